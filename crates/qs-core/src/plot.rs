//! Plot and line emission, and post-run finalization.
//!
//! Emitters append to the engine's stores while the strategy runs. After the
//! run, `fill_gaps` densifies every plot so each bar index has exactly one
//! point, and `dedup_straight_lines` keeps the first of identical horizontal
//! and vertical lines.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::candle::Bar;
use crate::engine::Engine;
use crate::series::na;

fn is_zero_f64(value: &f64) -> bool {
    *value == 0.0
}

fn is_zero_i64(value: &i64) -> bool {
    *value == 0
}

/// Rendering options for a plot label. Zero/empty fields are omitted on the
/// wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlotConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub color: String,
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub width: f64,
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub dashed: f64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub smooth: i64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub precision: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub shift: i64,
}

/// Rendering options for a line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub color: String,
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub width: f64,
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub dashed: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub shift: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LineType {
    #[serde(rename = "horizontalStraightLine")]
    Horizontal,
    #[serde(rename = "verticalStraightLine")]
    Vertical,
    #[serde(rename = "segment")]
    Segment,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// One emitted plot value; `value` is `null` on the wire where the strategy
/// emitted NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotPoint {
    pub value: Option<f64>,
    pub index: i64,
    #[serde(rename = "timestamp")]
    pub time: i64,
}

/// All points emitted under one plot label, with the label's config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlotData {
    pub data: Vec<PlotPoint>,
    pub config: PlotConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineData {
    #[serde(rename = "type")]
    pub line_type: LineType,
    pub config: LineConfig,
    pub points: Vec<Point>,
}

const CANDLE_PANE: &str = "candle_pane";

impl Engine {
    /// Emit a value under a plot label (auto-generated when `None`).
    ///
    /// The shifted index must land inside the bar range or the point is
    /// dropped; the label's config is replaced by each in-range emission.
    pub fn plot(&self, value: f64, config: Option<PlotConfig>, label: Option<&str>) {
        let label = label
            .map(str::to_owned)
            .unwrap_or_else(|| self.ctx.next_auto_label());
        let mut config = config.unwrap_or_default();
        if config.location.is_empty() {
            config.location = label.clone();
        }

        let mut plots = self.ctx.plots.borrow_mut();
        let entry = plots.entry(label).or_insert_with(|| PlotData {
            data: Vec::new(),
            config: config.clone(),
        });

        let index = self.ctx.bar_index.get() + config.shift;
        let bars = self.ctx.bars.borrow();
        if index < 0 || index as usize >= bars.len() {
            self.ctx.dropped.set(self.ctx.dropped.get() + 1);
            return;
        }

        entry.data.push(PlotPoint {
            value: if na(value) { None } else { Some(value) },
            index,
            time: bars[index as usize].time as i64,
        });
        entry.config = config;
    }

    /// Emit a horizontal line at `value`, anchored at the current (shifted)
    /// bar's time.
    pub fn hline(&self, value: f64, config: Option<LineConfig>) {
        let mut config = config.unwrap_or_default();
        if config.location.is_empty() {
            config.location = CANDLE_PANE.to_owned();
        }

        let index = self.ctx.bar_index.get() + config.shift;
        let bars = self.ctx.bars.borrow();
        if index < 0 || index as usize >= bars.len() {
            self.ctx.dropped.set(self.ctx.dropped.get() + 1);
            return;
        }

        let x = bars[index as usize].time;
        self.ctx.lines.borrow_mut().push(LineData {
            line_type: LineType::Horizontal,
            config,
            points: vec![Point { x, y: value }],
        });
    }

    /// Emit a vertical line through the current (shifted) bar, anchored at
    /// the open/close midpoint.
    pub fn vline(&self, config: Option<LineConfig>) {
        let mut config = config.unwrap_or_default();
        if config.location.is_empty() {
            config.location = CANDLE_PANE.to_owned();
        }

        let index = self.ctx.bar_index.get() + config.shift;
        let bars = self.ctx.bars.borrow();
        if index < 0 || index as usize >= bars.len() {
            self.ctx.dropped.set(self.ctx.dropped.get() + 1);
            return;
        }

        let bar = bars[index as usize];
        self.ctx.lines.borrow_mut().push(LineData {
            line_type: LineType::Vertical,
            config,
            points: vec![Point {
                x: bar.time,
                y: (bar.open + bar.close) / 2.0,
            }],
        });
    }

    /// Emit a segment between two chart points. No shift applies.
    pub fn line(&self, p1: Point, p2: Point, config: Option<LineConfig>) {
        let mut config = config.unwrap_or_default();
        if config.location.is_empty() {
            config.location = CANDLE_PANE.to_owned();
        }

        self.ctx.lines.borrow_mut().push(LineData {
            line_type: LineType::Segment,
            config,
            points: vec![p1, p2],
        });
    }
}

/// Densify every non-empty plot so each bar index in `[0, bars.len())` has
/// exactly one point.
///
/// Leading and trailing bars get absent values; interior gaps interpolate
/// linearly when both neighbours are present, carry the present neighbour
/// when one is absent, and stay absent otherwise. Gap times interpolate in
/// integer arithmetic.
pub fn fill_gaps(bars: &[Bar], plots: &mut BTreeMap<String, PlotData>) {
    for data in plots.values_mut() {
        if data.data.is_empty() {
            continue;
        }

        let first_index = data.data[0].index;
        let last_index = data.data[data.data.len() - 1].index;
        let mut filled = Vec::with_capacity(bars.len());

        for i in 0..first_index {
            filled.push(PlotPoint {
                value: None,
                index: i,
                time: bars[i as usize].time as i64,
            });
        }

        filled.push(data.data[0].clone());

        for pair in data.data.windows(2) {
            let (prev, curr) = (&pair[0], &pair[1]);
            let gap = curr.index - prev.index - 1;

            for j in 1..=gap {
                let value = match (prev.value, curr.value) {
                    (Some(p), Some(c)) => Some(p + (c - p) * j as f64 / (gap + 1) as f64),
                    (None, Some(c)) => Some(c),
                    (Some(p), None) => Some(p),
                    (None, None) => None,
                };
                filled.push(PlotPoint {
                    value,
                    index: prev.index + j,
                    time: prev.time + (curr.time - prev.time) * j / (gap + 1),
                });
            }

            filled.push(curr.clone());
        }

        for i in (last_index + 1)..bars.len() as i64 {
            filled.push(PlotPoint {
                value: None,
                index: i,
                time: bars[i as usize].time as i64,
            });
        }

        data.data = filled;
    }
}

/// Drop repeated horizontal lines sharing `(config, y)` and vertical lines
/// sharing `(config, x)`; the first emission wins. Segments pass through.
pub fn dedup_straight_lines(lines: &mut Vec<LineData>) {
    let mut seen = FxHashSet::default();
    lines.retain(|line| match line.line_type {
        LineType::Horizontal => seen.insert(format!(
            "{:?}|{:?}|{}",
            line.line_type, line.config, line.points[0].y
        )),
        LineType::Vertical => seen.insert(format!(
            "{:?}|{:?}|{}",
            line.line_type, line.config, line.points[0].x
        )),
        LineType::Segment => true,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar_at(time: f64) -> Bar {
        Bar {
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 1.0,
            time,
        }
    }

    fn point(value: Option<f64>, index: i64, time: i64) -> PlotPoint {
        PlotPoint { value, index, time }
    }

    #[test]
    fn fill_gaps_interpolates_values_and_times() {
        let bars: Vec<Bar> = [100.0, 200.0, 300.0, 400.0].map(bar_at).to_vec();
        let mut plots = BTreeMap::new();
        plots.insert(
            "p".to_owned(),
            PlotData {
                data: vec![point(Some(10.0), 0, 100), point(Some(40.0), 3, 400)],
                config: PlotConfig::default(),
            },
        );

        fill_gaps(&bars, &mut plots);

        let data = &plots["p"].data;
        assert_eq!(data.len(), 4);
        assert_eq!(
            data.iter().map(|p| p.value.unwrap()).collect::<Vec<_>>(),
            vec![10.0, 20.0, 30.0, 40.0]
        );
        // Integer time arithmetic: 100 + 300*j/3.
        assert_eq!(
            data.iter().map(|p| p.time).collect::<Vec<_>>(),
            vec![100, 200, 300, 400]
        );
        assert_eq!(
            data.iter().map(|p| p.index).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn fill_gaps_pads_leading_and_trailing_bars() {
        let bars: Vec<Bar> = [100.0, 200.0, 300.0, 400.0].map(bar_at).to_vec();
        let mut plots = BTreeMap::new();
        plots.insert(
            "p".to_owned(),
            PlotData {
                data: vec![point(Some(5.0), 1, 200), point(Some(6.0), 2, 300)],
                config: PlotConfig::default(),
            },
        );

        fill_gaps(&bars, &mut plots);

        let data = &plots["p"].data;
        assert_eq!(data.len(), 4);
        assert_eq!(data[0], point(None, 0, 100));
        assert_eq!(data[3], point(None, 3, 400));
    }

    #[test]
    fn fill_gaps_carries_the_present_neighbour() {
        let bars: Vec<Bar> = [100.0, 200.0, 300.0].map(bar_at).to_vec();
        let mut plots = BTreeMap::new();
        plots.insert(
            "carry".to_owned(),
            PlotData {
                data: vec![point(None, 0, 100), point(Some(8.0), 2, 300)],
                config: PlotConfig::default(),
            },
        );
        plots.insert(
            "absent".to_owned(),
            PlotData {
                data: vec![point(None, 0, 100), point(None, 2, 300)],
                config: PlotConfig::default(),
            },
        );

        fill_gaps(&bars, &mut plots);

        assert_eq!(plots["carry"].data[1].value, Some(8.0));
        assert_eq!(plots["absent"].data[1].value, None);
    }

    #[test]
    fn fill_gaps_leaves_empty_plots_alone() {
        let bars: Vec<Bar> = [100.0].map(bar_at).to_vec();
        let mut plots = BTreeMap::new();
        plots.insert("empty".to_owned(), PlotData::default());
        fill_gaps(&bars, &mut plots);
        assert!(plots["empty"].data.is_empty());
    }

    #[test]
    fn dedup_keeps_first_of_identical_straight_lines() {
        let hline = |y: f64, color: &str| LineData {
            line_type: LineType::Horizontal,
            config: LineConfig {
                color: color.to_owned(),
                ..Default::default()
            },
            points: vec![Point { x: 100.0, y }],
        };
        let segment = LineData {
            line_type: LineType::Segment,
            config: LineConfig::default(),
            points: vec![Point { x: 0.0, y: 0.0 }, Point { x: 1.0, y: 1.0 }],
        };

        let mut lines = vec![
            hline(30.0, "red"),
            segment.clone(),
            hline(30.0, "red"),
            hline(30.0, "blue"),
            segment.clone(),
        ];
        dedup_straight_lines(&mut lines);

        // One red 30, one blue 30, both segments untouched.
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].config.color, "red");
        assert_eq!(lines[2].config.color, "blue");
        assert_eq!(
            lines
                .iter()
                .filter(|l| l.line_type == LineType::Segment)
                .count(),
            2
        );
    }

    #[test]
    fn dedup_verticals_key_on_x() {
        let vline = |x: f64| LineData {
            line_type: LineType::Vertical,
            config: LineConfig::default(),
            points: vec![Point { x, y: 5.0 }],
        };
        let mut lines = vec![vline(100.0), vline(100.0), vline(200.0)];
        dedup_straight_lines(&mut lines);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn config_serialization_omits_zero_fields() {
        let config = PlotConfig {
            color: "#fff".to_owned(),
            ..Default::default()
        };
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value, serde_json::json!({ "color": "#fff" }));
    }

    #[test]
    fn line_type_wire_names() {
        assert_eq!(
            serde_json::to_value(LineType::Horizontal).unwrap(),
            "horizontalStraightLine"
        );
        assert_eq!(
            serde_json::to_value(LineType::Vertical).unwrap(),
            "verticalStraightLine"
        );
        assert_eq!(serde_json::to_value(LineType::Segment).unwrap(), "segment");
    }
}
