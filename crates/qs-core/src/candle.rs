use serde::Serialize;

use crate::series::na;

/// One OHLCV record at a single timestamp (unix seconds).
///
/// Gap bars inserted by ingestion carry NaN prices and a real timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub time: f64,
}

impl Bar {
    /// A NaN-valued filler bar for a missing timestamp.
    pub fn gap(time: f64) -> Self {
        Self {
            open: f64::NAN,
            high: f64::NAN,
            low: f64::NAN,
            close: f64::NAN,
            volume: f64::NAN,
            time,
        }
    }
}

/// Wire form of a bar: NaN/Inf fields collapse to `null`.
#[derive(Debug, Clone, Serialize)]
pub struct BarJson {
    pub close: Option<f64>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<f64>,
    #[serde(rename = "timestamp")]
    pub time: Option<f64>,
}

fn finite(value: f64) -> Option<f64> {
    if na(value) {
        None
    } else {
        Some(value)
    }
}

impl From<&Bar> for BarJson {
    fn from(bar: &Bar) -> Self {
        Self {
            close: finite(bar.close),
            open: finite(bar.open),
            high: finite(bar.high),
            low: finite(bar.low),
            volume: finite(bar.volume),
            time: finite(bar.time),
        }
    }
}
