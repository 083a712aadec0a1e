//! Historical-scan indicators: bars-since, value-when, and pivots.

use crate::engine::Engine;
use crate::series::Series;

use super::{FALSE, TRUE};

impl Engine {
    /// Bars elapsed since `cond` last held, scanning from the current bar
    /// backwards. NaN if it never held in range.
    pub fn bars_since(&self, cond: impl Fn() -> bool + 'static) -> Series {
        let engine = self.clone();
        self.wrapper(move || {
            for i in 0..engine.ctx.bar_count() as i64 {
                let hit = {
                    let _guard = engine.ctx.offset(i);
                    cond()
                };
                if hit {
                    return i as f64;
                }
            }
            f64::NAN
        })
    }

    /// Value of `src` at the `occurrence`-th (0-indexed) time `cond` held,
    /// scanning backwards from the current bar. NaN if not enough
    /// occurrences exist.
    pub fn value_when(
        &self,
        src: &Series,
        cond: impl Fn() -> bool + 'static,
        occurrence: usize,
    ) -> Series {
        let engine = self.clone();
        let src = src.clone();
        self.wrapper(move || {
            // The occurrence counter restarts on every evaluation.
            let mut times = 0;
            for i in 0..engine.ctx.bar_count() as i64 {
                let hit = {
                    let _guard = engine.ctx.offset(i);
                    cond()
                };
                if hit {
                    if times >= occurrence {
                        return src.g(i);
                    }
                    times += 1;
                }
            }
            f64::NAN
        })
    }

    /// True when the bar `right_bars` back is a strict local maximum of
    /// `src` (defaults to `high`) over the left/right windows.
    ///
    /// NaN neighbours never disqualify a candidate.
    pub fn pivot_high(&self, left_bars: i64, right_bars: i64, source: Option<&Series>) -> Series {
        let src = source.cloned().unwrap_or_else(|| self.high());
        self.wrapper(move || {
            let center = src.g(right_bars);

            for i in 1..=left_bars {
                if src.g(right_bars + i) >= center {
                    return FALSE;
                }
            }
            for i in 1..=right_bars {
                if src.g(right_bars - i) >= center {
                    return FALSE;
                }
            }

            TRUE
        })
    }

    /// True when the bar `right_bars` back is a strict local minimum of
    /// `src` (defaults to `low`).
    pub fn pivot_low(&self, left_bars: i64, right_bars: i64, source: Option<&Series>) -> Series {
        let src = source.cloned().unwrap_or_else(|| self.low());
        self.wrapper(move || {
            let center = src.g(right_bars);

            for i in 1..=left_bars {
                if src.g(right_bars + i) <= center {
                    return FALSE;
                }
            }
            for i in 1..=right_bars {
                if src.g(right_bars - i) <= center {
                    return FALSE;
                }
            }

            TRUE
        })
    }
}
