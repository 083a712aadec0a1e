//! Bullish RSI divergence: oscillator higher low against a price lower low.

use crate::engine::Engine;
use crate::series::{na, Series};

use super::{BUILT_IN, FALSE, TRUE};

impl Engine {
    /// True on bars where a bullish divergence confirms.
    ///
    /// The oscillator is `RSI(rsi_source, rsi_len)`; a confirmation needs a
    /// pivot low on the oscillator, a previous pivot between `range_lower`
    /// and `range_upper` bars back, the oscillator above its value at that
    /// pivot, and the price low below its value at that pivot.
    #[allow(clippy::too_many_arguments)]
    pub fn divergence(
        &self,
        rsi_len: i64,
        rsi_source: &Series,
        lb_r: i64,
        lb_l: i64,
        range_upper: i64,
        range_lower: i64,
        label: Option<&str>,
    ) -> Series {
        let label = self.resolve_label(label);
        let engine = self.clone();
        let rsi_source = rsi_source.clone();
        // The oscillator gets its own label so its cache bucket never
        // collides with the divergence result bucket.
        let osc_label = format!("{label}osc");
        let cache_label = format!("{BUILT_IN}{label}");
        self.wrapper(move || {
            let osc = engine.rsi(&rsi_source, rsi_len as f64, Some(&osc_label));
            let pl = engine.pivot_low(lb_l, lb_r, Some(&osc));

            if pl.get() != TRUE {
                return FALSE;
            }

            // Previous oscillator pivot close enough, and the oscillator
            // bottomed higher than it did there.
            let prev_pivot_in_range = {
                let pl = pl.clone();
                let since = engine.bars_since(move || pl.g(1) == TRUE).get();
                !na(since) && {
                    let bars = since as i64;
                    range_lower <= bars && bars <= range_upper
                }
            };
            let osc_higher_low = prev_pivot_in_range && {
                let pl = pl.clone();
                osc.g(lb_r)
                    > engine
                        .value_when(&osc.b(lb_r), move || pl.get() == TRUE, 1)
                        .get()
            };
            if !osc_higher_low {
                return FALSE;
            }

            // Price made a lower low at the pivot bar.
            let low = engine.low();
            let pl = pl.clone();
            let price_lower_low = low.b(lb_r).get()
                < engine
                    .value_when(&low.b(lb_r), move || pl.get() == TRUE, 1)
                    .get();
            if !price_lower_low {
                return FALSE;
            }

            TRUE
        })
        .cache(Some(&cache_label))
    }
}
