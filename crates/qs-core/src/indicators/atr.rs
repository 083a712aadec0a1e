//! Average True Range: Wilder smoothing of the true range.

use crate::engine::Engine;
use crate::series::{na, Series};

use super::BUILT_IN;

impl Engine {
    /// ATR over `length` bars.
    ///
    /// True range is `high − low` on the first bar, otherwise
    /// `max(high − low, |high − prev close|, |low − prev close|)`; the result
    /// is `RMA(TR, length)` carried in the storage named by `label`.
    pub fn atr(&self, length: f64, label: Option<&str>) -> Series {
        let label = self.resolve_label(label);
        let engine = self.clone();
        let cache_label = format!("{BUILT_IN}{label}");
        self.wrapper(move || {
            let high = engine.high();
            let low = engine.low();
            let close = engine.close();

            let true_range: Series = if na(high.g(1)) {
                high.sub(&low)
            } else {
                engine.max(
                    &engine.max(&high.sub(&low), &high.sub(close.b(1)).custom(f64::abs)),
                    &low.sub(close.b(1)).custom(f64::abs),
                )
            };

            engine.rma(&true_range, length, Some(&label)).get()
        })
        .cache(Some(&cache_label))
    }
}
