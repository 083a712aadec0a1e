//! Moving averages: SMA, VWMA, and the recurrent EMA/RMA.

use crate::engine::Engine;
use crate::series::{na, nz, Series};

use super::BUILT_IN;

impl Engine {
    /// Simple moving average over the last `length` bars.
    ///
    /// A window reaching past the first bar picks up NaN reads, so the whole
    /// average is NaN until the window fits.
    pub fn sma(&self, src: &Series, length: f64) -> Series {
        let src = src.clone();
        self.wrapper(move || {
            let mut sum = 0.0;
            for i in 0..length as i64 {
                sum += src.g(i);
            }
            sum / length
        })
    }

    /// Volume-weighted moving average: `SMA(src·volume, n) / SMA(volume, n)`.
    pub fn vwma(&self, src: &Series, length: f64) -> Series {
        let engine = self.clone();
        let src = src.clone();
        self.wrapper(move || {
            let up = engine.sma(&src.mul(engine.volume()), length);
            let down = engine.sma(&engine.volume(), length);
            up.div(&down).get()
        })
    }

    /// Exponential moving average, seeded with the source on the first bar.
    pub fn ema(&self, src: &Series, length: f64, label: Option<&str>) -> Series {
        let label = self.resolve_label(label);
        let engine = self.clone();
        let src = src.clone();
        let cache_label = format!("{BUILT_IN}{label}");
        self.wrapper(move || {
            let sum = engine.storage(&label);
            let alpha = 2.0 / (length + 1.0);
            let prev = sum.g(1);

            let result = if na(prev) {
                src.get()
            } else {
                alpha * src.get() + (1.0 - alpha) * nz(prev)
            };

            sum.set(0, result);
            result
        })
        .cache(Some(&cache_label))
    }

    /// Wilder's smoothing, seeded with `SMA(src, n)` on the first bar.
    pub fn rma(&self, src: &Series, length: f64, label: Option<&str>) -> Series {
        let label = self.resolve_label(label);
        let engine = self.clone();
        let src = src.clone();
        let cache_label = format!("{BUILT_IN}{label}");
        self.wrapper(move || {
            let alpha = 1.0 / length;
            let sum = engine.storage(&label);
            let prev = sum.g(1);

            let result = if na(prev) {
                engine.sma(&src, length).get()
            } else {
                alpha * src.get() + (1.0 - alpha) * nz(prev)
            };

            sum.set(0, result);
            result
        })
        .cache(Some(&cache_label))
    }
}
