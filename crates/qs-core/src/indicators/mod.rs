//! TA indicator factories.
//!
//! Each factory builds a thunk-backed series over the engine's cursor.
//! Recurrent indicators (EMA/RMA/RSI/ATR) carry their state in a writeback
//! storage keyed by label and memoize under the same label with a built-in
//! prefix, so user labels never collide with indicator caches.

mod atr;
mod cross;
mod divergence;
mod lookback;
mod ma;
mod rsi;

use crate::engine::Engine;
use crate::series::Series;

/// Boolean series encoding.
pub const TRUE: f64 = 1.0;
pub const FALSE: f64 = 0.0;

/// Prefix separating built-in indicator cache buckets from user labels.
pub(crate) const BUILT_IN: &str = "_";

/// NaN-propagating max: NaN if either operand is NaN.
pub(crate) fn nan_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.max(b)
    }
}

/// NaN-propagating min.
pub(crate) fn nan_min(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.min(b)
    }
}

impl Engine {
    pub(crate) fn resolve_label(&self, label: Option<&str>) -> String {
        label
            .map(str::to_owned)
            .unwrap_or_else(|| self.ctx.next_auto_label())
    }

    /// Element-wise max of two series; NaN if either side is NaN.
    pub fn max(&self, src1: &Series, src2: &Series) -> Series {
        let (a, b) = (src1.clone(), src2.clone());
        self.wrapper(move || nan_max(a.get(), b.get()))
    }

    /// Element-wise min of two series; NaN if either side is NaN.
    pub fn min(&self, src1: &Series, src2: &Series) -> Series {
        let (a, b) = (src1.clone(), src2.clone());
        self.wrapper(move || nan_min(a.get(), b.get()))
    }

    /// Difference vs. `length` bars back (default 1). `length == 0` returns
    /// the value itself.
    pub fn change(&self, src: &Series, length: Option<i64>) -> Series {
        let src = src.clone();
        self.wrapper(move || {
            let step = length.unwrap_or(1);
            if step == 0 {
                return src.get();
            }
            src.sub(src.b(step)).get()
        })
    }
}
