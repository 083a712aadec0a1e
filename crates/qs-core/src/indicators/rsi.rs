//! Relative Strength Index over Wilder-smoothed gains and losses.

use crate::engine::Engine;
use crate::series::Series;

use super::BUILT_IN;

impl Engine {
    /// RSI of `src` over `length` bars.
    ///
    /// Gains and losses are clamped against the zero-valued storage named by
    /// `label`; the smoothed averages live in the `u`/`d` suffixed storages.
    pub fn rsi(&self, src: &Series, length: f64, label: Option<&str>) -> Series {
        let label = self.resolve_label(label);
        let engine = self.clone();
        let src = src.clone();
        let cache_label = format!("{BUILT_IN}{label}");
        self.wrapper(move || {
            let zero = engine.storage(&label);

            let u = engine.max(&src.sub(src.b(1)), &zero);
            let d = engine.max(&src.b(1).sub(&src), &zero);

            let rs = engine
                .rma(&u, length, Some(&format!("{label}u")))
                .div(&engine.rma(&d, length, Some(&format!("{label}d"))));

            100.0 - 100.0 / (1.0 + rs.get())
        })
        .cache(Some(&cache_label))
    }
}

#[cfg(test)]
mod tests {
    use crate::indicators::test_support::{assert_seq, collect};

    #[test]
    fn rsi_hand_computed_sequence() {
        // length 2, alpha 1/2. Gains/losses seed through the SMA inside RMA,
        // so the first finite value appears once two finite diffs exist.
        //   bar 2: avg gain 1, avg loss 0  → RSI 100
        //   bar 3: avg gain ½, avg loss ½  → RSI 50
        //   bar 4: avg gain ¾, avg loss ¼  → RSI 75
        let values = collect(&[10.0, 11.0, 12.0, 11.0, 12.0], |eng| {
            eng.rsi(&eng.close(), 2.0, Some("r"))
        });
        assert_seq(&values, &[f64::NAN, f64::NAN, 100.0, 50.0, 75.0]);
    }

    #[test]
    fn rsi_is_100_with_no_losses_and_0_with_no_gains() {
        let rising = collect(&[1.0, 2.0, 3.0, 4.0], |eng| {
            eng.rsi(&eng.close(), 2.0, Some("up"))
        });
        assert_seq(&rising[2..], &[100.0, 100.0]);

        let falling = collect(&[4.0, 3.0, 2.0, 1.0], |eng| {
            eng.rsi(&eng.close(), 2.0, Some("down"))
        });
        assert_seq(&falling[2..], &[0.0, 0.0]);
    }
}
