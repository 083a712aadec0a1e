//! Cross detection between two series.

use crate::engine::Engine;
use crate::series::Series;

use super::{FALSE, TRUE};

impl Engine {
    /// True when `src1` crosses above `src2` on this bar.
    pub fn crossover(&self, src1: &Series, src2: &Series) -> Series {
        let (a, b) = (src1.clone(), src2.clone());
        self.wrapper(move || {
            if a.get() > b.get() && a.g(1) <= b.g(1) {
                TRUE
            } else {
                FALSE
            }
        })
    }

    /// True when `src1` crosses below `src2` on this bar.
    pub fn crossunder(&self, src1: &Series, src2: &Series) -> Series {
        let (a, b) = (src1.clone(), src2.clone());
        self.wrapper(move || {
            if a.get() < b.get() && a.g(1) >= b.g(1) {
                TRUE
            } else {
                FALSE
            }
        })
    }

    /// True when the series cross in either direction on this bar.
    pub fn cross(&self, src1: &Series, src2: &Series) -> Series {
        let (a, b) = (src1.clone(), src2.clone());
        self.wrapper(move || {
            let s1 = a.get();
            let s2 = b.get();
            let p1 = a.g(1);
            let p2 = b.g(1);

            if s1 > s2 && p1 <= p2 {
                return TRUE;
            }
            if s1 < s2 && p1 >= p2 {
                return TRUE;
            }

            FALSE
        })
    }
}
