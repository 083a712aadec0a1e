//! Lazy numeric series.
//!
//! A series answers one question: "what is my value at the current effective
//! index?" where the effective index is `bar_index - func_offset` on the
//! owning engine. Two variants exist: data-backed series read a shared float
//! buffer (price series and indicator writeback storages), thunk-backed
//! series re-derive their value through a closure. Both carry an immutable
//! pipeline of pending arithmetic operations applied at read time.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::warn;

use crate::engine::EngineCtx;

/// True iff `value` is NaN or ±Inf.
pub fn na(value: f64) -> bool {
    !value.is_finite()
}

/// `value` if finite, else 0.
pub fn nz(value: f64) -> f64 {
    nz_or(value, 0.0)
}

/// `value` if finite, else `replacement`.
pub fn nz_or(value: f64, replacement: f64) -> f64 {
    if na(value) {
        replacement
    } else {
        value
    }
}

/// First finite value, or NaN if none.
pub fn coalesce(values: &[f64]) -> f64 {
    values.iter().copied().find(|v| !na(*v)).unwrap_or(f64::NAN)
}

/// A pipeline operand: a constant, or another series read lazily at the
/// caller's effective index.
#[derive(Clone)]
pub enum Operand {
    Const(f64),
    Series(Series),
}

impl Operand {
    fn value(&self) -> f64 {
        match self {
            Operand::Const(c) => *c,
            Operand::Series(s) => s.get(),
        }
    }
}

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Operand::Const(value)
    }
}

impl From<Series> for Operand {
    fn from(series: Series) -> Self {
        Operand::Series(series)
    }
}

impl From<&Series> for Operand {
    fn from(series: &Series) -> Self {
        Operand::Series(series.clone())
    }
}

#[derive(Clone)]
enum Op {
    Add(Operand),
    Sub(Operand),
    Mul(Operand),
    Div(Operand),
    Custom(Rc<dyn Fn(f64) -> f64>),
}

#[derive(Clone)]
enum Kind {
    /// Values live in a shared growable buffer; `diff` is the bar index at
    /// which the buffer starts.
    Data {
        buf: Rc<RefCell<Vec<f64>>>,
        diff: i64,
    },
    /// Value re-derived by a closure on every read.
    Thunk(Rc<dyn Fn() -> f64>),
}

/// A lazily-evaluated float sequence tied to an engine's cursor.
///
/// Cloning is cheap (reference-counted handles); derivation methods return a
/// new series sharing the pipeline prefix without mutating the receiver.
#[derive(Clone)]
pub struct Series {
    ctx: Rc<EngineCtx>,
    kind: Kind,
    ops: Rc<Vec<Op>>,
    cache_label: Option<Rc<str>>,
}

impl Series {
    pub(crate) fn data(ctx: Rc<EngineCtx>, buf: Rc<RefCell<Vec<f64>>>, diff: i64) -> Self {
        Self {
            ctx,
            kind: Kind::Data { buf, diff },
            ops: Rc::new(Vec::new()),
            cache_label: None,
        }
    }

    pub(crate) fn thunk(ctx: Rc<EngineCtx>, f: impl Fn() -> f64 + 'static) -> Self {
        Self {
            ctx,
            kind: Kind::Thunk(Rc::new(f)),
            ops: Rc::new(Vec::new()),
            cache_label: None,
        }
    }

    fn derive(&self, op: Op) -> Series {
        let mut ops: Vec<Op> = self.ops.as_ref().clone();
        ops.push(op);
        Series {
            ctx: self.ctx.clone(),
            kind: self.kind.clone(),
            ops: Rc::new(ops),
            cache_label: None,
        }
    }

    pub fn add(&self, value: impl Into<Operand>) -> Series {
        self.derive(Op::Add(value.into()))
    }

    pub fn sub(&self, value: impl Into<Operand>) -> Series {
        self.derive(Op::Sub(value.into()))
    }

    pub fn mul(&self, value: impl Into<Operand>) -> Series {
        self.derive(Op::Mul(value.into()))
    }

    pub fn div(&self, value: impl Into<Operand>) -> Series {
        self.derive(Op::Div(value.into()))
    }

    /// Append a unary function applied to the running value.
    pub fn custom(&self, f: impl Fn(f64) -> f64 + 'static) -> Series {
        self.derive(Op::Custom(Rc::new(f)))
    }

    fn apply_ops(&self, mut value: f64) -> f64 {
        for op in self.ops.iter() {
            value = match op {
                Op::Add(o) => value + o.value(),
                Op::Sub(o) => value - o.value(),
                Op::Mul(o) => value * o.value(),
                Op::Div(o) => value / o.value(),
                Op::Custom(f) => f(value),
            };
        }
        value
    }

    /// Value at the current effective index, after the operation pipeline.
    ///
    /// Out-of-range data reads yield NaN. A cached thunk is evaluated at most
    /// once per `(label, effective_index)`.
    pub fn get(&self) -> f64 {
        match &self.kind {
            Kind::Data { buf, diff } => {
                let index = self.ctx.effective_index() - diff;
                let base = {
                    let buf = buf.borrow();
                    if index < 0 || index as usize >= buf.len() {
                        return f64::NAN;
                    }
                    buf[index as usize]
                };
                self.apply_ops(base)
            }
            Kind::Thunk(f) => {
                let index = self.ctx.effective_index();
                if let Some(label) = &self.cache_label {
                    if let Some(hit) = self.ctx.cache_get(label, index) {
                        return hit;
                    }
                }
                let value = self.apply_ops(f());
                if let Some(label) = &self.cache_label {
                    self.ctx.cache_put(label, index, value);
                }
                value
            }
        }
    }

    /// Value `steps` bars back from the current effective index.
    pub fn g(&self, steps: i64) -> f64 {
        if steps == 0 {
            return self.get();
        }
        let _guard = self.ctx.offset(steps);
        self.get()
    }

    /// A lagged view: `b(k).get()` behaves as `g(k)` on the receiver.
    pub fn b(&self, steps: i64) -> Series {
        let lagged = self.clone();
        Series::thunk(self.ctx.clone(), move || lagged.g(steps))
    }

    /// −1 / 0 / +1 for the current value, NaN for NaN.
    pub fn sign(&self) -> f64 {
        let value = self.get();
        if value.is_nan() {
            f64::NAN
        } else if value == 0.0 {
            0.0
        } else if value > 0.0 {
            1.0
        } else {
            -1.0
        }
    }

    /// True iff the current value is NaN or ±Inf.
    pub fn na(&self) -> bool {
        na(self.get())
    }

    /// Current value if finite, else 0.
    pub fn nz(&self) -> f64 {
        nz(self.get())
    }

    /// Current value if finite, else `replacement`.
    pub fn nz_or(&self, replacement: f64) -> f64 {
        nz_or(self.get(), replacement)
    }

    /// Memoize this series under `label` (auto-generated when `None`).
    ///
    /// Only thunk-backed series can be cached; on a data-backed series this
    /// is a misuse and returns the receiver unchanged.
    pub fn cache(&self, label: Option<&str>) -> Series {
        match &self.kind {
            Kind::Data { .. } => {
                warn!(?label, "cache() ignored: series is data-backed");
                self.clone()
            }
            Kind::Thunk(_) => {
                let label = label
                    .map(str::to_owned)
                    .unwrap_or_else(|| self.ctx.next_auto_label());
                Series {
                    cache_label: Some(label.into()),
                    ..self.clone()
                }
            }
        }
    }

    /// Write `value` into the storage slot `steps` bars back.
    ///
    /// Out-of-range writes are dropped. On a thunk-backed series this is a
    /// misuse and a no-op.
    pub fn set(&self, steps: i64, value: f64) {
        match &self.kind {
            Kind::Data { buf, diff } => {
                let index = self.ctx.effective_index() - steps - diff;
                let mut buf = buf.borrow_mut();
                if index >= 0 && (index as usize) < buf.len() {
                    buf[index as usize] = value;
                }
            }
            Kind::Thunk(_) => warn!("set() ignored: series is not data-backed"),
        }
    }

    /// Append raw values to the underlying buffer.
    ///
    /// On a thunk-backed series this is a misuse and a no-op.
    pub fn add_data(&self, values: &[f64]) {
        match &self.kind {
            Kind::Data { buf, .. } => buf.borrow_mut().extend_from_slice(values),
            Kind::Thunk(_) => warn!("add_data() ignored: series is not data-backed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candle::Bar;
    use crate::engine::Engine;

    fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 1.0,
                time: 100.0 * (i as f64 + 1.0),
            })
            .collect()
    }

    fn engine_with_closes(closes: &[f64]) -> Engine {
        let engine = Engine::new();
        engine.add_bars(&bars_from_closes(closes));
        engine
    }

    #[test]
    fn free_helpers() {
        assert!(na(f64::NAN));
        assert!(na(f64::INFINITY));
        assert!(na(f64::NEG_INFINITY));
        assert!(!na(0.0));
        assert_eq!(nz(f64::NAN), 0.0);
        assert_eq!(nz(3.5), 3.5);
        assert_eq!(nz_or(f64::NAN, 7.0), 7.0);
        assert_eq!(coalesce(&[f64::NAN, f64::INFINITY, 2.0, 3.0]), 2.0);
        assert!(coalesce(&[f64::NAN]).is_nan());
    }

    #[test]
    fn derivation_does_not_mutate_the_parent() {
        let engine = engine_with_closes(&[10.0]);
        let close = engine.close();
        let scaled = close.mul(2.0).add(1.0);
        assert_eq!(scaled.get(), 21.0);
        assert_eq!(close.get(), 10.0);

        // Two children derived from the same parent must not see each other.
        let doubled = close.mul(2.0);
        let tripled = close.mul(3.0);
        assert_eq!(doubled.get(), 20.0);
        assert_eq!(tripled.get(), 30.0);
    }

    #[test]
    fn pipeline_constants_and_custom() {
        let engine = engine_with_closes(&[4.0]);
        let close = engine.close();
        assert_eq!(close.sub(1.0).get(), 3.0);
        assert_eq!(close.div(2.0).get(), 2.0);
        assert_eq!(close.custom(|v| v * v).get(), 16.0);
    }

    #[test]
    fn series_operands_evaluate_at_the_reader_index() {
        let engine = Engine::new();
        let mut bars = bars_from_closes(&[1.0, 2.0, 3.0]);
        bars[0].volume = 2.0;
        bars[1].volume = 5.0;
        bars[2].volume = 10.0;
        engine.add_bars(&bars);

        let close = engine.close();
        let volume = engine.volume();
        // The operand is the volume *series*: it must be read at the same
        // effective index as the receiver, not captured at derivation time.
        let product = close.mul(&volume);
        let collected = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = collected.clone();
        engine.run(move |_| {
            sink.borrow_mut().push((product.get(), product.g(1)));
        });
        let got = collected.borrow();
        assert_eq!(got[0].0, 2.0);
        assert!(got[0].1.is_nan());
        assert_eq!(got[1], (10.0, 2.0));
        assert_eq!(got[2], (30.0, 10.0));
    }

    #[test]
    fn lagged_view_matches_direct_history() {
        let engine = engine_with_closes(&[5.0, 6.0, 7.0, 8.0]);
        let close = engine.close();
        let lagged = close.b(2);
        let collected = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = collected.clone();
        engine.run(move |_| {
            sink.borrow_mut().push((lagged.get(), close.g(2)));
        });
        for (i, (via_b, via_g)) in collected.borrow().iter().enumerate() {
            if i < 2 {
                assert!(via_b.is_nan());
                assert!(via_g.is_nan());
            } else {
                assert_eq!(via_b, via_g);
                assert_eq!(*via_b, 5.0 + (i as f64 - 2.0));
            }
        }
    }

    #[test]
    fn nested_lags_compose() {
        let engine = engine_with_closes(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let close = engine.close();
        let twice = close.b(1).b(2);
        let collected = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = collected.clone();
        engine.run(move |_| sink.borrow_mut().push((twice.get(), close.g(3))));
        for (via_nested, via_g) in collected.borrow().iter() {
            assert!(via_nested == via_g || (via_nested.is_nan() && via_g.is_nan()));
        }
    }

    #[test]
    fn out_of_range_reads_are_nan_before_the_pipeline() {
        let engine = engine_with_closes(&[10.0]);
        let close = engine.close();
        // A pipeline that would mask NaN must not run on an out-of-range read.
        let masked = close.custom(|_| 42.0);
        assert!(masked.g(1).is_nan());
        assert_eq!(masked.get(), 42.0);
    }

    #[test]
    fn sign_and_na() {
        let engine = engine_with_closes(&[-3.0]);
        let close = engine.close();
        assert_eq!(close.sign(), -1.0);
        assert_eq!(close.mul(-1.0).sign(), 1.0);
        assert_eq!(close.mul(0.0).sign(), 0.0);
        assert!(close.g(5).is_nan());
        assert!(close.b(5).na());
        assert_eq!(close.b(5).nz_or(9.0), 9.0);
        // Division by zero is NA, not an error.
        assert!(close.div(0.0).na());
    }

    #[test]
    fn misuse_is_a_noop() {
        let engine = engine_with_closes(&[1.0, 2.0]);
        let close = engine.close();
        let wrapper = engine.wrapper(|| 5.0);
        // set/add_data on a thunk do nothing.
        wrapper.set(0, 99.0);
        wrapper.add_data(&[1.0]);
        assert_eq!(wrapper.get(), 5.0);
        // cache on a data series returns it unchanged.
        let cached = close.cache(Some("x"));
        assert_eq!(cached.get(), close.get());
    }

    #[test]
    fn offset_restored_on_every_exit_path() {
        let engine = engine_with_closes(&[1.0, 2.0, 3.0]);
        let close = engine.close();
        // Deep nested historical reads leave the cursor untouched.
        let nested = close.b(1).b(1).b(1);
        let _ = nested.get();
        assert_eq!(close.get(), 1.0);
    }
}
