//! Evaluation driver and engine state.
//!
//! The engine owns the bar store, the cursor (`bar_index`, `func_offset`),
//! the per-engine memoization cache, the indicator writeback storages, and
//! the plot/line stores. `run` iterates bars from 0 upward and invokes the
//! strategy once per bar; afterwards the plot store is densified and straight
//! lines are deduplicated.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::debug;

use crate::candle::{Bar, BarJson};
use crate::plot::{self, LineData, PlotData};
use crate::series::Series;

pub(crate) struct StorageSlot {
    pub(crate) buf: Rc<RefCell<Vec<f64>>>,
    pub(crate) diff: i64,
}

/// Shared engine internals. Series hold a handle to this; it never holds a
/// series back, so the reference graph stays acyclic.
pub(crate) struct EngineCtx {
    pub(crate) bar_index: Cell<i64>,
    pub(crate) func_offset: Cell<i64>,
    pub(crate) bars: RefCell<Vec<Bar>>,

    pub(crate) open: Rc<RefCell<Vec<f64>>>,
    pub(crate) high: Rc<RefCell<Vec<f64>>>,
    pub(crate) low: Rc<RefCell<Vec<f64>>>,
    pub(crate) close: Rc<RefCell<Vec<f64>>>,
    pub(crate) volume: Rc<RefCell<Vec<f64>>>,
    pub(crate) time: Rc<RefCell<Vec<f64>>>,

    pub(crate) storages: RefCell<FxHashMap<String, StorageSlot>>,
    cache: RefCell<FxHashMap<String, FxHashMap<i64, f64>>>,

    pub(crate) plots: RefCell<BTreeMap<String, PlotData>>,
    pub(crate) lines: RefCell<Vec<LineData>>,

    auto_label: Cell<u32>,
    pub(crate) dropped: Cell<u64>,
}

impl EngineCtx {
    /// The index every series read is relative to.
    pub(crate) fn effective_index(&self) -> i64 {
        self.bar_index.get() - self.func_offset.get()
    }

    pub(crate) fn bar_count(&self) -> usize {
        self.bars.borrow().len()
    }

    /// Temporarily shift the cursor back by `steps`; the guard restores the
    /// offset on drop, on every exit path.
    pub(crate) fn offset(self: &Rc<Self>, steps: i64) -> OffsetGuard {
        self.func_offset.set(self.func_offset.get() + steps);
        OffsetGuard {
            ctx: Rc::clone(self),
            steps,
        }
    }

    pub(crate) fn cache_get(&self, label: &str, index: i64) -> Option<f64> {
        self.cache.borrow().get(label)?.get(&index).copied()
    }

    pub(crate) fn cache_put(&self, label: &str, index: i64, value: f64) {
        self.cache
            .borrow_mut()
            .entry(label.to_owned())
            .or_default()
            .insert(index, value);
    }

    /// Next auto label for this bar; the counter resets at the top of every
    /// bar, so an unconditional call sequence gets stable labels across bars.
    pub(crate) fn next_auto_label(&self) -> String {
        let n = self.auto_label.get();
        self.auto_label.set(n + 1);
        format!("@{n}")
    }
}

pub(crate) struct OffsetGuard {
    ctx: Rc<EngineCtx>,
    steps: i64,
}

impl Drop for OffsetGuard {
    fn drop(&mut self) {
        self.ctx
            .func_offset
            .set(self.ctx.func_offset.get() - self.steps);
    }
}

/// The evaluation engine. Cloning yields another handle to the same state.
#[derive(Clone)]
pub struct Engine {
    pub(crate) ctx: Rc<EngineCtx>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            ctx: Rc::new(EngineCtx {
                bar_index: Cell::new(0),
                func_offset: Cell::new(0),
                bars: RefCell::new(Vec::new()),
                open: Rc::new(RefCell::new(Vec::new())),
                high: Rc::new(RefCell::new(Vec::new())),
                low: Rc::new(RefCell::new(Vec::new())),
                close: Rc::new(RefCell::new(Vec::new())),
                volume: Rc::new(RefCell::new(Vec::new())),
                time: Rc::new(RefCell::new(Vec::new())),
                storages: RefCell::new(FxHashMap::default()),
                cache: RefCell::new(FxHashMap::default()),
                plots: RefCell::new(BTreeMap::new()),
                lines: RefCell::new(Vec::new()),
                auto_label: Cell::new(0),
                dropped: Cell::new(0),
            }),
        }
    }

    /// Append bars to the store and keep every existing writeback storage
    /// aligned by growing it with NaN slots.
    pub fn add_bars(&self, bars: &[Bar]) {
        for slot in self.ctx.storages.borrow().values() {
            slot.buf
                .borrow_mut()
                .extend(std::iter::repeat(f64::NAN).take(bars.len()));
        }
        self.ctx.bars.borrow_mut().extend_from_slice(bars);
        for bar in bars {
            self.ctx.open.borrow_mut().push(bar.open);
            self.ctx.high.borrow_mut().push(bar.high);
            self.ctx.low.borrow_mut().push(bar.low);
            self.ctx.close.borrow_mut().push(bar.close);
            self.ctx.volume.borrow_mut().push(bar.volume);
            self.ctx.time.borrow_mut().push(bar.time);
        }
    }

    fn price(&self, buf: &Rc<RefCell<Vec<f64>>>) -> Series {
        Series::data(self.ctx.clone(), buf.clone(), 0)
    }

    pub fn open(&self) -> Series {
        self.price(&self.ctx.open)
    }

    pub fn high(&self) -> Series {
        self.price(&self.ctx.high)
    }

    pub fn low(&self) -> Series {
        self.price(&self.ctx.low)
    }

    pub fn close(&self) -> Series {
        self.price(&self.ctx.close)
    }

    pub fn volume(&self) -> Series {
        self.price(&self.ctx.volume)
    }

    pub fn time(&self) -> Series {
        self.price(&self.ctx.time)
    }

    /// A thunk-backed series evaluated against this engine's cursor.
    pub fn wrapper(&self, f: impl Fn() -> f64 + 'static) -> Series {
        Series::thunk(self.ctx.clone(), f)
    }

    /// The writeback storage registered under `label`, created zero-filled on
    /// first reference with its start pinned to the current bar index.
    pub fn storage(&self, label: &str) -> Series {
        let bar_count = self.ctx.bar_count();
        let bar_index = self.ctx.bar_index.get();
        let mut storages = self.ctx.storages.borrow_mut();
        let slot = storages
            .entry(label.to_owned())
            .or_insert_with(|| StorageSlot {
                buf: Rc::new(RefCell::new(vec![0.0; bar_count])),
                diff: bar_index,
            });
        Series::data(self.ctx.clone(), slot.buf.clone(), slot.diff)
    }

    pub fn bar_index(&self) -> i64 {
        self.ctx.bar_index.get()
    }

    pub fn is_first_bar(&self) -> bool {
        self.ctx.bar_index.get() == 0
    }

    pub fn is_last_bar(&self) -> bool {
        self.ctx.bar_index.get() + 1 == self.ctx.bar_count() as i64
    }

    /// Emissions dropped because their shifted index fell outside the bar
    /// range.
    pub fn dropped_emissions(&self) -> u64 {
        self.ctx.dropped.get()
    }

    /// Evaluate `strategy` once per bar, then densify plots and deduplicate
    /// straight lines.
    ///
    /// After this returns, every non-empty plot covers `[0, bar_count)` with
    /// exactly one point per index, in ascending order.
    pub fn run<F>(&self, mut strategy: F)
    where
        F: FnMut(&Engine),
    {
        let count = self.ctx.bar_count() as i64;
        for index in 0..count {
            self.ctx.bar_index.set(index);
            self.ctx.auto_label.set(0);
            strategy(self);
        }

        {
            let bars = self.ctx.bars.borrow();
            let mut plots = self.ctx.plots.borrow_mut();
            plot::fill_gaps(&bars, &mut plots);
        }
        plot::dedup_straight_lines(&mut self.ctx.lines.borrow_mut());

        if self.ctx.dropped.get() > 0 {
            debug!(
                dropped = self.ctx.dropped.get(),
                "emissions fell outside the bar range"
            );
        }
    }

    /// Immutable snapshot of bars, plots, and lines for the HTTP surface.
    pub fn chart_data(&self) -> ChartData {
        ChartData {
            bars: self.ctx.bars.borrow().iter().map(BarJson::from).collect(),
            plots: self.ctx.plots.borrow().clone(),
            lines: self.ctx.lines.borrow().clone(),
        }
    }
}

/// Everything the chart front-end needs, frozen after `run`.
#[derive(Debug, Clone, Serialize)]
pub struct ChartData {
    pub bars: Vec<BarJson>,
    pub plots: BTreeMap<String, PlotData>,
    pub lines: Vec<LineData>,
}
