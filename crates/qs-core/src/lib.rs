//! Bar-by-bar technical-analysis engine.
//!
//! A strategy closure runs once per bar and composes lazy numeric series:
//! the six price series, indicator series derived from them, and arbitrary
//! arithmetic pipelines on top. Emitted plots and lines are densified after
//! the run and served as JSON by the companion server crate.

pub mod candle;
pub mod engine;
pub mod indicators;
pub mod ingest;
pub mod plot;
pub mod series;

pub use candle::{Bar, BarJson};
pub use engine::{ChartData, Engine};
pub use indicators::{FALSE, TRUE};
pub use ingest::IngestError;
pub use plot::{LineConfig, LineData, LineType, PlotConfig, PlotData, PlotPoint, Point};
pub use series::{coalesce, na, nz, nz_or, Operand, Series};
