//! Multi-timeframe candle aggregation for candela.
//!
//! This crate holds the algorithmic core of the service:
//!
//! - [`bucket_start`] - maps an instant to the start of its containing
//!   window, the single source of truth for interval alignment
//! - [`aggregate`] / [`fold_window`] - stateless recomputation of the
//!   in-progress coarse candle from durable closed base candles plus the
//!   in-flight update
//! - [`ClosedCandleSource`] - the store query seam the engine reads through

#![forbid(unsafe_code)]

mod bucket;
mod engine;

pub use bucket::bucket_start;
pub use engine::{ClosedCandleSource, aggregate, fold_window};
