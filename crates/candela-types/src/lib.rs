//! Core types for the candela candle aggregation service.
//!
//! This crate provides the fundamental data structures used throughout
//! candela:
//!
//! - [`BaseCandle`] - A 1-minute candle as ingested from the stream
//! - [`Candle`] - An aggregated candle at any tracked timeframe
//! - [`Timeframe`] - The fixed set of tracked timeframes
//!
//! No I/O lives here; every other workspace crate depends on this one.

#![forbid(unsafe_code)]

mod candle;
mod error;
mod timeframe;

pub use candle::{BaseCandle, Candle};
pub use error::{CandelaError, Result};
pub use timeframe::{Timeframe, TimeframeParseError};
