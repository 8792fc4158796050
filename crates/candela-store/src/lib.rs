//! TimescaleDB persistence for candela.
//!
//! The 1-minute hypertable (`candle_data_1m`) is the single source of
//! truth; coarse timeframes are continuous aggregates over it (see
//! `sql/schema.sql` at the workspace root). This crate provides:
//!
//! - [`create_pool`] - connection pool construction
//! - [`CandleStore`] - range query, idempotent upsert, retention delete,
//!   and table statistics for base candles
//! - [`RollupRefresher`] - manual refresh of the continuous aggregates

#![forbid(unsafe_code)]

mod candles;
mod pool;
mod rollup;

pub use candles::{CandleStore, StoreError, TableStats};
pub use pool::{PoolConfig, create_pool};
pub use rollup::RollupRefresher;
