//! Gap detection and historical backfill for candela.
//!
//! After downtime the store's newest base candle lags the current minute.
//! This crate detects that gap per symbol, fetches the missing span from
//! the exchange REST API in bounded batches, and upserts it idempotently —
//! safe to overlap with concurrently arriving live data because every
//! writer supplies a complete record keyed by `(symbol, start_time)`.
//!
//! - [`KlineClient`] - REST client with bounded retries and backoff
//! - [`CandleFetcher`] / [`BackfillStore`] - the fetch and store seams the
//!   runners operate through
//! - [`plan_recovery`] / [`batches`] - pure gap planning
//! - [`backfill_symbol`] / [`backfill_all`] - the recovery runners

#![forbid(unsafe_code)]

mod client;
mod gap;
mod parse;

pub use client::{BackfillError, ClientConfig, KlineClient};
pub use gap::{
    BackfillReport, BackfillStore, CandleFetcher, GapPlan, backfill_all, backfill_symbol, batches,
    plan_recovery,
};
pub use parse::parse_klines;
