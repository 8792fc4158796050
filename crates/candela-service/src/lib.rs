//! Service wiring for candela.
//!
//! This crate connects the aggregation engine to its collaborators:
//!
//! - [`Config`] - values-only configuration from the environment
//! - [`Coordinator`] - per-tick aggregation, cache write, publish, closure
//! - [`Ingestor`] - persists incoming base candles and drives the coordinator
//! - [`BackfillGuard`] - per-symbol mutual exclusion between backfill and
//!   cleanup
//! - [`run_cleanup_scheduler`] / [`run_rollup_scheduler`] - maintenance
//!   timers
//! - [`Runtime`] - startup ordering and graceful shutdown

#![forbid(unsafe_code)]

mod cleanup;
mod config;
mod coordinator;
mod guard;
mod ingest;
mod runtime;

pub use cleanup::{CleanupOutcome, RetentionStore, run_cleanup_once, run_cleanup_scheduler};
pub use config::Config;
pub use coordinator::Coordinator;
pub use guard::{BackfillGuard, BackfillToken};
pub use ingest::{BaseCandleSink, Ingestor};
pub use runtime::{Runtime, run_rollup_scheduler};
