//! Retention cleanup scheduling.

use async_trait::async_trait;
use candela_store::{CandleStore, TableStats};
use candela_types::Result;
use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;
use tokio::sync::watch;

use crate::guard::BackfillGuard;

/// Store operations needed by the cleanup scheduler.
#[async_trait]
pub trait RetentionStore: Send + Sync {
    /// Returns row counts and time bounds for the base candle table.
    async fn table_stats(&self) -> Result<TableStats>;

    /// Deletes base candles older than `cutoff`, returning the count.
    async fn delete_base_candles_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
impl RetentionStore for CandleStore {
    async fn table_stats(&self) -> Result<TableStats> {
        Ok(Self::table_stats(self).await?)
    }

    async fn delete_base_candles_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        Ok(Self::delete_base_candles_older_than(self, cutoff).await?)
    }
}

/// Result of one cleanup round.
#[derive(Debug, Clone, PartialEq)]
pub enum CleanupOutcome {
    /// A backfill was active; nothing was deleted this round.
    Skipped,
    /// Cleanup ran to completion.
    Completed {
        /// Number of rows deleted.
        deleted: u64,
        /// Table statistics before the delete.
        before: TableStats,
        /// Table statistics after the delete.
        after: TableStats,
    },
}

/// Runs a single cleanup round.
///
/// Purely destructive and irreversible, so it is skipped entirely while
/// any backfill holds the guard; the next timer tick retries. Only the
/// base (1m) table is cleaned — coarse timeframes are derived, not
/// separately retained.
///
/// # Errors
///
/// Returns an error if a store operation fails.
pub async fn run_cleanup_once<S: RetentionStore + ?Sized>(
    store: &S,
    guard: &BackfillGuard,
    retention: TimeDelta,
) -> Result<CleanupOutcome> {
    if guard.any_active() {
        tracing::info!("backfill in progress, skipping cleanup round");
        return Ok(CleanupOutcome::Skipped);
    }

    let before = store.table_stats().await?;
    let cutoff = Utc::now() - retention;
    let deleted = store.delete_base_candles_older_than(cutoff).await?;
    let after = store.table_stats().await?;

    if deleted > 0 {
        tracing::info!(
            deleted,
            %cutoff,
            rows_before = before.total_rows,
            rows_after = after.total_rows,
            "cleaned up expired base candles"
        );
    } else {
        tracing::info!(retention_days = retention.num_days(), "no expired base candles");
    }

    Ok(CleanupOutcome::Completed {
        deleted,
        before,
        after,
    })
}

/// Periodic cleanup scheduler.
///
/// Runs a round every `interval` until shutdown is signalled. Failures are
/// logged and retried on the next tick.
pub async fn run_cleanup_scheduler<S: RetentionStore + ?Sized>(
    store: &S,
    guard: BackfillGuard,
    retention: TimeDelta,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(
        retention_days = retention.num_days(),
        interval_secs = interval.as_secs(),
        "cleanup scheduler started"
    );

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                if let Err(e) = run_cleanup_once(store, &guard, retention).await {
                    tracing::warn!(error = %e, "cleanup round failed");
                }
            }
            _ = shutdown.changed() => {
                tracing::info!("cleanup scheduler stopping");
                return;
            }
        }
    }
}
