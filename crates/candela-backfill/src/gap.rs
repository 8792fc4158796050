//! Gap detection and bounded recovery.

use async_trait::async_trait;
use candela_types::BaseCandle;
use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

use crate::client::BackfillError;

/// Pause between consecutive REST requests, to stay friendly to the
/// exchange's rate limits.
const REQUEST_PACING: Duration = Duration::from_millis(100);

/// Store operations needed by the backfill runner.
///
/// Implemented by the TimescaleDB store; kept as a seam so the planning
/// and accounting logic is testable without a database.
#[async_trait]
pub trait BackfillStore: Send + Sync {
    /// Returns the most recent stored base candle start time for a symbol.
    async fn latest_start_time(&self, symbol: &str)
    -> Result<Option<DateTime<Utc>>, BackfillError>;

    /// Idempotently upserts a batch of base candles, returning the number
    /// of rows written.
    async fn upsert_base_candles(&self, candles: &[BaseCandle]) -> Result<u64, BackfillError>;
}

/// Source of historical 1-minute candles.
///
/// Implemented by [`KlineClient`](crate::KlineClient) in production; kept
/// as a seam so the recovery loop is testable without a live endpoint.
#[async_trait]
pub trait CandleFetcher: Send + Sync {
    /// Fetches 1-minute candles for the half-open span `[from, to)`, at
    /// most `max_batch` per request.
    async fn fetch_base_candles(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        max_batch: u32,
    ) -> Result<Vec<BaseCandle>, BackfillError>;
}

/// Outcome of gap planning for one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GapPlan {
    /// The store is within one base interval of the current minute.
    UpToDate,
    /// Fetch and upsert the half-open span `[from, to)`.
    Recover {
        /// First missing minute.
        from: DateTime<Utc>,
        /// End of the recovery span (exclusive).
        to: DateTime<Utc>,
    },
    /// The gap exceeds the configured lookback; recovery is abandoned and
    /// reported rather than attempted.
    TooLarge {
        /// Size of the detected gap.
        gap: TimeDelta,
        /// The configured maximum lookback.
        max_lookback: TimeDelta,
    },
}

/// Decides what recovery, if any, a symbol needs.
///
/// `latest` is the newest stored base candle start time. With no stored
/// data at all, the full configured lookback is recovered. The decision is
/// derived entirely from its arguments; `now` is passed in so the planner
/// stays pure.
#[must_use]
pub fn plan_recovery(
    latest: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    max_lookback: TimeDelta,
) -> GapPlan {
    let Some(latest) = latest else {
        return GapPlan::Recover {
            from: now - max_lookback,
            to: now,
        };
    };

    let from = latest + TimeDelta::minutes(1);
    let gap = now - from;
    if gap <= TimeDelta::minutes(1) {
        return GapPlan::UpToDate;
    }
    if gap > max_lookback {
        return GapPlan::TooLarge { gap, max_lookback };
    }
    GapPlan::Recover { from, to: now }
}

/// Splits `[from, to)` into consecutive spans of at most `batch_minutes`.
#[must_use]
pub fn batches(
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    batch_minutes: u32,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let step = TimeDelta::minutes(i64::from(batch_minutes));
    let mut spans = Vec::new();
    let mut current = from;
    while current < to {
        let end = (current + step).min(to);
        spans.push((current, end));
        current = end;
    }
    spans
}

/// Result of a backfill run for one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillReport {
    /// The symbol that was checked.
    pub symbol: String,
    /// Number of rows upserted.
    pub inserted: u64,
    /// True if the gap exceeded the lookback and recovery was abandoned.
    pub abandoned: bool,
}

/// Detects and repairs the gap for one symbol.
///
/// Fetches the missing span in batches of at most `batch_minutes` candles
/// per request and upserts each batch before fetching the next, so a crash
/// mid-recovery loses at most one batch of work.
///
/// # Errors
///
/// Returns an error if a fetch fails after all retries or a store write
/// fails.
pub async fn backfill_symbol<S, F>(
    store: &S,
    client: &F,
    symbol: &str,
    max_lookback: TimeDelta,
    batch_minutes: u32,
) -> Result<BackfillReport, BackfillError>
where
    S: BackfillStore + ?Sized,
    F: CandleFetcher + ?Sized,
{
    let latest = store.latest_start_time(symbol).await?;
    let now = Utc::now();

    match plan_recovery(latest, now, max_lookback) {
        GapPlan::UpToDate => {
            tracing::debug!(symbol, "store is up to date");
            Ok(BackfillReport {
                symbol: symbol.to_string(),
                inserted: 0,
                abandoned: false,
            })
        }
        GapPlan::TooLarge { gap, max_lookback } => {
            tracing::warn!(
                symbol,
                gap_minutes = gap.num_minutes(),
                max_lookback_minutes = max_lookback.num_minutes(),
                "gap exceeds maximum lookback, abandoning recovery"
            );
            Ok(BackfillReport {
                symbol: symbol.to_string(),
                inserted: 0,
                abandoned: true,
            })
        }
        GapPlan::Recover { from, to } => {
            tracing::info!(
                symbol,
                %from,
                %to,
                gap_minutes = (to - from).num_minutes(),
                "gap detected, starting backfill"
            );

            let mut inserted = 0;
            for (span_start, span_end) in batches(from, to, batch_minutes) {
                let candles = client
                    .fetch_base_candles(symbol, span_start, span_end, batch_minutes)
                    .await?;
                if candles.is_empty() {
                    tracing::warn!(symbol, %span_start, "no historical data returned, stopping");
                    break;
                }
                inserted += store.upsert_base_candles(&candles).await?;
                tokio::time::sleep(REQUEST_PACING).await;
            }

            tracing::info!(symbol, inserted, "backfill complete");
            Ok(BackfillReport {
                symbol: symbol.to_string(),
                inserted,
                abandoned: false,
            })
        }
    }
}

/// Runs backfill for every symbol concurrently and returns the reports.
///
/// Per-symbol failures are logged and skipped; one broken symbol never
/// blocks recovery of the rest.
pub async fn backfill_all<S, F>(
    store: &S,
    client: &F,
    symbols: &[String],
    max_lookback: TimeDelta,
    batch_minutes: u32,
) -> Vec<BackfillReport>
where
    S: BackfillStore + ?Sized,
    F: CandleFetcher + ?Sized,
{
    let tasks = symbols
        .iter()
        .map(|symbol| backfill_symbol(store, client, symbol, max_lookback, batch_minutes));
    let results = futures::future::join_all(tasks).await;

    results
        .into_iter()
        .zip(symbols)
        .filter_map(|(result, symbol)| match result {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!(symbol, error = %e, "backfill failed");
                None
            }
        })
        .collect()
}
