//! The `cleanup` command: one retention cleanup round.

use anyhow::{Context, Result};
use candela_service::{BackfillGuard, CleanupOutcome, Config, run_cleanup_once};
use candela_store::{CandleStore, PoolConfig, create_pool};

pub(crate) async fn run() -> Result<()> {
    let config = Config::from_env().context("invalid configuration")?;

    let pool = create_pool(&config.database_url, &PoolConfig::default())
        .await
        .context("cannot reach candle database")?;
    let store = CandleStore::new(pool);

    // One-shot invocation: no backfill can be active in this process.
    let outcome = run_cleanup_once(&store, &BackfillGuard::new(), config.retention)
        .await
        .context("cleanup failed")?;

    if let CleanupOutcome::Completed { deleted, before, after } = outcome {
        tracing::info!(
            deleted,
            rows_before = before.total_rows,
            rows_after = after.total_rows,
            "cleanup finished"
        );
    }
    Ok(())
}
