//! The `backfill` command: one-shot gap recovery for all symbols.

use anyhow::{Context, Result};
use candela_backfill::{ClientConfig, KlineClient, backfill_all};
use candela_service::Config;
use candela_store::{CandleStore, PoolConfig, create_pool};

pub(crate) async fn run() -> Result<()> {
    let config = Config::from_env().context("invalid configuration")?;

    let pool = create_pool(&config.database_url, &PoolConfig::default())
        .await
        .context("cannot reach candle database")?;
    let store = CandleStore::new(pool);

    let client = KlineClient::new(ClientConfig {
        base_url: config.rest_base_url.clone(),
        ..ClientConfig::default()
    })
    .context("cannot build REST client")?;

    let reports = backfill_all(
        &store,
        &client,
        &config.symbols,
        config.backfill_max_lookback,
        config.backfill_batch,
    )
    .await;

    let inserted: u64 = reports.iter().map(|r| r.inserted).sum();
    let abandoned = reports.iter().filter(|r| r.abandoned).count();
    tracing::info!(
        symbols = reports.len(),
        inserted,
        abandoned,
        "backfill finished"
    );
    Ok(())
}
