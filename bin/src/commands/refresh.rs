//! The `refresh` command: refresh the coarse rollup views once.

use anyhow::{Context, Result};
use candela_service::Config;
use candela_store::{PoolConfig, RollupRefresher, create_pool};
use candela_types::Timeframe;

pub(crate) async fn run() -> Result<()> {
    let config = Config::from_env().context("invalid configuration")?;

    let pool = create_pool(&config.database_url, &PoolConfig::default())
        .await
        .context("cannot reach candle database")?;

    let refreshed = RollupRefresher::new(pool).refresh_all().await;
    tracing::info!(
        refreshed,
        total = Timeframe::coarse().len(),
        "rollup refresh finished"
    );
    Ok(())
}
