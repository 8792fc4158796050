//! Connection pool construction.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Configuration for the database connection pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections.
    pub max_connections: u32,
    /// Timeout for acquiring a connection from the pool.
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            // Small pool: one ingestion stream per symbol plus the
            // maintenance tasks, each holding a connection briefly.
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// Creates a connection pool to the candle database.
///
/// # Errors
///
/// Returns an error if the database is unreachable. Callers treat this as
/// fatal at startup: the service never serves ingestion without a store.
pub async fn create_pool(database_url: &str, config: &PoolConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(database_url)
        .await?;

    tracing::info!(max_connections = config.max_connections, "connected to candle database");
    Ok(pool)
}
