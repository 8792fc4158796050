//! Continuous-aggregate rollup refresh.

use candela_types::Timeframe;
use sqlx::postgres::PgPool;

use crate::StoreError;

/// Refreshes the TimescaleDB continuous aggregates that materialize coarse
/// timeframes from the 1-minute hypertable.
///
/// Closed coarse candles become durable through these views rather than
/// through explicit writes; refreshing them keeps reader lag bounded.
#[derive(Debug, Clone)]
pub struct RollupRefresher {
    pool: PgPool,
}

impl RollupRefresher {
    /// Creates a refresher over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Refreshes the rollup view for one coarse timeframe.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh procedure fails.
    pub async fn refresh(&self, timeframe: Timeframe) -> Result<(), StoreError> {
        // View names come from the static Timeframe table, never from
        // user input; refresh_continuous_aggregate cannot take a bind
        // parameter for the view identifier.
        let statement = format!(
            "CALL refresh_continuous_aggregate('{}', NULL, NULL)",
            timeframe.view_name()
        );
        sqlx::query(&statement).execute(&self.pool).await?;
        tracing::debug!(view = timeframe.view_name(), "refreshed continuous aggregate");
        Ok(())
    }

    /// Refreshes every coarse rollup view, finest first.
    ///
    /// A failure on one view is logged and does not abort the sweep;
    /// returns the number of views refreshed successfully.
    pub async fn refresh_all(&self) -> u32 {
        let mut refreshed = 0;
        for timeframe in Timeframe::coarse() {
            match self.refresh(*timeframe).await {
                Ok(()) => refreshed += 1,
                Err(e) => {
                    tracing::warn!(view = timeframe.view_name(), error = %e, "rollup refresh failed");
                }
            }
        }
        refreshed
    }
}
