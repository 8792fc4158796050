//! Base candle persistence.

use async_trait::async_trait;
use candela_aggregate::ClosedCandleSource;
use candela_backfill::{BackfillError, BackfillStore};
use candela_types::{BaseCandle, CandelaError};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::{FromRow, QueryBuilder, Row};
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for CandelaError {
    fn from(err: StoreError) -> Self {
        Self::Store(err.to_string())
    }
}

/// Database row representation of a base candle.
#[derive(Debug, FromRow)]
struct BaseCandleRow {
    symbol: String,
    start_time: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    is_closed: bool,
}

impl From<BaseCandleRow> for BaseCandle {
    fn from(row: BaseCandleRow) -> Self {
        Self {
            symbol: row.symbol,
            start_time: row.start_time,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
            is_closed: row.is_closed,
        }
    }
}

/// Statistics about the base candle hypertable.
#[derive(Debug, Clone, PartialEq)]
pub struct TableStats {
    /// Total number of rows.
    pub total_rows: i64,
    /// Oldest candle start time, if any rows exist.
    pub oldest: Option<DateTime<Utc>>,
    /// Newest candle start time, if any rows exist.
    pub newest: Option<DateTime<Utc>>,
    /// Number of distinct symbols.
    pub symbols: i64,
}

/// Durable store for 1-minute base candles.
///
/// All writers go through the idempotent upsert keyed by
/// `(symbol, start_time)`; live ingestion and backfill may overlap freely.
#[derive(Debug, Clone)]
pub struct CandleStore {
    pool: PgPool,
}

impl CandleStore {
    /// Creates a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Upserts a single base candle, keyed by `(symbol, start_time)`.
    ///
    /// A record that is not closed never overwrites an existing closed row
    /// at the same key, so a lagging backfill can never downgrade final
    /// data written by live ingestion.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn upsert_base_candle(&self, candle: &BaseCandle) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO candle_data_1m
                (symbol, start_time, open, high, low, close, volume, is_closed)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (symbol, start_time) DO UPDATE
            SET open = excluded.open,
                high = excluded.high,
                low = excluded.low,
                close = excluded.close,
                volume = excluded.volume,
                is_closed = excluded.is_closed
            WHERE NOT (candle_data_1m.is_closed AND NOT excluded.is_closed)
            ",
        )
        .bind(&candle.symbol)
        .bind(candle.start_time)
        .bind(candle.open)
        .bind(candle.high)
        .bind(candle.low)
        .bind(candle.close)
        .bind(candle.volume)
        .bind(candle.is_closed)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upserts a batch of base candles in one statement.
    ///
    /// Returns the number of rows written. Same conflict semantics as
    /// [`Self::upsert_base_candle`].
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; the batch is all-or-nothing.
    pub async fn upsert_base_candles(&self, candles: &[BaseCandle]) -> Result<u64, StoreError> {
        if candles.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::new(
            "INSERT INTO candle_data_1m \
             (symbol, start_time, open, high, low, close, volume, is_closed) ",
        );
        builder.push_values(candles, |mut b, candle| {
            b.push_bind(&candle.symbol)
                .push_bind(candle.start_time)
                .push_bind(candle.open)
                .push_bind(candle.high)
                .push_bind(candle.low)
                .push_bind(candle.close)
                .push_bind(candle.volume)
                .push_bind(candle.is_closed);
        });
        builder.push(
            " ON CONFLICT (symbol, start_time) DO UPDATE \
             SET open = excluded.open, \
                 high = excluded.high, \
                 low = excluded.low, \
                 close = excluded.close, \
                 volume = excluded.volume, \
                 is_closed = excluded.is_closed \
             WHERE NOT (candle_data_1m.is_closed AND NOT excluded.is_closed)",
        );

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Returns the most recent stored `start_time` for a symbol.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn latest_start_time(
        &self,
        symbol: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let row = sqlx::query(
            "SELECT MAX(start_time) AS latest FROM candle_data_1m WHERE symbol = $1",
        )
        .bind(symbol)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("latest")?)
    }

    /// Deletes base candles with `start_time` older than `cutoff`.
    ///
    /// Returns the number of rows deleted. Destructive and irreversible;
    /// callers serialize this against backfill.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_base_candles_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM candle_data_1m WHERE start_time < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Returns row counts and time bounds for the base candle table.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn table_stats(&self) -> Result<TableStats, StoreError> {
        let row = sqlx::query(
            r"
            SELECT COUNT(*) AS total_rows,
                   MIN(start_time) AS oldest,
                   MAX(start_time) AS newest,
                   COUNT(DISTINCT symbol) AS symbols
            FROM candle_data_1m
            ",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(TableStats {
            total_rows: row.try_get("total_rows")?,
            oldest: row.try_get("oldest")?,
            newest: row.try_get("newest")?,
            symbols: row.try_get("symbols")?,
        })
    }
}

#[async_trait]
impl BackfillStore for CandleStore {
    async fn latest_start_time(
        &self,
        symbol: &str,
    ) -> Result<Option<DateTime<Utc>>, BackfillError> {
        Self::latest_start_time(self, symbol)
            .await
            .map_err(|e| BackfillError::Store(e.to_string()))
    }

    async fn upsert_base_candles(&self, candles: &[BaseCandle]) -> Result<u64, BackfillError> {
        Self::upsert_base_candles(self, candles)
            .await
            .map_err(|e| BackfillError::Store(e.to_string()))
    }
}

#[async_trait]
impl ClosedCandleSource for CandleStore {
    async fn closed_base_candles(
        &self,
        symbol: &str,
        window_start: DateTime<Utc>,
        exclude_before: DateTime<Utc>,
    ) -> candela_types::Result<Vec<BaseCandle>> {
        let rows: Vec<BaseCandleRow> = sqlx::query_as(
            r"
            SELECT symbol, start_time, open, high, low, close, volume, is_closed
            FROM candle_data_1m
            WHERE symbol = $1
              AND is_closed
              AND start_time >= $2
              AND start_time < $3
            ORDER BY start_time ASC
            ",
        )
        .bind(symbol)
        .bind(window_start)
        .bind(exclude_before)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CandelaError::Store(e.to_string()))?;

        Ok(rows.into_iter().map(BaseCandle::from).collect())
    }
}
