//! Service configuration.

use candela_types::{CandelaError, Result, Timeframe};
use chrono::TimeDelta;
use std::str::FromStr;
use std::time::Duration;

/// Values-only service configuration.
///
/// The symbol and timeframe sets are static for the life of the process,
/// keeping the aggregation fan-out bounded and predictable; changing them
/// means restarting.
#[derive(Debug, Clone)]
pub struct Config {
    /// Symbols to ingest and aggregate.
    pub symbols: Vec<String>,
    /// Coarse timeframes recomputed on every base candle tick.
    pub timeframes: Vec<Timeframe>,
    /// Postgres/TimescaleDB connection URL.
    pub database_url: String,
    /// Redis connection URL.
    pub redis_url: String,
    /// Base URL of the historical klines endpoint.
    pub rest_base_url: String,
    /// Maximum gap backfill will attempt to repair.
    pub backfill_max_lookback: TimeDelta,
    /// Maximum candles per historical fetch request.
    pub backfill_batch: u32,
    /// Age beyond which base candles are purged.
    pub retention: TimeDelta,
    /// How often the cleanup scheduler runs.
    pub cleanup_interval: Duration,
    /// How often the rollup views are refreshed.
    pub rollup_interval: Duration,
}

impl Config {
    /// Loads configuration from the environment, applying defaults for
    /// anything unset.
    ///
    /// Recognized variables: `SYMBOLS`, `TIMEFRAMES`, `DATABASE_URL`,
    /// `REDIS_URL`, `REST_BASE_URL`, `BACKFILL_MAX_LOOKBACK_HOURS`,
    /// `BACKFILL_BATCH`, `RETENTION_DAYS`, `CLEANUP_INTERVAL_HOURS`,
    /// `ROLLUP_REFRESH_MINUTES`.
    ///
    /// # Errors
    ///
    /// Returns an error if a set variable fails to parse.
    pub fn from_env() -> Result<Self> {
        let get = |name: &str| std::env::var(name).ok();

        Ok(Self {
            symbols: parse_symbols(&get("SYMBOLS").unwrap_or_else(|| "BTCUSDT,ETHUSDT".to_string())),
            timeframes: parse_timeframes(get("TIMEFRAMES").as_deref())?,
            database_url: get("DATABASE_URL")
                .unwrap_or_else(|| "postgres://localhost:5432/candela".to_string()),
            redis_url: get("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
            rest_base_url: get("REST_BASE_URL")
                .unwrap_or_else(|| "https://api.binance.com/api/v3/klines".to_string()),
            backfill_max_lookback: TimeDelta::hours(parse_var(
                "BACKFILL_MAX_LOOKBACK_HOURS",
                get("BACKFILL_MAX_LOOKBACK_HOURS"),
                24 * 30,
            )?),
            backfill_batch: parse_var("BACKFILL_BATCH", get("BACKFILL_BATCH"), 1000)?,
            retention: TimeDelta::days(parse_var("RETENTION_DAYS", get("RETENTION_DAYS"), 7)?),
            cleanup_interval: Duration::from_secs(
                parse_var("CLEANUP_INTERVAL_HOURS", get("CLEANUP_INTERVAL_HOURS"), 24)? * 3600,
            ),
            rollup_interval: Duration::from_secs(
                parse_var("ROLLUP_REFRESH_MINUTES", get("ROLLUP_REFRESH_MINUTES"), 5)? * 60,
            ),
        })
    }
}

/// Parses a comma-separated symbol list, normalizing to upper case.
fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_uppercase)
        .collect()
}

/// Parses a comma-separated timeframe list; `None` means all coarse
/// timeframes.
fn parse_timeframes(raw: Option<&str>) -> Result<Vec<Timeframe>> {
    match raw {
        None => Ok(Timeframe::coarse().to_vec()),
        Some(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                Timeframe::from_str(s).map_err(|e| CandelaError::Config(e.to_string()))
            })
            .collect(),
    }
}

fn parse_var<T: FromStr>(name: &str, value: Option<String>, default: T) -> Result<T> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| CandelaError::Config(format!("invalid value for {name}: '{raw}'"))),
    }
}
