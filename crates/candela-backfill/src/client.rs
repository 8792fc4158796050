//! REST client for historical 1-minute klines.

use async_trait::async_trait;
use candela_types::BaseCandle;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use crate::gap::CandleFetcher;
use crate::parse::{ParseError, parse_klines};

/// Configuration for the kline REST client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the klines endpoint.
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum retry attempts for transient failures.
    pub max_retries: u32,
    /// Base delay for exponential backoff (in milliseconds).
    pub base_delay_ms: u64,
    /// Maximum delay between retries (in milliseconds).
    pub max_delay_ms: u64,
    /// User agent string.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.binance.com/api/v3/klines".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            user_agent: format!("candela/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Errors that can occur while fetching historical candles.
#[derive(Error, Debug)]
pub enum BackfillError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error status after all retries.
    #[error("Server error: {status}")]
    ServerError {
        /// HTTP status code.
        status: u16,
    },

    /// Response payload was not a valid kline array.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Store write failed during backfill.
    #[error("store error: {0}")]
    Store(String),
}

/// HTTP client for the historical kline endpoint, with connection pooling
/// and bounded retries.
#[derive(Debug, Clone)]
pub struct KlineClient {
    client: Client,
    config: ClientConfig,
}

impl KlineClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: ClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .tcp_keepalive(Duration::from_secs(60))
            .user_agent(&config.user_agent)
            .gzip(true)
            .build()?;
        Ok(Self { client, config })
    }

    /// Creates a client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_defaults() -> Result<Self, reqwest::Error> {
        Self::new(ClientConfig::default())
    }

    /// Returns the client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetches closed-or-current 1-minute candles for `[from, to)`,
    /// at most `max_batch` per request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails after all retries or the
    /// payload cannot be parsed.
    pub async fn fetch_base_candles(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        max_batch: u32,
    ) -> Result<Vec<BaseCandle>, BackfillError> {
        let body = self
            .get_with_retry(symbol, from.timestamp_millis(), to.timestamp_millis(), max_batch)
            .await?;
        Ok(parse_klines(&body, symbol, Utc::now())?)
    }

    async fn get_with_retry(
        &self,
        symbol: &str,
        start_ms: i64,
        end_ms: i64,
        limit: u32,
    ) -> Result<bytes::Bytes, BackfillError> {
        let mut attempts = 0;

        loop {
            let request = self
                .client
                .get(&self.config.base_url)
                .query(&[("symbol", symbol), ("interval", "1m")])
                .query(&[("startTime", start_ms), ("endTime", end_ms)])
                .query(&[("limit", limit)]);

            match request.send().await {
                Ok(response) => {
                    // Retry on server errors (5xx) and rate limiting (429)
                    if response.status().is_server_error()
                        || response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS
                    {
                        if attempts < self.config.max_retries {
                            attempts += 1;
                            tokio::time::sleep(self.backoff_delay(attempts)).await;
                            continue;
                        }
                        return Err(BackfillError::ServerError {
                            status: response.status().as_u16(),
                        });
                    }

                    response.error_for_status_ref()?;
                    return Ok(response.bytes().await?);
                }
                Err(e) if Self::is_retryable(&e) && attempts < self.config.max_retries => {
                    attempts += 1;
                    tokio::time::sleep(self.backoff_delay(attempts)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Calculates the backoff delay with exponential backoff and jitter.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp_delay = self
            .config
            .base_delay_ms
            .saturating_mul(1u64 << attempt.min(10));
        let capped = exp_delay.min(self.config.max_delay_ms);

        // Deterministic jitter (±25%) keyed on the attempt number, so no
        // RNG dependency is needed.
        let jitter_range = capped / 4;
        let jitter = if jitter_range > 0 {
            let offset = (u64::from(attempt) * 17) % (jitter_range * 2);
            offset.saturating_sub(jitter_range)
        } else {
            0
        };

        Duration::from_millis((capped + jitter).max(100))
    }

    fn is_retryable(error: &reqwest::Error) -> bool {
        if error.is_builder() {
            return false;
        }
        error.is_timeout() || error.is_connect() || error.is_request()
    }
}

#[async_trait]
impl CandleFetcher for KlineClient {
    async fn fetch_base_candles(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        max_batch: u32,
    ) -> Result<Vec<BaseCandle>, BackfillError> {
        Self::fetch_base_candles(self, symbol, from, to, max_batch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.base_delay_ms, 500);
        assert_eq!(config.max_delay_ms, 30_000);
    }

    #[tokio::test]
    async fn test_client_creation() {
        assert!(KlineClient::with_defaults().is_ok());
    }

    #[test]
    fn test_backoff_delay_bounds() {
        let client = KlineClient::with_defaults().unwrap();

        let delay1 = client.backoff_delay(1);
        assert!(delay1.as_millis() >= 750 && delay1.as_millis() <= 1250);

        let delay2 = client.backoff_delay(2);
        assert!(delay2.as_millis() >= 1500 && delay2.as_millis() <= 2500);

        // High attempts are capped at max_delay (plus jitter).
        let delay_high = client.backoff_delay(20);
        assert!(delay_high.as_millis() <= 37_500);
    }
}
