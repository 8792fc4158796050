//! Redis-backed live cache and event publisher.

use async_trait::async_trait;
use candela_types::{Candle, Timeframe};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use thiserror::Error;

use crate::messages::{CacheEntry, CandleEvent, cache_key, channel};

/// Errors that can occur during cache writes or publishes.
#[derive(Error, Debug)]
pub enum PublishError {
    /// Redis command failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Message serialization failed.
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Write access to the live in-flight candle cache.
///
/// The cache is a pure derived view, safely overwritten by the most recent
/// computation; it carries no transactional guarantees.
#[async_trait]
pub trait LiveCache: Send + Sync {
    /// Replaces the cached in-flight candle for its (symbol, timeframe).
    async fn set_current(&self, candle: &Candle) -> Result<(), PublishError>;

    /// Removes the cached entry after a window closes.
    async fn remove_current(&self, symbol: &str, timeframe: Timeframe) -> Result<(), PublishError>;
}

/// Emission of candle events to subscribers.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes an event on the channel scoped to (symbol, timeframe).
    async fn publish(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        event: &CandleEvent,
    ) -> Result<(), PublishError>;
}

/// Redis implementation of [`LiveCache`] and [`EventPublisher`].
///
/// The connection manager reconnects transparently; individual command
/// failures surface to the caller, which treats them as best-effort.
#[derive(Clone)]
pub struct RedisPublisher {
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPublisher").finish_non_exhaustive()
    }
}

impl RedisPublisher {
    /// Connects to Redis at the given URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial connection cannot be established.
    /// Callers treat this as fatal at startup.
    pub async fn connect(redis_url: &str) -> Result<Self, PublishError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!("connected to redis");
        Ok(Self { conn })
    }

    /// TTL for a cached in-flight candle: the window length plus one
    /// minute of slack so a stalled stream expires rather than pinning a
    /// stale snapshot.
    #[must_use]
    pub const fn cache_ttl_seconds(timeframe: Timeframe) -> u64 {
        timeframe.seconds() + 60
    }
}

#[async_trait]
impl LiveCache for RedisPublisher {
    async fn set_current(&self, candle: &Candle) -> Result<(), PublishError> {
        let key = cache_key(&candle.symbol, candle.timeframe);
        let payload = serde_json::to_string(&CacheEntry::from(candle))?;
        let ttl = Self::cache_ttl_seconds(candle.timeframe);
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, payload, ttl).await?;
        Ok(())
    }

    async fn remove_current(&self, symbol: &str, timeframe: Timeframe) -> Result<(), PublishError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(cache_key(symbol, timeframe)).await?;
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for RedisPublisher {
    async fn publish(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        event: &CandleEvent,
    ) -> Result<(), PublishError> {
        let payload = serde_json::to_string(event)?;
        let mut conn = self.conn.clone();
        let _: () = conn.publish(channel(symbol, timeframe), payload).await?;
        Ok(())
    }
}
