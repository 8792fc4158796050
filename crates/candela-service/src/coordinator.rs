//! Closure and publish coordination.

use candela_aggregate::{ClosedCandleSource, aggregate};
use candela_publish::{CandleEvent, EventPublisher, LiveCache};
use candela_types::{BaseCandle, Timeframe};
use std::sync::Arc;

/// Drives one base candle tick through every tracked timeframe.
///
/// For each timeframe: recompute the coarse candle, replace the live cache
/// entry, publish an update snapshot, and on closure publish the terminal
/// event and drop the cache entry so the next tick starts a fresh window.
///
/// All timeframes are processed concurrently; a slow or failed store query
/// for one never blocks the others. Cache and publish failures are logged
/// and skipped — the next tick supersedes anything a subscriber missed.
#[derive(Debug)]
pub struct Coordinator<S, C, P> {
    store: Arc<S>,
    cache: Arc<C>,
    publisher: Arc<P>,
    timeframes: Vec<Timeframe>,
}

impl<S, C, P> Coordinator<S, C, P>
where
    S: ClosedCandleSource,
    C: LiveCache,
    P: EventPublisher,
{
    /// Creates a coordinator over the given collaborators.
    #[must_use]
    pub const fn new(
        store: Arc<S>,
        cache: Arc<C>,
        publisher: Arc<P>,
        timeframes: Vec<Timeframe>,
    ) -> Self {
        Self {
            store,
            cache,
            publisher,
            timeframes,
        }
    }

    /// Returns the tracked timeframes.
    #[must_use]
    pub fn timeframes(&self) -> &[Timeframe] {
        &self.timeframes
    }

    /// Processes one base candle update across every tracked timeframe.
    pub async fn on_base_candle(&self, base: &BaseCandle) {
        let tasks = self
            .timeframes
            .iter()
            .map(|timeframe| self.process_timeframe(base, *timeframe));
        futures::future::join_all(tasks).await;
    }

    async fn process_timeframe(&self, base: &BaseCandle, timeframe: Timeframe) {
        let candle = match aggregate(self.store.as_ref(), base, timeframe).await {
            Ok(candle) => candle,
            Err(e) => {
                tracing::warn!(
                    symbol = %base.symbol,
                    %timeframe,
                    error = %e,
                    "aggregation failed, skipping this tick"
                );
                return;
            }
        };

        if let Err(e) = self.cache.set_current(&candle).await {
            tracing::warn!(symbol = %base.symbol, %timeframe, error = %e, "cache write failed");
        }

        if let Err(e) = self
            .publisher
            .publish(&base.symbol, timeframe, &CandleEvent::update(&candle))
            .await
        {
            tracing::warn!(symbol = %base.symbol, %timeframe, error = %e, "update publish failed");
        }

        if candle.is_closed {
            if let Err(e) = self
                .publisher
                .publish(&base.symbol, timeframe, &CandleEvent::closed(&candle))
                .await
            {
                tracing::warn!(symbol = %base.symbol, %timeframe, error = %e, "closed publish failed");
            }
            if let Err(e) = self.cache.remove_current(&base.symbol, timeframe).await {
                tracing::warn!(symbol = %base.symbol, %timeframe, error = %e, "cache delete failed");
            }
            tracing::info!(
                symbol = %base.symbol,
                %timeframe,
                open_time = %candle.open_time,
                "candle closed"
            );
        }
    }
}
