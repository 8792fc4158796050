//! Base candle ingestion.

use async_trait::async_trait;
use candela_aggregate::ClosedCandleSource;
use candela_publish::{EventPublisher, LiveCache};
use candela_store::CandleStore;
use candela_types::{BaseCandle, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::coordinator::Coordinator;

/// Durable write access for incoming base candles.
#[async_trait]
pub trait BaseCandleSink: Send + Sync {
    /// Idempotently upserts one base candle, keyed by
    /// `(symbol, start_time)`.
    async fn upsert_base_candle(&self, candle: &BaseCandle) -> Result<()>;
}

#[async_trait]
impl BaseCandleSink for CandleStore {
    async fn upsert_base_candle(&self, candle: &BaseCandle) -> Result<()> {
        Ok(Self::upsert_base_candle(self, candle).await?)
    }
}

/// Consumes the external stream's base candle updates.
///
/// Each update is persisted first, then handed to the coordinator so the
/// just-closed minute is already durable when its closure tick fans out.
/// A failed upsert is logged and the tick still aggregates — the window
/// query excludes the in-flight minute, so the live snapshot stays
/// correct and the row is rewritten on the next update.
#[derive(Debug)]
pub struct Ingestor<W, S, C, P> {
    sink: Arc<W>,
    coordinator: Arc<Coordinator<S, C, P>>,
}

impl<W, S, C, P> Ingestor<W, S, C, P>
where
    W: BaseCandleSink,
    S: ClosedCandleSource,
    C: LiveCache,
    P: EventPublisher,
{
    /// Creates an ingestor over the given sink and coordinator.
    #[must_use]
    pub const fn new(sink: Arc<W>, coordinator: Arc<Coordinator<S, C, P>>) -> Self {
        Self { sink, coordinator }
    }

    /// Processes one base candle update.
    pub async fn on_update(&self, candle: &BaseCandle) {
        if let Err(e) = self.sink.upsert_base_candle(candle).await {
            tracing::warn!(
                symbol = %candle.symbol,
                start_time = %candle.start_time,
                error = %e,
                "base candle upsert failed"
            );
        }
        self.coordinator.on_base_candle(candle).await;
    }

    /// Drains the feed until it closes or shutdown is signalled.
    pub async fn run(
        &self,
        mut feed: mpsc::Receiver<BaseCandle>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                update = feed.recv() => match update {
                    Some(candle) => self.on_update(&candle).await,
                    None => {
                        tracing::info!("ingestion feed closed");
                        return;
                    }
                },
                _ = shutdown.changed() => {
                    tracing::info!("ingestion stopping");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candela_publish::{CandleEvent, PublishError};
    use candela_types::{Candle, CandelaError, Timeframe};
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakySink {
        fail: bool,
        upserts: AtomicUsize,
    }

    #[async_trait]
    impl BaseCandleSink for FlakySink {
        async fn upsert_base_candle(&self, _candle: &BaseCandle) -> Result<()> {
            self.upserts.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CandelaError::Store("write timeout".to_string()));
            }
            Ok(())
        }
    }

    struct EmptySource;

    #[async_trait]
    impl ClosedCandleSource for EmptySource {
        async fn closed_base_candles(
            &self,
            _symbol: &str,
            _window_start: DateTime<Utc>,
            _exclude_before: DateTime<Utc>,
        ) -> Result<Vec<BaseCandle>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct NullCache;

    #[async_trait]
    impl LiveCache for NullCache {
        async fn set_current(&self, _candle: &Candle) -> std::result::Result<(), PublishError> {
            Ok(())
        }

        async fn remove_current(
            &self,
            _symbol: &str,
            _timeframe: Timeframe,
        ) -> std::result::Result<(), PublishError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingPublisher {
        events: Mutex<Vec<CandleEvent>>,
    }

    #[async_trait]
    impl EventPublisher for CountingPublisher {
        async fn publish(
            &self,
            _symbol: &str,
            _timeframe: Timeframe,
            event: &CandleEvent,
        ) -> std::result::Result<(), PublishError> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    fn update() -> BaseCandle {
        BaseCandle::new(
            "BTCUSDT".to_string(),
            Utc.with_ymd_and_hms(2024, 6, 3, 10, 2, 0).unwrap(),
            43000.0,
            43010.0,
            42990.0,
            43005.0,
            1.0,
            false,
        )
    }

    #[tokio::test]
    async fn test_upsert_then_aggregate() {
        let sink = Arc::new(FlakySink {
            fail: false,
            upserts: AtomicUsize::new(0),
        });
        let publisher = Arc::new(CountingPublisher::default());
        let coordinator = Arc::new(Coordinator::new(
            Arc::new(EmptySource),
            Arc::new(NullCache),
            Arc::clone(&publisher),
            vec![Timeframe::Minute5, Timeframe::Hour1],
        ));
        let ingestor = Ingestor::new(Arc::clone(&sink), coordinator);

        ingestor.on_update(&update()).await;

        assert_eq!(sink.upserts.load(Ordering::SeqCst), 1);
        assert_eq!(publisher.events.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_upsert_still_aggregates() {
        let sink = Arc::new(FlakySink {
            fail: true,
            upserts: AtomicUsize::new(0),
        });
        let publisher = Arc::new(CountingPublisher::default());
        let coordinator = Arc::new(Coordinator::new(
            Arc::new(EmptySource),
            Arc::new(NullCache),
            Arc::clone(&publisher),
            vec![Timeframe::Minute5],
        ));
        let ingestor = Ingestor::new(Arc::clone(&sink), coordinator);

        ingestor.on_update(&update()).await;

        assert_eq!(sink.upserts.load(Ordering::SeqCst), 1);
        assert_eq!(publisher.events.lock().unwrap().len(), 1);
    }
}
