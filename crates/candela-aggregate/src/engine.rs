//! Stateless aggregation of base candles into coarse candles.

use async_trait::async_trait;
use candela_types::{BaseCandle, Candle, Result, Timeframe};
use chrono::{DateTime, Utc};

use crate::bucket_start;

/// Read access to durable closed base candles.
///
/// Implemented by the TimescaleDB store in production and by in-memory
/// fakes in tests. The engine only ever reads through this seam.
#[async_trait]
pub trait ClosedCandleSource: Send + Sync {
    /// Returns all closed base candles for `symbol` with
    /// `window_start <= start_time < exclude_before`, ascending by
    /// `start_time`.
    async fn closed_base_candles(
        &self,
        symbol: &str,
        window_start: DateTime<Utc>,
        exclude_before: DateTime<Utc>,
    ) -> Result<Vec<BaseCandle>>;
}

/// Computes the current coarse candle for one (symbol, timeframe) from the
/// in-flight base candle and durable state.
///
/// The exclusion boundary is the in-flight candle's own minute, never the
/// processing instant: the store query covers
/// `[window_start, base.start_time)` and is therefore disjoint from `base`
/// by construction, no matter how many partial updates arrive for the same
/// minute. The computation carries no in-memory state between invocations;
/// calling it twice with the same inputs yields identical output.
///
/// # Errors
///
/// Returns an error if the store query fails. No partial or estimated
/// result is ever substituted.
pub async fn aggregate<S: ClosedCandleSource + ?Sized>(
    store: &S,
    base: &BaseCandle,
    timeframe: Timeframe,
) -> Result<Candle> {
    let window_start = bucket_start(base.start_time, timeframe);
    let exclude_before = bucket_start(base.start_time, Timeframe::Minute1);

    let closed = store
        .closed_base_candles(&base.symbol, window_start, exclude_before)
        .await?;

    Ok(fold_window(base, timeframe, &closed))
}

/// Combines closed base candles with the in-flight update into the current
/// coarse candle.
///
/// `closed` must be the window's closed base candles in ascending
/// `start_time` order, excluding the in-flight candle's own minute. Pure;
/// exposed separately from [`aggregate`] so the fold can be tested without
/// a store.
#[must_use]
pub fn fold_window(base: &BaseCandle, timeframe: Timeframe, closed: &[BaseCandle]) -> Candle {
    let open_time = bucket_start(base.start_time, timeframe);
    let length = timeframe.minutes();

    let (open, high, low, volume) = match closed.first() {
        Some(first) => {
            let high = closed.iter().map(|c| c.high).fold(base.high, f64::max);
            let low = closed.iter().map(|c| c.low).fold(base.low, f64::min);
            let volume = closed.iter().map(|c| c.volume).sum::<f64>() + base.volume;
            (first.open, high, low, volume)
        }
        None => (base.open, base.high, base.low, base.volume),
    };

    let base_count = closed.len() as u32 + 1;

    let is_closed = if base_count > length {
        // Correctness alert: more base candles than the window can hold.
        // Keep serving the live snapshot but never let this window close.
        tracing::error!(
            symbol = %base.symbol,
            timeframe = %timeframe,
            base_count,
            length,
            "window holds more base candles than its length, refusing closure"
        );
        false
    } else {
        base.is_closed && base_count == length
    };

    Candle {
        symbol: base.symbol.clone(),
        timeframe,
        open_time,
        open,
        high,
        low,
        close: base.close,
        volume,
        base_count,
        is_closed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use candela_types::CandelaError;
    use chrono::TimeZone;
    use std::sync::Mutex;

    /// In-memory closed-candle store with the same half-open range
    /// semantics as the real one.
    struct MemoryStore {
        candles: Vec<BaseCandle>,
        queries: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
        fail: bool,
    }

    impl MemoryStore {
        fn new(mut candles: Vec<BaseCandle>) -> Self {
            candles.sort_by_key(|c| c.start_time);
            Self {
                candles,
                queries: Mutex::new(Vec::new()),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl ClosedCandleSource for MemoryStore {
        async fn closed_base_candles(
            &self,
            symbol: &str,
            window_start: DateTime<Utc>,
            exclude_before: DateTime<Utc>,
        ) -> Result<Vec<BaseCandle>> {
            if self.fail {
                return Err(CandelaError::Store("connection reset".to_string()));
            }
            self.queries
                .lock()
                .unwrap()
                .push((window_start, exclude_before));
            Ok(self
                .candles
                .iter()
                .filter(|c| {
                    c.symbol == symbol
                        && c.is_closed
                        && c.start_time >= window_start
                        && c.start_time < exclude_before
                })
                .cloned()
                .collect())
        }
    }

    fn minute(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, h, m, 0).unwrap()
    }

    fn closed_minute(h: u32, m: u32, price: f64, volume: f64) -> BaseCandle {
        BaseCandle::new(
            "BTCUSDT".to_string(),
            minute(h, m),
            price,
            price + 10.0,
            price - 10.0,
            price + 5.0,
            volume,
            true,
        )
    }

    /// 34 closed 1m candles for 10:00-10:33 plus the
    /// in-flight 10:34 candle.
    fn in_progress_hour_store() -> (MemoryStore, BaseCandle) {
        let mut candles = Vec::new();
        for m in 0..34 {
            let mut c = closed_minute(10, m, 43100.0, 10.25);
            c.high = 43150.0;
            c.low = 42900.0;
            candles.push(c);
        }
        // Shape the window extrema and the first open.
        candles[0].open = 43000.0;
        candles[12].high = 44000.0;
        candles[20].low = 42800.0;
        // 34 * 10.25 = 348.5; adjust one candle to reach 350.5 total.
        candles[5].volume = 12.25;

        let in_flight = BaseCandle::new(
            "BTCUSDT".to_string(),
            minute(10, 34),
            43500.0,
            43600.0,
            43480.0,
            43550.0,
            10.5,
            false,
        );
        (MemoryStore::new(candles), in_flight)
    }

    #[tokio::test]
    async fn test_in_progress_hour_window() {
        let (store, in_flight) = in_progress_hour_store();
        let candle = aggregate(&store, &in_flight, Timeframe::Hour1).await.unwrap();

        assert_eq!(candle.open_time, minute(10, 0));
        assert_relative_eq!(candle.open, 43000.0);
        assert_relative_eq!(candle.high, 44000.0);
        assert_relative_eq!(candle.low, 42800.0);
        assert_relative_eq!(candle.close, 43550.0);
        assert_relative_eq!(candle.volume, 361.0);
        assert_eq!(candle.base_count, 35);
        assert!(!candle.is_closed);
    }

    #[tokio::test]
    async fn test_closing_hour_window() {
        let candles: Vec<_> = (0..59).map(|m| closed_minute(10, m, 43000.0, 1.0)).collect();
        let store = MemoryStore::new(candles);
        let mut last = closed_minute(10, 59, 43200.0, 1.0);
        last.is_closed = true;

        let candle = aggregate(&store, &last, Timeframe::Hour1).await.unwrap();
        assert_eq!(candle.base_count, 60);
        assert!(candle.is_closed);
    }

    #[tokio::test]
    async fn test_closure_requires_closed_base() {
        // All 60 minutes present but the last update is still open.
        let candles: Vec<_> = (0..59).map(|m| closed_minute(10, m, 43000.0, 1.0)).collect();
        let store = MemoryStore::new(candles);
        let last = BaseCandle {
            is_closed: false,
            ..closed_minute(10, 59, 43200.0, 1.0)
        };

        let candle = aggregate(&store, &last, Timeframe::Hour1).await.unwrap();
        assert_eq!(candle.base_count, 60);
        assert!(!candle.is_closed);
    }

    #[tokio::test]
    async fn test_closure_requires_full_window() {
        // 58 closed candles + a closed 59th: only 59 of 60 minutes seen.
        let candles: Vec<_> = (0..58).map(|m| closed_minute(10, m, 43000.0, 1.0)).collect();
        let store = MemoryStore::new(candles);
        let last = closed_minute(10, 58, 43200.0, 1.0);

        let candle = aggregate(&store, &last, Timeframe::Hour1).await.unwrap();
        assert_eq!(candle.base_count, 59);
        assert!(!candle.is_closed);
    }

    #[tokio::test]
    async fn test_boundary_exclusivity() {
        // A closed row already persisted for the in-flight minute must not
        // be combined with the in-flight update for the same minute.
        let mut candles: Vec<_> = (0..30).map(|m| closed_minute(10, m, 43000.0, 1.0)).collect();
        candles.push(closed_minute(10, 30, 43100.0, 99.0));
        let store = MemoryStore::new(candles);

        let in_flight = BaseCandle {
            is_closed: false,
            volume: 2.5,
            ..closed_minute(10, 30, 43100.0, 0.0)
        };
        let candle = aggregate(&store, &in_flight, Timeframe::Hour1).await.unwrap();

        // 30 stored minutes + the in-flight one; the persisted 10:30 row
        // (volume 99.0) is excluded by the half-open boundary.
        assert_eq!(candle.base_count, 31);
        assert_relative_eq!(candle.volume, 30.0 + 2.5);

        let queries = store.queries.lock().unwrap();
        assert_eq!(queries[0], (minute(10, 0), minute(10, 30)));
    }

    #[tokio::test]
    async fn test_first_tick_of_window() {
        let store = MemoryStore::new(Vec::new());
        let in_flight = BaseCandle {
            is_closed: false,
            ..closed_minute(10, 0, 43000.0, 3.5)
        };
        let candle = aggregate(&store, &in_flight, Timeframe::Minute5).await.unwrap();

        assert_eq!(candle.base_count, 1);
        assert_relative_eq!(candle.open, 43000.0);
        assert_relative_eq!(candle.volume, 3.5);
        assert!(!candle.is_closed);
    }

    #[tokio::test]
    async fn test_volume_conservation() {
        // One full 15m window: 14 closed candles plus the closing 15th.
        let candles: Vec<_> = (0..14)
            .map(|m| closed_minute(10, m, 43000.0 + f64::from(m), 1.5 + f64::from(m)))
            .collect();
        let expected: f64 =
            candles.iter().map(|c| c.volume).sum::<f64>() + 7.75;
        let store = MemoryStore::new(candles);
        let mut last = closed_minute(10, 14, 43014.0, 7.75);
        last.is_closed = true;

        let candle = aggregate(&store, &last, Timeframe::Minute15).await.unwrap();
        assert_relative_eq!(candle.volume, expected);
        assert!(candle.is_closed);
    }

    #[tokio::test]
    async fn test_ohlc_bounds_on_generated_sequence() {
        // Deterministic pseudo-random walk over a 5m window.
        let mut seed: u64 = 0x9E37_79B9_7F4A_7C15;
        let mut next = || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((seed >> 33) % 2000) as f64 - 1000.0
        };

        let mut candles = Vec::new();
        for m in 0..4 {
            let mid = 43000.0 + next();
            let mut c = closed_minute(10, m, mid, 1.0);
            c.high = mid + next().abs();
            c.low = mid - next().abs();
            c.close = (c.high + c.low) / 2.0;
            candles.push(c);
        }
        let max_high = candles.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let min_low = candles.iter().map(|c| c.low).fold(f64::MAX, f64::min);

        let store = MemoryStore::new(candles);
        let in_flight = BaseCandle {
            is_closed: false,
            ..closed_minute(10, 4, 43000.0, 1.0)
        };
        let candle = aggregate(&store, &in_flight, Timeframe::Minute5).await.unwrap();

        assert_relative_eq!(candle.high, max_high.max(in_flight.high));
        assert_relative_eq!(candle.low, min_low.min(in_flight.low));
        assert!(candle.ohlc_consistent());
    }

    #[tokio::test]
    async fn test_idempotence() {
        let (store, in_flight) = in_progress_hour_store();
        let first = aggregate(&store, &in_flight, Timeframe::Hour1).await.unwrap();
        let second = aggregate(&store, &in_flight, Timeframe::Hour1).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_store_failure_surfaces() {
        let (mut store, in_flight) = in_progress_hour_store();
        store.fail = true;
        let result = aggregate(&store, &in_flight, Timeframe::Hour1).await;
        assert!(matches!(result, Err(CandelaError::Store(_))));
    }

    #[test]
    fn test_overfull_window_never_closes() {
        // 6 closed candles crammed into a 5m window: invariant violation.
        let closed: Vec<_> = (0..6).map(|m| closed_minute(10, m, 43000.0, 1.0)).collect();
        let mut last = closed_minute(10, 6, 43000.0, 1.0);
        last.is_closed = true;

        let candle = fold_window(&last, Timeframe::Minute5, &closed);
        assert_eq!(candle.base_count, 7);
        assert!(!candle.is_closed);
    }
}
