//! Candle data structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Timeframe;

/// A 1-minute (base interval) candle as delivered by the stream or the
/// historical REST collaborator.
///
/// The same record arrives many times per minute while the minute is open,
/// each update superseding the last, and once more with `is_closed = true`
/// at closure. It is persisted idempotently, keyed by
/// `(symbol, start_time)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseCandle {
    /// Trading pair identifier (e.g. "BTCUSDT").
    pub symbol: String,
    /// Inclusive start of the candle's minute (UTC).
    pub start_time: DateTime<Utc>,
    /// Opening price.
    pub open: f64,
    /// Highest price so far.
    pub high: f64,
    /// Lowest price so far.
    pub low: f64,
    /// Most recent price.
    pub close: f64,
    /// Traded volume so far.
    pub volume: f64,
    /// True once the minute has fully elapsed and the values are final.
    pub is_closed: bool,
}

impl BaseCandle {
    /// Creates a new base candle.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        symbol: String,
        start_time: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        is_closed: bool,
    ) -> Self {
        Self {
            symbol,
            start_time,
            open,
            high,
            low,
            close,
            volume,
            is_closed,
        }
    }
}

/// An aggregated candle at any tracked timeframe.
///
/// A coarse candle has no persisted identity while open; it is recomputed
/// from durable base candles plus the in-flight update on every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Trading pair identifier.
    pub symbol: String,
    /// The candle's timeframe.
    pub timeframe: Timeframe,
    /// Inclusive start of the half-open window `[open_time, open_time + length)`.
    pub open_time: DateTime<Utc>,
    /// First base candle's open in the window.
    pub open: f64,
    /// Maximum high across the window.
    pub high: f64,
    /// Minimum low across the window.
    pub low: f64,
    /// Most recent base candle's close.
    pub close: f64,
    /// Sum of base candle volumes in the window.
    pub volume: f64,
    /// Number of base candles combined so far (closed ones plus the
    /// in-flight update).
    pub base_count: u32,
    /// True once the window is complete and the values are final.
    pub is_closed: bool,
}

impl Candle {
    /// Returns the price range (high - low).
    #[must_use]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Returns true if this is a bullish (green) candle.
    #[must_use]
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Returns true if the OHLC extrema bound the open and close.
    ///
    /// Holds for any candle built from at least one base candle; a
    /// violation indicates corrupted input data.
    #[must_use]
    pub fn ohlc_consistent(&self) -> bool {
        self.high >= self.open.max(self.close) && self.low <= self.open.min(self.close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_candle() -> Candle {
        Candle {
            symbol: "BTCUSDT".to_string(),
            timeframe: Timeframe::Hour1,
            open_time: Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap(),
            open: 43000.0,
            high: 44000.0,
            low: 42800.0,
            close: 43550.0,
            volume: 361.0,
            base_count: 35,
            is_closed: false,
        }
    }

    #[test]
    fn test_range() {
        assert!((test_candle().range() - 1200.0).abs() < 1e-9);
    }

    #[test]
    fn test_bullish() {
        assert!(test_candle().is_bullish());
    }

    #[test]
    fn test_ohlc_consistent() {
        let mut c = test_candle();
        assert!(c.ohlc_consistent());
        c.high = 43200.0;
        assert!(!c.ohlc_consistent());
    }
}
