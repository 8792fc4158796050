//! Wire message and cache entry formats.

use candela_types::{Candle, Timeframe};
use serde::{Deserialize, Serialize};

/// Full candle snapshot as carried by publish messages.
///
/// `timestamp` is the window's open time in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleSnapshot {
    /// Trading pair identifier.
    pub symbol: String,
    /// The snapshot's timeframe.
    pub timeframe: Timeframe,
    /// Window open time in epoch milliseconds.
    pub timestamp: i64,
    /// Opening price.
    pub open: f64,
    /// Highest price.
    pub high: f64,
    /// Lowest price.
    pub low: f64,
    /// Most recent price.
    pub close: f64,
    /// Accumulated volume.
    pub volume: f64,
    /// True for a terminal snapshot.
    pub is_closed: bool,
}

impl From<&Candle> for CandleSnapshot {
    fn from(candle: &Candle) -> Self {
        Self {
            symbol: candle.symbol.clone(),
            timeframe: candle.timeframe,
            timestamp: candle.open_time.timestamp_millis(),
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
            volume: candle.volume,
            is_closed: candle.is_closed,
        }
    }
}

/// A message published on a candle channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CandleEvent {
    /// Non-terminal snapshot; replaces the subscriber's previous snapshot
    /// for the same (symbol, timeframe).
    #[serde(rename = "candle")]
    Update(CandleSnapshot),
    /// Terminal snapshot; the window is complete and its values final.
    #[serde(rename = "candle_closed")]
    Closed {
        /// Trading pair identifier.
        symbol: String,
        /// The closed window's timeframe.
        timeframe: Timeframe,
        /// The final candle values.
        candle: CandleSnapshot,
    },
}

impl CandleEvent {
    /// Builds the update event for a candle.
    #[must_use]
    pub fn update(candle: &Candle) -> Self {
        Self::Update(candle.into())
    }

    /// Builds the terminal closed event for a candle.
    #[must_use]
    pub fn closed(candle: &Candle) -> Self {
        Self::Closed {
            symbol: candle.symbol.clone(),
            timeframe: candle.timeframe,
            candle: candle.into(),
        }
    }
}

/// Live-cache value for the current in-flight candle.
///
/// `time` is the window open time in epoch seconds, matching what the
/// charting API reads back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Window open time in epoch seconds.
    pub time: i64,
    /// Opening price.
    pub open: f64,
    /// Highest price.
    pub high: f64,
    /// Lowest price.
    pub low: f64,
    /// Most recent price.
    pub close: f64,
    /// Accumulated volume.
    pub volume: f64,
}

impl From<&Candle> for CacheEntry {
    fn from(candle: &Candle) -> Self {
        Self {
            time: candle.open_time.timestamp(),
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
            volume: candle.volume,
        }
    }
}

/// Returns the live-cache key for a (symbol, timeframe) pair.
#[must_use]
pub fn cache_key(symbol: &str, timeframe: Timeframe) -> String {
    format!("current_candle:{symbol}:{timeframe}")
}

/// Returns the pub/sub channel for a (symbol, timeframe) pair.
#[must_use]
pub fn channel(symbol: &str, timeframe: Timeframe) -> String {
    format!("candle:{symbol}:{timeframe}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_candle() -> Candle {
        Candle {
            symbol: "BTCUSDT".to_string(),
            timeframe: Timeframe::Hour1,
            open_time: chrono::Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap(),
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
    fn test_keys() {
        assert_eq!(cache_key("BTCUSDT", Timeframe::Hour1), "current_candle:BTCUSDT:1h");
        assert_eq!(channel("ETHUSDT", Timeframe::Minute5), "candle:ETHUSDT:5m");
    }

    #[test]
    fn test_update_wire_format() {
        let event = CandleEvent::update(&test_candle());
        let value: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "candle");
        assert_eq!(value["symbol"], "BTCUSDT");
        assert_eq!(value["timeframe"], "1h");
        assert_eq!(value["timestamp"], 1717408800000_i64);
        assert_eq!(value["is_closed"], false);
    }

    #[test]
    fn test_closed_wire_format() {
        let mut candle = test_candle();
        candle.is_closed = true;
        let event = CandleEvent::closed(&candle);
        let value: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "candle_closed");
        assert_eq!(value["candle"]["close"], 43550.0);
        assert_eq!(value["candle"]["is_closed"], true);
    }

    #[test]
    fn test_cache_entry_uses_seconds() {
        let entry = CacheEntry::from(&test_candle());
        assert_eq!(entry.time, 1717408800);
        assert_eq!(entry.volume, 361.0);
    }
}
