//! Tracked aggregation timeframes.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A candle timeframe tracked by the aggregation service.
///
/// The base interval is one minute; every coarser timeframe is an exact
/// multiple of it and is derived from stored 1-minute candles, never
/// ingested directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Timeframe {
    /// 1-minute candles (the base interval).
    #[default]
    #[serde(rename = "1m")]
    Minute1,
    /// 5-minute candles.
    #[serde(rename = "5m")]
    Minute5,
    /// 15-minute candles.
    #[serde(rename = "15m")]
    Minute15,
    /// 1-hour candles.
    #[serde(rename = "1h")]
    Hour1,
    /// 4-hour candles.
    #[serde(rename = "4h")]
    Hour4,
    /// Daily candles.
    #[serde(rename = "1d")]
    Day1,
    /// Weekly candles.
    #[serde(rename = "1w")]
    Week1,
}

impl Timeframe {
    /// Returns the window length in base (1-minute) intervals.
    #[must_use]
    pub const fn minutes(&self) -> u32 {
        match self {
            Self::Minute1 => 1,
            Self::Minute5 => 5,
            Self::Minute15 => 15,
            Self::Hour1 => 60,
            Self::Hour4 => 240,
            Self::Day1 => 1440,
            Self::Week1 => 10080,
        }
    }

    /// Returns the window length in seconds.
    #[must_use]
    pub const fn seconds(&self) -> u64 {
        self.minutes() as u64 * 60
    }

    /// Returns the window length in milliseconds.
    #[must_use]
    pub const fn milliseconds(&self) -> i64 {
        self.minutes() as i64 * 60_000
    }

    /// Returns true if this is the base interval.
    #[must_use]
    pub const fn is_base(&self) -> bool {
        matches!(self, Self::Minute1)
    }

    /// Returns the timeframe as its wire string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Minute1 => "1m",
            Self::Minute5 => "5m",
            Self::Minute15 => "15m",
            Self::Hour1 => "1h",
            Self::Hour4 => "4h",
            Self::Day1 => "1d",
            Self::Week1 => "1w",
        }
    }

    /// Returns the continuous-aggregate view name backing this timeframe.
    ///
    /// The base interval maps to the raw hypertable.
    #[must_use]
    pub const fn view_name(&self) -> &'static str {
        match self {
            Self::Minute1 => "candle_data_1m",
            Self::Minute5 => "candle_data_5m",
            Self::Minute15 => "candle_data_15m",
            Self::Hour1 => "candle_data_1h",
            Self::Hour4 => "candle_data_4h",
            Self::Day1 => "candle_data_1d",
            Self::Week1 => "candle_data_1w",
        }
    }

    /// Returns all tracked timeframes, finest first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Minute1,
            Self::Minute5,
            Self::Minute15,
            Self::Hour1,
            Self::Hour4,
            Self::Day1,
            Self::Week1,
        ]
    }

    /// Returns the coarse timeframes derived from the base interval.
    #[must_use]
    pub const fn coarse() -> &'static [Self] {
        &[
            Self::Minute5,
            Self::Minute15,
            Self::Hour1,
            Self::Hour4,
            Self::Day1,
            Self::Week1,
        ]
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = TimeframeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1m" | "m1" | "minute" | "minute1" => Ok(Self::Minute1),
            "5m" | "m5" | "minute5" => Ok(Self::Minute5),
            "15m" | "m15" | "minute15" => Ok(Self::Minute15),
            "1h" | "h1" | "hour" | "hour1" => Ok(Self::Hour1),
            "4h" | "h4" | "hour4" => Ok(Self::Hour4),
            "1d" | "d1" | "day" | "daily" => Ok(Self::Day1),
            "1w" | "w1" | "week" | "weekly" => Ok(Self::Week1),
            _ => Err(TimeframeParseError(s.to_string())),
        }
    }
}

/// Error returned when parsing an invalid timeframe string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeframeParseError(String);

impl std::fmt::Display for TimeframeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid timeframe '{}', expected one of: 1m, 5m, 15m, 1h, 4h, 1d, 1w",
            self.0
        )
    }
}

impl std::error::Error for TimeframeParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_minutes() {
        assert_eq!(Timeframe::Minute1.minutes(), 1);
        assert_eq!(Timeframe::Hour1.minutes(), 60);
        assert_eq!(Timeframe::Hour4.minutes(), 240);
        assert_eq!(Timeframe::Week1.minutes(), 10080);
    }

    #[test]
    fn test_timeframe_parse() {
        assert_eq!("5m".parse::<Timeframe>().unwrap(), Timeframe::Minute5);
        assert_eq!("h1".parse::<Timeframe>().unwrap(), Timeframe::Hour1);
        assert_eq!("1W".parse::<Timeframe>().unwrap(), Timeframe::Week1);
        assert!("2h".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_coarse_excludes_base() {
        assert!(!Timeframe::coarse().contains(&Timeframe::Minute1));
        assert_eq!(Timeframe::coarse().len(), Timeframe::all().len() - 1);
    }

    #[test]
    fn test_serde_wire_names() {
        let json = serde_json::to_string(&Timeframe::Minute15).unwrap();
        assert_eq!(json, "\"15m\"");
        let tf: Timeframe = serde_json::from_str("\"1w\"").unwrap();
        assert_eq!(tf, Timeframe::Week1);
    }
}
