//! Kline payload parsing.

use candela_types::BaseCandle;
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while parsing a kline payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Payload was not a JSON array of kline rows.
    #[error("expected a kline array, got: {0}")]
    NotAnArray(String),

    /// A kline row was missing fields or carried the wrong types.
    #[error("malformed kline row at index {0}: {1}")]
    MalformedRow(usize, String),
}

/// Parses a klines response body into base candles.
///
/// The endpoint returns rows of the form
/// `[open_time_ms, "open", "high", "low", "close", "volume", close_time_ms, ...]`
/// with prices and volume as strings. A candle is marked closed only when
/// its minute has fully elapsed relative to `now`; the endpoint includes
/// the currently forming minute in its last row.
///
/// # Errors
///
/// Returns an error if the payload is not a kline array or a row is
/// malformed. No partial result is returned.
pub fn parse_klines(
    body: &[u8],
    symbol: &str,
    now: DateTime<Utc>,
) -> Result<Vec<BaseCandle>, ParseError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ParseError::NotAnArray(e.to_string()))?;
    let rows = value
        .as_array()
        .ok_or_else(|| ParseError::NotAnArray(value.to_string()))?;

    rows.iter()
        .enumerate()
        .map(|(index, row)| parse_row(row, index, symbol, now))
        .collect()
}

fn parse_row(
    row: &Value,
    index: usize,
    symbol: &str,
    now: DateTime<Utc>,
) -> Result<BaseCandle, ParseError> {
    let fields = row
        .as_array()
        .ok_or_else(|| ParseError::MalformedRow(index, "row is not an array".to_string()))?;
    if fields.len() < 6 {
        return Err(ParseError::MalformedRow(
            index,
            format!("expected at least 6 fields, got {}", fields.len()),
        ));
    }

    let open_time_ms = fields[0]
        .as_i64()
        .ok_or_else(|| ParseError::MalformedRow(index, "open time is not an integer".to_string()))?;
    let start_time = DateTime::from_timestamp_millis(open_time_ms)
        .ok_or_else(|| ParseError::MalformedRow(index, "open time out of range".to_string()))?;

    let price = |i: usize, name: &str| -> Result<f64, ParseError> {
        fields[i]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| ParseError::MalformedRow(index, format!("bad {name} field")))
    };

    // The row's own minute is closed once it has fully elapsed.
    let is_closed = start_time + TimeDelta::minutes(1) <= now;

    Ok(BaseCandle::new(
        symbol.to_string(),
        start_time,
        price(1, "open")?,
        price(2, "high")?,
        price(3, "low")?,
        price(4, "close")?,
        price(5, "volume")?,
        is_closed,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    const SAMPLE: &str = r#"[
        [1717408800000, "43000.00", "43120.50", "42980.00", "43100.10", "12.345", 1717408859999, "531000.0", 842, "6.1", "262000.0", "0"],
        [1717408860000, "43100.10", "43150.00", "43050.00", "43080.00", "8.5", 1717408919999, "366000.0", 512, "4.0", "172000.0", "0"]
    ]"#;

    #[test]
    fn test_parse_sample() {
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 10, 5, 0).unwrap();
        let candles = parse_klines(SAMPLE.as_bytes(), "BTCUSDT", now).unwrap();
        assert_eq!(candles.len(), 2);

        let first = &candles[0];
        assert_eq!(first.symbol, "BTCUSDT");
        assert_eq!(first.start_time, Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap());
        assert_relative_eq!(first.open, 43000.0);
        assert_relative_eq!(first.high, 43120.5);
        assert_relative_eq!(first.volume, 12.345);
        assert!(first.is_closed);
    }

    #[test]
    fn test_forming_minute_stays_open() {
        // "now" is 30s into the second row's minute.
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 10, 1, 30).unwrap();
        let candles = parse_klines(SAMPLE.as_bytes(), "BTCUSDT", now).unwrap();
        assert!(candles[0].is_closed);
        assert!(!candles[1].is_closed);
    }

    #[test]
    fn test_rejects_non_array() {
        let err = parse_klines(br#"{"code":-1121}"#, "BTCUSDT", Utc::now()).unwrap_err();
        assert!(matches!(err, ParseError::NotAnArray(_)));
    }

    #[test]
    fn test_rejects_short_row() {
        let err = parse_klines(br"[[1717408800000]]", "BTCUSDT", Utc::now()).unwrap_err();
        assert!(matches!(err, ParseError::MalformedRow(0, _)));
    }

    #[test]
    fn test_rejects_bad_price() {
        let body = br#"[[1717408800000, "not-a-price", "1", "1", "1", "1"]]"#;
        let err = parse_klines(body, "BTCUSDT", Utc::now()).unwrap_err();
        assert!(matches!(err, ParseError::MalformedRow(0, _)));
    }
}
