//! Window alignment arithmetic.

use candela_types::Timeframe;
use chrono::{DateTime, Utc};

/// Returns the start of the window containing `instant` for the given
/// timeframe.
///
/// Computed as floor division of epoch milliseconds by the window length,
/// so every window start is an exact multiple of the length from the Unix
/// epoch. Weekly windows therefore align to the epoch (Thursday 00:00 UTC),
/// matching the stored rollups.
///
/// This function is the single source of truth for interval alignment;
/// every component derives boundaries from it rather than recomputing them
/// locally.
#[must_use]
pub fn bucket_start(instant: DateTime<Utc>, timeframe: Timeframe) -> DateTime<Utc> {
    let length_ms = timeframe.milliseconds();
    let ms = instant.timestamp_millis();
    let start = ms.div_euclid(length_ms) * length_ms;
    DateTime::from_timestamp_millis(start).expect("floor of a valid timestamp stays in range")
}
