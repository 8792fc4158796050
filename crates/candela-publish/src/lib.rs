//! Redis live cache and pub/sub publishing for candela.
//!
//! Subscribers receive full-snapshot messages with replace semantics: each
//! `candle` update fully supersedes the previous snapshot for its
//! (symbol, timeframe) key, and a terminal `candle_closed` message marks
//! window completion. Delivery is best-effort, at-least-once; a missed
//! update is superseded by the next tick.

#![forbid(unsafe_code)]

mod messages;
mod publisher;

pub use messages::{CacheEntry, CandleEvent, CandleSnapshot, cache_key, channel};
pub use publisher::{EventPublisher, LiveCache, PublishError, RedisPublisher};
