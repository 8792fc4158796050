//! Mutual exclusion between backfill and cleanup.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Tracks which symbols have a backfill in flight.
///
/// Cleanup must never delete rows a concurrent backfill is about to read
/// as "latest", so the cleanup scheduler skips its round while any token
/// is held. Both tasks run inside one process, so a shared set is all the
/// coordination required — no distributed lock.
#[derive(Debug, Clone, Default)]
pub struct BackfillGuard {
    active: Arc<Mutex<HashSet<String>>>,
}

impl BackfillGuard {
    /// Creates an empty guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a backfill active for `symbol`, releasing on drop.
    #[must_use]
    pub fn begin(&self, symbol: &str) -> BackfillToken {
        self.active.lock().unwrap().insert(symbol.to_string());
        BackfillToken {
            guard: self.clone(),
            symbol: symbol.to_string(),
        }
    }

    /// Returns true if any backfill is currently active.
    #[must_use]
    pub fn any_active(&self) -> bool {
        !self.active.lock().unwrap().is_empty()
    }

    /// Returns true if a backfill is active for `symbol`.
    #[must_use]
    pub fn is_active(&self, symbol: &str) -> bool {
        self.active.lock().unwrap().contains(symbol)
    }

    fn end(&self, symbol: &str) {
        self.active.lock().unwrap().remove(symbol);
    }
}

/// RAII marker for one symbol's in-flight backfill.
#[derive(Debug)]
pub struct BackfillToken {
    guard: BackfillGuard,
    symbol: String,
}

impl Drop for BackfillToken {
    fn drop(&mut self) {
        self.guard.end(&self.symbol);
    }
}
