// Cache entry with fetch timestamp.
// Freshness is a pure wall-clock comparison against the configured window.

use std::sync::Arc;

/// A cached value with the time it was fetched.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// The cached value, shared with consumers.
    pub value: Arc<T>,
    /// When the value was fetched (Unix milliseconds).
    pub fetched_at_ms: i64,
}

impl<T> CacheEntry<T> {
    pub fn new(value: Arc<T>, fetched_at_ms: i64) -> Self {
        Self {
            value,
            fetched_at_ms,
        }
    }

    /// Age of the entry at `now_ms`.
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.fetched_at_ms
    }

    /// Whether the entry is still inside its freshness window.
    pub fn is_fresh(&self, now_ms: i64, ttl_ms: u64) -> bool {
        (self.age_ms(now_ms) as i128) < ttl_ms as i128
    }
}
