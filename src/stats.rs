//! Diagnostic counters exposed by `ServerCache::stats`.

#[cfg(feature = "serde")]
use serde::Serialize;

/// Point-in-time snapshot of cache activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct CacheStats {
    /// Entries currently held by the store (including retained stale ones)
    pub keys: usize,
    /// Lookups answered from a fresh entry
    pub hits: u64,
    /// Lookups that found no fresh entry
    pub misses: u64,
    /// Populations running right now
    pub in_flight: usize,
}

impl CacheStats {
    /// hits / (hits + misses), or 0.0 before any lookup
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
