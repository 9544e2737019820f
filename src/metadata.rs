//! Cache metadata and entry structures.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Current time as a duration since `UNIX_EPOCH`.
pub(crate) fn current_time() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
}

/// Metadata associated with a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntryMetadata {
    /// When the entry was last populated (Duration since UNIX_EPOCH)
    pub created_time: Duration,
    /// Time-to-live for the entry
    pub ttl: Duration,
}

impl EntryMetadata {
    /// Create new metadata stamped with the current time
    pub fn new(ttl: Duration) -> Self {
        Self::with_time(current_time(), ttl)
    }

    /// Create metadata with a specific creation time
    pub fn with_time(created_time: Duration, ttl: Duration) -> Self {
        Self { created_time, ttl }
    }

    /// Absolute expiry; the entry is valid strictly before this instant
    pub fn expires_at(&self) -> Duration {
        self.created_time.saturating_add(self.ttl)
    }

    /// Check if the entry is expired at the given time
    pub fn is_expired(&self, now: Duration) -> bool {
        now >= self.expires_at()
    }

    /// Whether an expired entry is still within `window` of its expiry.
    ///
    /// Fresh entries are always within the window.
    pub fn is_within(&self, now: Duration, window: Duration) -> bool {
        now < self.expires_at().saturating_add(window)
    }

    /// Age of the entry at the given time
    pub fn age(&self, now: Duration) -> Duration {
        now.saturating_sub(self.created_time)
    }
}

/// A cache entry containing both the value and its metadata.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CacheEntry<T> {
    /// The cached value
    pub value: T,
    /// Metadata about the entry
    pub metadata: EntryMetadata,
}

impl<T> CacheEntry<T> {
    /// Create a new entry stamped now with the given TTL
    pub fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            metadata: EntryMetadata::new(ttl),
        }
    }

    /// Create a new entry with specific metadata
    pub fn with_metadata(value: T, metadata: EntryMetadata) -> Self {
        Self { value, metadata }
    }

    /// Check if the entry is expired at the given time
    pub fn is_expired(&self, now: Duration) -> bool {
        self.metadata.is_expired(now)
    }

    /// Absolute expiry of the entry
    pub fn expires_at(&self) -> Duration {
        self.metadata.expires_at()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_boundary() {
        let metadata =
            EntryMetadata::with_time(Duration::from_secs(1_000), Duration::from_secs(60));

        assert_eq!(metadata.expires_at(), Duration::from_secs(1_060));
        assert!(!metadata.is_expired(Duration::from_secs(1_059)));
        // Valid only while now < expires_at
        assert!(metadata.is_expired(Duration::from_secs(1_060)));
        assert!(metadata.is_expired(Duration::from_secs(2_000)));
    }

    #[test]
    fn test_zero_ttl_is_born_expired() {
        let metadata = EntryMetadata::new(Duration::ZERO);
        assert!(metadata.is_expired(metadata.created_time));
    }

    #[test]
    fn test_is_within_window() {
        let metadata = EntryMetadata::with_time(Duration::from_secs(100), Duration::from_secs(10));
        let window = Duration::from_secs(5);

        assert!(metadata.is_within(Duration::from_secs(105), window));
        assert!(metadata.is_within(Duration::from_secs(114), window));
        assert!(!metadata.is_within(Duration::from_secs(115), window));
        assert!(!metadata.is_within(Duration::from_secs(111), Duration::ZERO));
    }

    #[test]
    fn test_entry_age() {
        let entry = CacheEntry::new("row".to_string(), Duration::from_secs(30));
        let now = entry.metadata.created_time + Duration::from_secs(10);

        assert_eq!(entry.metadata.age(now), Duration::from_secs(10));
        assert!(!entry.is_expired(now));
        assert_eq!(entry.expires_at(), entry.metadata.created_time + Duration::from_secs(30));
    }
}
