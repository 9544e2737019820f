//! Storage trait and the in-memory implementation
//!
//! `ServerCache` keeps its entries behind the [`Store`] trait. The default
//! implementation is [`MokaStore`], a bounded moka cache whose per-entry
//! expiry follows each entry's TTL plus a configurable stale retention.

use crate::{CacheEntry, EntryMetadata, Result};
use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache as MokaFutureCache;
use moka::ops::compute::Op;
use std::future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Backing map for `ServerCache`.
///
/// Implementations only store and hand back entries; freshness checks,
/// statistics and single-flight population live in `ServerCache`.
#[async_trait]
pub trait Store<T>: Send + Sync
where
    T: Clone + Send + Sync + 'static,
{
    /// Get an entry by key, expired or not
    async fn get(&self, key: &str) -> Option<CacheEntry<T>>;

    /// Store an entry, replacing any existing entry for the key
    async fn set(&self, key: &str, entry: CacheEntry<T>) -> Result<()>;

    /// Remove an entry by key
    async fn remove(&self, key: &str);

    /// Remove the entry for `key` only if it is still the one described by
    /// `observed`. A newer entry written since it was read is left alone.
    ///
    /// The default re-reads and compares before removing, which leaves a
    /// window between the two calls; stores that can compare and remove
    /// under one lock should override it.
    async fn remove_if_stale(&self, key: &str, observed: &EntryMetadata) {
        if let Some(current) = self.get(key).await {
            if current.metadata == *observed {
                self.remove(key).await;
            }
        }
    }

    /// Remove all entries
    async fn clear(&self);

    /// Number of entries currently held
    async fn len(&self) -> usize;

    /// Check if the store is empty
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Moka expiry policy: an entry lives for its TTL plus the stale retention.
#[derive(Debug, Clone, Copy)]
struct RetainStale {
    retention: Duration,
}

impl RetainStale {
    fn lifetime<T>(&self, entry: &CacheEntry<T>) -> Duration {
        entry.metadata.ttl.saturating_add(self.retention)
    }
}

impl<T> Expiry<String, CacheEntry<T>> for RetainStale {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry<T>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(self.lifetime(value))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry<T>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(self.lifetime(value))
    }
}

/// Moka-based in-memory store
///
/// Bounded by entry count. Entries are dropped by moka's own housekeeping
/// once `ttl + stale_retention` has elapsed since they were written, which
/// keeps memory in check without a sweep task of our own.
///
/// # Examples
///
/// ```rust
/// use servercache::MokaStore;
/// use std::time::Duration;
///
/// let store: MokaStore<String> = MokaStore::new(1000, Duration::ZERO);
/// ```
#[derive(Clone)]
pub struct MokaStore<T> {
    inner: Arc<MokaFutureCache<String, CacheEntry<T>>>,
}

impl<T> MokaStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new store
    ///
    /// # Arguments
    ///
    /// * `max_capacity` - Maximum number of entries the store can hold
    /// * `stale_retention` - How long an expired entry is kept around
    pub fn new(max_capacity: u64, stale_retention: Duration) -> Self {
        let inner = MokaFutureCache::builder()
            .max_capacity(max_capacity)
            .expire_after(RetainStale {
                retention: stale_retention,
            })
            .build();

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Get the underlying moka cache
    pub fn inner(&self) -> &MokaFutureCache<String, CacheEntry<T>> {
        &self.inner
    }
}

#[async_trait]
impl<T> Store<T> for MokaStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<CacheEntry<T>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, entry: CacheEntry<T>) -> Result<()> {
        self.inner.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn remove(&self, key: &str) {
        self.inner.invalidate(key).await;
    }

    async fn remove_if_stale(&self, key: &str, observed: &EntryMetadata) {
        let observed = *observed;
        let _ = self
            .inner
            .entry_by_ref(key)
            .and_compute_with(|current| {
                let op = match current {
                    Some(entry) if entry.value().metadata == observed => Op::Remove,
                    _ => Op::Nop,
                };
                future::ready(op)
            })
            .await;
    }

    async fn clear(&self) {
        self.inner.invalidate_all();
        self.inner.run_pending_tasks().await;
    }

    async fn len(&self) -> usize {
        // entry_count is only exact once pending housekeeping has run
        self.inner.run_pending_tasks().await;
        self.inner.entry_count() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(value: &str, ttl: Duration) -> CacheEntry<String> {
        CacheEntry::new(value.to_string(), ttl)
    }

    #[tokio::test]
    async fn test_set_get_remove() {
        let store: MokaStore<String> = MokaStore::new(100, Duration::ZERO);

        store.set("k", entry("v", Duration::from_secs(60))).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().value, "v");

        store.remove("k").await;
        assert!(store.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_clear_and_len() {
        let store: MokaStore<String> = MokaStore::new(100, Duration::ZERO);

        for key in ["a", "b", "c"] {
            store.set(key, entry(key, Duration::from_secs(60))).await.unwrap();
        }
        assert_eq!(store.len().await, 3);

        store.clear().await;
        assert!(store.is_empty().await);
        assert!(store.get("a").await.is_none());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_entry() {
        let store: MokaStore<String> = MokaStore::new(100, Duration::ZERO);

        store.set("k", entry("old", Duration::from_secs(60))).await.unwrap();
        store.set("k", entry("new", Duration::from_secs(120))).await.unwrap();

        let current = store.get("k").await.unwrap();
        assert_eq!(current.value, "new");
        assert_eq!(current.metadata.ttl, Duration::from_secs(120));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_retention_keeps_expired_entry() {
        let store: MokaStore<String> = MokaStore::new(100, Duration::from_secs(60));
        let expired = CacheEntry::with_metadata(
            "stale".to_string(),
            EntryMetadata::new(Duration::from_millis(10)),
        );
        store.set("k", expired).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        // Store hands back expired entries; freshness is the caller's call
        let kept = store.get("k").await.unwrap();
        assert_eq!(kept.value, "stale");
    }

    #[tokio::test]
    async fn test_entries_dropped_after_ttl_without_retention() {
        let store: MokaStore<String> = MokaStore::new(100, Duration::ZERO);
        store.set("k", entry("v", Duration::from_millis(20))).await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(store.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_remove_if_stale_keeps_newer_entry() {
        let store: MokaStore<String> = MokaStore::new(100, Duration::ZERO);
        let old = EntryMetadata::with_time(Duration::from_secs(1_000), Duration::from_secs(60));
        store
            .set("k", CacheEntry::with_metadata("old".to_string(), old))
            .await
            .unwrap();
        store.set("k", entry("new", Duration::from_secs(60))).await.unwrap();

        store.remove_if_stale("k", &old).await;
        assert_eq!(store.get("k").await.unwrap().value, "new");

        let current = store.get("k").await.unwrap().metadata;
        store.remove_if_stale("k", &current).await;
        assert!(store.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_store_clone_shares_entries() {
        let store: MokaStore<String> = MokaStore::new(100, Duration::ZERO);
        let clone = store.clone();

        store.set("k", entry("v", Duration::from_secs(60))).await.unwrap();
        assert_eq!(clone.get("k").await.unwrap().value, "v");
    }
}
