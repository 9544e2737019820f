//! The request-scoped server cache
//!
//! [`ServerCache`] memoizes producer results per key for a TTL window and
//! guarantees that at most one producer per key runs at a time. Concurrent
//! callers for a key that is being populated wait for the running producer
//! and receive its outcome, success or failure.

use crate::metadata::current_time;
use crate::{
    CacheEntry, CacheError, CacheStats, FetchOptions, FetchOptionsBuilder, MokaStore, Result,
    Store,
};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Outcome slot shared between a running population and its waiters.
/// `None` until the producer finishes.
type Outcome<T> = Option<Result<T>>;

/// Builder for [`ServerCache`] backed by a [`MokaStore`].
#[derive(Debug, Clone)]
pub struct ServerCacheBuilder {
    max_capacity: u64,
    stale_retention: Duration,
}

impl Default for ServerCacheBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerCacheBuilder {
    /// Entry bound used when none is configured
    pub const DEFAULT_MAX_CAPACITY: u64 = 10_000;

    /// Create a builder with default settings
    pub fn new() -> Self {
        Self {
            max_capacity: Self::DEFAULT_MAX_CAPACITY,
            stale_retention: Duration::ZERO,
        }
    }

    /// Maximum number of entries held at once
    pub fn max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// How long expired entries stay available to the fallback and
    /// stale-while-revalidate policies
    pub fn stale_retention(mut self, retention: Duration) -> Self {
        self.stale_retention = retention;
        self
    }

    /// Build the cache
    pub fn build<T>(self) -> ServerCache<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        ServerCache::with_store(
            MokaStore::new(self.max_capacity, self.stale_retention),
            self.stale_retention,
        )
    }
}

/// TTL cache with single-flight population.
///
/// Cloning is cheap and clones share all state.
///
/// # Examples
///
/// ```rust
/// use servercache::ServerCache;
/// use std::time::Duration;
///
/// # async fn example() -> servercache::Result<()> {
/// let cache: ServerCache<Vec<String>> = ServerCache::new(1000);
///
/// let rows = cache
///     .get_or_set(
///         "messages:page:1",
///         || async { Ok(vec!["hello".to_string()]) },
///         Duration::from_secs(300),
///     )
///     .await?;
/// assert_eq!(rows.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct ServerCache<T, S = MokaStore<T>> {
    inner: Arc<Inner<T, S>>,
}

impl<T, S> Clone for ServerCache<T, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T, S> {
    store: S,
    stale_retention: Duration,
    in_flight: Mutex<HashMap<String, watch::Receiver<Outcome<T>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<T> ServerCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a cache holding at most `max_capacity` entries, with no
    /// stale retention
    pub fn new(max_capacity: u64) -> Self {
        ServerCacheBuilder::new().max_capacity(max_capacity).build()
    }
}

impl<T, S> ServerCache<T, S>
where
    T: Clone + Send + Sync + 'static,
    S: Store<T> + 'static,
{
    /// Wrap a custom store.
    ///
    /// `stale_retention` should match how long the store keeps expired
    /// entries; expired entries older than that are evicted on access.
    pub fn with_store(store: S, stale_retention: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                stale_retention,
                in_flight: Mutex::new(HashMap::new()),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
        }
    }

    /// The backing store
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// Return the value for `key` if a fresh entry exists.
    pub async fn get(&self, key: &str) -> Option<T> {
        let now = current_time();
        match self.inner.lookup(key, now).await {
            Some(entry) if !entry.is_expired(now) => {
                self.inner.record_hit();
                Some(entry.value)
            }
            _ => {
                self.inner.record_miss();
                None
            }
        }
    }

    /// Store `value` under `key`, valid for `ttl` from now.
    ///
    /// Replaces any existing entry. A zero TTL stores nothing.
    pub async fn set(&self, key: &str, value: T, ttl: Duration) -> Result<()> {
        if ttl.is_zero() {
            return Ok(());
        }
        self.inner.store.set(key, CacheEntry::new(value, ttl)).await
    }

    /// Return the fresh value for `key`, or run `producer` and cache its
    /// result for `ttl`.
    ///
    /// A producer error is returned to every caller waiting on that
    /// population and nothing is cached, so the next call runs the
    /// producer again.
    pub async fn get_or_set<F, Fut>(&self, key: &str, producer: F, ttl: Duration) -> Result<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.fetch(FetchOptionsBuilder::new(key).ttl(ttl).producer(producer))
            .await
    }

    /// `get_or_set` with per-call policies, see [`FetchOptions`].
    pub async fn fetch<F, Fut>(&self, options: FetchOptions<F>) -> Result<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let FetchOptions {
            key,
            ttl,
            stale_while_revalidate,
            force_fresh,
            fallback_to_cache,
            producer,
        } = options;

        if !force_fresh {
            let now = current_time();
            if let Some(entry) = self.inner.lookup(&key, now).await {
                if !entry.is_expired(now) {
                    self.inner.record_hit();
                    return Ok(entry.value);
                }

                if let Some(window) = stale_while_revalidate {
                    if entry.metadata.is_within(now, window) {
                        self.inner.record_hit();
                        debug!(key = %key, "serving stale entry while revalidating");
                        self.refresh_in_background(key.as_str(), producer, ttl);
                        return Ok(entry.value);
                    }
                }
            }
        }

        self.inner.record_miss();
        debug!(key = %key, "cache miss");

        match self.populate(&key, producer, ttl, force_fresh).await {
            Ok(value) => Ok(value),
            Err(err) if fallback_to_cache => {
                match self.inner.lookup(&key, current_time()).await {
                    Some(entry) => {
                        warn!(
                            key = %key,
                            error = %err,
                            "producer failed, serving last known value"
                        );
                        Ok(entry.value)
                    }
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Repopulate `key` on a detached task.
    ///
    /// Goes through the same single-flight path as `get_or_set`, so a
    /// population already running for the key is joined instead of
    /// duplicated. Failures are logged and dropped.
    pub fn refresh_in_background<F, Fut>(
        &self,
        key: impl Into<String>,
        producer: F,
        ttl: Duration,
    ) -> JoinHandle<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let cache = self.clone();
        let key = key.into();
        tokio::spawn(async move {
            if let Err(err) = cache.populate(&key, producer, ttl, true).await {
                warn!(key = %key, error = %err, "background refresh failed");
            }
        })
    }

    /// Remove `key` regardless of expiry.
    pub async fn invalidate(&self, key: &str) {
        self.inner.store.remove(key).await;
    }

    /// Remove every entry. Counters are kept.
    pub async fn clear(&self) {
        self.inner.store.clear().await;
    }

    /// Snapshot of the diagnostic counters.
    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            keys: self.inner.store.len().await,
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            in_flight: self.inner.lock_in_flight().len(),
        }
    }

    /// Join the population running for `key`, or start one.
    async fn populate<F, Fut>(
        &self,
        key: &str,
        producer: F,
        ttl: Duration,
        force: bool,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let mut outcome = {
            let mut in_flight = self.inner.lock_in_flight();
            match in_flight.entry(key.to_string()) {
                Entry::Occupied(running) => {
                    debug!(key = %key, "joining in-flight population");
                    running.get().clone()
                }
                Entry::Vacant(slot) => {
                    let (tx, rx) = watch::channel(None);
                    slot.insert(rx.clone());
                    self.spawn_population(key.to_string(), producer, ttl, force, tx);
                    rx
                }
            }
        };

        let settled = outcome
            .wait_for(Option::is_some)
            .await
            .map(|settled| settled.clone());

        match settled {
            Ok(Some(result)) => result,
            // Sender dropped without an outcome: the producer task panicked
            _ => Err(CacheError::Aborted(key.to_string())),
        }
    }

    fn spawn_population<F, Fut>(
        &self,
        key: String,
        producer: F,
        ttl: Duration,
        force: bool,
        tx: watch::Sender<Outcome<T>>,
    ) where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let registration = InFlight {
                inner: &inner,
                key: &key,
            };
            let result = inner.produce(&key, producer, ttl, force).await;
            drop(registration);
            tx.send_replace(Some(result));
        });
    }
}

impl<T, S> Inner<T, S>
where
    T: Clone + Send + Sync + 'static,
    S: Store<T>,
{
    /// Entry for `key` if it is fresh or still within stale retention.
    /// Anything older is evicted.
    async fn lookup(&self, key: &str, now: Duration) -> Option<CacheEntry<T>> {
        let entry = self.store.get(key).await?;
        if entry.metadata.is_within(now, self.stale_retention) {
            Some(entry)
        } else {
            self.store.remove_if_stale(key, &entry.metadata).await;
            None
        }
    }

    async fn produce<F, Fut>(
        &self,
        key: &str,
        producer: F,
        ttl: Duration,
        force: bool,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        // A population that finished just before this one registered
        // already left a fresh entry. The caller's miss still stands.
        if !force {
            if let Some(entry) = self.store.get(key).await {
                if !entry.is_expired(current_time()) {
                    return Ok(entry.value);
                }
            }
        }

        debug!(key = %key, "running producer");
        let value = match producer().await {
            Ok(value) => value,
            Err(err) => {
                debug!(key = %key, error = %err, "producer failed, nothing cached");
                return Err(err);
            }
        };

        if !ttl.is_zero() {
            if let Err(err) = self.store.set(key, CacheEntry::new(value.clone(), ttl)).await {
                // The fresh value is still good to return
                warn!(key = %key, error = %err, "failed to store produced value");
            }
        }

        Ok(value)
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<String, watch::Receiver<Outcome<T>>>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }
}

/// Registration of a running population; removed from the in-flight
/// table on drop, including when the producer panics.
struct InFlight<'a, T, S> {
    inner: &'a Inner<T, S>,
    key: &'a str,
}

impl<T, S> Drop for InFlight<'_, T, S> {
    fn drop(&mut self) {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(self.key);
    }
}
