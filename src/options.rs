//! Per-call options for `ServerCache::fetch`
//!
//! `get_or_set` covers the common case. `fetch` takes a [`FetchOptions`]
//! when a call site also wants to force a refresh, fall back to the
//! last-known-good value, or serve stale data while revalidating.

use crate::Result;
use std::future::Future;
use std::time::Duration;

/// Configuration for a single `fetch` call.
pub struct FetchOptions<F> {
    /// The cache key to read and populate
    pub key: String,

    /// Time-to-live of a freshly produced value
    pub ttl: Duration,

    /// How long after expiry a retained entry may be served while a
    /// background refresh runs
    pub stale_while_revalidate: Option<Duration>,

    /// Skip the fresh-entry check and repopulate
    pub force_fresh: bool,

    /// Serve a retained (possibly expired) entry if the producer fails
    pub fallback_to_cache: bool,

    /// Produces the value on a miss
    pub producer: F,
}

/// Builder for [`FetchOptions`]
#[derive(Debug, Clone)]
pub struct FetchOptionsBuilder {
    key: String,
    ttl: Duration,
    stale_while_revalidate: Option<Duration>,
    force_fresh: bool,
    fallback_to_cache: bool,
}

impl FetchOptionsBuilder {
    /// Default TTL when none is set: five minutes
    pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

    /// Create a new builder for `key`
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ttl: Self::DEFAULT_TTL,
            stale_while_revalidate: None,
            force_fresh: false,
            fallback_to_cache: false,
        }
    }

    /// Set the time-to-live for produced values
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the stale-while-revalidate window
    pub fn stale_while_revalidate(mut self, window: Duration) -> Self {
        self.stale_while_revalidate = Some(window);
        self
    }

    /// Set whether to bypass fresh entries
    pub fn force_fresh(mut self, force: bool) -> Self {
        self.force_fresh = force;
        self
    }

    /// Set whether to fall back to a retained entry on producer failure
    pub fn fallback_to_cache(mut self, fallback: bool) -> Self {
        self.fallback_to_cache = fallback;
        self
    }

    /// Finish the options with the producer
    pub fn producer<T, F, Fut>(self, producer: F) -> FetchOptions<F>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        FetchOptions {
            key: self.key,
            ttl: self.ttl,
            stale_while_revalidate: self.stale_while_revalidate,
            force_fresh: self.force_fresh,
            fallback_to_cache: self.fallback_to_cache,
            producer,
        }
    }
}
