//! Process-wide cache instance.

use crate::{ServerCache, ServerCacheBuilder};
use serde_json::Value;
use std::sync::OnceLock;

static GLOBAL: OnceLock<ServerCache<Value>> = OnceLock::new();

/// The process-wide cache, created with default settings on first use.
///
/// Values are stored as JSON so one instance can hold every loader's data.
/// It lives until the process exits; a restart starts cold.
pub fn global() -> &'static ServerCache<Value> {
    GLOBAL.get_or_init(|| ServerCacheBuilder::new().build())
}
