#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # servercache
//!
//! Server-side building blocks for page loaders that sit in front of a
//! hosted database: a TTL cache with single-flight population and a
//! page-number pagination calculator.
//!
//! ## Features
//!
//! - `serde` (default): JSON serialization of [`Pagination`] and
//!   [`CacheStats`], plus the process-wide [`global`] cache
//!
//! ## Quick Start
//!
//! ```rust
//! use servercache::{keys, paginate, parse_page, ServerCache};
//! use std::time::Duration;
//!
//! const MESSAGES_PER_PAGE: u64 = 10;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache: ServerCache<(Vec<String>, u64)> = ServerCache::new(1000);
//!
//!     let requested = parse_page(Some("2"));
//!     let page = paginate(25, MESSAGES_PER_PAGE, requested)?;
//!
//!     let (rows, total) = cache
//!         .get_or_set(
//!             &keys::index_messages(page.current_page),
//!             move || async move {
//!                 // This would be a filtered, sorted, ranged database query
//!                 let rows: Vec<String> =
//!                     page.range().map(|row| format!("message {row}")).collect();
//!                 Ok((rows, 25))
//!             },
//!             Duration::from_secs(300),
//!         )
//!         .await?;
//!
//!     assert_eq!(rows.len(), 10);
//!     assert_eq!(paginate(total, MESSAGES_PER_PAGE, requested)?.total_pages, 3);
//!     Ok(())
//! }
//! ```

pub mod error;
#[cfg(feature = "serde")]
pub mod global;
pub mod keys;
pub mod metadata;
pub mod options;
pub mod pagination;
pub mod server_cache;
pub mod stats;
pub mod store;

pub use error::{CacheError, Result};
#[cfg(feature = "serde")]
pub use global::global;
pub use metadata::{CacheEntry, EntryMetadata};
pub use options::{FetchOptions, FetchOptionsBuilder};
pub use pagination::{Pagination, paginate, parse_page};
pub use server_cache::{ServerCache, ServerCacheBuilder};
pub use stats::CacheStats;
pub use store::{MokaStore, Store};
