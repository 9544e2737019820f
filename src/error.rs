//! Error types for cache and pagination operations.

use thiserror::Error;

/// Result type alias for servercache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors that can occur while populating the cache or computing pages.
///
/// The type is `Clone` because a single population outcome is handed to
/// every caller that was waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The producer supplied to `get_or_set`/`fetch` failed
    #[error("Failed to produce value: {0}")]
    Producer(String),

    /// A caller broke an input contract (e.g. a zero page size)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The backing store rejected an operation
    #[error("Store operation failed: {0}")]
    Store(String),

    /// An in-flight population ended without delivering an outcome
    #[error("Population of key `{0}` was aborted")]
    Aborted(String),

    /// Generic error for other failures
    #[error("Server cache error: {0}")]
    Other(String),
}

impl CacheError {
    /// Create a new producer error
    pub fn producer<S: Into<String>>(msg: S) -> Self {
        CacheError::Producer(msg.into())
    }

    /// Create a new invalid-argument error
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        CacheError::InvalidArgument(msg.into())
    }

    /// Create a new store error
    pub fn store<S: Into<String>>(msg: S) -> Self {
        CacheError::Store(msg.into())
    }

    /// Create a new generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        CacheError::Other(msg.into())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CacheError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        CacheError::Other(err.to_string())
    }
}

impl From<String> for CacheError {
    fn from(err: String) -> Self {
        CacheError::Other(err)
    }
}

impl From<&str> for CacheError {
    fn from(err: &str) -> Self {
        CacheError::Other(err.to_string())
    }
}

#[cfg(feature = "serde")]
impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Other(format!("Serialization error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            CacheError::producer("db down").to_string(),
            "Failed to produce value: db down"
        );
        assert_eq!(
            CacheError::invalid_argument("page size must be positive").to_string(),
            "Invalid argument: page size must be positive"
        );
        assert_eq!(
            CacheError::Aborted("messages:page:1".into()).to_string(),
            "Population of key `messages:page:1` was aborted"
        );
    }

    #[test]
    fn test_conversions() {
        let from_str: CacheError = "boom".into();
        assert_eq!(from_str, CacheError::Other("boom".into()));

        let boxed: Box<dyn std::error::Error + Send + Sync> = "io failure".into();
        let converted: CacheError = boxed.into();
        assert_eq!(converted, CacheError::other("io failure"));
    }
}
