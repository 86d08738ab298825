//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Cache is full and the eviction policy freed no slot
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// A value could not be encoded or a snapshot could not be decoded
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Snapshot file could not be created, removed or read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Insert-if-absent found the key already present
    #[error("Key already exists: {0}")]
    KeyAlreadyExists(String),

    /// Replace found no live entry for the key
    #[error("Key not found: {0}")]
    NotFound(String),

    /// The cache has been closed and released its store
    #[error("Cache is closed")]
    Closed,

    /// Configuration could not be applied
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Encoding(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: CacheError = io.into();
        assert!(matches!(err, CacheError::Io(_)));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_json_error_is_encoding_error() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: CacheError = json_err.into();
        assert!(matches!(err, CacheError::Encoding(_)));
    }
}
