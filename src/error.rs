//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use std::path::PathBuf;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for every cache operation.
#[derive(Error, Debug)]
pub enum CacheError {
    /// No live entry exists for the key (raised by incr/decr/pop)
    #[error("key {0} not found in cache")]
    KeyNotFound(String),

    /// Stored value cannot take part in an arithmetic update
    #[error("unsupported operand type for increment: '{operand}'")]
    TypeMismatch {
        /// Type name of the stored value
        operand: &'static str,
    },

    /// Integer increment left the i64 range
    #[error("integer overflow while incrementing key {0}")]
    Overflow(String),

    /// Underlying file system failure (disk store only)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Another store instance holds the directory lock
    #[error("cache directory is locked by another instance: {}", .0.display())]
    Locked(PathBuf),

    /// Configuration value could not be used
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<bincode::Error> for CacheError {
    fn from(err: bincode::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_not_found_message() {
        let err = CacheError::KeyNotFound("i:1".to_string());
        assert_eq!(err.to_string(), "key i:1 not found in cache");
    }

    #[test]
    fn test_type_mismatch_names_operand() {
        let err = CacheError::TypeMismatch { operand: "str" };
        assert!(err.to_string().contains("unsupported operand type"));
        assert!(err.to_string().contains("'str'"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err: CacheError = io.into();
        assert!(matches!(err, CacheError::Io(_)));
    }
}
