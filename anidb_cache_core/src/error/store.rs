//! Persistent store error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by [`Store`](crate::cache::Store) implementations and the typed cache
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem failure on a cache path
    #[error("Cache I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An entity could not be serialized
    #[error("Failed to encode cache entry '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A stored blob could not be decoded
    #[error("Failed to decode cache entry '{key}': {message}")]
    Decode { key: String, message: String },
}

impl StoreError {
    /// Create an I/O error for a cache path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an encode error
    pub fn encode(key: &str, source: serde_json::Error) -> Self {
        Self::Encode {
            key: key.to_string(),
            source,
        }
    }

    /// Create a decode error
    pub fn decode(key: &str, message: impl Into<String>) -> Self {
        Self::Decode {
            key: key.to_string(),
            message: message.into(),
        }
    }
}
