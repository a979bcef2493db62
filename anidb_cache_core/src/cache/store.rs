//! The blob store seam

use crate::cache::CacheKey;
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A stored blob and the time it was last written or touched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub data: Vec<u8>,
    pub last_modified: DateTime<Utc>,
}

/// Persistent key-value store for cache blobs
///
/// Writes to one key are atomic: readers see either the old or the new blob.
/// Implementations must tolerate concurrent access to independent keys.
#[async_trait]
pub trait Store: Send + Sync {
    /// Reads a blob; `None` when absent
    async fn get(&self, key: &CacheKey) -> Result<Option<StoredBlob>, StoreError>;

    /// Writes a blob and returns its new last-modified time
    async fn set(&self, key: &CacheKey, data: Vec<u8>) -> Result<DateTime<Utc>, StoreError>;

    /// Removes a blob; absent keys are not an error
    async fn delete(&self, key: &CacheKey) -> Result<(), StoreError>;

    /// Removes `prefix` and every key below it
    async fn delete_all(&self, prefix: &CacheKey) -> Result<(), StoreError>;

    /// Last-modified time of a blob, `None` when absent
    async fn stat(&self, key: &CacheKey) -> Result<Option<DateTime<Utc>>, StoreError>;

    /// Sets the last-modified time, creating an empty blob when absent
    async fn touch_at(&self, key: &CacheKey, when: DateTime<Utc>) -> Result<(), StoreError>;

    /// Sets the last-modified time to now, creating an empty blob when absent
    async fn touch(&self, key: &CacheKey) -> Result<(), StoreError> {
        self.touch_at(key, Utc::now()).await
    }
}
