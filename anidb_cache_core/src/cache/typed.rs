//! Typed access to the blob store

use crate::cache::staleness::{Cacheable, is_expired};
use crate::cache::store::Store;
use crate::cache::CacheKey;
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use log::{trace, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// JSON-serializing facade over a [`Store`]
///
/// Store failures are logged and treated as misses: a cache that cannot be
/// read or written degrades to talking to the server.
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn Store>,
}

impl Cache {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Reads and decodes an entry
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        self.get_stamped(key).await.map(|(value, _)| value)
    }

    /// Reads and decodes an entry along with its last-modified time
    pub async fn get_stamped<T: DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> Option<(T, DateTime<Utc>)> {
        let blob = match self.store.get(key).await {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                trace!("Cache miss for {key}");
                return None;
            }
            Err(e) => {
                warn!("Failed to read cache entry {key}: {e}");
                return None;
            }
        };
        match serde_json::from_slice(&blob.data) {
            Ok(value) => Some((value, blob.last_modified)),
            Err(e) => {
                warn!("{}", StoreError::decode(&key.path(), e.to_string()));
                None
            }
        }
    }

    /// Stamps `value` with the current time and writes it
    pub async fn set<T: Serialize + Cacheable>(&self, key: &CacheKey, value: &mut T) {
        value.touch(Utc::now());
        self.put(key, value).await;
    }

    /// Writes `value` as is, keeping whatever stamp it carries
    pub async fn put<T: Serialize>(&self, key: &CacheKey, value: &T) {
        let data = match serde_json::to_vec(value) {
            Ok(data) => data,
            Err(e) => {
                warn!("{}", StoreError::encode(&key.path(), e));
                return;
            }
        };
        match self.store.set(key, data).await {
            Ok(_) => trace!("Cached {key}"),
            Err(e) => warn!("Failed to write cache entry {key}: {e}"),
        }
    }

    pub async fn delete(&self, key: &CacheKey) {
        if let Err(e) = self.store.delete(key).await {
            warn!("Failed to delete cache entry {key}: {e}");
        }
    }

    pub async fn delete_all(&self, prefix: &CacheKey) {
        if let Err(e) = self.store.delete_all(prefix).await {
            warn!("Failed to delete cache namespace {prefix}: {e}");
        }
    }

    pub async fn stat(&self, key: &CacheKey) -> Option<DateTime<Utc>> {
        match self.store.stat(key).await {
            Ok(stamp) => stamp,
            Err(e) => {
                warn!("Failed to stat cache entry {key}: {e}");
                None
            }
        }
    }

    pub async fn touch(&self, key: &CacheKey) {
        if let Err(e) = self.store.touch(key).await {
            warn!("Failed to touch cache entry {key}: {e}");
        }
    }

    /// True unless a live invalid marker exists for `key`
    ///
    /// A marker older than `max_age` is deleted.
    pub async fn is_valid(&self, key: &CacheKey, max_age: Duration) -> bool {
        let marker = key.invalid_marker();
        match self.stat(&marker).await {
            None => true,
            Some(stamp) if is_expired(stamp, max_age, Utc::now()) => {
                trace!("Invalid marker for {key} expired");
                self.delete(&marker).await;
                true
            }
            Some(_) => false,
        }
    }

    /// Deletes `key` and marks it invalid as of now
    pub async fn mark_invalid(&self, key: &CacheKey) {
        self.mark_invalid_at(key, Utc::now()).await;
    }

    /// Deletes `key` and marks it invalid as of `when`
    pub async fn mark_invalid_at(&self, key: &CacheKey, when: DateTime<Utc>) {
        self.delete(key).await;
        if let Err(e) = self.store.touch_at(&key.invalid_marker(), when).await {
            warn!("Failed to mark {key} invalid: {e}");
        }
    }
}
