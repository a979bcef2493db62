//! Process-local store

use crate::cache::store::{Store, StoredBlob};
use crate::cache::CacheKey;
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Memory-based store; contents vanish with the process
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<CacheKey, StoredBlob>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Stores a blob with an explicit last-modified time
    pub async fn insert_with_time(&self, key: &CacheKey, data: Vec<u8>, when: DateTime<Utc>) {
        self.entries.write().await.insert(
            key.clone(),
            StoredBlob {
                data,
                last_modified: when,
            },
        );
    }

    /// All stored keys, sorted
    pub async fn keys(&self) -> Vec<CacheKey> {
        let mut keys: Vec<CacheKey> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<StoredBlob>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &CacheKey, data: Vec<u8>) -> Result<DateTime<Utc>, StoreError> {
        let now = Utc::now();
        self.insert_with_time(key, data, now).await;
        Ok(now)
    }

    async fn delete(&self, key: &CacheKey) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn delete_all(&self, prefix: &CacheKey) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .retain(|key, _| !prefix.is_prefix_of(key));
        Ok(())
    }

    async fn stat(&self, key: &CacheKey) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self
            .entries
            .read()
            .await
            .get(key)
            .map(|blob| blob.last_modified))
    }

    async fn touch_at(&self, key: &CacheKey, when: DateTime<Utc>) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .entry(key.clone())
            .and_modify(|blob| blob.last_modified = when)
            .or_insert_with(|| StoredBlob {
                data: Vec::new(),
                last_modified: when,
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_key;

    #[tokio::test]
    async fn test_touch_keeps_data() {
        let store = MemoryStore::new();
        let key = cache_key!["aid", 1];
        store.set(&key, vec![1, 2, 3]).await.unwrap();

        let earlier = Utc::now() - chrono::Duration::days(3);
        store.touch_at(&key, earlier).await.unwrap();

        let blob = store.get(&key).await.unwrap().unwrap();
        assert_eq!(blob.data, vec![1, 2, 3]);
        assert_eq!(blob.last_modified, earlier);
    }

    #[tokio::test]
    async fn test_delete_all_matches_whole_tokens() {
        let store = MemoryStore::new();
        store.set(&cache_key!["fid", 1], vec![]).await.unwrap();
        store.set(&cache_key!["fidx", 1], vec![]).await.unwrap();
        store.set(&cache_key!["fid"], vec![]).await.unwrap();

        store.delete_all(&cache_key!["fid"]).await.unwrap();
        assert_eq!(store.keys().await, vec![cache_key!["fidx", 1]]);
    }
}
