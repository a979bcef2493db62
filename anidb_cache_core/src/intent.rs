//! Single-flight request coalescing
//!
//! An [`IntentMap`] tracks, per cache key, the observers waiting for one
//! shared result. The first registrant for a key owns the fetch; everyone
//! arriving before the result is delivered joins the same entry.
//!
//! Locking: a directory mutex guards the key-to-entry map and an async mutex
//! guards each entry's observer list. Entry locks are always taken before the
//! directory lock, except for the non-blocking `try_lock` in [`IntentMap::register`].
//! Entries leave the directory only while their lock is held, so a
//! registrant either joins a delivery or starts a fresh cycle.

use crate::cache::CacheKey;
use crate::pending::Observer;
use log::{trace, warn};
use std::collections::HashMap;
use std::sync::{Arc, MutexGuard, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};

struct IntentEntry<V> {
    observers: Vec<Observer<V>>,
}

impl<V: Clone> IntentEntry<V> {
    fn notify(&self, value: &V) {
        for observer in &self.observers {
            // A dropped receiver only means that caller lost interest
            let _ = observer.send(value.clone());
        }
    }
}

type Entry<V> = Arc<Mutex<IntentEntry<V>>>;
type Directory<V> = Arc<std::sync::Mutex<HashMap<String, Entry<V>>>>;

fn lock_directory<V>(directory: &Directory<V>) -> MutexGuard<'_, HashMap<String, Entry<V>>> {
    directory.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes `key` from the directory if it still maps to `entry`
fn retire<V>(directory: &Directory<V>, key: &str, entry: &Entry<V>) {
    let mut dir = lock_directory(directory);
    if dir.get(key).is_some_and(|current| Arc::ptr_eq(current, entry)) {
        dir.remove(key);
    }
}

/// Observers awaiting one shared result per key
pub struct IntentMap<V> {
    directory: Directory<V>,
}

impl<V> Default for IntentMap<V> {
    fn default() -> Self {
        Self {
            directory: Arc::new(std::sync::Mutex::new(HashMap::new())),
        }
    }
}

impl<V: Clone + Send + 'static> IntentMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `observer` for `key`
    ///
    /// Returns `true` when another registrant is already pending and will
    /// deliver the result, `false` when the caller is first and owns the fetch.
    pub async fn register(&self, key: &CacheKey, observer: Observer<V>) -> bool {
        let path = key.path();
        loop {
            let busy = {
                let mut dir = lock_directory(&self.directory);
                match dir.get(&path) {
                    None => {
                        let entry = IntentEntry {
                            observers: vec![observer],
                        };
                        dir.insert(path, Arc::new(Mutex::new(entry)));
                        return false;
                    }
                    Some(entry) => match entry.try_lock() {
                        Ok(mut guard) => {
                            guard.observers.push(observer);
                            return true;
                        }
                        Err(_) => entry.clone(),
                    },
                }
            };

            // The entry is being resolved or held manually; wait for it
            let mut guard = busy.lock().await;
            let current = lock_directory(&self.directory)
                .get(&path)
                .is_some_and(|entry| Arc::ptr_eq(entry, &busy));
            if current {
                guard.observers.push(observer);
                return true;
            }
            trace!("Intent for {path} retired while waiting, starting a new cycle");
        }
    }

    async fn lock_current(&self, key: &CacheKey) -> Option<(String, Entry<V>, OwnedMutexGuard<IntentEntry<V>>)> {
        let path = key.path();
        loop {
            let entry = lock_directory(&self.directory).get(&path).cloned()?;
            let guard = entry.clone().lock_owned().await;
            let current = lock_directory(&self.directory)
                .get(&path)
                .is_some_and(|current| Arc::ptr_eq(current, &entry));
            if current {
                return Some((path, entry, guard));
            }
        }
    }

    /// Delivers `value` to every observer of `key`, then retires the entry
    pub async fn resolve_and_retire(&self, key: &CacheKey, value: V) {
        let Some((path, entry, mut guard)) = self.lock_current(key).await else {
            warn!("Resolving {key} with no pending intent");
            return;
        };
        guard.notify(&value);
        guard.observers.clear();
        retire(&self.directory, &path, &entry);
    }

    /// Delivers `value` to every observer of `key`, keeping the entry
    pub async fn resolve_no_retire(&self, key: &CacheKey, value: V) {
        match self.lock_current(key).await {
            Some((_, _, guard)) => guard.notify(&value),
            None => warn!("Notifying {key} with no pending intent"),
        }
    }

    /// Closes every observer of `key` without a value and retires the entry
    pub async fn close_only(&self, key: &CacheKey) {
        let Some((path, entry, mut guard)) = self.lock_current(key).await else {
            warn!("Closing {key} with no pending intent");
            return;
        };
        guard.observers.clear();
        retire(&self.directory, &path, &entry);
    }

    /// Takes exclusive hold of the live entry for `key`
    ///
    /// Registrants arriving while the handle is held wait for it and then
    /// start a new cycle. Dropping the handle closes and retires the entry.
    pub async fn lock_for_manual_resolution(&self, key: &CacheKey) -> Option<IntentHandle<V>> {
        let (path, _, guard) = self.lock_current(key).await?;
        Some(IntentHandle {
            path,
            directory: self.directory.clone(),
            guard,
        })
    }

    /// True if an intent is live for `key`
    pub fn is_pending(&self, key: &CacheKey) -> bool {
        lock_directory(&self.directory).contains_key(&key.path())
    }

    /// Number of live intents
    pub fn len(&self) -> usize {
        lock_directory(&self.directory).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive hold on one live intent, for several sequential deliveries
pub struct IntentHandle<V> {
    path: String,
    directory: Directory<V>,
    guard: OwnedMutexGuard<IntentEntry<V>>,
}

impl<V: Clone> IntentHandle<V> {
    /// Delivers `value` to every observer, keeping them registered
    pub fn notify(&self, value: V) {
        self.guard.notify(&value);
    }

    /// Closes every observer and retires the entry
    pub fn free(self) {}
}

impl<V> Drop for IntentHandle<V> {
    fn drop(&mut self) {
        self.guard.observers.clear();
        // Retire before the entry lock is released
        let entry = OwnedMutexGuard::mutex(&self.guard).clone();
        retire(&self.directory, &self.path, &entry);
    }
}
