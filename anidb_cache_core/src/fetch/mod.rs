//! Per-kind entity fetchers
//!
//! Each fetcher follows the same shape: validate the input, coalesce on the
//! entity's cache key, honour the invalid marker, serve a fresh cached copy,
//! and only then go to the server. A failed remote lookup falls back to the
//! stale cached copy; a "does not exist" reply writes the invalid marker.

mod anime;
mod episode;
mod file;
mod group;
mod mylist;
mod mylist_anime;
mod mylist_manip;
mod stats;
mod user;

use crate::api::AniDB;
use crate::cache::{CacheKey, Link, Staleness};
use crate::error::{FetchError, ProtocolError};
use crate::pending::{FetchResult, MutationResult};
use crate::protocol::Reply;
use log::{trace, warn};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// What the cache holds for a key
pub(crate) enum Cached<T> {
    /// A live invalid marker: the server said the key does not exist
    Invalid,
    Fresh(T),
    /// Missing or stale; a stale copy is kept as fallback
    Stale(Option<T>),
}

impl AniDB {
    /// Checks the invalid marker, then the cached entity's freshness
    pub(crate) async fn lookup<T>(&self, key: &CacheKey) -> Cached<T>
    where
        T: DeserializeOwned + Staleness,
    {
        let cache = &self.inner.cache;
        if !cache.is_valid(key, self.durations().invalid()).await {
            trace!("{key} is marked invalid");
            return Cached::Invalid;
        }
        match cache.get::<T>(key).await {
            Some(value) if !value.is_stale(self.durations()) => {
                trace!("Fresh cache hit for {key}");
                Cached::Fresh(value)
            }
            stale => Cached::Stale(stale),
        }
    }

    /// Like [`AniDB::lookup`] for a linkage record fresh for `max_age`
    pub(crate) async fn lookup_link<T>(&self, key: &CacheKey, max_age: Duration) -> Cached<T>
    where
        T: DeserializeOwned,
    {
        let cache = &self.inner.cache;
        if !cache.is_valid(key, self.durations().invalid()).await {
            trace!("{key} is marked invalid");
            return Cached::Invalid;
        }
        match cache.get::<Link<T>>(key).await {
            Some(link) if link.is_fresh(max_age) => Cached::Fresh(link.value),
            stale => Cached::Stale(stale.map(|link| link.value)),
        }
    }

    /// Writes a linkage record stamped now
    pub(crate) async fn link<T: serde::Serialize>(&self, key: &CacheKey, value: T) {
        self.inner.cache.set(key, &mut Link::new(value)).await;
    }
}

/// Outcome of a request that did not produce a usable reply
///
/// A rejected client is fatal; anything else yields `fallback`.
pub(crate) fn failed<T>(what: &str, error: ProtocolError, fallback: Option<T>) -> FetchResult<T> {
    match error {
        ProtocolError::ClientRejected { code, message } => Err(FetchError::fatal(code, message)),
        error => {
            warn!("{what} failed: {error}");
            Ok(fallback)
        }
    }
}

/// Like [`failed`] for a list mutation, which has nothing to fall back to
pub(crate) fn mutation_failed(what: &str, error: ProtocolError) -> MutationResult {
    failed::<bool>(what, error, None).map(|_| false)
}

/// Outcome of a reply with a code the fetcher has no use for
pub(crate) fn unexpected<T>(what: &str, reply: &Reply, fallback: Option<T>) -> FetchResult<T> {
    warn!("{what}: unexpected reply {} {}", reply.code, reply.text);
    Ok(fallback)
}
