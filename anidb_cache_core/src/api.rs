//! The caller-facing service
//!
//! [`AniDB`] owns the cache, one intent map per entity kind and the handle
//! to the dispatch worker. Cloning it is cheap and shares all of them.
//!
//! Fetch operations return a [`Pending`] right away; the work runs on a
//! background task that keeps going when the caller drops its future, so
//! other waiters and the cache still get the result.

use crate::cache::{Cache, CacheDurations, CacheKey, Store};
use crate::cache_key;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::entities::{Anime, Episode, File, Group, MyListAnime, MyListEntry, MyListStats, User};
use crate::error::{FetchError, Result};
use crate::ids::{Aid, Eid, Fid, Gid, Lid, Uid};
use crate::intent::IntentMap;
use crate::pending::{FetchResult, MutationResult, Pending, Settle};
use crate::protocol::{ApiTransport, DocumentSource};
use crate::security::{CredentialProvider, Credentials, SecureString};
use futures::FutureExt;
use log::{debug, error};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// One intent map per kind of delivered value
#[derive(Default)]
pub(crate) struct Intents {
    pub(crate) anime: IntentMap<FetchResult<Anime>>,
    pub(crate) episode: IntentMap<FetchResult<Episode>>,
    pub(crate) file: IntentMap<FetchResult<File>>,
    pub(crate) fid: IntentMap<FetchResult<Fid>>,
    pub(crate) fid_list: IntentMap<Fid>,
    pub(crate) group: IntentMap<FetchResult<Group>>,
    pub(crate) gid: IntentMap<FetchResult<Gid>>,
    pub(crate) uid: IntentMap<FetchResult<Uid>>,
    pub(crate) username: IntentMap<FetchResult<String>>,
    pub(crate) user: IntentMap<FetchResult<User>>,
    pub(crate) mylist: IntentMap<FetchResult<MyListEntry>>,
    pub(crate) mylist_anime: IntentMap<FetchResult<MyListAnime>>,
    pub(crate) stats: IntentMap<FetchResult<MyListStats>>,
    pub(crate) lid: IntentMap<FetchResult<Lid>>,
    pub(crate) mutation: IntentMap<MutationResult>,
}

impl Intents {
    fn len(&self) -> usize {
        self.anime.len()
            + self.episode.len()
            + self.file.len()
            + self.fid.len()
            + self.fid_list.len()
            + self.group.len()
            + self.gid.len()
            + self.uid.len()
            + self.username.len()
            + self.user.len()
            + self.mylist.len()
            + self.mylist_anime.len()
            + self.stats.len()
            + self.lid.len()
            + self.mutation.len()
    }
}

/// Picks the intent map for one kind out of [`Intents`]
pub(crate) type Select<V> = fn(&Intents) -> &IntentMap<V>;

pub(crate) struct Inner {
    pub(crate) cache: Cache,
    pub(crate) durations: CacheDurations,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) documents: Arc<dyn DocumentSource>,
    pub(crate) credentials: Arc<dyn CredentialProvider>,
    pub(crate) fetch_timeout: Duration,
    pub(crate) intents: Intents,
    pub(crate) current_user: RwLock<Option<User>>,
}

/// Coalescing, caching AniDB client
#[derive(Clone)]
pub struct AniDB {
    pub(crate) inner: Arc<Inner>,
}

impl AniDB {
    /// Creates the service and spawns its dispatch worker
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        transport: Arc<dyn ApiTransport>,
        documents: Arc<dyn DocumentSource>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        let cache = Cache::new(store);
        let dispatcher = Dispatcher::spawn(
            &config.dispatch,
            transport,
            cache.clone(),
            credentials.clone(),
        );
        debug!(
            "AniDB service ready (server {}:{}, cache {})",
            config.dispatch.server,
            config.dispatch.port,
            config.cache.dir.display()
        );

        Self {
            inner: Arc::new(Inner {
                cache,
                durations: config.cache.durations.clone(),
                dispatcher,
                documents,
                credentials,
                fetch_timeout: config.fetch_timeout(),
                intents: Intents::default(),
                current_user: RwLock::new(None),
            }),
        }
    }

    pub fn cache(&self) -> &Cache {
        &self.inner.cache
    }

    pub(crate) fn durations(&self) -> &CacheDurations {
        &self.inner.durations
    }

    /// Stores new credentials and logs in with them
    ///
    /// A refused login (500) clears the stored credentials again. `udp_key` is
    /// stored with the credentials for the provider to persist; sessions are
    /// never encrypted.
    pub async fn auth(
        &self,
        username: &str,
        password: &str,
        udp_key: Option<&str>,
    ) -> Result<()> {
        let mut credentials = Credentials::new(username, SecureString::new(password));
        if let Some(key) = udp_key {
            credentials = credentials.with_udp_key(SecureString::new(key));
        }
        self.inner.credentials.set(credentials).await;
        *self.inner.current_user.write().await = None;
        self.inner.dispatcher.authenticate().await?;
        Ok(())
    }

    /// Ends the session; stored credentials are kept for the next request
    pub async fn logout(&self) -> Result<()> {
        self.inner.dispatcher.logout().await?;
        Ok(())
    }

    /// True while the ban cooldown is running
    pub async fn is_banned(&self) -> bool {
        self.inner.dispatcher.is_banned().await
    }

    /// Number of fetches currently in flight
    pub fn pending_intents(&self) -> usize {
        self.inner.intents.len()
    }

    pub async fn cached_anime(&self, aid: Aid) -> Option<Anime> {
        self.inner.cache.get(&cache_key!["aid", aid]).await
    }

    pub async fn cached_episode(&self, eid: Eid) -> Option<Episode> {
        self.inner.cache.get(&cache_key!["eid", eid]).await
    }

    pub async fn cached_file(&self, fid: Fid) -> Option<File> {
        self.inner.cache.get(&cache_key!["fid", fid]).await
    }

    pub async fn cached_group(&self, gid: Gid) -> Option<Group> {
        self.inner.cache.get(&cache_key!["gid", gid]).await
    }

    /// Runs `fetch` for `key` unless a fetch for it is already in flight
    ///
    /// Every caller gets its own [`Pending`]; the first one's background task
    /// fetches and delivers to all of them. A panic inside `fetch` is
    /// delivered as [`FetchError::Aborted`].
    pub(crate) fn coalesce<T, F, Fut>(
        &self,
        select: Select<std::result::Result<T, FetchError>>,
        key: CacheKey,
        fetch: F,
    ) -> Pending<std::result::Result<T, FetchError>>
    where
        T: Clone + Send + 'static,
        std::result::Result<T, FetchError>: Settle,
        F: FnOnce(AniDB) -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<T, FetchError>> + Send + 'static,
    {
        let (observer, pending) = Pending::channel();
        let service = self.clone();
        tokio::spawn(async move {
            if select(&service.inner.intents).register(&key, observer).await {
                return;
            }
            let result = match AssertUnwindSafe(fetch(service.clone()))
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!("Fetch of {key} panicked: {message}");
                    Err(FetchError::aborted(message))
                }
            };
            select(&service.inner.intents)
                .resolve_and_retire(&key, result)
                .await;
        });
        pending
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "fetch task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let panic: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(panic.as_ref()), "boom");
        let panic: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(panic.as_ref()), "bang");
        let panic: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(panic.as_ref()), "fetch task panicked");
    }
}
