use super::{Cached, failed, unexpected};
use crate::api::AniDB;
use crate::cache::CacheKey;
use crate::cache_key;
use crate::entities::User;
use crate::ids::Uid;
use crate::pending::{FetchResult, Pending};
use crate::protocol::{ParamMap, Reply};
use log::debug;

impl AniDB {
    pub fn uid_by_name(&self, name: &str) -> Pending<FetchResult<Uid>> {
        if name.is_empty() {
            return Pending::unresolved();
        }
        let key = name_key(name);
        let params = ParamMap::new().with("user", name);
        self.coalesce(|intents| &intents.uid, key.clone(), move |service| async move {
            let user = service.fetch_user_link::<Uid>(&key, params).await?;
            Ok(user.map(|user| user.uid))
        })
    }

    pub fn name_by_uid(&self, uid: Uid) -> Pending<FetchResult<String>> {
        if !uid.is_valid() {
            return Pending::unresolved();
        }
        let key = cache_key!["user", "by-uid", uid];
        let params = ParamMap::new().with("uid", uid);
        self.coalesce(
            |intents| &intents.username,
            key.clone(),
            move |service| async move {
                let user = service.fetch_user_link::<String>(&key, params).await?;
                Ok(user.map(|user| user.username))
            },
        )
    }

    /// Shared body of the two linkage lookups: answers from the linkage at
    /// `key` when fresh, otherwise sends USER with `params`
    ///
    /// Only the field the linkage holds is meaningful in a user built from
    /// a cached linkage.
    async fn fetch_user_link<T>(&self, key: &CacheKey, params: ParamMap) -> FetchResult<User>
    where
        T: serde::de::DeserializeOwned + IntoPartialUser,
    {
        let stale = match self.lookup_link::<T>(key, self.durations().user()).await {
            Cached::Invalid => return Ok(None),
            Cached::Fresh(value) => return Ok(Some(value.into_partial_user())),
            Cached::Stale(stale) => stale.map(IntoPartialUser::into_partial_user),
        };

        let what = format!("USER {key}");
        let reply = match self.inner.dispatcher.send("USER", params).await {
            Ok(reply) => reply,
            Err(e) => return failed(&what, e, stale),
        };
        match reply.code {
            295 => Ok(Some(self.store_user(&reply).await)),
            394 => {
                debug!("No such user: {key}");
                self.inner.cache.mark_invalid(key).await;
                Ok(None)
            }
            _ => unexpected(&what, &reply, stale),
        }
    }

    /// Caches both user linkages, and the user record unless one exists
    async fn store_user(&self, reply: &Reply) -> User {
        let mut user = User::from_fields(&reply.fields());
        self.link(&name_key(&user.username), user.uid).await;
        self.link(&cache_key!["user", "by-uid", user.uid], user.username.clone())
            .await;

        let key = cache_key!["user", user.uid];
        match self.inner.cache.get::<User>(&key).await {
            Some(existing) => existing,
            None => {
                self.inner.cache.set(&key, &mut user).await;
                user
            }
        }
    }

    /// A user record assembled from the name linkage
    pub fn user_by_id(&self, uid: Uid) -> Pending<FetchResult<User>> {
        if !uid.is_valid() {
            return Pending::unresolved();
        }
        self.coalesce(
            |intents| &intents.user,
            cache_key!["user", uid],
            move |service| async move {
                let key = cache_key!["user", uid];
                let stale = match service.lookup::<User>(&key).await {
                    Cached::Invalid => return Ok(None),
                    Cached::Fresh(user) => return Ok(Some(user)),
                    Cached::Stale(stale) => stale,
                };
                let Some(username) = service.name_by_uid(uid).await? else {
                    return Ok(stale);
                };
                let mut user = User::new(uid, username);
                service.inner.cache.set(&key, &mut user).await;
                Ok(Some(user))
            },
        )
    }

    pub fn user_by_name(&self, name: &str) -> Pending<FetchResult<User>> {
        let uid = self.uid_by_name(name);
        let service = self.clone();
        Pending::spawn(async move {
            match uid.await? {
                Some(uid) => service.user_by_id(uid).await,
                None => Ok(None),
            }
        })
    }

    /// The user the stored credentials belong to
    pub fn current_user(&self) -> Pending<FetchResult<User>> {
        let service = self.clone();
        Pending::spawn(async move { Ok(service.resolve_current_user().await) })
    }

    /// Resolves the current user, remembering it for the life of the service
    pub(crate) async fn resolve_current_user(&self) -> Option<User> {
        let credentials = self.inner.credentials.current().await?;
        if let Some(user) = self.inner.current_user.read().await.as_ref()
            && user.username.eq_ignore_ascii_case(&credentials.username)
        {
            return Some(user.clone());
        }
        let user = self
            .user_by_name(&credentials.username)
            .await
            .ok()
            .flatten()?;
        *self.inner.current_user.write().await = Some(user.clone());
        Some(user)
    }
}

/// Linkage values that can stand in for a user record
trait IntoPartialUser {
    fn into_partial_user(self) -> User;
}

impl IntoPartialUser for Uid {
    fn into_partial_user(self) -> User {
        User::new(self, "")
    }
}

impl IntoPartialUser for String {
    fn into_partial_user(self) -> User {
        User::new(Uid::default(), self)
    }
}

/// Username linkage key; AniDB usernames are case-insensitive
fn name_key(name: &str) -> CacheKey {
    cache_key!["user", "by-name", name.to_lowercase()]
}
