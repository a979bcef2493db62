use super::{Cached, failed, unexpected};
use crate::api::AniDB;
use crate::cache_key;
use crate::entities::Group;
use crate::ids::Gid;
use crate::pending::{FetchResult, Pending};
use crate::protocol::ParamMap;
use log::{debug, warn};

impl AniDB {
    pub fn group_by_id(&self, gid: Gid) -> Pending<FetchResult<Group>> {
        if !gid.is_valid() {
            return Pending::unresolved();
        }
        self.coalesce(
            |intents| &intents.group,
            cache_key!["gid", gid],
            move |service| async move { service.fetch_group(gid).await },
        )
    }

    async fn fetch_group(&self, gid: Gid) -> FetchResult<Group> {
        let key = cache_key!["gid", gid];
        let stale = match self.lookup::<Group>(&key).await {
            Cached::Invalid => return Ok(None),
            Cached::Fresh(group) => return Ok(Some(group)),
            Cached::Stale(stale) => stale,
        };

        let what = format!("GROUP {gid}");
        let reply = match self
            .inner
            .dispatcher
            .send("GROUP", ParamMap::new().with("gid", gid))
            .await
        {
            Ok(reply) => reply,
            Err(e) => return failed(&what, e, stale),
        };
        match reply.code {
            250 => Ok(Some(self.store_group(Group::from_fields(&reply.fields())).await)),
            350 => {
                debug!("Group {gid} does not exist");
                self.inner.cache.mark_invalid(&key).await;
                Ok(None)
            }
            _ => unexpected(&what, &reply, stale),
        }
    }

    /// Resolves a group's name or short name to its id
    pub fn gid_by_name(&self, name: &str) -> Pending<FetchResult<Gid>> {
        if name.is_empty() {
            return Pending::unresolved();
        }
        let name = name.to_string();
        self.coalesce(
            |intents| &intents.gid,
            cache_key!["gid", "by-name", name],
            move |service| async move { service.fetch_gid_by_name(&name).await },
        )
    }

    async fn fetch_gid_by_name(&self, name: &str) -> FetchResult<Gid> {
        let key = cache_key!["gid", "by-name", name];
        let max_age = self.durations().group();
        let stale = match self.lookup_link::<Gid>(&key, max_age).await {
            Cached::Invalid => return Ok(None),
            Cached::Fresh(gid) => return Ok(Some(gid)),
            Cached::Stale(stale) => stale,
        };
        if let Cached::Fresh(gid) = self
            .lookup_link::<Gid>(&cache_key!["gid", "by-shortname", name], max_age)
            .await
        {
            return Ok(Some(gid));
        }

        let what = format!("GROUP {name}");
        let reply = match self
            .inner
            .dispatcher
            .send("GROUP", ParamMap::new().with("gname", name))
            .await
        {
            Ok(reply) => reply,
            Err(e) => return failed(&what, e, stale),
        };
        match reply.code {
            250 => {
                let group = self.store_group(Group::from_fields(&reply.fields())).await;
                Ok(Some(group.gid))
            }
            350 => {
                debug!("No group is named {name}");
                self.inner.cache.mark_invalid(&key).await;
                Ok(None)
            }
            _ => unexpected(&what, &reply, stale),
        }
    }

    /// Fetches a group by name or short name
    ///
    /// When the name linkage leads to a group with other names, the linkage
    /// is deleted and the name looked up on the server once more.
    pub fn group_by_name(&self, name: &str) -> Pending<FetchResult<Group>> {
        let service = self.clone();
        let name = name.to_string();
        Pending::spawn(async move {
            let mut retried = false;
            loop {
                let Some(gid) = service.gid_by_name(&name).await? else {
                    return Ok(None);
                };
                let Some(group) = service.group_by_id(gid).await? else {
                    return Ok(None);
                };
                if retried || group.is_named(&name) {
                    return Ok(Some(group));
                }

                warn!("Group {gid} is not named {name}, dropping the name linkage");
                let cache = &service.inner.cache;
                cache.delete(&cache_key!["gid", "by-name", name]).await;
                cache.delete(&cache_key!["gid", "by-shortname", name]).await;
                retried = true;
            }
        })
    }

    /// Caches a group and the linkage of its names
    async fn store_group(&self, mut group: Group) -> Group {
        self.inner
            .cache
            .set(&cache_key!["gid", group.gid], &mut group)
            .await;
        if !group.name.is_empty() {
            self.link(&cache_key!["gid", "by-name", group.name], group.gid)
                .await;
        }
        if !group.short_name.is_empty() {
            self.link(&cache_key!["gid", "by-shortname", group.short_name], group.gid)
                .await;
        }
        group
    }
}
