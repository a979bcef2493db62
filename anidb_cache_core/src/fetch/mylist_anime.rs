use super::{Cached, failed, unexpected};
use crate::api::AniDB;
use crate::cache_key;
use crate::entities::{MyListAnime, MyListEntry};
use crate::epno::EpisodeList;
use crate::ids::{Aid, Uid};
use crate::pending::{FetchResult, Pending};
use crate::protocol::ParamMap;
use log::{debug, warn};

impl AniDB {
    /// The current user's list summary for an anime
    pub fn my_list_anime(&self, aid: Aid) -> Pending<FetchResult<MyListAnime>> {
        if !aid.is_valid() {
            return Pending::unresolved();
        }
        let service = self.clone();
        Pending::spawn(async move {
            let Some(user) = service.resolve_current_user().await else {
                warn!("No current user to look up the list summary of anime {aid}");
                return Ok(None);
            };
            let uid = user.uid;
            service
                .coalesce(
                    |intents| &intents.mylist_anime,
                    cache_key!["mylist-anime", uid, aid],
                    move |service| async move { service.fetch_my_list_anime(uid, aid).await },
                )
                .await
        })
    }

    async fn fetch_my_list_anime(&self, uid: Uid, aid: Aid) -> FetchResult<MyListAnime> {
        let key = cache_key!["mylist-anime", uid, aid];
        let stale = match self.lookup::<MyListAnime>(&key).await {
            Cached::Invalid => return Ok(None),
            Cached::Fresh(summary) => return Ok(Some(summary)),
            Cached::Stale(stale) => stale,
        };

        let what = format!("MYLIST aid {aid}");
        let reply = match self
            .inner
            .dispatcher
            .send("MYLIST", ParamMap::new().with("aid", aid))
            .await
        {
            Ok(reply) => reply,
            Err(e) => return failed(&what, e, stale),
        };
        let mut summary = match reply.code {
            // Only one file of the anime is listed
            221 => {
                let entry = self
                    .store_entry(MyListEntry::from_fields(&reply.fields()), Some(uid))
                    .await;
                let Some(episode) = self.episode_by_id(entry.eid).await? else {
                    warn!("{what}: episode {} of the only entry is unknown", entry.eid);
                    return Ok(stale);
                };
                MyListAnime::from_single_entry(&entry, EpisodeList::from(episode.number))
            }
            312 => {
                let (mut summary, groups) = MyListAnime::from_fields(aid, &reply.fields());
                for (name, episodes) in groups {
                    match self.gid_by_name(&name).await? {
                        Some(gid) => summary.add_group(gid, &episodes),
                        None => warn!("{what}: unknown group {name}"),
                    }
                }
                summary
            }
            321 => {
                debug!("Anime {aid} is not in the list of user {uid}");
                self.inner.cache.mark_invalid(&key).await;
                return Ok(None);
            }
            _ => return unexpected(&what, &reply, stale),
        };
        self.inner.cache.set(&key, &mut summary).await;
        Ok(Some(summary))
    }

    /// Any user's cached list summary for an anime, stale or not
    ///
    /// Never touches the network; [`AniDB::my_list_anime`] refreshes the
    /// current user's summary.
    pub async fn user_my_list_anime(&self, uid: Uid, aid: Aid) -> Option<MyListAnime> {
        self.inner
            .cache
            .get(&cache_key!["mylist-anime", uid, aid])
            .await
    }
}
