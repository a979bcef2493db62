use super::{Cached, failed, unexpected};
use crate::api::AniDB;
use crate::cache_key;
use crate::entities::Episode;
use crate::ids::{Aid, Eid};
use crate::pending::{FetchResult, Pending};
use crate::protocol::ParamMap;
use log::{debug, warn};

impl AniDB {
    /// Fetches an episode through the anime it belongs to
    ///
    /// The owning anime comes from the episode-to-anime linkage, or from an
    /// EPISODE query when there is none. A linkage pointing at an anime that
    /// is gone or does not list the episode is deleted and the query tried
    /// once.
    pub fn episode_by_id(&self, eid: Eid) -> Pending<FetchResult<Episode>> {
        if !eid.is_valid() {
            return Pending::unresolved();
        }
        self.coalesce(
            |intents| &intents.episode,
            cache_key!["eid", eid],
            move |service| async move { service.fetch_episode(eid).await },
        )
    }

    async fn fetch_episode(&self, eid: Eid) -> FetchResult<Episode> {
        let key = cache_key!["eid", eid];
        let stale = match self.lookup::<Episode>(&key).await {
            Cached::Invalid => return Ok(None),
            Cached::Fresh(episode) => return Ok(Some(episode)),
            Cached::Stale(stale) => stale,
        };

        let link_key = cache_key!["aid", "by-eid", eid];
        let mut queried = false;
        loop {
            let aid = match self
                .lookup_link::<Aid>(&link_key, self.durations().anime())
                .await
            {
                Cached::Fresh(aid) | Cached::Stale(Some(aid)) => aid,
                _ => {
                    queried = true;
                    let what = format!("EPISODE {eid}");
                    let reply = match self
                        .inner
                        .dispatcher
                        .send("EPISODE", ParamMap::new().with("eid", eid))
                        .await
                    {
                        Ok(reply) => reply,
                        Err(e) => return failed(&what, e, stale),
                    };
                    match reply.code {
                        240 => reply.fields().id::<Aid>(1),
                        340 => {
                            debug!("Episode {eid} does not exist");
                            self.inner.cache.mark_invalid(&key).await;
                            return Ok(None);
                        }
                        _ => return unexpected(&what, &reply, stale),
                    }
                }
            };

            match self.anime_by_id(aid).await? {
                Some(anime) => {
                    if let Some(episode) = anime.episode_by_eid(eid) {
                        return Ok(Some(episode.clone()));
                    }
                    warn!("Anime {aid} does not list episode {eid}, dropping the linkage");
                }
                None => warn!("Anime {aid} of episode {eid} is gone, dropping the linkage"),
            }
            self.inner.cache.delete(&link_key).await;
            if queried {
                return Ok(None);
            }
        }
    }
}
