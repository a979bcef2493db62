use super::Cached;
use crate::api::AniDB;
use crate::cache_key;
use crate::entities::{ANIME_AMASK, Anime};
use crate::error::{FetchError, ProtocolError};
use crate::ids::Aid;
use crate::pending::{FetchResult, Pending};
use crate::protocol::ParamMap;
use log::{debug, warn};
use tokio::time::{Instant, timeout_at};

impl AniDB {
    /// Fetches an anime from both APIs
    ///
    /// The UDP ANIME query and the HTTP document race under one shared
    /// timeout. The document is required; without the UDP half the anime is
    /// cached as incomplete.
    pub fn anime_by_id(&self, aid: Aid) -> Pending<FetchResult<Anime>> {
        if !aid.is_valid() {
            return Pending::unresolved();
        }
        self.coalesce(
            |intents| &intents.anime,
            cache_key!["aid", aid],
            move |service| async move { service.fetch_anime(aid).await },
        )
    }

    async fn fetch_anime(&self, aid: Aid) -> FetchResult<Anime> {
        let key = cache_key!["aid", aid];
        let stale = match self.lookup::<Anime>(&key).await {
            Cached::Invalid => return Ok(None),
            Cached::Fresh(anime) => return Ok(Some(anime)),
            Cached::Stale(stale) => stale,
        };

        let deadline = Instant::now() + self.inner.fetch_timeout;
        let params = ParamMap::new()
            .with("aid", aid)
            .with("amask", ANIME_AMASK);
        let (document, reply) = tokio::join!(
            timeout_at(deadline, self.inner.documents.anime(aid)),
            timeout_at(deadline, self.inner.dispatcher.send("ANIME", params)),
        );

        let mut anime = Anime::new(aid);
        anime.incomplete = true;
        match reply {
            Ok(Ok(reply)) if reply.code == 330 => {
                debug!("Anime {aid} does not exist");
                self.inner.cache.mark_invalid(&key).await;
                return Ok(None);
            }
            Ok(Ok(reply)) => {
                if anime.populate_from_reply(&reply) {
                    anime.incomplete = false;
                } else {
                    warn!("ANIME {aid}: unexpected reply {} {}", reply.code, reply.text);
                }
            }
            Ok(Err(ProtocolError::ClientRejected { code, message })) => {
                return Err(FetchError::fatal(code, message));
            }
            Ok(Err(e)) => warn!("ANIME {aid} failed: {e}"),
            Err(_) => warn!("ANIME {aid} timed out"),
        }

        let document = match document {
            Ok(Ok(document)) => document,
            Ok(Err(e)) => {
                warn!("Anime {aid}: {e}");
                return Ok(stale);
            }
            Err(_) => {
                warn!("Anime document for {aid} timed out");
                return Ok(stale);
            }
        };
        if !anime.populate_from_document(&document) || !anime.has_title() {
            if stale.is_none() {
                debug!("Anime {aid} has no usable document, marking it invalid");
                self.inner.cache.mark_invalid(&key).await;
            }
            return Ok(stale);
        }

        if anime.incomplete {
            debug!("Caching anime {aid} without its UDP half");
        }
        self.store_anime(&mut anime).await;
        Ok(Some(anime))
    }

    /// Caches the anime, each of its episodes and their episode-to-anime linkage
    async fn store_anime(&self, anime: &mut Anime) {
        let cache = &self.inner.cache;
        let aid = anime.aid;
        for episode in &mut anime.episodes {
            cache.set(&cache_key!["eid", episode.eid], episode).await;
            self.link(&cache_key!["aid", "by-eid", episode.eid], aid).await;
        }
        cache.set(&cache_key!["aid", aid], anime).await;
    }
}
