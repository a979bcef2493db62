use super::{Cached, failed, unexpected};
use crate::api::AniDB;
use crate::cache::CacheKey;
use crate::cache_key;
use crate::entities::{Episode, FILE_AMASK, FILE_FMASK, File};
use crate::epno::{EpisodeList, EpisodeRange};
use crate::error::FetchError;
use crate::ids::{Fid, Gid};
use crate::pending::{FetchResult, Pending, PendingStream};
use crate::protocol::ParamMap;
use futures::{FutureExt, StreamExt};
use log::{debug, error, warn};
use std::panic::AssertUnwindSafe;

/// Lowercases a 32 digit hex ed2k hash; `None` for anything else
pub(crate) fn normalize_ed2k(ed2k: &str) -> Option<String> {
    (ed2k.len() == 32 && ed2k.bytes().all(|b| b.is_ascii_hexdigit()))
        .then(|| ed2k.to_ascii_lowercase())
}

fn file_params() -> ParamMap {
    ParamMap::new()
        .with("fmask", FILE_FMASK)
        .with("amask", FILE_AMASK)
}

impl AniDB {
    pub fn file_by_id(&self, fid: Fid) -> Pending<FetchResult<File>> {
        if !fid.is_valid() {
            return Pending::unresolved();
        }
        self.coalesce(
            |intents| &intents.file,
            cache_key!["fid", fid],
            move |service| async move { service.fetch_file(fid).await },
        )
    }

    async fn fetch_file(&self, fid: Fid) -> FetchResult<File> {
        let key = cache_key!["fid", fid];
        let stale = match self.lookup::<File>(&key).await {
            Cached::Invalid => return Ok(None),
            Cached::Fresh(file) => return Ok(Some(file)),
            Cached::Stale(stale) => stale,
        };

        let what = format!("FILE {fid}");
        let reply = match self
            .inner
            .dispatcher
            .send("FILE", file_params().with("fid", fid))
            .await
        {
            Ok(reply) => reply,
            Err(e) => return failed(&what, e, stale),
        };
        match reply.code {
            220 if reply.truncated => Err(FetchError::fatal(220, format!("{what}: reply truncated"))),
            220 => self.accept_file(File::from_fields(&reply.fields()), false).await,
            320 => {
                debug!("File {fid} does not exist");
                self.inner.cache.mark_invalid(&key).await;
                Ok(None)
            }
            _ => unexpected(&what, &reply, stale),
        }
    }

    /// Resolves an ed2k hash and file size to a file id
    pub fn fid_by_ed2k(&self, ed2k: &str, size: u64) -> Pending<FetchResult<Fid>> {
        let Some(ed2k) = normalize_ed2k(ed2k) else {
            return Pending::unresolved();
        };
        if size == 0 {
            return Pending::unresolved();
        }
        let key = cache_key!["fid", "by-ed2k", ed2k, size];
        self.coalesce(|intents| &intents.fid, key.clone(), move |service| async move {
            service.fetch_fid_by_ed2k(key, ed2k, size).await
        })
    }

    async fn fetch_fid_by_ed2k(&self, key: CacheKey, ed2k: String, size: u64) -> FetchResult<Fid> {
        let stale = match self.lookup_link::<Fid>(&key, self.durations().file()).await {
            Cached::Invalid => return Ok(None),
            Cached::Fresh(fid) => return Ok(Some(fid)),
            Cached::Stale(stale) => stale,
        };

        let what = format!("FILE {ed2k} ({size} bytes)");
        let params = file_params().with("size", size).with("ed2k", &ed2k);
        let reply = match self.inner.dispatcher.send("FILE", params).await {
            Ok(reply) => reply,
            Err(e) => return failed(&what, e, stale),
        };
        match reply.code {
            220 if reply.truncated => Err(FetchError::fatal(220, format!("{what}: reply truncated"))),
            220 => {
                let file = self
                    .accept_file(File::from_fields(&reply.fields()), false)
                    .await?;
                Ok(file.map(|file| file.fid))
            }
            320 => {
                debug!("No file matches {what}");
                self.inner.cache.mark_invalid(&key).await;
                Ok(None)
            }
            322 => Err(FetchError::ambiguous(format!("several files match {what}"))),
            _ => unexpected(&what, &reply, stale),
        }
    }

    pub fn file_by_ed2k(&self, ed2k: &str, size: u64) -> Pending<FetchResult<File>> {
        let fid = self.fid_by_ed2k(ed2k, size);
        let service = self.clone();
        Pending::spawn(async move {
            match fid.await? {
                Some(fid) => service.file_by_id(fid).await,
                None => Ok(None),
            }
        })
    }

    /// Streams the ids of every file `gid` released for `episode`
    pub fn fids_by_group(&self, episode: &Episode, gid: Gid) -> PendingStream<Fid> {
        if !episode.eid.is_valid() || !gid.is_valid() {
            return PendingStream::empty();
        }
        let key = cache_key!["fid", "by-eid-gid", episode.eid, gid];
        let (observer, stream) = PendingStream::channel();
        let service = self.clone();
        let episode = episode.clone();
        tokio::spawn(async move {
            let intents = &service.inner.intents.fid_list;
            if intents.register(&key, observer).await {
                return;
            }
            let fids = match AssertUnwindSafe(service.fetch_fids_by_group(&key, &episode, gid))
                .catch_unwind()
                .await
            {
                Ok(fids) => fids,
                Err(panic) => {
                    error!(
                        "Enumeration of {key} panicked: {}",
                        crate::api::panic_message(panic.as_ref())
                    );
                    Vec::new()
                }
            };
            if let Some(handle) = intents.lock_for_manual_resolution(&key).await {
                for fid in fids {
                    handle.notify(fid);
                }
                handle.free();
            }
        });
        stream
    }

    async fn fetch_fids_by_group(&self, key: &CacheKey, episode: &Episode, gid: Gid) -> Vec<Fid> {
        let stale = match self.lookup_link::<Vec<Fid>>(key, self.durations().file()).await {
            Cached::Invalid => return Vec::new(),
            Cached::Fresh(fids) => return fids,
            Cached::Stale(stale) => stale.unwrap_or_default(),
        };

        let what = format!("FILE aid {} gid {gid} epno {}", episode.aid, episode.number);
        let params = file_params()
            .with("aid", episode.aid)
            .with("gid", gid)
            .with("epno", episode.number);
        let reply = match self.inner.dispatcher.send("FILE", params).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("{what} failed: {e}");
                return stale;
            }
        };
        let fids = match reply.code {
            220 if reply.truncated => {
                warn!("{what}: reply truncated");
                return stale;
            }
            220 => match self.accept_file(File::from_fields(&reply.fields()), true).await {
                Ok(Some(file)) => vec![file.fid],
                Ok(None) => return stale,
                Err(e) => {
                    warn!("{what}: {e}");
                    return stale;
                }
            },
            322 => reply
                .fields()
                .iter()
                .filter_map(|fid| fid.trim().parse::<u32>().ok())
                .map(Fid)
                .filter(|fid| fid.is_valid())
                .collect(),
            320 => {
                debug!("{what}: no files");
                self.inner.cache.mark_invalid(key).await;
                return Vec::new();
            }
            _ => {
                warn!("{what}: unexpected reply {} {}", reply.code, reply.text);
                return stale;
            }
        };
        self.link(key, fids.clone()).await;
        fids
    }

    /// Streams every file `gid` released for `episode`
    pub fn files_by_group(&self, episode: &Episode, gid: Gid) -> PendingStream<File> {
        let mut fids = self.fids_by_group(episode, gid);
        let (observer, stream) = PendingStream::channel();
        let service = self.clone();
        tokio::spawn(async move {
            while let Some(fid) = fids.next().await {
                match service.file_by_id(fid).await {
                    Ok(Some(file)) => {
                        if observer.send(file).is_err() {
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Skipping file {fid}: {e}"),
                }
            }
        });
        stream
    }

    /// Reconciles a freshly parsed file and caches it with its ed2k linkage
    ///
    /// The per-user list ids of the cached copy are carried over. Yields
    /// `None` when the file cannot be placed in its episode list.
    async fn accept_file(&self, mut file: File, from_enumeration: bool) -> FetchResult<File> {
        if !self.reconcile_episodes(&mut file, from_enumeration).await? {
            return Ok(None);
        }
        let key = cache_key!["fid", file.fid];
        if let Some(previous) = self.inner.cache.get::<File>(&key).await {
            file.lid = previous.lid;
        }
        self.inner.cache.set(&key, &mut file).await;
        if let Some(ed2k) = normalize_ed2k(&file.ed2k)
            && file.size > 0
        {
            self.link(&cache_key!["fid", "by-ed2k", ed2k, file.size], file.fid)
                .await;
        }
        Ok(Some(file))
    }

    /// Checks a suspicious episode number against the episode records
    ///
    /// Files covering part of one episode are numbered by their position in
    /// the group's files for that episode. Returns false when that position
    /// cannot be determined.
    async fn reconcile_episodes(&self, file: &mut File, from_enumeration: bool) -> Result<bool, FetchError> {
        if !file.needs_episode_reconciliation() {
            return Ok(true);
        }
        let Some(episode) = self.episode_by_id(file.eid).await? else {
            debug!(
                "File {}: episode {} unknown, keeping number {}",
                file.fid, file.eid, file.episode_number
            );
            return Ok(true);
        };

        let mut ranges = vec![EpisodeRange::single(episode.number)];
        let mut complete = true;
        for &eid in file.related_episodes.keys() {
            match self.cached_episode(eid).await {
                Some(other) if other.aid == episode.aid => ranges.push(EpisodeRange::single(other.number)),
                _ => complete = false,
            }
        }
        let candidate = if complete {
            EpisodeList::from_ranges(ranges).simplify()
        } else {
            EpisodeList::new()
        };

        if !file.is_partial() {
            file.episode_number = if candidate.len() == 1 {
                candidate
            } else {
                EpisodeList::from(episode.number)
            };
            return Ok(true);
        }

        if from_enumeration {
            warn!("File {} is a partial episode, numbered {candidate}", file.fid);
            file.episode_number = candidate;
            return Ok(true);
        }
        if !matches!(candidate.ranges(), [range] if range.is_single()) {
            return Err(FetchError::ambiguous(format!(
                "file {} covers parts of several episodes ({})",
                file.fid, file.episode_number
            )));
        }

        let mut fids: Vec<Fid> = self.fids_by_group(&episode, file.gid).collect().await;
        if fids.is_empty() {
            warn!(
                "File {}: group {} lists no files for episode {}",
                file.fid, file.gid, episode.eid
            );
            return Ok(false);
        }
        fids.sort_unstable();
        fids.dedup();
        let Ok(index) = fids.binary_search(&file.fid) else {
            return Err(FetchError::ambiguous(format!(
                "file {} is missing from the files of group {} for episode {}",
                file.fid, file.gid, episode.eid
            )));
        };

        let mut number = episode.number;
        number.part = Some(index as u32);
        number.parts = fids.len() as u32;
        file.episode_number = EpisodeList::from(number);
        Ok(true)
    }
}
