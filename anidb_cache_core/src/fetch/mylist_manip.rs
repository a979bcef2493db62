//! List mutations
//!
//! Identical concurrent mutations coalesce on `["mylist-add" | "mylist-edit" |
//! "mylist-del", uid, fid]`. A successful mutation is mirrored into the
//! cached file, list summary and entry by read-modify-write.

use super::{failed, mutation_failed, unexpected};
use crate::api::AniDB;
use crate::cache_key;
use crate::entities::{File, MyListAnime, MyListEntry, MyListSet};
use crate::ids::{Lid, Uid};
use crate::pending::{FetchResult, MutationResult, Pending};
use crate::protocol::ParamMap;
use chrono::Utc;
use log::{debug, warn};

/// Identifies an entry by list id when known, by file id otherwise
fn entry_params(mut params: ParamMap, uid: Uid, file: &File) -> ParamMap {
    match file.lid.get(&uid) {
        Some(lid) if lid.is_valid() => params.insert("lid", lid),
        _ => params.insert("fid", file.fid),
    }
    params
}

impl AniDB {
    /// Adds a file to the current user's list, yielding its list id
    ///
    /// A file already listed yields the existing entry's id.
    pub fn my_list_add(&self, file: &File, set: MyListSet) -> Pending<FetchResult<Lid>> {
        if !file.fid.is_valid() {
            return Pending::unresolved();
        }
        let service = self.clone();
        let file = file.clone();
        Pending::spawn(async move {
            let Some(uid) = service.current_uid().await else {
                return Ok(None);
            };
            service
                .coalesce(
                    |intents| &intents.lid,
                    cache_key!["mylist-add", uid, file.fid],
                    move |service| async move { service.add_to_list(uid, file, set).await },
                )
                .await
        })
    }

    async fn add_to_list(&self, uid: Uid, file: File, set: MyListSet) -> FetchResult<Lid> {
        let what = format!("MYLISTADD fid {}", file.fid);
        let params = set.to_params().with("fid", file.fid);
        let reply = match self.inner.dispatcher.send("MYLISTADD", params).await {
            Ok(reply) => reply,
            Err(e) => return failed(&what, e, None),
        };
        match reply.code {
            210 => {
                let lid: Lid = reply.fields().id(0);
                debug!("Added file {} to the list as {lid}", file.fid);
                self.record_mutation(uid, &file, lid, &set).await;
                Ok(Some(lid))
            }
            310 => {
                let entry = MyListEntry::from_fields(&reply.fields());
                debug!("File {} is already listed as {}", file.fid, entry.lid);
                Ok(Some(self.store_entry(entry, Some(uid)).await.lid))
            }
            320 => {
                debug!("{what}: no such file");
                Ok(None)
            }
            _ => unexpected(&what, &reply, None),
        }
    }

    /// Adds the file with this ed2k hash and size to the current user's list
    pub fn my_list_add_by_ed2k(&self, ed2k: &str, size: u64, set: MyListSet) -> Pending<FetchResult<Lid>> {
        let file = self.file_by_ed2k(ed2k, size);
        let service = self.clone();
        Pending::spawn(async move {
            match file.await? {
                Some(file) => service.my_list_add(&file, set).await,
                None => Ok(None),
            }
        })
    }

    /// Edits the current user's entry for `file`
    pub fn my_list_edit(&self, file: &File, set: MyListSet) -> Pending<MutationResult> {
        self.mutate("mylist-edit", file, move |service, uid, file| async move {
            service.edit_list(uid, file, set).await
        })
    }

    async fn edit_list(&self, uid: Uid, file: File, set: MyListSet) -> MutationResult {
        let what = format!("MYLISTADD edit fid {}", file.fid);
        let params = entry_params(set.to_params().with("edit", 1), uid, &file);
        let reply = match self.inner.dispatcher.send("MYLISTADD", params).await {
            Ok(reply) => reply,
            Err(e) => return mutation_failed(&what, e),
        };
        match reply.code {
            311 => {
                let lid = file.lid.get(&uid).copied().unwrap_or_default();
                self.record_mutation(uid, &file, lid, &set).await;
                Ok(true)
            }
            411 => {
                debug!("{what}: no such entry");
                Ok(false)
            }
            _ => Ok(unexpected::<bool>(&what, &reply, None)?.unwrap_or(false)),
        }
    }

    /// Edits the entry with list id `lid`
    pub fn my_list_edit_by_lid(&self, lid: Lid, set: MyListSet) -> Pending<MutationResult> {
        if !lid.is_valid() {
            return Pending::unresolved();
        }
        let service = self.clone();
        Pending::spawn(async move {
            let Some(uid) = service.current_uid().await else {
                return Ok(false);
            };
            let Some(entry) = service.my_list_by_lid(lid).await? else {
                return Ok(false);
            };
            let mut file = match service.file_by_id(entry.fid).await? {
                Some(file) => file,
                None => File {
                    fid: entry.fid,
                    aid: entry.aid,
                    eid: entry.eid,
                    gid: entry.gid,
                    ..File::default()
                },
            };
            file.lid.insert(uid, lid);
            service.my_list_edit(&file, set).await
        })
    }

    /// Removes `file` from the current user's list
    pub fn my_list_del(&self, file: &File) -> Pending<MutationResult> {
        self.mutate("mylist-del", file, |service, uid, file| async move {
            service.delete_from_list(uid, file).await
        })
    }

    async fn delete_from_list(&self, uid: Uid, file: File) -> MutationResult {
        let what = format!("MYLISTDEL fid {}", file.fid);
        let params = entry_params(ParamMap::new(), uid, &file);
        let reply = match self.inner.dispatcher.send("MYLISTDEL", params).await {
            Ok(reply) => reply,
            Err(e) => return mutation_failed(&what, e),
        };
        match reply.code {
            211 => {
                self.record_removal(uid, &file).await;
                Ok(true)
            }
            411 => {
                debug!("{what}: no such entry");
                Ok(false)
            }
            _ => Ok(unexpected::<bool>(&what, &reply, None)?.unwrap_or(false)),
        }
    }

    /// Coalesces one kind of mutation of the current user's entry for `file`
    fn mutate<F, Fut>(&self, kind: &'static str, file: &File, run: F) -> Pending<MutationResult>
    where
        F: FnOnce(AniDB, Uid, File) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = MutationResult> + Send + 'static,
    {
        if !file.fid.is_valid() {
            return Pending::unresolved();
        }
        let service = self.clone();
        let file = file.clone();
        Pending::spawn(async move {
            let Some(uid) = service.current_uid().await else {
                return Ok(false);
            };
            service
                .coalesce(
                    |intents| &intents.mutation,
                    cache_key![kind, uid, file.fid],
                    move |service| run(service, uid, file),
                )
                .await
        })
    }

    pub(crate) async fn current_uid(&self) -> Option<Uid> {
        match self.resolve_current_user().await {
            Some(user) => Some(user.uid),
            None => {
                warn!("List operations need a current user");
                None
            }
        }
    }

    /// Mirrors a successful add or edit into the cache
    ///
    /// Summaries only ever gain episodes; the entry is only updated when
    /// it is already cached.
    async fn record_mutation(&self, uid: Uid, file: &File, lid: Lid, set: &MyListSet) {
        let cache = &self.inner.cache;
        if lid.is_valid() {
            let file_key = cache_key!["fid", file.fid];
            let mut cached = cache
                .get::<File>(&file_key)
                .await
                .unwrap_or_else(|| file.clone());
            if cached.lid.get(&uid) != Some(&lid) {
                cached.lid.insert(uid, lid);
                cache.put(&file_key, &cached).await;
            }
            self.link(&cache_key!["mylist", "by-fid", file.fid, uid], lid)
                .await;
        }

        let summary_key = cache_key!["mylist-anime", uid, file.aid];
        let mut summary = cache
            .get::<MyListAnime>(&summary_key)
            .await
            .unwrap_or_else(|| MyListAnime::new(file.aid));
        summary.record(file.gid, &file.episode_number, set);
        cache.put(&summary_key, &summary).await;

        if set.is_empty() || !lid.is_valid() {
            return;
        }
        let entry_key = cache_key!["mylist", lid];
        if let Some(mut entry) = cache.get::<MyListEntry>(&entry_key).await {
            entry.apply(set, Utc::now());
            cache.put(&entry_key, &entry).await;
        }
    }

    /// Mirrors a successful delete into the cache
    async fn record_removal(&self, uid: Uid, file: &File) {
        let cache = &self.inner.cache;
        let file_key = cache_key!["fid", file.fid];
        let lid = match cache.get::<File>(&file_key).await {
            Some(mut cached) => {
                let lid = cached.lid.remove(&uid);
                if lid.is_some() {
                    cache.put(&file_key, &cached).await;
                }
                lid
            }
            None => None,
        };
        if let Some(lid) = lid.or_else(|| file.lid.get(&uid).copied()) {
            cache.delete(&cache_key!["mylist", lid]).await;
        }
        cache
            .delete(&cache_key!["mylist", "by-fid", file.fid, uid])
            .await;
    }
}
