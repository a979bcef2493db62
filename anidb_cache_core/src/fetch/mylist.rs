use super::{Cached, failed, unexpected};
use crate::api::AniDB;
use crate::cache_key;
use crate::entities::{File, MyListEntry};
use crate::error::FetchError;
use crate::ids::{Fid, Lid, Uid};
use crate::pending::{FetchResult, Pending};
use crate::protocol::ParamMap;
use log::{debug, warn};

impl AniDB {
    pub fn my_list_by_lid(&self, lid: Lid) -> Pending<FetchResult<MyListEntry>> {
        if !lid.is_valid() {
            return Pending::unresolved();
        }
        self.coalesce(
            |intents| &intents.mylist,
            cache_key!["mylist", lid],
            move |service| async move { service.fetch_my_list_entry(lid).await },
        )
    }

    async fn fetch_my_list_entry(&self, lid: Lid) -> FetchResult<MyListEntry> {
        let key = cache_key!["mylist", lid];
        let stale = match self.lookup::<MyListEntry>(&key).await {
            Cached::Invalid => return Ok(None),
            Cached::Fresh(entry) => return Ok(Some(entry)),
            Cached::Stale(stale) => stale,
        };

        let what = format!("MYLIST lid {lid}");
        let reply = match self
            .inner
            .dispatcher
            .send("MYLIST", ParamMap::new().with("lid", lid))
            .await
        {
            Ok(reply) => reply,
            Err(e) => return failed(&what, e, stale),
        };
        match reply.code {
            221 => {
                let uid = self.resolve_current_user().await.map(|user| user.uid);
                let entry = MyListEntry::from_fields(&reply.fields());
                Ok(Some(self.store_entry(entry, uid).await))
            }
            312 => Err(FetchError::ambiguous(format!("{what} matched several entries"))),
            321 => {
                debug!("List entry {lid} does not exist");
                self.inner.cache.mark_invalid(&key).await;
                Ok(None)
            }
            _ => unexpected(&what, &reply, stale),
        }
    }

    /// The current user's list entry for a file
    ///
    /// Goes through the file-to-entry linkage when known; a linkage to an
    /// entry that no longer exists is deleted.
    pub fn my_list_by_fid(&self, fid: Fid) -> Pending<FetchResult<MyListEntry>> {
        if !fid.is_valid() {
            return Pending::unresolved();
        }
        let service = self.clone();
        Pending::spawn(async move {
            let Some(user) = service.resolve_current_user().await else {
                warn!("No current user to look up the list entry of file {fid}");
                return Ok(None);
            };
            let uid = user.uid;
            service
                .coalesce(
                    |intents| &intents.mylist,
                    cache_key!["mylist", "by-fid", fid, uid],
                    move |service| async move { service.fetch_my_list_by_fid(fid, uid).await },
                )
                .await
        })
    }

    async fn fetch_my_list_by_fid(&self, fid: Fid, uid: Uid) -> FetchResult<MyListEntry> {
        let link_key = cache_key!["mylist", "by-fid", fid, uid];
        let stale = match self
            .lookup_link::<Lid>(&link_key, self.durations().mylist_by_fid())
            .await
        {
            Cached::Invalid => return Ok(None),
            Cached::Fresh(lid) => match self.my_list_by_lid(lid).await? {
                Some(entry) => return Ok(Some(entry)),
                None => {
                    warn!("List entry {lid} of file {fid} is gone, dropping the linkage");
                    self.inner.cache.delete(&link_key).await;
                    None
                }
            },
            Cached::Stale(Some(lid)) => self.inner.cache.get::<MyListEntry>(&cache_key!["mylist", lid]).await,
            Cached::Stale(None) => None,
        };

        let what = format!("MYLIST fid {fid}");
        let reply = match self
            .inner
            .dispatcher
            .send("MYLIST", ParamMap::new().with("fid", fid))
            .await
        {
            Ok(reply) => reply,
            Err(e) => return failed(&what, e, stale),
        };
        match reply.code {
            221 => {
                let entry = MyListEntry::from_fields(&reply.fields());
                Ok(Some(self.store_entry(entry, Some(uid)).await))
            }
            312 => Err(FetchError::ambiguous(format!("{what} matched several entries"))),
            321 => {
                debug!("File {fid} is not in the list of user {uid}");
                self.inner.cache.mark_invalid(&link_key).await;
                Ok(None)
            }
            _ => unexpected(&what, &reply, stale),
        }
    }

    pub fn lid_by_fid(&self, fid: Fid) -> Pending<FetchResult<Lid>> {
        let entry = self.my_list_by_fid(fid);
        Pending::spawn(async move { Ok(entry.await?.map(|entry| entry.lid)) })
    }

    /// The current user's list entry for `file`, using its list ids when known
    pub fn my_list_by_file(&self, file: &File) -> Pending<FetchResult<MyListEntry>> {
        let service = self.clone();
        let fid = file.fid;
        let lids = file.lid.clone();
        Pending::spawn(async move {
            if let Some(user) = service.resolve_current_user().await
                && let Some(&lid) = lids.get(&user.uid)
                && let Some(entry) = service.my_list_by_lid(lid).await?
            {
                return Ok(Some(entry));
            }
            service.my_list_by_fid(fid).await
        })
    }

    /// Caches a parsed list entry
    ///
    /// With a known user the cached file's list ids and the file-to-entry
    /// linkage are updated too.
    pub(crate) async fn store_entry(&self, mut entry: MyListEntry, uid: Option<Uid>) -> MyListEntry {
        if let Some(uid) = uid {
            let file_key = cache_key!["fid", entry.fid];
            if let Some(mut file) = self.inner.cache.get::<File>(&file_key).await
                && file.lid.get(&uid) != Some(&entry.lid)
            {
                file.lid.insert(uid, entry.lid);
                self.inner.cache.put(&file_key, &file).await;
            }
            self.link(&cache_key!["mylist", "by-fid", entry.fid, uid], entry.lid)
                .await;
        }
        self.inner
            .cache
            .set(&cache_key!["mylist", entry.lid], &mut entry)
            .await;
        entry
    }
}
