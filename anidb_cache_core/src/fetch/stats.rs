use super::{Cached, failed, unexpected};
use crate::api::AniDB;
use crate::cache_key;
use crate::entities::MyListStats;
use crate::ids::Uid;
use crate::pending::{FetchResult, Pending};
use crate::protocol::ParamMap;

impl AniDB {
    /// Totals of the current user's list
    pub fn my_list_stats(&self) -> Pending<FetchResult<MyListStats>> {
        let service = self.clone();
        Pending::spawn(async move {
            let Some(uid) = service.current_uid().await else {
                return Ok(None);
            };
            service
                .coalesce(
                    |intents| &intents.stats,
                    cache_key!["mylist-stats", uid],
                    move |service| async move { service.fetch_my_list_stats(uid).await },
                )
                .await
        })
    }

    async fn fetch_my_list_stats(&self, uid: Uid) -> FetchResult<MyListStats> {
        let key = cache_key!["mylist-stats", uid];
        let stale = match self.lookup::<MyListStats>(&key).await {
            Cached::Invalid => return Ok(None),
            Cached::Fresh(stats) => return Ok(Some(stats)),
            Cached::Stale(stale) => stale,
        };

        let reply = match self.inner.dispatcher.send("MYLISTSTATS", ParamMap::new()).await {
            Ok(reply) => reply,
            Err(e) => return failed("MYLISTSTATS", e, stale),
        };
        if reply.code != 222 {
            return unexpected("MYLISTSTATS", &reply, stale);
        }
        let mut stats = MyListStats::from_fields(uid, &reply.fields());
        self.inner.cache.set(&key, &mut stats).await;
        Ok(Some(stats))
    }
}
