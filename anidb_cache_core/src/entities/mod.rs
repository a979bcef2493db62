//! Cached AniDB entities
//!
//! Every entity carries a `cached` stamp written by [`Cache::set`](crate::cache::Cache::set)
//! and implements [`Staleness`](crate::cache::Staleness) with its kind's duration.
//! The parsers here turn UDP reply fields and HTTP documents into entities;
//! they never touch the cache or the network.

mod anime;
mod episode;
mod file;
mod group;
mod mylist;
mod mylist_anime;
mod stats;
mod user;

pub use anime::{ANIME_AMASK, Anime, EpisodeCount, ResourceKind};
pub use episode::Episode;
pub use file::{AudioStream, FILE_AMASK, FILE_FMASK, File, VideoInfo, normalize_codec};
pub use group::{Group, GroupRelation};
pub use mylist::{FileState, MyListEntry, MyListSet, MyListState};
pub use mylist_anime::MyListAnime;
pub use stats::MyListStats;
pub use user::User;

use serde::{Deserialize, Serialize};

/// An average rating and the number of votes behind it
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub rating: f32,
    pub votes: u32,
}

impl Rating {
    pub fn new(rating: f32, votes: u32) -> Self {
        Self { rating, votes }
    }
}

macro_rules! cacheable {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::cache::Cacheable for $ty {
                fn cached_at(&self) -> chrono::DateTime<chrono::Utc> {
                    self.cached
                }

                fn touch(&mut self, now: chrono::DateTime<chrono::Utc>) {
                    self.cached = now;
                }
            }
        )+
    };
}

cacheable!(
    Anime,
    Episode,
    File,
    Group,
    User,
    MyListEntry,
    MyListAnime,
    MyListStats,
);
