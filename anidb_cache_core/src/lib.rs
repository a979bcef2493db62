//! AniDB Cache Core Library
//!
//! A request-coalescing cache layer in front of the AniDB UDP and HTTP APIs.
//! Every lookup first consults the local store; stale or missing entries are
//! fetched remotely exactly once per key, no matter how many callers ask at
//! the same time, and the result is fanned out to all of them.

pub mod api;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod entities;
pub mod epno;
pub mod error;
mod fetch;
pub mod ids;
pub mod intent;
pub mod pending;
pub mod protocol;
pub mod security;

// Re-export main types
pub use api::AniDB;
pub use cache::{Cache, CacheDurations, CacheKey, FileStore, MemoryStore, Store};
pub use config::Config;
pub use entities::{
    Anime, Episode, File, Group, MyListAnime, MyListEntry, MyListSet, MyListStats, User,
};
pub use epno::{EpisodeList, EpisodeNumber, EpisodeRange, EpisodeType};
pub use error::{Error, FetchError, Result};
pub use ids::{Aid, Eid, Fid, Gid, Lid, Uid};
pub use pending::{FetchResult, MutationResult, Pending, PendingStream};
