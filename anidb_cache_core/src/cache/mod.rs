//! Persistent entity cache
//!
//! - `key`: composite keys and their injective path encoding
//! - `store`: the untyped blob [`Store`] seam, with [`FileStore`] and [`MemoryStore`]
//! - `typed`: the JSON [`Cache`] facade and invalid-key markers
//! - `staleness`: per-kind freshness rules

pub mod file_store;
pub mod key;
pub mod memory_store;
pub mod staleness;
pub mod store;
pub mod typed;

// Re-export main types
pub use file_store::FileStore;
pub use key::CacheKey;
pub use memory_store::MemoryStore;
pub use staleness::{CacheDurations, Cacheable, Link, Staleness, is_expired};
pub use store::{Store, StoredBlob};
pub use typed::Cache;
