//! Per-kind staleness rules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const HOUR: u64 = 60 * 60;
const DAY: u64 = 24 * HOUR;

/// How long each kind of cached record stays fresh, in seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheDurations {
    pub anime_secs: u64,
    /// Anime whose UDP half failed
    pub anime_incomplete_secs: u64,
    pub episode_secs: u64,
    /// Files, ed2k linkage and group+episode file lists
    pub file_secs: u64,
    /// Files without stream information
    pub file_incomplete_secs: u64,
    /// Groups and their name linkage
    pub group_secs: u64,
    /// Users and the uid/name linkage
    pub user_secs: u64,
    pub mylist_secs: u64,
    /// List entries already marked watched
    pub mylist_watched_secs: u64,
    /// File to list entry linkage
    pub mylist_by_fid_secs: u64,
    pub mylist_anime_secs: u64,
    pub mylist_stats_secs: u64,
    /// Invalid-key markers
    pub invalid_secs: u64,
}

impl Default for CacheDurations {
    fn default() -> Self {
        Self {
            anime_secs: 7 * DAY,
            anime_incomplete_secs: DAY,
            episode_secs: 7 * DAY,
            file_secs: 7 * DAY,
            file_incomplete_secs: DAY,
            group_secs: 28 * DAY,
            user_secs: 112 * DAY,
            mylist_secs: DAY,
            mylist_watched_secs: 7 * DAY,
            mylist_by_fid_secs: 7 * DAY,
            mylist_anime_secs: DAY,
            mylist_stats_secs: DAY,
            invalid_secs: HOUR,
        }
    }
}

macro_rules! duration_getters {
    ($($name:ident => $field:ident),* $(,)?) => {
        impl CacheDurations {
            $(
                pub fn $name(&self) -> Duration {
                    Duration::from_secs(self.$field)
                }
            )*
        }
    };
}

duration_getters! {
    anime => anime_secs,
    anime_incomplete => anime_incomplete_secs,
    episode => episode_secs,
    file => file_secs,
    file_incomplete => file_incomplete_secs,
    group => group_secs,
    user => user_secs,
    mylist => mylist_secs,
    mylist_watched => mylist_watched_secs,
    mylist_by_fid => mylist_by_fid_secs,
    mylist_anime => mylist_anime_secs,
    mylist_stats => mylist_stats_secs,
    invalid => invalid_secs,
}

/// A record stamped with the time it was last refreshed from the server
pub trait Cacheable {
    fn cached_at(&self) -> DateTime<Utc>;

    /// Stamps the record; called by the cache on every write
    fn touch(&mut self, now: DateTime<Utc>);
}

/// A record that knows how long it stays fresh
pub trait Staleness: Cacheable {
    fn max_age(&self, durations: &CacheDurations) -> Duration;

    fn is_stale_at(&self, durations: &CacheDurations, now: DateTime<Utc>) -> bool {
        is_expired(self.cached_at(), self.max_age(durations), now)
    }

    fn is_stale(&self, durations: &CacheDurations) -> bool {
        self.is_stale_at(durations, Utc::now())
    }
}

/// True when more than `max_age` has passed between `stamp` and `now`
pub fn is_expired(stamp: DateTime<Utc>, max_age: Duration, now: DateTime<Utc>) -> bool {
    match chrono::Duration::from_std(max_age) {
        Ok(max_age) => now.signed_duration_since(stamp) > max_age,
        Err(_) => false,
    }
}

/// A linkage record: a narrow mapping used to shortcut lookups
///
/// Linkage takes its freshness from the entity it points into, so the caller
/// picks the duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link<T> {
    pub value: T,
    pub cached: DateTime<Utc>,
}

impl<T> Link<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            cached: DateTime::<Utc>::default(),
        }
    }

    pub fn is_fresh(&self, max_age: Duration) -> bool {
        !is_expired(self.cached, max_age, Utc::now())
    }
}

impl<T> Cacheable for Link<T> {
    fn cached_at(&self) -> DateTime<Utc> {
        self.cached
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.cached = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_expiry_boundaries() {
        let now = Utc::now();
        let max_age = Duration::from_secs(HOUR);
        assert!(!is_expired(now - TimeDelta::seconds(3599), max_age, now));
        assert!(!is_expired(now - TimeDelta::seconds(3600), max_age, now));
        assert!(is_expired(now - TimeDelta::seconds(3601), max_age, now));
    }

    #[test]
    fn test_default_durations() {
        let durations = CacheDurations::default();
        assert_eq!(durations.invalid(), Duration::from_secs(3600));
        assert_eq!(durations.anime(), Duration::from_secs(7 * DAY));
        assert!(durations.anime_incomplete() < durations.anime());
        assert!(durations.file_incomplete() < durations.file());
    }

    #[test]
    fn test_link_freshness() {
        let mut link = Link::new(42u32);
        assert!(!link.is_fresh(Duration::from_secs(60)));
        link.touch(Utc::now());
        assert!(link.is_fresh(Duration::from_secs(60)));
    }
}
