use crate::cache::{CacheDurations, Staleness};
use crate::ids::Uid;
use crate::protocol::Fields;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Totals of a user's list (MYLISTSTATS)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MyListStats {
    pub uid: Uid,

    pub anime: u32,
    pub episodes: u32,
    pub files: u32,
    /// Bytes
    pub size: u64,

    pub added_anime: u32,
    pub added_episodes: u32,
    pub added_files: u32,
    pub added_groups: u32,

    /// Fractions in 0.0 to 1.0
    pub leech: f32,
    pub glory: f32,
    pub viewed_of_database: f32,
    pub mylist_of_database: f32,
    pub viewed_of_mylist: f32,

    pub viewed_episodes: u32,
    pub votes: u32,
    pub reviews: u32,
    pub viewed_time: Duration,

    pub cached: DateTime<Utc>,
}

impl Staleness for MyListStats {
    fn max_age(&self, durations: &CacheDurations) -> Duration {
        durations.mylist_stats()
    }
}

impl MyListStats {
    /// Parses the data line of a 222 MYLISTSTATS reply
    pub fn from_fields(uid: Uid, fields: &Fields) -> Self {
        let count = |i| u32::try_from(fields.int(i)).unwrap_or(0);
        let percent = |i| fields.int(i) as f32 / 100.0;

        let episodes = count(1);
        let viewed_episodes = count(13);
        // More precise than the rounded percentage in field 12
        let viewed_of_mylist = if episodes == 0 {
            percent(12)
        } else {
            viewed_episodes as f32 / episodes as f32
        };

        Self {
            uid,
            anime: count(0),
            episodes,
            files: count(2),
            size: u64::try_from(fields.int(3)).unwrap_or(0) * 1024 * 1024,
            added_anime: count(4),
            added_episodes: count(5),
            added_files: count(6),
            added_groups: count(7),
            leech: percent(8),
            glory: percent(9),
            viewed_of_database: percent(10),
            mylist_of_database: percent(11),
            viewed_of_mylist,
            viewed_episodes,
            votes: count(14),
            reviews: count(15),
            viewed_time: Duration::from_secs(u64::try_from(fields.int(16)).unwrap_or(0) * 60),
            cached: DateTime::<Utc>::default(),
        }
    }
}
