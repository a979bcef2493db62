use crate::cache::{CacheDurations, Staleness};
use crate::ids::Uid;
use crate::protocol::Fields;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// An AniDB user; almost entirely a local record built from USER replies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uid: Uid,
    pub username: String,
    pub cached: DateTime<Utc>,
}

impl User {
    pub fn new(uid: Uid, username: impl Into<String>) -> Self {
        Self {
            uid,
            username: username.into(),
            cached: DateTime::<Utc>::default(),
        }
    }

    /// Parses the data line of a 295 USER reply
    pub fn from_fields(fields: &Fields) -> Self {
        Self::new(fields.id(0), fields.str(1))
    }
}

impl Staleness for User {
    fn max_age(&self, durations: &CacheDurations) -> Duration {
        durations.user()
    }
}
