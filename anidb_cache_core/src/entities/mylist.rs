use crate::cache::{CacheDurations, Staleness};
use crate::ids::{Aid, Eid, Fid, Gid, Lid};
use crate::protocol::{Fields, ParamMap};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where a list entry's file is kept
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MyListState {
    #[default]
    Unknown,
    Hdd,
    Cd,
    Deleted,
}

impl MyListState {
    pub fn code(self) -> u32 {
        match self {
            Self::Unknown => 0,
            Self::Hdd => 1,
            Self::Cd => 2,
            Self::Deleted => 3,
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Hdd,
            2 => Self::Cd,
            3 => Self::Deleted,
            _ => Self::Unknown,
        }
    }
}

/// Condition of the listed file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileState {
    #[default]
    Original,
    Corrupted,
    Edited,
    SelfRip,
    Dvd,
    Vhs,
    Tv,
    Theaters,
    Streamed,
    Other,
}

impl FileState {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Corrupted,
            2 => Self::Edited,
            10 => Self::SelfRip,
            11 => Self::Dvd,
            12 => Self::Vhs,
            13 => Self::Tv,
            14 => Self::Theaters,
            15 => Self::Streamed,
            100 => Self::Other,
            _ => Self::Original,
        }
    }
}

/// One file in the user's list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MyListEntry {
    pub lid: Lid,

    pub fid: Fid,
    pub eid: Eid,
    pub aid: Aid,
    pub gid: Gid,

    pub date_added: Option<DateTime<Utc>>,
    pub date_watched: Option<DateTime<Utc>>,

    pub file_state: FileState,
    pub state: MyListState,

    pub storage: String,
    pub source: String,
    pub other: String,

    pub cached: DateTime<Utc>,
}

impl Staleness for MyListEntry {
    fn max_age(&self, durations: &CacheDurations) -> Duration {
        if self.date_watched.is_some() {
            durations.mylist_watched()
        } else {
            durations.mylist()
        }
    }
}

impl MyListEntry {
    /// Parses the data line of a 221 MYLIST (or 310 MYLISTADD) reply
    pub fn from_fields(fields: &Fields) -> Self {
        Self {
            lid: fields.id(0),
            fid: fields.id(1),
            eid: fields.id(2),
            aid: fields.id(3),
            gid: fields.id(4),
            date_added: fields.date(5),
            state: MyListState::from_code(fields.int(6)),
            date_watched: fields.date(7),
            storage: fields.str(8).to_string(),
            source: fields.str(9).to_string(),
            other: fields.str(10).to_string(),
            file_state: FileState::from_code(fields.int(11)),
            cached: DateTime::<Utc>::default(),
        }
    }

    /// Applies the fields a successful mutation changed
    pub fn apply(&mut self, set: &MyListSet, now: DateTime<Utc>) {
        if let Some(view_date) = set.view_date {
            self.date_watched = view_date;
        } else if let Some(watched) = set.watched {
            self.date_watched = watched.then_some(now);
        }
        if let Some(state) = set.state {
            self.state = state;
        }
        if let Some(source) = &set.source {
            self.source = source.clone();
        }
        if let Some(storage) = &set.storage {
            self.storage = storage.clone();
        }
        if let Some(other) = &set.other {
            self.other = other.clone();
        }
    }
}

/// Fields to change in a list mutation; `None` leaves a field alone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MyListSet {
    pub state: Option<MyListState>,
    pub watched: Option<bool>,
    /// `Some(None)` clears the watch date
    pub view_date: Option<Option<DateTime<Utc>>>,
    pub source: Option<String>,
    pub storage: Option<String>,
    pub other: Option<String>,
}

impl MyListSet {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// True if this mutation marks the file watched
    pub fn marks_watched(&self) -> bool {
        self.watched == Some(true) || matches!(self.view_date, Some(Some(_)))
    }

    pub fn to_params(&self) -> ParamMap {
        let mut params = ParamMap::new();
        if let Some(state) = self.state {
            params.insert("state", state.code());
        }
        if let Some(watched) = self.watched {
            params.insert("viewed", u8::from(watched));
        }
        if let Some(view_date) = self.view_date {
            let stamp = view_date.map_or(0, |date| i32::try_from(date.timestamp()).unwrap_or(0));
            params.insert("viewdate", stamp);
        }
        if let Some(source) = &self.source {
            params.insert("source", source);
        }
        if let Some(storage) = &self.storage {
            params.insert("storage", storage);
        }
        if let Some(other) = &self.other {
            params.insert("other", other);
        }
        params
    }
}
