use crate::cache::{CacheDurations, Staleness};
use crate::entities::Rating;
use crate::ids::Gid;
use crate::protocol::document::IMAGE_BASE_URL;
use crate::protocol::Fields;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// How another group relates to this one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupRelation {
    ParticipantIn,
    ParentOf,
    MergedFrom,
    NowKnownAs,
    Other,
    ChildOf,
    Unknown(u32),
}

impl GroupRelation {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::ParticipantIn,
            2 => Self::ParentOf,
            4 => Self::MergedFrom,
            5 => Self::NowKnownAs,
            6 => Self::Other,
            102 => Self::ChildOf,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for GroupRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ParticipantIn => "Participated In",
            Self::ParentOf => "Parent Of",
            Self::MergedFrom => "Merged From",
            Self::NowKnownAs => "Now Known As",
            Self::Other => "Other",
            Self::ChildOf => "Child Of",
            Self::Unknown(_) => "Unknown",
        })
    }
}

/// A release group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Group {
    pub gid: Gid,

    pub name: String,
    pub short_name: String,

    /// `irc://server/channel`, empty when the group has no channel
    pub irc: String,
    pub url: String,
    pub picture: String,

    pub founded: Option<DateTime<Utc>>,
    pub disbanded: Option<DateTime<Utc>>,
    pub last_release: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,

    pub rating: Rating,
    /// Number of anime the group worked on
    pub anime_count: u32,
    /// Number of files the group released
    pub file_count: u32,

    pub related_groups: BTreeMap<Gid, GroupRelation>,

    pub cached: DateTime<Utc>,
}

impl Staleness for Group {
    fn max_age(&self, durations: &CacheDurations) -> Duration {
        durations.group()
    }
}

impl Group {
    /// Parses the data line of a 250 GROUP reply
    pub fn from_fields(fields: &Fields) -> Self {
        let count = |i| u32::try_from(fields.int(i)).unwrap_or(0);

        let channel = fields.str(7);
        let irc = if channel.is_empty() {
            String::new()
        } else {
            format!(
                "irc://{}/{}",
                fields.str(8),
                channel.strip_prefix('#').unwrap_or(channel)
            )
        };
        let picture = match fields.str(10) {
            "" => String::new(),
            name => format!("{IMAGE_BASE_URL}{name}"),
        };
        let related_groups = fields
            .pairs(16)
            .into_iter()
            .filter_map(|(gid, kind)| {
                let gid = gid.trim().parse::<u32>().ok()?;
                let kind = kind.trim().parse::<u32>().unwrap_or(0);
                Some((Gid(gid), GroupRelation::from_code(kind)))
            })
            .collect();

        Self {
            gid: fields.id(0),
            name: fields.str(5).to_string(),
            short_name: fields.str(6).to_string(),
            irc,
            url: fields.str(9).to_string(),
            picture,
            founded: fields.date(11),
            disbanded: fields.date(12),
            // field 13 (date flags) is not used
            last_release: fields.date(14),
            last_activity: fields.date(15),
            rating: Rating::new(fields.int(1) as f32 / 100.0, count(2)),
            anime_count: count(3),
            file_count: count(4),
            related_groups,
            cached: DateTime::<Utc>::default(),
        }
    }

    /// True if `name` is this group's name or short name, ignoring ASCII case
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name) || self.short_name.eq_ignore_ascii_case(name)
    }
}
