use crate::cache::{CacheDurations, Staleness};
use crate::entities::{MyListEntry, MyListSet, MyListState};
use crate::epno::EpisodeList;
use crate::ids::{Aid, Gid};
use crate::protocol::Fields;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Summary of one anime in a user's list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MyListAnime {
    pub aid: Aid,
    pub episodes_with_state: BTreeMap<MyListState, EpisodeList>,
    pub watched_episodes: EpisodeList,
    pub episodes_per_group: BTreeMap<Gid, EpisodeList>,
    pub cached: DateTime<Utc>,
}

impl Staleness for MyListAnime {
    fn max_age(&self, durations: &CacheDurations) -> Duration {
        durations.mylist_anime()
    }
}

impl MyListAnime {
    pub fn new(aid: Aid) -> Self {
        Self {
            aid,
            ..Self::default()
        }
    }

    /// Parses the data line of a 312 MYLIST reply
    ///
    /// Group names (fields 7 onward, paired with episode lists) are returned
    /// separately; the caller resolves them to ids and calls [`MyListAnime::add_group`].
    pub fn from_fields(aid: Aid, fields: &Fields) -> (Self, Vec<(String, EpisodeList)>) {
        let states = [
            MyListState::Unknown,
            MyListState::Hdd,
            MyListState::Cd,
            MyListState::Deleted,
        ];
        let episodes_with_state = states
            .into_iter()
            .enumerate()
            .map(|(i, state)| (state, EpisodeList::parse(fields.str(2 + i))))
            .collect();

        let groups: Vec<&str> = fields.iter().skip(7).collect();
        let groups = groups
            .chunks_exact(2)
            .map(|pair| (pair[0].to_string(), EpisodeList::parse(pair[1])))
            .collect();

        let summary = Self {
            aid,
            episodes_with_state,
            watched_episodes: EpisodeList::parse(fields.str(6)),
            episodes_per_group: BTreeMap::new(),
            cached: DateTime::<Utc>::default(),
        };
        (summary, groups)
    }

    /// Builds a summary from the only entry listed for the anime
    pub fn from_single_entry(entry: &MyListEntry, episodes: EpisodeList) -> Self {
        let mut summary = Self::new(entry.aid);
        summary
            .episodes_with_state
            .insert(entry.state, episodes.clone());
        if entry.date_watched.is_some() {
            summary.watched_episodes = episodes.clone();
        }
        summary.episodes_per_group.insert(entry.gid, episodes);
        summary
    }

    pub fn add_group(&mut self, gid: Gid, episodes: &EpisodeList) {
        self.episodes_per_group.entry(gid).or_default().add(episodes);
    }

    /// Records a successful list mutation of a file covering `episodes`
    ///
    /// Episodes are only ever added: other files may still cover them.
    pub fn record(&mut self, gid: Gid, episodes: &EpisodeList, set: &MyListSet) {
        self.add_group(gid, episodes);
        if let Some(state) = set.state {
            self.episodes_with_state
                .entry(state)
                .or_default()
                .add(episodes);
        }
        if set.marks_watched() {
            self.watched_episodes.add(episodes);
        }
    }
}
