use super::{EpisodeNumber, EpisodeRange, EpisodeType};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// A list of episode ranges
///
/// Serialized as its API string form, so partial-episode totals
/// (`parts`) do not survive a round trip through the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpisodeList(Vec<EpisodeRange>);

impl EpisodeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the comma-separated API list format and simplifies the result
    ///
    /// Unparseable entries are dropped.
    pub fn parse(s: &str) -> Self {
        let ranges = s.split(',').filter_map(EpisodeRange::parse).collect();
        Self(ranges).simplify()
    }

    pub fn from_ranges(ranges: impl IntoIterator<Item = EpisodeRange>) -> Self {
        Self(ranges.into_iter().collect())
    }

    pub fn ranges(&self) -> &[EpisodeRange] {
        &self.0
    }

    pub fn ranges_mut(&mut self) -> &mut [EpisodeRange] {
        &mut self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_infinite(&self) -> bool {
        self.0.iter().any(EpisodeRange::is_infinite)
    }

    pub fn contains_episode(&self, episode: &EpisodeNumber) -> bool {
        self.0.iter().any(|range| range.contains_episode(episode))
    }

    /// Merges touching ranges and sorts by type, then start
    pub fn simplify(self) -> Self {
        let mut ranges = self.0;
        let mut changed = true;
        while changed {
            changed = false;
            let mut merged: Vec<EpisodeRange> = Vec::with_capacity(ranges.len());
            let mut used = vec![false; ranges.len()];
            for i in 0..ranges.len() {
                if used[i] {
                    continue;
                }
                let mut current = ranges[i];
                for j in (i + 1)..ranges.len() {
                    if used[j] {
                        continue;
                    }
                    if let Some(joined) = current.merge(&ranges[j]) {
                        current = joined;
                        used[j] = true;
                        changed = true;
                    }
                }
                merged.push(current);
            }
            ranges = merged;
        }
        ranges.sort_by_key(|range| (range.kind, range.start.number));
        Self(ranges)
    }

    /// Adds all ranges of `other`, then simplifies
    pub fn add(&mut self, other: &EpisodeList) {
        let mut ranges = std::mem::take(&mut self.0);
        ranges.extend_from_slice(&other.0);
        *self = Self(ranges).simplify();
    }

    pub fn add_episode(&mut self, episode: EpisodeNumber) {
        self.add(&Self::from(episode));
    }
}

impl From<EpisodeNumber> for EpisodeList {
    fn from(episode: EpisodeNumber) -> Self {
        Self(vec![EpisodeRange::single(episode)])
    }
}

impl From<EpisodeRange> for EpisodeList {
    fn from(range: EpisodeRange) -> Self {
        Self(vec![range])
    }
}

impl fmt::Display for EpisodeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut widths: HashMap<EpisodeType, usize> = HashMap::new();
        for range in &self.0 {
            let width = widths.entry(range.kind).or_insert(1);
            *width = (*width).max(range.scale());
        }
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|range| range.format(widths.get(&range.kind).copied().unwrap_or(1)))
            .collect();
        f.write_str(&parts.join(","))
    }
}

impl Serialize for EpisodeList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EpisodeList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}
