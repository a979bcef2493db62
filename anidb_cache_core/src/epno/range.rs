use super::{EpisodeNumber, EpisodeType};
use std::fmt;

/// A range of episodes of one type, possibly open ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EpisodeRange {
    pub kind: EpisodeType,
    pub start: EpisodeNumber,
    /// `None` for an endless range such as `S8-`
    pub end: Option<EpisodeNumber>,
}

impl EpisodeRange {
    /// A range holding exactly one episode
    pub fn single(episode: EpisodeNumber) -> Self {
        Self {
            kind: episode.kind,
            start: episode,
            end: Some(episode),
        }
    }

    /// Parses the API range format (`"01"`, `"S1-"`, `"T1-T3"`)
    ///
    /// Ranges whose endpoints have different types are rejected.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split('-');
        let start = EpisodeNumber::parse(parts.next()?)?;
        let end = match parts.next() {
            None => Some(start),
            Some("") => None,
            Some(end) => Some(EpisodeNumber::parse(end)?),
        };
        if parts.next().is_some() {
            return None;
        }
        if end.is_some_and(|end| end.kind != start.kind) {
            return None;
        }
        Some(Self {
            kind: start.kind,
            start,
            end,
        })
    }

    pub fn is_infinite(&self) -> bool {
        self.end.is_none()
    }

    /// True when the range covers exactly one (possibly partial) episode
    pub fn is_single(&self) -> bool {
        self.end == Some(self.start)
    }

    /// True if the episode has this range's type and falls between its bounds
    pub fn contains_episode(&self, episode: &EpisodeNumber) -> bool {
        episode.kind == self.kind
            && episode.number >= self.start.number
            && self.end.is_none_or(|end| episode.number <= end.number)
    }

    /// True if `other` lies completely inside this range
    pub fn contains_range(&self, other: &EpisodeRange) -> bool {
        if other.kind != self.kind || other.start.number < self.start.number {
            return false;
        }
        match (self.end, other.end) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(end), Some(other_end)) => other_end.number <= end.number,
        }
    }

    /// Merges two overlapping or adjacent ranges of the same type
    pub fn merge(&self, other: &EpisodeRange) -> Option<EpisodeRange> {
        if !self.touches(other) {
            return None;
        }
        let start = if self.start.number <= other.start.number {
            self.start
        } else {
            other.start
        };
        let end = match (self.end, other.end) {
            (Some(a), Some(b)) => Some(if a.number >= b.number { a } else { b }),
            _ => None,
        };
        Some(Self {
            kind: self.kind,
            start,
            end,
        })
    }

    fn touches(&self, other: &EpisodeRange) -> bool {
        if self.kind != other.kind {
            return false;
        }
        // `+ 1` keeps merely adjacent ranges touching
        match (self.end, other.end) {
            (None, None) => true,
            (None, Some(b_end)) => b_end.number + 1 >= self.start.number,
            (Some(a_end), None) => a_end.number + 1 >= other.start.number,
            (Some(a_end), Some(b_end)) => {
                if self.start.number == other.start.number || a_end.number == b_end.number {
                    true
                } else if a_end.number < b_end.number {
                    a_end.number + 1 >= other.start.number
                } else {
                    b_end.number + 1 >= self.start.number
                }
            }
        }
    }

    /// Formats both endpoints padded to `width` digits
    pub fn format(&self, width: usize) -> String {
        match self.end {
            Some(end) if end == self.start => self.start.format(width),
            Some(end) => format!("{}-{}", self.start.format(width), end.format(width)),
            None => format!("{}-", self.start.format(width)),
        }
    }

    pub(crate) fn scale(&self) -> usize {
        let end = self.end.map_or(1, |end| end.scale());
        self.start.scale().max(end)
    }
}

impl From<EpisodeNumber> for EpisodeRange {
    fn from(episode: EpisodeNumber) -> Self {
        Self::single(episode)
    }
}

impl fmt::Display for EpisodeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(self.scale()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(s: &str) -> EpisodeRange {
        EpisodeRange::parse(s).unwrap()
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(range("01").to_string(), "1");
        assert_eq!(range("S1-").to_string(), "S1-");
        assert_eq!(range("T1-T3").to_string(), "T1-T3");
        assert!(EpisodeRange::parse("5-S3").is_none());
        assert!(EpisodeRange::parse("").is_none());
        assert!(EpisodeRange::parse("1-2-3").is_none());
    }

    #[test]
    fn test_merge() {
        let a = range("5-7");
        assert_eq!(a.merge(&range("8-12")).unwrap().to_string(), "05-12");
        assert_eq!(a.merge(&range("3-6")).unwrap().to_string(), "3-7");
        assert!(a.merge(&range("10-12")).is_none());
        assert!(a.merge(&range("S1-S3")).is_none());
        assert_eq!(
            range("S3-S10").merge(&range("S1-S3")).unwrap().to_string(),
            "S01-S10"
        );
    }

    #[test]
    fn test_merge_open_ranges() {
        assert_eq!(range("S8-").merge(&range("S7")).unwrap().to_string(), "S7-");
        assert!(range("S8-").merge(&range("S5")).is_none());
    }

    #[test]
    fn test_contains() {
        let r = range("3-6");
        assert!(r.contains_episode(&EpisodeNumber::regular(3)));
        assert!(r.contains_episode(&EpisodeNumber::regular(6)));
        assert!(!r.contains_episode(&EpisodeNumber::regular(7)));
        assert!(range("1-").contains_range(&r));
        assert!(!r.contains_range(&range("4-")));
        assert!(r.contains_range(&range("4-5")));
    }
}
