//! AniDB episode numbers, ranges and lists
//!
//! The API describes episodes as strings like `12`, `S2` or `1.1`, ranges as
//! `S3-S6` or `8-` (open ended), and lists as comma-separated ranges. Files
//! spanning several episodes and list summaries are expressed in these terms.

mod list;
mod range;

pub use list::EpisodeList;
pub use range::EpisodeRange;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Episode category, ordered the way AniDB sorts them
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EpisodeType {
    Regular,
    Special,
    Credits,
    Trailer,
    Parody,
    Other,
}

impl EpisodeType {
    /// The prefix used in episode strings (empty for regular episodes)
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Regular => "",
            Self::Special => "S",
            Self::Credits => "C",
            Self::Trailer => "T",
            Self::Parody => "P",
            Self::Other => "O",
        }
    }

    fn from_prefix(prefix: char) -> Option<Self> {
        match prefix {
            'S' => Some(Self::Special),
            'C' => Some(Self::Credits),
            'T' => Some(Self::Trailer),
            'P' => Some(Self::Parody),
            'O' => Some(Self::Other),
            _ => None,
        }
    }
}

/// A single episode, possibly only a part of one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EpisodeNumber {
    pub kind: EpisodeType,
    pub number: u32,
    /// `None` for a whole episode
    pub part: Option<u32>,
    /// Total number of parts when known, 0 otherwise
    pub parts: u32,
}

impl EpisodeNumber {
    /// A whole episode
    pub fn new(kind: EpisodeType, number: u32) -> Self {
        Self {
            kind,
            number,
            part: None,
            parts: 0,
        }
    }

    /// A whole regular episode
    pub fn regular(number: u32) -> Self {
        Self::new(EpisodeType::Regular, number)
    }

    /// Parses the API episode format (`"1"`, `"S2"`, `"03"`, `"1.1"`)
    pub fn parse(s: &str) -> Option<Self> {
        let (base, part) = match s.split_once('.') {
            None => (s, None),
            Some((base, part)) => {
                if part.contains('.') {
                    return None;
                }
                (base, Some(part.parse::<u32>().unwrap_or(0)))
            }
        };

        if let Ok(number) = base.parse::<u32>() {
            return Some(Self {
                kind: EpisodeType::Regular,
                number,
                part,
                parts: 0,
            });
        }

        let prefix = base.chars().next()?;
        let kind = EpisodeType::from_prefix(prefix)?;
        let number = base[prefix.len_utf8()..].parse::<u32>().ok()?;
        Some(Self {
            kind,
            number,
            part,
            parts: 0,
        })
    }

    /// True if `other` is this episode, or a part of it when this is a whole episode
    pub fn contains(&self, other: &EpisodeNumber) -> bool {
        let same = self.kind == other.kind && self.number == other.number;
        match self.part {
            None => same,
            Some(part) => same && other.part == Some(part),
        }
    }

    /// Formats with the number zero-padded to `width` digits
    pub fn format(&self, width: usize) -> String {
        let prefix = self.kind.prefix();
        match self.part {
            None => format!("{prefix}{:0width$}", self.number),
            Some(part) if self.parts != 0 => {
                let fraction = f64::from(self.number) + f64::from(part) / f64::from(self.parts);
                format!("{prefix}{fraction:0width$.2}")
            }
            Some(part) => format!("{prefix}{:0width$}.{part}", self.number),
        }
    }

    pub(crate) fn scale(&self) -> usize {
        digits(self.number)
    }
}

impl fmt::Display for EpisodeNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(1))
    }
}

/// Number of decimal digits needed to print `n`
fn digits(n: u32) -> usize {
    n.checked_ilog10().map_or(1, |log| log as usize + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_episode() {
        assert_eq!(EpisodeNumber::parse("1"), Some(EpisodeNumber::regular(1)));
        assert_eq!(
            EpisodeNumber::parse("S2"),
            Some(EpisodeNumber::new(EpisodeType::Special, 2))
        );
        assert_eq!(EpisodeNumber::parse("03"), Some(EpisodeNumber::regular(3)));
        assert_eq!(EpisodeNumber::parse(""), None);
        assert_eq!(EpisodeNumber::parse("X4"), None);
        assert_eq!(EpisodeNumber::parse("1.2.3"), None);
    }

    #[test]
    fn test_partial_episode_formatting() {
        let mut first = EpisodeNumber::parse("1.0").unwrap();
        let mut second = EpisodeNumber::parse("1.1").unwrap();
        assert_eq!(first.part, Some(0));
        assert_eq!(first.to_string(), "1.0");
        assert_eq!(second.to_string(), "1.1");

        first.parts = 2;
        second.parts = 2;
        assert_eq!(first.to_string(), "1.00");
        assert_eq!(second.to_string(), "1.50");
    }

    #[test]
    fn test_format_width() {
        let ep = EpisodeNumber::new(EpisodeType::Credits, 7);
        assert_eq!(ep.format(2), "C07");
        assert_eq!(ep.format(1), "C7");
    }

    #[test]
    fn test_whole_episode_contains_parts() {
        let whole = EpisodeNumber::regular(4);
        let mut part = whole;
        part.part = Some(1);

        assert!(whole.contains(&part));
        assert!(!part.contains(&whole));
        assert!(!whole.contains(&EpisodeNumber::new(EpisodeType::Special, 4)));
    }

    #[test]
    fn test_digits() {
        assert_eq!(digits(0), 1);
        assert_eq!(digits(9), 1);
        assert_eq!(digits(10), 2);
        assert_eq!(digits(1000), 4);
    }
}
