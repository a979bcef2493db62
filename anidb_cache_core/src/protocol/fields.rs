//! Field access for `|`-delimited reply data lines

use chrono::{DateTime, TimeZone, Utc};

/// The fields of one reply data line
///
/// Accessors never fail: missing or unparseable numbers read as zero, and a
/// zero date means unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(Vec<String>);

impl Fields {
    pub fn parse(line: &str) -> Self {
        Self(line.split('|').map(decode_value).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Field `i`, or the empty string when absent
    pub fn str(&self, i: usize) -> &str {
        self.0.get(i).map(String::as_str).unwrap_or("")
    }

    /// Field `i` as an integer, zero on failure
    pub fn int(&self, i: usize) -> i64 {
        self.str(i).trim().parse().unwrap_or(0)
    }

    /// Field `i` as an id, zero when out of range
    pub fn id<T: From<u32>>(&self, i: usize) -> T {
        T::from(u32::try_from(self.int(i)).unwrap_or(0))
    }

    /// Field `i` as a unix timestamp; zero means unknown
    pub fn date(&self, i: usize) -> Option<DateTime<Utc>> {
        match self.int(i) {
            0 => None,
            secs => Utc.timestamp_opt(secs, 0).single(),
        }
    }

    /// Field `i` split on `'`, without empty entries
    pub fn list(&self, i: usize) -> Vec<&str> {
        self.str(i).split('\'').filter(|s| !s.is_empty()).collect()
    }

    /// Field `i` split on `'`, each entry split on `,`
    pub fn pairs(&self, i: usize) -> Vec<(&str, &str)> {
        self.list(i)
            .into_iter()
            .filter_map(|entry| entry.split_once(','))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Reverses the server's value escaping: `<br />` is a newline and a backtick a quote
fn decode_value(value: &str) -> String {
    value.replace("<br />", "\n").replace('`', "'")
}
