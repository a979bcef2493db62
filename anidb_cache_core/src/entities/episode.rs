use crate::cache::{CacheDurations, Staleness};
use crate::entities::Rating;
use crate::epno::EpisodeNumber;
use crate::ids::{Aid, Eid};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub eid: Eid,
    /// The anime this episode belongs to
    pub aid: Aid,
    #[serde(with = "episode_number")]
    pub number: EpisodeNumber,
    /// Rounded to minutes upstream
    pub length: Duration,
    pub air_date: Option<DateTime<Utc>>,
    pub rating: Rating,
    /// One title per language
    pub titles: BTreeMap<String, String>,
    pub cached: DateTime<Utc>,
}

impl Staleness for Episode {
    fn max_age(&self, durations: &CacheDurations) -> Duration {
        durations.episode()
    }
}

/// Episode numbers are stored in their API string form
mod episode_number {
    use crate::epno::EpisodeNumber;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(number: &EpisodeNumber, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&number.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<EpisodeNumber, D::Error> {
        let s = String::deserialize(deserializer)?;
        EpisodeNumber::parse(&s).ok_or_else(|| D::Error::custom(format!("bad episode number '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Cacheable;
    use crate::epno::EpisodeType;
    use chrono::TimeDelta;

    fn episode() -> Episode {
        Episode {
            eid: Eid(100),
            aid: Aid(7),
            number: EpisodeNumber::new(EpisodeType::Special, 2),
            length: Duration::from_secs(24 * 60),
            air_date: None,
            rating: Rating::new(8.5, 10),
            titles: BTreeMap::from([("en".to_string(), "Pilot".to_string())]),
            cached: DateTime::<Utc>::default(),
        }
    }

    #[test]
    fn test_episode_staleness_threshold() {
        let durations = CacheDurations::default();
        let mut ep = episode();
        let now = Utc::now();
        ep.touch(now);

        let week = TimeDelta::days(7);
        let e = TimeDelta::seconds(1);
        assert!(!ep.is_stale_at(&durations, now + week - e));
        assert!(ep.is_stale_at(&durations, now + week + e));
    }

    #[test]
    fn test_episode_number_stored_as_string() {
        let json = serde_json::to_value(episode()).unwrap();
        assert_eq!(json["number"], "S2");
        let back: Episode = serde_json::from_value(json).unwrap();
        assert_eq!(back, episode());
    }
}
