use crate::cache::{CacheDurations, Staleness};
use crate::entities::{Episode, Rating};
use crate::epno::{EpisodeNumber, EpisodeType};
use crate::ids::{Aid, Eid};
use crate::protocol::document::{AnimeDocument, DocumentResource, IMAGE_BASE_URL, parse_date};
use crate::protocol::Reply;
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// UDP ANIME mask: episodes, air date, end date, awards, update date
pub const ANIME_AMASK: &str = "0000980201";

/// Number of known episodes of each type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeCount {
    pub regular: u32,
    pub special: u32,
    pub credits: u32,
    pub trailer: u32,
    pub parody: u32,
    pub other: u32,
}

impl EpisodeCount {
    fn add(&mut self, kind: EpisodeType) {
        let slot = match kind {
            EpisodeType::Regular => &mut self.regular,
            EpisodeType::Special => &mut self.special,
            EpisodeType::Credits => &mut self.credits,
            EpisodeType::Trailer => &mut self.trailer,
            EpisodeType::Parody => &mut self.parody,
            EpisodeType::Other => &mut self.other,
        };
        *slot += 1;
    }
}

/// Third party sites an anime links to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    AniDB,
    AnimeNewsNetwork,
    MyAnimeList,
    AnimeNfo,
    OfficialJapanese,
    OfficialEnglish,
    WikipediaEnglish,
    WikipediaJapanese,
    SyoboiSchedule,
    AllCinema,
    Anison,
    Vndb,
    MaruMegane,
}

impl ResourceKind {
    fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            1 => Self::AnimeNewsNetwork,
            2 => Self::MyAnimeList,
            3 => Self::AnimeNfo,
            4 => Self::OfficialJapanese,
            5 => Self::OfficialEnglish,
            6 => Self::WikipediaEnglish,
            7 => Self::WikipediaJapanese,
            8 => Self::SyoboiSchedule,
            9 => Self::AllCinema,
            10 => Self::Anison,
            14 => Self::Vndb,
            15 => Self::MaruMegane,
            _ => return None,
        })
    }

    /// Builds the link from the entity identifiers; `None` for kinds that carry URLs
    fn link(self, ids: &[String]) -> Option<String> {
        let id = |i: usize| ids.get(i).map(String::as_str).unwrap_or_default();
        Some(match self {
            Self::AnimeNewsNetwork => {
                format!("http://www.animenewsnetwork.com/encyclopedia/anime.php?id={}", id(0))
            }
            Self::MyAnimeList => format!("http://myanimelist.net/anime/{}", id(0)),
            Self::AnimeNfo => format!("http://www.animenfo.com/animetitle,{},{},a.html", id(0), id(1)),
            Self::WikipediaEnglish => format!("http://en.wikipedia.org/wiki/{}", id(0)),
            Self::WikipediaJapanese => format!("http://ja.wikipedia.org/wiki/{}", id(0)),
            Self::SyoboiSchedule => format!("http://cal.syoboi.jp/tid/{}/time", id(0)),
            Self::AllCinema => format!("http://www.allcinema.net/prog/show_c.php?num_c={}", id(0)),
            Self::Anison => format!("http://anison.info/data/program/{}.html", id(0)),
            Self::Vndb => format!("http://vndb.org/v{}", id(0)),
            Self::MaruMegane => format!("http://www.anime.marumegane.com/{}.html", id(0)),
            Self::AniDB | Self::OfficialJapanese | Self::OfficialEnglish => return None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Anime {
    pub aid: Aid,
    pub r18: bool,

    /// Production type: "TV Series", "Movie", "OVA" and so on
    pub kind: String,
    /// Total number of regular episodes, 0 when unknown
    pub total_episodes: u32,
    pub episode_count: EpisodeCount,

    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,

    pub primary_title: String,
    /// One official title per language
    pub official_titles: BTreeMap<String, String>,
    pub short_titles: BTreeMap<String, Vec<String>>,
    pub synonyms: BTreeMap<String, Vec<String>>,

    pub official_url: String,
    pub picture: String,
    pub description: String,

    /// Votes of people who finished the anime
    pub votes: Rating,
    /// Votes of people still watching
    pub temporary_votes: Rating,
    pub reviews: Rating,

    pub episodes: Vec<Episode>,
    pub awards: Vec<String>,
    pub resources: BTreeMap<ResourceKind, Vec<String>>,

    /// Set when the UDP half of the lookup failed
    pub incomplete: bool,
    /// Last modification on the server
    pub updated: Option<DateTime<Utc>>,
    pub cached: DateTime<Utc>,
}

impl Staleness for Anime {
    fn max_age(&self, durations: &CacheDurations) -> Duration {
        if self.incomplete {
            durations.anime_incomplete()
        } else {
            durations.anime()
        }
    }
}

impl Anime {
    pub fn new(aid: Aid) -> Self {
        Self {
            aid,
            ..Self::default()
        }
    }

    /// True once the document half provided the anime's identity
    pub fn has_title(&self) -> bool {
        !self.primary_title.is_empty()
    }

    /// Finds the episode matching `number`
    pub fn episode(&self, number: &EpisodeNumber) -> Option<&Episode> {
        self.episodes
            .iter()
            .find(|ep| ep.number.kind == number.kind && ep.number.number == number.number)
    }

    pub fn episode_by_eid(&self, eid: Eid) -> Option<&Episode> {
        self.episodes.iter().find(|ep| ep.eid == eid)
    }

    /// Fills fields from the HTTP document
    ///
    /// Returns false when the document reports an error or describes another anime.
    pub fn populate_from_document(&mut self, doc: &AnimeDocument) -> bool {
        if !doc.error.is_empty() {
            warn!("Anime document for {} reports: {}", self.aid, doc.error);
            return false;
        }
        if doc.id != self.aid.0 {
            warn!("Requested anime {} but the document describes {}", self.aid, doc.id);
            return false;
        }

        self.r18 = doc.r18;
        self.kind = doc.kind.clone();
        // The UDP half carries more precise dates
        if self.incomplete {
            if let Some(start) = doc.start() {
                self.start_date = Some(start);
            }
            if let Some(end) = doc.end() {
                self.end_date = Some(end);
            }
        }

        for title in &doc.titles {
            match title.kind.as_str() {
                "main" => self.primary_title = title.title.clone(),
                "official" => {
                    self.official_titles
                        .insert(title.lang.clone(), title.title.clone());
                }
                "short" => self
                    .short_titles
                    .entry(title.lang.clone())
                    .or_default()
                    .push(title.title.clone()),
                "synonym" => self
                    .synonyms
                    .entry(title.lang.clone())
                    .or_default()
                    .push(title.title.clone()),
                _ => {}
            }
        }

        self.official_url = doc.url.clone();
        if !doc.picture.is_empty() {
            self.picture = format!("{IMAGE_BASE_URL}{}", doc.picture);
        }
        self.description = doc.description.clone();

        let ratings = &doc.ratings;
        self.votes = Rating::new(ratings.permanent.rating, ratings.permanent.count);
        self.temporary_votes = Rating::new(ratings.temporary.rating, ratings.temporary.count);
        self.reviews = Rating::new(ratings.review.rating, ratings.review.count);

        self.populate_resources(&doc.resources);
        self.populate_episodes(doc);

        if self.incomplete && self.end_date.is_some() {
            self.total_episodes = self.episode_count.regular;
        }
        true
    }

    fn populate_resources(&mut self, resources: &[DocumentResource]) {
        self.resources.clear();
        self.resources.insert(
            ResourceKind::AniDB,
            vec![format!("http://anidb.net/a{}", self.aid)],
        );

        for resource in resources {
            let Some(kind) = ResourceKind::from_code(resource.kind) else {
                continue;
            };
            let links = self.resources.entry(kind).or_default();
            for entity in &resource.entities {
                match kind.link(&entity.identifiers) {
                    Some(link) => links.push(link),
                    None => links.extend(entity.urls.iter().cloned()),
                }
            }
        }
    }

    fn populate_episodes(&mut self, doc: &AnimeDocument) {
        let mut episodes: Vec<Episode> = doc
            .episodes
            .iter()
            .filter_map(|ep| {
                let Some(number) = EpisodeNumber::parse(&ep.epno) else {
                    warn!("Skipping episode {} of anime {} with number '{}'", ep.id, self.aid, ep.epno);
                    return None;
                };
                Some(Episode {
                    eid: Eid(ep.id),
                    aid: self.aid,
                    number,
                    length: Duration::from_secs(u64::from(ep.length) * 60),
                    air_date: parse_date(&ep.airdate),
                    rating: Rating::new(ep.rating, ep.votes),
                    titles: ep
                        .titles
                        .iter()
                        .map(|t| (t.lang.clone(), t.title.clone()))
                        .collect(),
                    cached: DateTime::<Utc>::default(),
                })
            })
            .collect();
        episodes.sort_by_key(|ep| (ep.number.kind, ep.number.number));

        let mut counts = EpisodeCount::default();
        for ep in &episodes {
            counts.add(ep.number.kind);
        }
        self.episode_count = counts;
        self.episodes = episodes;
    }

    /// Fills fields from a 230 ANIME reply; returns false for any other reply
    pub fn populate_from_reply(&mut self, reply: &Reply) -> bool {
        if reply.code != 230 {
            return false;
        }
        let fields = reply.fields();
        self.total_episodes = u32::try_from(fields.int(0)).unwrap_or(0);
        if let Some(start) = fields.date(1) {
            self.start_date = Some(start);
        }
        if let Some(end) = fields.date(2) {
            self.end_date = Some(end);
        }
        let awards: Vec<String> = fields.list(3).into_iter().map(str::to_string).collect();
        if !awards.is_empty() {
            self.awards = awards;
        }
        if let Some(updated) = fields.date(4) {
            self.updated = Some(updated);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Cacheable;
    use crate::protocol::document::{
        DocumentEpisode, DocumentRating, DocumentTitle, ExternalEntity,
    };
    use chrono::TimeDelta;

    fn document() -> AnimeDocument {
        AnimeDocument {
            id: 5,
            kind: "TV Series".to_string(),
            end_date: "2001-03-31".to_string(),
            titles: vec![
                DocumentTitle {
                    lang: "x-jat".to_string(),
                    kind: "main".to_string(),
                    title: "Seikai no Monshou".to_string(),
                },
                DocumentTitle {
                    lang: "en".to_string(),
                    kind: "official".to_string(),
                    title: "Crest of the Stars".to_string(),
                },
                DocumentTitle {
                    lang: "en".to_string(),
                    kind: "short".to_string(),
                    title: "CotS".to_string(),
                },
            ],
            picture: "5.jpg".to_string(),
            resources: vec![
                DocumentResource {
                    kind: 2,
                    entities: vec![ExternalEntity {
                        identifiers: vec!["290".to_string()],
                        urls: vec![],
                    }],
                },
                DocumentResource {
                    kind: 4,
                    entities: vec![ExternalEntity {
                        identifiers: vec![],
                        urls: vec!["http://example.jp".to_string()],
                    }],
                },
            ],
            episodes: vec![
                DocumentEpisode {
                    id: 12,
                    kind: 1,
                    epno: "2".to_string(),
                    length: 25,
                    ..DocumentEpisode::default()
                },
                DocumentEpisode {
                    id: 11,
                    kind: 1,
                    epno: "1".to_string(),
                    airdate: "2000-01-02".to_string(),
                    ..DocumentEpisode::default()
                },
                DocumentEpisode {
                    id: 20,
                    kind: 2,
                    epno: "S1".to_string(),
                    ..DocumentEpisode::default()
                },
            ],
            ratings: crate::protocol::document::DocumentRatings {
                permanent: DocumentRating {
                    count: 100,
                    rating: 8.2,
                },
                ..Default::default()
            },
            ..AnimeDocument::default()
        }
    }

    #[test]
    fn test_populate_from_document() {
        let mut anime = Anime::new(Aid(5));
        anime.incomplete = true;
        assert!(anime.populate_from_document(&document()));

        assert_eq!(anime.primary_title, "Seikai no Monshou");
        assert_eq!(anime.official_titles["en"], "Crest of the Stars");
        assert_eq!(anime.short_titles["en"], vec!["CotS"]);
        assert_eq!(anime.picture, "http://img7.anidb.net/pics/anime/5.jpg");
        assert_eq!(anime.votes, Rating::new(8.2, 100));
        assert_eq!(
            anime.resources[&ResourceKind::MyAnimeList],
            vec!["http://myanimelist.net/anime/290"]
        );
        assert_eq!(
            anime.resources[&ResourceKind::OfficialJapanese],
            vec!["http://example.jp"]
        );
        assert_eq!(anime.resources[&ResourceKind::AniDB], vec!["http://anidb.net/a5"]);

        let eids: Vec<u32> = anime.episodes.iter().map(|ep| ep.eid.0).collect();
        assert_eq!(eids, vec![11, 12, 20]);
        assert_eq!(anime.episode_count.regular, 2);
        assert_eq!(anime.episode_count.special, 1);
        assert_eq!(anime.episodes[1].length, Duration::from_secs(25 * 60));
        // UDP half missing and the anime has ended
        assert_eq!(anime.total_episodes, 2);
    }

    #[test]
    fn test_document_for_other_anime_is_rejected() {
        let mut anime = Anime::new(Aid(6));
        assert!(!anime.populate_from_document(&document()));

        let mut doc = document();
        doc.error = "Banned".to_string();
        assert!(!Anime::new(Aid(5)).populate_from_document(&doc));
    }

    #[test]
    fn test_populate_from_reply() {
        let mut anime = Anime::new(Aid(5));
        let reply = Reply::new(230, "ANIME").with_line("26|954547200|0|Award A'Award B|1234567890");
        assert!(anime.populate_from_reply(&reply));
        assert_eq!(anime.total_episodes, 26);
        assert!(anime.start_date.is_some());
        assert!(anime.end_date.is_none());
        assert_eq!(anime.awards, vec!["Award A", "Award B"]);
        assert!(anime.updated.is_some());

        assert!(!anime.populate_from_reply(&Reply::new(330, "NO SUCH ANIME")));
    }

    #[test]
    fn test_incomplete_anime_goes_stale_sooner() {
        let durations = CacheDurations::default();
        let now = Utc::now();
        let mut anime = Anime::new(Aid(1));
        anime.touch(now);
        let e = TimeDelta::seconds(1);

        anime.incomplete = true;
        assert!(!anime.is_stale_at(&durations, now + TimeDelta::days(1) - e));
        assert!(anime.is_stale_at(&durations, now + TimeDelta::days(1) + e));

        anime.incomplete = false;
        assert!(!anime.is_stale_at(&durations, now + TimeDelta::days(7) - e));
        assert!(anime.is_stale_at(&durations, now + TimeDelta::days(7) + e));
    }
}
