//! HTTP API anime documents

use anidb_cache_core::protocol::AnimeDocument;
use anidb_cache_core::protocol::document::{DocumentEpisode, DocumentEpisodeTitle, DocumentTitle};

/// Builds an [`AnimeDocument`] with a main title and regular episodes
pub struct AnimeDocumentBuilder {
    document: AnimeDocument,
}

impl AnimeDocumentBuilder {
    pub fn new(aid: u32, title: &str) -> Self {
        Self {
            document: AnimeDocument {
                id: aid,
                kind: "TV Series".to_string(),
                start_date: "2009-01-01".to_string(),
                end_date: "2009-12-31".to_string(),
                titles: vec![DocumentTitle {
                    lang: "x-jat".to_string(),
                    kind: "main".to_string(),
                    title: title.to_string(),
                }],
                ..AnimeDocument::default()
            },
        }
    }

    pub fn official_title(mut self, lang: &str, title: &str) -> Self {
        self.document.titles.push(DocumentTitle {
            lang: lang.to_string(),
            kind: "official".to_string(),
            title: title.to_string(),
        });
        self
    }

    /// Adds an episode; `epno` may carry a type prefix such as `S1`
    pub fn episode(mut self, eid: u32, epno: &str) -> Self {
        self.document.episodes.push(DocumentEpisode {
            id: eid,
            kind: if epno.starts_with(|c: char| c.is_ascii_digit()) { 1 } else { 2 },
            epno: epno.to_string(),
            length: 24,
            airdate: "2009-01-01".to_string(),
            titles: vec![DocumentEpisodeTitle {
                lang: "en".to_string(),
                title: format!("Episode {epno}"),
            }],
            ..DocumentEpisode::default()
        });
        self
    }

    /// Adds regular episodes `1..=count` with ids starting at `first_eid`
    pub fn episodes(mut self, first_eid: u32, count: u32) -> Self {
        for n in 0..count {
            self = self.episode(first_eid + n, &(n + 1).to_string());
        }
        self
    }

    pub fn build(self) -> AnimeDocument {
        self.document
    }
}
