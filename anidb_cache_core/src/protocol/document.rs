//! The HTTP API anime document
//!
//! Fetching and XML decoding live outside this crate; a [`DocumentSource`]
//! hands over an already deserialized [`AnimeDocument`].

use crate::ids::Aid;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Base URL for anime pictures
pub const IMAGE_BASE_URL: &str = "http://img7.anidb.net/pics/anime/";

/// Date format of document date fields
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Error reported by a document source
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Document fetch failed: {message}")]
pub struct DocumentError {
    pub message: String,
}

impl DocumentError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Stateless source of anime documents (HTTP API)
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn anime(&self, aid: Aid) -> Result<AnimeDocument, DocumentError>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimeDocument {
    /// Non-empty when the API request failed
    pub error: String,

    pub id: u32,
    pub r18: bool,
    /// "TV Series", "Movie", "OVA" and so on
    pub kind: String,
    /// Unreliable, set even when the total number is unknown
    pub episode_count: u32,
    /// YYYY-MM-DD
    pub start_date: String,
    /// YYYY-MM-DD
    pub end_date: String,

    pub titles: Vec<DocumentTitle>,
    pub url: String,
    pub description: String,
    pub ratings: DocumentRatings,
    /// Picture basename; combine with [`IMAGE_BASE_URL`]
    pub picture: String,
    pub resources: Vec<DocumentResource>,
    pub episodes: Vec<DocumentEpisode>,
}

impl AnimeDocument {
    pub fn start(&self) -> Option<DateTime<Utc>> {
        parse_date(&self.start_date)
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        parse_date(&self.end_date)
    }
}

/// A title with language and type (`main`, `official`, `short`, `synonym`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentTitle {
    pub lang: String,
    pub kind: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentRating {
    pub count: u32,
    pub rating: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentRatings {
    pub permanent: DocumentRating,
    pub temporary: DocumentRating,
    pub review: DocumentRating,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalEntity {
    pub identifiers: Vec<String>,
    pub urls: Vec<String>,
}

/// Links to a third party site; the meaning of `kind` is undocumented upstream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentResource {
    pub kind: u32,
    pub entities: Vec<ExternalEntity>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentEpisodeTitle {
    pub lang: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentEpisode {
    pub id: u32,
    /// 1 regular, 2 special, 3 credits, 4 trailer, 5 parody, 6 other
    pub kind: u32,
    /// Episode number, possibly prefixed by its type letter
    pub epno: String,
    /// Minutes
    pub length: u32,
    /// YYYY-MM-DD
    pub airdate: String,
    pub rating: f32,
    pub votes: u32,
    pub titles: Vec<DocumentEpisodeTitle>,
}

/// Parses a document date; empty or malformed dates are unknown
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        let date = parse_date("2009-04-05").unwrap();
        assert_eq!(date.to_rfc3339(), "2009-04-05T00:00:00+00:00");
        assert!(parse_date("").is_none());
        assert!(parse_date("2009-13-40").is_none());
    }

    #[test]
    fn test_partial_document_deserializes() {
        let doc: AnimeDocument =
            serde_json::from_str(r#"{"id": 5, "titles": [{"kind": "main", "title": "Foo"}]}"#)
                .unwrap();
        assert_eq!(doc.id, 5);
        assert_eq!(doc.titles[0].title, "Foo");
        assert!(doc.error.is_empty());
        assert!(doc.episodes.is_empty());
    }
}
