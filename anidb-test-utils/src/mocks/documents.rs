//! Scripted HTTP document source

use anidb_cache_core::Aid;
use anidb_cache_core::protocol::document::DocumentError;
use anidb_cache_core::protocol::{AnimeDocument, DocumentSource};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct MockBehavior {
    documents: HashMap<Aid, Result<AnimeDocument, String>>,
    requests: Vec<Aid>,
    delay: Duration,
}

/// In-process [`DocumentSource`]
///
/// Anime without a scripted document get an error document, the way the
/// HTTP API answers for unknown ids.
#[derive(Clone, Default)]
pub struct MockDocuments {
    behavior: Arc<Mutex<MockBehavior>>,
}

impl MockDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `document` for its anime id
    pub fn insert(&self, document: AnimeDocument) {
        let aid = Aid(document.id);
        self.behavior
            .lock()
            .unwrap()
            .documents
            .insert(aid, Ok(document));
    }

    /// Fails requests for `aid` as if the HTTP request itself broke
    pub fn fail(&self, aid: Aid, message: &str) {
        self.behavior
            .lock()
            .unwrap()
            .documents
            .insert(aid, Err(message.to_string()));
    }

    /// Holds every document back for `delay`
    pub fn set_delay(&self, delay: Duration) {
        self.behavior.lock().unwrap().delay = delay;
    }

    /// How many times the document of `aid` was requested
    pub fn count(&self, aid: Aid) -> usize {
        self.behavior
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|&&requested| requested == aid)
            .count()
    }
}

#[async_trait]
impl DocumentSource for MockDocuments {
    async fn anime(&self, aid: Aid) -> Result<AnimeDocument, DocumentError> {
        let (result, delay) = {
            let mut behavior = self.behavior.lock().unwrap();
            behavior.requests.push(aid);
            let result = behavior.documents.get(&aid).cloned().unwrap_or_else(|| {
                Ok(AnimeDocument {
                    error: "Anime not found".to_string(),
                    ..AnimeDocument::default()
                })
            });
            (result, behavior.delay)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result.map_err(DocumentError::new)
    }
}
