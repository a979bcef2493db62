//! Test utilities for the AniDB cache layer
//!
//! This crate provides scripted stand-ins for the UDP transport and the HTTP
//! document source, builders for API replies and documents, and a helper to
//! assemble an [`AniDB`] service wired to them.

pub mod builders;
pub mod mocks;

use anidb_cache_core::security::{Credentials, MemoryCredentials};
use anidb_cache_core::{AniDB, Config, MemoryStore, Store};
use std::sync::Arc;

// Re-export commonly used types
pub use builders::{AnimeDocumentBuilder, FileLineBuilder, replies};
pub use mocks::{MockDocuments, MockTransport, SESSION, SentRequest};

/// Routes `log` output through the test harness; safe to call repeatedly
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Configuration without pacing, so tests are not held up by the throttle
///
/// Timeouts are short and retries few; combine with a paused clock when a
/// test exercises the backoff.
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.dispatch.min_interval_ms = 0;
    config.dispatch.max_interval_ms = 0;
    config.dispatch.request_timeout_ms = 200;
    config.dispatch.max_retries = 2;
    config.dispatch.initial_backoff_ms = 10;
    config.dispatch.max_backoff_ms = 40;
    config.fetch_timeout_secs = 5;
    config
}

/// Everything a service under test is wired to
pub struct Harness {
    pub service: AniDB,
    pub store: Arc<MemoryStore>,
    pub transport: MockTransport,
    pub documents: MockDocuments,
    pub credentials: Arc<MemoryCredentials>,
}

impl Harness {
    /// A service logged in as `user`/`secret` against the given mocks
    pub fn new(transport: MockTransport, documents: MockDocuments) -> Self {
        Self::with_credentials(
            transport,
            documents,
            MemoryCredentials::with(Credentials::new("user", "secret")),
        )
    }

    /// A service without stored credentials
    pub fn anonymous(transport: MockTransport, documents: MockDocuments) -> Self {
        Self::with_credentials(transport, documents, MemoryCredentials::new())
    }

    fn with_credentials(
        transport: MockTransport,
        documents: MockDocuments,
        credentials: MemoryCredentials,
    ) -> Self {
        init_logging();
        let store = Arc::new(MemoryStore::new());
        let credentials = Arc::new(credentials);
        let service = AniDB::new(
            fast_config(),
            store.clone() as Arc<dyn Store>,
            Arc::new(transport.clone()),
            Arc::new(documents.clone()),
            credentials.clone(),
        );
        Self {
            service,
            store,
            transport,
            documents,
            credentials,
        }
    }
}
