//! Shared fixtures for the integration tests

#![allow(dead_code)]

use anidb_test_utils::{AnimeDocumentBuilder, Harness, MockDocuments, MockTransport, replies};

pub const COWBOY_AID: u32 = 5;
pub const COWBOY_FIRST_EID: u32 = 100;
pub const START: i64 = 1_230_768_000;
pub const END: i64 = 1_262_304_000;

/// Serves anime 5 with episodes 100 through 102 over both APIs
pub fn cowboy(transport: &MockTransport, documents: &MockDocuments) {
    documents.insert(
        AnimeDocumentBuilder::new(COWBOY_AID, "Cowboy Bebop")
            .official_title("en", "Cowboy Bebop")
            .episodes(COWBOY_FIRST_EID, 3)
            .build(),
    );
    transport.always("ANIME", replies::anime(3, START, END));
}

/// A logged-in service whose user is `user` (uid 42)
pub fn with_user() -> Harness {
    let harness = Harness::new(MockTransport::new(), MockDocuments::new());
    harness.transport.always("USER", replies::user(42, "user"));
    harness
}
