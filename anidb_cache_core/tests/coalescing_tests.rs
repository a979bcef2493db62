//! Tests for request coalescing
//!
//! Concurrent lookups of one key must share a single remote fetch, and
//! lookups of an already cached key must not fetch at all.

mod common;

use anidb_cache_core::{Aid, Gid};
use anidb_test_utils::{Harness, MockDocuments, MockTransport, replies};
use common::{COWBOY_AID, cowboy};
use futures::future::join_all;
use std::time::Duration;

#[tokio::test]
async fn test_concurrent_anime_lookups_share_one_fetch() {
    let harness = Harness::new(MockTransport::new(), MockDocuments::new());
    cowboy(&harness.transport, &harness.documents);
    harness.transport.set_delay(Duration::from_millis(50));
    harness.documents.set_delay(Duration::from_millis(50));

    let service = &harness.service;
    let (first, second) = tokio::join!(
        service.anime_by_id(Aid(COWBOY_AID)),
        service.anime_by_id(Aid(COWBOY_AID))
    );

    let first = first.unwrap().expect("anime 5 exists");
    let second = second.unwrap().expect("anime 5 exists");
    assert_eq!(first, second);
    assert_eq!(first.primary_title, "Cowboy Bebop");
    assert!(!first.incomplete);
    assert_eq!(harness.transport.count("ANIME"), 1);
    assert_eq!(harness.documents.count(Aid(COWBOY_AID)), 1);
}

#[tokio::test]
async fn test_many_callers_one_request() {
    let harness = Harness::new(MockTransport::new(), MockDocuments::new());
    harness.transport.set_delay(Duration::from_millis(50));
    harness
        .transport
        .expect("GROUP", replies::group(7, "Frostii", "FTI"));

    let service = &harness.service;
    let results = join_all((0..10).map(|_| service.group_by_id(Gid(7)))).await;

    for result in results {
        assert_eq!(result.unwrap().unwrap().name, "Frostii");
    }
    assert_eq!(harness.transport.count("GROUP"), 1);
    assert_eq!(service.pending_intents(), 0);
}

#[tokio::test]
async fn test_cached_lookup_is_idempotent() {
    let harness = Harness::new(MockTransport::new(), MockDocuments::new());
    cowboy(&harness.transport, &harness.documents);
    let service = &harness.service;

    let first = service.anime_by_id(Aid(COWBOY_AID)).await.unwrap();
    let second = service.anime_by_id(Aid(COWBOY_AID)).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(harness.transport.count("ANIME"), 1);
    assert_eq!(harness.documents.count(Aid(COWBOY_AID)), 1);
    assert_eq!(service.cached_anime(Aid(COWBOY_AID)).await, first);
}

#[tokio::test]
async fn test_dropped_caller_does_not_cancel_fetch() {
    let harness = Harness::new(MockTransport::new(), MockDocuments::new());
    harness.transport.set_delay(Duration::from_millis(50));
    harness
        .transport
        .expect("GROUP", replies::group(7, "Frostii", "FTI"));
    let service = &harness.service;

    let abandoned = service.group_by_id(Gid(7));
    let kept = service.group_by_id(Gid(7));
    drop(abandoned);

    assert!(kept.await.unwrap().is_some());
    assert_eq!(harness.transport.count("GROUP"), 1);
}

#[tokio::test]
async fn test_invalid_ids_resolve_without_fetching() {
    let harness = Harness::new(MockTransport::new(), MockDocuments::new());
    let service = &harness.service;

    assert_eq!(service.anime_by_id(Aid(0)).await, Ok(None));
    assert_eq!(service.group_by_id(Gid(0)).await, Ok(None));
    assert_eq!(harness.transport.total(), 0);
}
