//! Tests for anime and episode lookups
//!
//! Covers the two-transport anime fetch, invalid-key markers, staleness and
//! the episode-to-anime linkage.

mod common;

use anidb_cache_core::cache::Link;
use anidb_cache_core::{Aid, Anime, Eid, cache_key};
use anidb_test_utils::{AnimeDocumentBuilder, Harness, MockDocuments, MockTransport, replies};
use chrono::{TimeDelta, Utc};
use common::{COWBOY_AID, COWBOY_FIRST_EID, END, START, cowboy};

#[tokio::test]
async fn test_anime_is_cached_with_episodes() {
    let harness = Harness::new(MockTransport::new(), MockDocuments::new());
    cowboy(&harness.transport, &harness.documents);
    let service = &harness.service;

    let anime = service.anime_by_id(Aid(COWBOY_AID)).await.unwrap().unwrap();
    assert_eq!(anime.episodes.len(), 3);
    assert_eq!(anime.total_episodes, 3);
    assert_eq!(
        harness.transport.sent_of("ANIME")[0].params.get("aid"),
        Some("5")
    );

    // Episodes and their linkage are written alongside the anime
    let episode = service
        .cached_episode(Eid(COWBOY_FIRST_EID))
        .await
        .expect("episode cached with its anime");
    assert_eq!(episode.aid, Aid(COWBOY_AID));
    let link: Link<Aid> = service
        .cache()
        .get(&cache_key!["aid", "by-eid", COWBOY_FIRST_EID])
        .await
        .unwrap();
    assert_eq!(link.value, Aid(COWBOY_AID));

    let episode = service.episode_by_id(Eid(COWBOY_FIRST_EID + 1)).await.unwrap().unwrap();
    assert_eq!(episode.number.number, 2);
    assert_eq!(harness.transport.count("EPISODE"), 0);
}

#[tokio::test]
async fn test_unknown_anime_is_marked_invalid() {
    let harness = Harness::new(MockTransport::new(), MockDocuments::new());
    harness.transport.expect("ANIME", replies::no_such_anime());
    let service = &harness.service;

    assert_eq!(service.anime_by_id(Aid(6)).await, Ok(None));
    assert_eq!(service.anime_by_id(Aid(6)).await, Ok(None));

    assert_eq!(harness.transport.count("ANIME"), 1);
    assert_eq!(harness.documents.count(Aid(6)), 1);
    assert!(
        service
            .cache()
            .stat(&cache_key!["invalid", "aid", 6])
            .await
            .is_some()
    );
}

#[tokio::test]
async fn test_expired_invalid_marker_allows_refetch() {
    let harness = Harness::new(MockTransport::new(), MockDocuments::new());
    harness.documents.insert(
        AnimeDocumentBuilder::new(6, "Trigun")
            .episodes(600, 2)
            .build(),
    );
    harness
        .transport
        .always("ANIME", replies::anime(2, common::START, common::END));
    let service = &harness.service;

    let key = cache_key!["aid", 6];
    service
        .cache()
        .mark_invalid_at(&key, Utc::now() - TimeDelta::minutes(61))
        .await;

    let anime = service.anime_by_id(Aid(6)).await.unwrap();
    assert_eq!(anime.map(|anime| anime.primary_title), Some("Trigun".to_string()));
    assert_eq!(harness.transport.count("ANIME"), 1);
    assert!(service.cache().stat(&key.invalid_marker()).await.is_none());
}

#[tokio::test]
async fn test_live_invalid_marker_short_circuits() {
    let harness = Harness::new(MockTransport::new(), MockDocuments::new());
    cowboy(&harness.transport, &harness.documents);
    let service = &harness.service;

    service
        .cache()
        .mark_invalid_at(&cache_key!["aid", COWBOY_AID], Utc::now() - TimeDelta::minutes(30))
        .await;

    assert_eq!(service.anime_by_id(Aid(COWBOY_AID)).await, Ok(None));
    assert_eq!(harness.transport.total(), 0);
    assert_eq!(harness.documents.count(Aid(COWBOY_AID)), 0);
}

#[tokio::test]
async fn test_anime_without_udp_half_is_incomplete() {
    let harness = Harness::new(MockTransport::new(), MockDocuments::new());
    cowboy(&harness.transport, &harness.documents);
    harness.transport.always_silent("ANIME");
    let service = &harness.service;

    let anime = service.anime_by_id(Aid(COWBOY_AID)).await.unwrap().unwrap();
    assert!(anime.incomplete);
    assert_eq!(anime.primary_title, "Cowboy Bebop");
    assert_eq!(anime.episodes.len(), 3);
}

#[tokio::test]
async fn test_stale_anime_is_refetched() {
    let harness = Harness::new(MockTransport::new(), MockDocuments::new());
    cowboy(&harness.transport, &harness.documents);
    let service = &harness.service;
    let key = cache_key!["aid", COWBOY_AID];

    service.anime_by_id(Aid(COWBOY_AID)).await.unwrap();
    let mut cached: Anime = service.cache().get(&key).await.unwrap();
    cached.cached = Utc::now() - TimeDelta::days(8);
    service.cache().put(&key, &cached).await;

    let anime = service.anime_by_id(Aid(COWBOY_AID)).await.unwrap().unwrap();
    assert!(anime.cached > Utc::now() - TimeDelta::minutes(1));
    assert_eq!(harness.transport.count("ANIME"), 2);
    assert_eq!(harness.documents.count(Aid(COWBOY_AID)), 2);
}

#[tokio::test]
async fn test_stale_copy_served_when_refresh_fails() {
    let harness = Harness::new(MockTransport::new(), MockDocuments::new());
    cowboy(&harness.transport, &harness.documents);
    let service = &harness.service;
    let key = cache_key!["aid", COWBOY_AID];

    service.anime_by_id(Aid(COWBOY_AID)).await.unwrap();
    let mut cached: Anime = service.cache().get(&key).await.unwrap();
    cached.cached = Utc::now() - TimeDelta::days(8);
    service.cache().put(&key, &cached).await;
    harness.documents.fail(Aid(COWBOY_AID), "HTTP 503");

    let anime = service.anime_by_id(Aid(COWBOY_AID)).await.unwrap();
    assert_eq!(anime, Some(cached));
}

#[tokio::test]
async fn test_stale_episode_linkage_is_replaced() {
    let harness = Harness::new(MockTransport::new(), MockDocuments::new());
    cowboy(&harness.transport, &harness.documents);
    harness.documents.insert(
        AnimeDocumentBuilder::new(7, "Samurai Champloo")
            .episode(900, "1")
            .build(),
    );
    harness.transport.expect("EPISODE", replies::episode(900, 7));
    let service = &harness.service;

    // The linkage claims episode 900 belongs to anime 5, which does not list it
    let link_key = cache_key!["aid", "by-eid", 900];
    service
        .cache()
        .set(&link_key, &mut Link::new(Aid(COWBOY_AID)))
        .await;

    let episode = service.episode_by_id(Eid(900)).await.unwrap().unwrap();
    assert_eq!(episode.aid, Aid(7));
    assert_eq!(harness.transport.count("EPISODE"), 1);

    let link: Link<Aid> = service.cache().get(&link_key).await.unwrap();
    assert_eq!(link.value, Aid(7));
}

#[tokio::test]
async fn test_linkage_to_missing_anime_falls_back_to_episode_query() {
    let harness = Harness::new(MockTransport::new(), MockDocuments::new());
    harness.documents.insert(
        AnimeDocumentBuilder::new(7, "Samurai Champloo")
            .episode(900, "1")
            .build(),
    );
    harness.transport.expect("ANIME", replies::no_such_anime());
    harness.transport.expect("ANIME", replies::anime(26, START, END));
    harness.transport.expect("EPISODE", replies::episode(900, 7));
    let service = &harness.service;

    let link_key = cache_key!["aid", "by-eid", 900];
    service.cache().set(&link_key, &mut Link::new(Aid(999))).await;

    let episode = service.episode_by_id(Eid(900)).await.unwrap().unwrap();
    assert_eq!(episode.aid, Aid(7));
    assert_eq!(harness.transport.count("EPISODE"), 1);
    let link: Link<Aid> = service.cache().get(&link_key).await.unwrap();
    assert_eq!(link.value, Aid(7));

    assert_eq!(service.episode_by_id(Eid(900)).await, Ok(Some(episode)));
    assert_eq!(harness.transport.count("EPISODE"), 1);
}

#[tokio::test]
async fn test_episode_missing_from_both_animes() {
    let harness = Harness::new(MockTransport::new(), MockDocuments::new());
    cowboy(&harness.transport, &harness.documents);
    harness.documents.insert(
        AnimeDocumentBuilder::new(7, "Samurai Champloo")
            .episode(901, "1")
            .build(),
    );
    harness.transport.expect("EPISODE", replies::episode(900, 7));
    let service = &harness.service;

    let link_key = cache_key!["aid", "by-eid", 900];
    service
        .cache()
        .set(&link_key, &mut Link::new(Aid(COWBOY_AID)))
        .await;

    assert_eq!(service.episode_by_id(Eid(900)).await, Ok(None));
    assert_eq!(harness.transport.count("EPISODE"), 1);
    assert!(service.cache().stat(&link_key).await.is_none());
}

#[tokio::test]
async fn test_unknown_episode() {
    let harness = Harness::new(MockTransport::new(), MockDocuments::new());
    harness.transport.expect("EPISODE", replies::no_such_episode());
    let service = &harness.service;

    assert_eq!(service.episode_by_id(Eid(12345)).await, Ok(None));
    assert_eq!(service.episode_by_id(Eid(12345)).await, Ok(None));
    assert_eq!(harness.transport.count("EPISODE"), 1);
}
