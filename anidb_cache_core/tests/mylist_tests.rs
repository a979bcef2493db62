//! Tests for list lookups and mutations
//!
//! The current user (uid 42) is resolved from the stored credentials before
//! any list command goes out.

mod common;

use anidb_cache_core::entities::MyListState;
use anidb_cache_core::{
    Aid, Eid, EpisodeList, Fid, File, Gid, Lid, MyListEntry, MyListSet, Uid, cache_key,
};
use anidb_test_utils::{Harness, MockDocuments, MockTransport, replies};
use common::{COWBOY_AID, COWBOY_FIRST_EID, cowboy, with_user};

fn file() -> File {
    File {
        fid: Fid(10),
        aid: Aid(COWBOY_AID),
        eid: Eid(COWBOY_FIRST_EID),
        gid: Gid(7),
        episode_number: EpisodeList::parse("1"),
        ..File::default()
    }
}

fn watched_on_hdd() -> MyListSet {
    MyListSet {
        state: Some(MyListState::Hdd),
        watched: Some(true),
        ..MyListSet::default()
    }
}

#[tokio::test]
async fn test_add_records_entry_everywhere() {
    let harness = with_user();
    harness.transport.expect("MYLISTADD", replies::mylist_added(900));
    let service = &harness.service;

    let lid = service.my_list_add(&file(), watched_on_hdd()).await;
    assert_eq!(lid, Ok(Some(Lid(900))));

    let request = &harness.transport.sent_of("MYLISTADD")[0];
    assert_eq!(request.params.get("fid"), Some("10"));
    assert_eq!(request.params.get("state"), Some("1"));
    assert_eq!(request.params.get("viewed"), Some("1"));
    assert!(!request.params.contains("edit"));
    assert_eq!(harness.transport.count("USER"), 1);

    let cached = service.cached_file(Fid(10)).await.unwrap();
    assert_eq!(cached.lid.get(&Uid(42)), Some(&Lid(900)));

    let summary = service
        .user_my_list_anime(Uid(42), Aid(COWBOY_AID))
        .await
        .expect("summary created by the add");
    assert_eq!(summary.episodes_per_group[&Gid(7)], EpisodeList::parse("1"));
    assert_eq!(summary.episodes_with_state[&MyListState::Hdd], EpisodeList::parse("1"));
    assert_eq!(summary.watched_episodes, EpisodeList::parse("1"));

    // The file-to-entry linkage leads straight to the entry
    harness
        .transport
        .expect("MYLIST", replies::mylist_entry(900, 10, COWBOY_FIRST_EID, COWBOY_AID, 7));
    let entry = service.my_list_by_fid(Fid(10)).await.unwrap().unwrap();
    assert_eq!(entry.lid, Lid(900));
    assert_eq!(
        harness.transport.sent_of("MYLIST")[0].params.get("lid"),
        Some("900")
    );
}

#[tokio::test]
async fn test_add_of_listed_file_yields_existing_entry() {
    let harness = with_user();
    harness.transport.expect(
        "MYLISTADD",
        replies::mylist_already_listed(901, 10, COWBOY_FIRST_EID, COWBOY_AID, 7),
    );
    let service = &harness.service;

    let lid = service.my_list_add(&file(), MyListSet::default()).await;
    assert_eq!(lid, Ok(Some(Lid(901))));

    let entry = service.my_list_by_lid(Lid(901)).await.unwrap().unwrap();
    assert_eq!(entry.fid, Fid(10));
    assert_eq!(harness.transport.count("MYLIST"), 0);
}

#[tokio::test]
async fn test_edit_uses_known_lid() {
    let harness = with_user();
    harness.transport.expect("MYLISTADD", replies::mylist_added(900));
    harness.transport.expect("MYLISTADD", replies::mylist_edited(1));
    let service = &harness.service;

    service.my_list_add(&file(), MyListSet::default()).await.unwrap();
    let listed = service.cached_file(Fid(10)).await.unwrap();

    let set = MyListSet {
        storage: Some("shelf 2".to_string()),
        ..MyListSet::default()
    };
    assert_eq!(service.my_list_edit(&listed, set).await, Ok(true));

    let request = &harness.transport.sent_of("MYLISTADD")[1];
    assert_eq!(request.params.get("edit"), Some("1"));
    assert_eq!(request.params.get("lid"), Some("900"));
    assert_eq!(request.params.get("storage"), Some("shelf 2"));
    assert!(!request.params.contains("fid"));
}

#[tokio::test]
async fn test_edit_updates_cached_entry() {
    let harness = with_user();
    harness
        .transport
        .expect("MYLIST", replies::mylist_entry(900, 10, COWBOY_FIRST_EID, COWBOY_AID, 7));
    harness.transport.expect("MYLISTADD", replies::mylist_edited(1));
    let service = &harness.service;

    let entry = service.my_list_by_fid(Fid(10)).await.unwrap().unwrap();
    assert!(entry.date_watched.is_none());

    let mut listed = file();
    listed.lid.insert(Uid(42), Lid(900));
    let set = MyListSet {
        watched: Some(true),
        ..MyListSet::default()
    };
    assert_eq!(service.my_list_edit(&listed, set).await, Ok(true));

    let entry: MyListEntry = service
        .cache()
        .get(&cache_key!["mylist", 900])
        .await
        .unwrap();
    assert!(entry.date_watched.is_some());
}

#[tokio::test]
async fn test_edit_of_missing_entry() {
    let harness = with_user();
    harness
        .transport
        .expect("MYLISTADD", replies::no_such_mylist_entry());

    let result = harness.service.my_list_edit(&file(), watched_on_hdd()).await;
    assert_eq!(result, Ok(false));
    assert_eq!(harness.service.user_my_list_anime(Uid(42), Aid(COWBOY_AID)).await, None);
}

#[tokio::test]
async fn test_edit_by_lid() {
    let harness = with_user();
    harness
        .transport
        .expect("MYLIST", replies::mylist_entry(900, 10, COWBOY_FIRST_EID, COWBOY_AID, 7));
    harness.transport.expect("FILE", replies::no_such_file());
    harness.transport.expect("MYLISTADD", replies::mylist_edited(1));

    let result = harness
        .service
        .my_list_edit_by_lid(Lid(900), watched_on_hdd())
        .await;

    assert_eq!(result, Ok(true));
    let request = &harness.transport.sent_of("MYLISTADD")[0];
    assert_eq!(request.params.get("lid"), Some("900"));
}

#[tokio::test]
async fn test_delete_forgets_entry() {
    let harness = with_user();
    harness.transport.expect("MYLISTADD", replies::mylist_added(900));
    harness.transport.expect("MYLISTDEL", replies::mylist_deleted(1));
    let service = &harness.service;

    service.my_list_add(&file(), MyListSet::default()).await.unwrap();
    let listed = service.cached_file(Fid(10)).await.unwrap();
    assert_eq!(service.my_list_del(&listed).await, Ok(true));

    assert_eq!(
        harness.transport.sent_of("MYLISTDEL")[0].params.get("lid"),
        Some("900")
    );
    let cached = service.cached_file(Fid(10)).await.unwrap();
    assert!(cached.lid.is_empty());
    assert!(
        service
            .cache()
            .stat(&cache_key!["mylist", "by-fid", 10, 42])
            .await
            .is_none()
    );
}

#[tokio::test]
async fn test_delete_of_missing_entry() {
    let harness = with_user();
    harness
        .transport
        .expect("MYLISTDEL", replies::no_such_mylist_entry());

    assert_eq!(harness.service.my_list_del(&file()).await, Ok(false));
}

#[tokio::test]
async fn test_list_commands_need_a_user() {
    let harness = Harness::anonymous(MockTransport::new(), MockDocuments::new());
    let service = &harness.service;

    assert_eq!(service.my_list_add(&file(), MyListSet::default()).await, Ok(None));
    assert_eq!(service.my_list_del(&file()).await, Ok(false));
    assert_eq!(service.my_list_stats().await, Ok(None));
    assert_eq!(harness.transport.total(), 0);
}

#[tokio::test]
async fn test_missing_entry_by_fid_is_remembered() {
    let harness = with_user();
    harness.transport.expect("MYLIST", replies::no_such_entry());
    let service = &harness.service;

    assert_eq!(service.my_list_by_fid(Fid(10)).await, Ok(None));
    assert_eq!(service.my_list_by_fid(Fid(10)).await, Ok(None));
    assert_eq!(harness.transport.count("MYLIST"), 1);
}

#[tokio::test]
async fn test_summary_from_several_entries() {
    let harness = with_user();
    harness.transport.expect(
        "MYLIST",
        replies::mylist_summary("Cowboy Bebop", "1-3", "1-2", &[("Frostii", "1-3")]),
    );
    harness
        .transport
        .expect("GROUP", replies::group(7, "Frostii", "FTI"));
    let service = &harness.service;

    let summary = service.my_list_anime(Aid(COWBOY_AID)).await.unwrap().unwrap();

    assert_eq!(summary.episodes_per_group[&Gid(7)], EpisodeList::parse("1-3"));
    assert_eq!(summary.watched_episodes, EpisodeList::parse("1-2"));
    assert_eq!(
        harness.transport.sent_of("GROUP")[0].params.get("gname"),
        Some("Frostii")
    );

    // Cached for the next caller and readable for any user id
    assert_eq!(service.my_list_anime(Aid(COWBOY_AID)).await, Ok(Some(summary.clone())));
    assert_eq!(harness.transport.count("MYLIST"), 1);
    assert_eq!(
        service.user_my_list_anime(Uid(42), Aid(COWBOY_AID)).await,
        Some(summary)
    );
}

#[tokio::test]
async fn test_summary_from_single_entry() {
    let harness = with_user();
    cowboy(&harness.transport, &harness.documents);
    harness
        .transport
        .expect("MYLIST", replies::mylist_entry(900, 10, COWBOY_FIRST_EID, COWBOY_AID, 7));
    let service = &harness.service;

    let summary = service.my_list_anime(Aid(COWBOY_AID)).await.unwrap().unwrap();

    assert_eq!(summary.episodes_per_group[&Gid(7)], EpisodeList::parse("1"));
    assert_eq!(summary.episodes_with_state[&MyListState::Hdd], EpisodeList::parse("1"));
    assert!(service.cache().stat(&cache_key!["mylist", 900]).await.is_some());
}

#[tokio::test]
async fn test_anime_not_in_list() {
    let harness = with_user();
    harness.transport.expect("MYLIST", replies::no_such_entry());
    let service = &harness.service;

    assert_eq!(service.my_list_anime(Aid(COWBOY_AID)).await, Ok(None));
    assert_eq!(service.my_list_anime(Aid(COWBOY_AID)).await, Ok(None));
    assert_eq!(harness.transport.count("MYLIST"), 1);
}

#[tokio::test]
async fn test_stats_are_cached() {
    let harness = with_user();
    harness
        .transport
        .expect("MYLISTSTATS", replies::mylist_stats(10, 120, 130, 60));
    let service = &harness.service;

    let stats = service.my_list_stats().await.unwrap().unwrap();
    assert_eq!(stats.uid, Uid(42));
    assert_eq!(stats.anime, 10);
    assert_eq!(stats.viewed_episodes, 60);
    assert_eq!(stats.viewed_of_mylist, 0.5);

    assert_eq!(service.my_list_stats().await, Ok(Some(stats)));
    assert_eq!(harness.transport.count("MYLISTSTATS"), 1);
}
