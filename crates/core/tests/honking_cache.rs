//! Honking cache integration tests.
//!
//! Every test runs against its own migrated in-memory SQLite database, so
//! the vote service, the orchestrator and the backfill all go through real
//! transactions.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use honk_common::AppError;
use honk_core::{BackfillMode, HonkingCacheService, HonkingVoteService, SongCache};
use honk_db::entities::{performance, song};
use honk_db::repositories::{HonkingVoteRepository, PerformanceRepository, SongRepository};
use honk_db::test_utils::TestDatabase;
use sea_orm::{ConnectionTrait, EntityTrait, Set};

const ARCADIA: &str = "song-arcadia";
const MADHUVAN: &str = "song-madhuvan";
const SILENT: &str = "song-silent";

/// Two performances of Arcadia, sorted so `PERF_A < PERF_B`.
const PERF_A: &str = "perf-a";
const PERF_B: &str = "perf-b";
const PERF_C: &str = "perf-c";
const PERF_M: &str = "perf-m";
const PERF_S: &str = "perf-s";

struct Fixture {
    db: TestDatabase,
    votes: HonkingVoteService,
    cache: HonkingCacheService,
}

async fn fixture() -> Fixture {
    let db = TestDatabase::in_memory()
        .await
        .expect("Failed to create database");

    for (id, name) in [("v1", "alice"), ("v2", "bob"), ("v3", "carol")] {
        db.seed_user(id, name).await.unwrap();
    }
    db.seed_show("show1", "2023-06-10").await.unwrap();
    db.seed_show("show2", "2023-12-31").await.unwrap();

    db.seed_song(ARCADIA, "Arcadia").await.unwrap();
    db.seed_song(MADHUVAN, "Madhuvan").await.unwrap();
    db.seed_song(SILENT, "Silent Song").await.unwrap();

    db.seed_performance(PERF_A, ARCADIA, "show1", 3).await.unwrap();
    db.seed_performance(PERF_B, ARCADIA, "show2", 7).await.unwrap();
    db.seed_performance(PERF_C, ARCADIA, "show2", 12).await.unwrap();
    db.seed_performance(PERF_M, MADHUVAN, "show1", 5).await.unwrap();
    db.seed_performance(PERF_S, SILENT, "show1", 9).await.unwrap();

    let conn = Arc::clone(&db.conn);
    Fixture {
        votes: HonkingVoteService::new(Arc::clone(&conn)),
        cache: HonkingCacheService::new(conn),
        db,
    }
}

async fn load_song(db: &TestDatabase, id: &str) -> song::Model {
    SongRepository::find_by_id_in(db.connection(), id)
        .await
        .unwrap()
        .expect("song exists")
}

async fn load_performance(db: &TestDatabase, id: &str) -> performance::Model {
    PerformanceRepository::find_by_id_in(db.connection(), id)
        .await
        .unwrap()
        .expect("performance exists")
}

async fn set_performance_count(db: &TestDatabase, id: &str, count: i32) {
    let mut active: performance::ActiveModel = load_performance(db, id).await.into();
    active.honking_vote_count = Set(count);
    PerformanceRepository::update_in(db.connection(), active)
        .await
        .unwrap();
}

/// Sum and conservation properties for every song in the fixture.
async fn assert_cache_matches_ledger(f: &Fixture) {
    let conn = f.db.connection();
    for song_id in [ARCADIA, MADHUVAN, SILENT] {
        let mut max = 0;
        for perf_id in PerformanceRepository::ids_by_song_in(conn, song_id)
            .await
            .unwrap()
        {
            let perf = load_performance(&f.db, &perf_id).await;
            let ledger = HonkingVoteRepository::count_by_performance_in(conn, &perf_id)
                .await
                .unwrap();
            assert_eq!(
                i64::from(perf.honking_vote_count),
                ledger as i64,
                "cached count of {perf_id}"
            );
            max = max.max(perf.honking_vote_count);
        }

        let song = load_song(&f.db, song_id).await;
        assert_eq!(song.current_honking_vote_count, max, "winner count of {song_id}");
        match &song.current_honking_performance_id {
            Some(winner) => {
                assert_eq!(load_performance(&f.db, winner).await.honking_vote_count, max);
            }
            None => assert_eq!(max, 0),
        }
        assert!(f.cache.verify(song_id).await.unwrap());
    }
}

#[tokio::test]
async fn test_first_vote_makes_performance_the_honking_version() {
    let f = fixture().await;

    let outcome = f.votes.set_vote("v1", ARCADIA, PERF_A).await.unwrap();

    assert!(outcome.is_new());
    assert_eq!(
        outcome.honking_version,
        SongCache {
            performance_id: Some(PERF_A.to_string()),
            vote_count: 1,
        }
    );

    let perf = load_performance(&f.db, PERF_A).await;
    assert_eq!(perf.honking_vote_count, 1);
    assert!(perf.honking_votes_updated_at.is_some());

    let song = load_song(&f.db, ARCADIA).await;
    assert_eq!(song.current_honking_performance_id.as_deref(), Some(PERF_A));
    assert_eq!(song.current_honking_vote_count, 1);
    assert!(song.honking_version_updated_at.is_some());
}

#[tokio::test]
async fn test_changed_vote_moves_count_and_ties_go_to_lowest_id() {
    let f = fixture().await;

    f.votes.set_vote("v1", ARCADIA, PERF_A).await.unwrap();
    f.votes.set_vote("v2", ARCADIA, PERF_A).await.unwrap();
    let outcome = f.votes.set_vote("v1", ARCADIA, PERF_B).await.unwrap();

    assert_eq!(outcome.previous_performance_id.as_deref(), Some(PERF_A));
    assert_eq!(load_performance(&f.db, PERF_A).await.honking_vote_count, 1);
    assert_eq!(load_performance(&f.db, PERF_B).await.honking_vote_count, 1);

    let song = load_song(&f.db, ARCADIA).await;
    assert_eq!(song.current_honking_performance_id.as_deref(), Some(PERF_A));
    assert_eq!(song.current_honking_vote_count, 1);

    // Still one ledger row per voter
    assert_eq!(
        HonkingVoteRepository::tally_by_song_in(f.db.connection(), ARCADIA)
            .await
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn test_tie_break_ignores_vote_order() {
    let f = fixture().await;

    f.votes.set_vote("v1", ARCADIA, PERF_C).await.unwrap();
    f.votes.set_vote("v2", ARCADIA, PERF_B).await.unwrap();

    let song = load_song(&f.db, ARCADIA).await;
    assert_eq!(song.current_honking_performance_id.as_deref(), Some(PERF_B));
    assert_eq!(song.current_honking_vote_count, 1);

    f.votes.set_vote("v3", ARCADIA, PERF_C).await.unwrap();
    let song = load_song(&f.db, ARCADIA).await;
    assert_eq!(song.current_honking_performance_id.as_deref(), Some(PERF_C));
    assert_eq!(song.current_honking_vote_count, 2);
}

#[tokio::test]
async fn test_deleting_last_vote_clears_honking_version() {
    let f = fixture().await;

    f.votes.set_vote("v1", ARCADIA, PERF_A).await.unwrap();
    let cache = f.votes.delete_vote("v1", ARCADIA).await.unwrap();

    assert_eq!(cache, SongCache::default());
    assert_eq!(load_performance(&f.db, PERF_A).await.honking_vote_count, 0);

    let song = load_song(&f.db, ARCADIA).await;
    assert!(song.current_honking_performance_id.is_none());
    assert_eq!(song.current_honking_vote_count, 0);
    assert!(f.votes.get_user_vote("v1", ARCADIA).await.unwrap().is_none());
}

#[tokio::test]
async fn test_verify_only_then_backfill_repairs_drift() {
    let f = fixture().await;

    f.votes.set_vote("v1", ARCADIA, PERF_A).await.unwrap();
    f.votes.set_vote("v2", MADHUVAN, PERF_M).await.unwrap();
    set_performance_count(&f.db, PERF_A, 5).await;

    let report = f.cache.run_backfill(BackfillMode::VerifyOnly).await.unwrap();
    assert_eq!(report.songs_processed, 2);
    assert_eq!(report.initial_inconsistencies, 1);
    assert_eq!(report.final_inconsistencies, 1);
    assert_eq!(report.performances_updated, 0);
    assert!(!report.is_consistent());
    // Verifying never writes
    assert_eq!(load_performance(&f.db, PERF_A).await.honking_vote_count, 5);

    let report = f.cache.run_backfill(BackfillMode::Backfill).await.unwrap();
    assert_eq!(report.songs_processed, 2);
    assert_eq!(report.initial_inconsistencies, 1);
    assert_eq!(report.final_inconsistencies, 0);
    // Arcadia has three performances, Madhuvan one
    assert_eq!(report.performances_updated, 4);
    assert!(report.is_consistent());

    assert_eq!(load_performance(&f.db, PERF_A).await.honking_vote_count, 1);
    assert_cache_matches_ledger(&f).await;
}

#[tokio::test]
async fn test_backfill_repairs_votes_written_around_the_cache() {
    let f = fixture().await;

    f.db.seed_raw_vote("hv1", "v1", ARCADIA, PERF_B).await.unwrap();
    f.db.seed_raw_vote("hv2", "v2", ARCADIA, PERF_B).await.unwrap();
    f.db.seed_raw_vote("hv3", "v3", ARCADIA, PERF_C).await.unwrap();
    set_performance_count(&f.db, PERF_A, 9).await;

    assert!(!f.cache.verify(ARCADIA).await.unwrap());

    let report = f.cache.run_backfill(BackfillMode::Backfill).await.unwrap();
    assert!(report.is_consistent());

    let song = load_song(&f.db, ARCADIA).await;
    assert_eq!(song.current_honking_performance_id.as_deref(), Some(PERF_B));
    assert_eq!(song.current_honking_vote_count, 2);
    assert_eq!(load_performance(&f.db, PERF_A).await.honking_vote_count, 0);
    assert_cache_matches_ledger(&f).await;
}

#[tokio::test]
async fn test_backfill_restores_corrupted_song_winner() {
    let f = fixture().await;

    f.votes.set_vote("v1", ARCADIA, PERF_B).await.unwrap();
    f.votes.set_vote("v2", ARCADIA, PERF_B).await.unwrap();
    f.votes.set_vote("v3", ARCADIA, PERF_A).await.unwrap();

    let mut active: song::ActiveModel = load_song(&f.db, ARCADIA).await.into();
    active.current_honking_performance_id = Set(Some(PERF_A.to_string()));
    SongRepository::update_in(f.db.connection(), active)
        .await
        .unwrap();

    let report = f.cache.run_backfill(BackfillMode::VerifyOnly).await.unwrap();
    assert_eq!(report.initial_inconsistencies, 1);
    assert_eq!(report.final_inconsistencies, 1);

    let report = f.cache.run_backfill(BackfillMode::Backfill).await.unwrap();
    assert_eq!(report.final_inconsistencies, 0);

    let song = load_song(&f.db, ARCADIA).await;
    assert_eq!(song.current_honking_performance_id.as_deref(), Some(PERF_B));
    assert_eq!(song.current_honking_vote_count, 2);
    assert_cache_matches_ledger(&f).await;
}

#[tokio::test]
async fn test_deleted_winner_is_cleared_and_backfill_elects_runner_up() {
    let f = fixture().await;

    f.votes.set_vote("v1", ARCADIA, PERF_B).await.unwrap();
    f.votes.set_vote("v2", ARCADIA, PERF_B).await.unwrap();
    f.votes.set_vote("v3", ARCADIA, PERF_C).await.unwrap();

    performance::Entity::delete_by_id(PERF_B)
        .exec(f.db.connection())
        .await
        .unwrap();

    let song = load_song(&f.db, ARCADIA).await;
    assert!(song.current_honking_performance_id.is_none());
    assert!(!f.cache.verify(ARCADIA).await.unwrap());

    let report = f.cache.run_backfill(BackfillMode::Backfill).await.unwrap();
    assert!(report.is_consistent());

    let song = load_song(&f.db, ARCADIA).await;
    assert_eq!(song.current_honking_performance_id.as_deref(), Some(PERF_C));
    assert_eq!(song.current_honking_vote_count, 1);
    assert_cache_matches_ledger(&f).await;
}

#[tokio::test]
async fn test_rebuild_all_cache_counts_songs_and_performances() {
    let f = fixture().await;

    f.db.seed_raw_vote("hv1", "v1", ARCADIA, PERF_A).await.unwrap();
    f.db.seed_raw_vote("hv2", "v1", MADHUVAN, PERF_M).await.unwrap();

    let (songs, performances) = f.cache.rebuild_all_cache().await.unwrap();

    assert_eq!(songs, 2);
    assert_eq!(performances, 4);
    assert_cache_matches_ledger(&f).await;
}

#[tokio::test]
async fn test_recompute_is_idempotent() {
    let f = fixture().await;
    let conn = f.db.connection();

    f.db.seed_raw_vote("hv1", "v1", ARCADIA, PERF_B).await.unwrap();

    let first = HonkingCacheService::recompute_song_cache(conn, ARCADIA)
        .await
        .unwrap();
    let count = HonkingCacheService::recompute_performance_cache(conn, PERF_B)
        .await
        .unwrap();
    let song_before = load_song(&f.db, ARCADIA).await;

    let second = HonkingCacheService::recompute_song_cache(conn, ARCADIA)
        .await
        .unwrap();
    let count_again = HonkingCacheService::recompute_performance_cache(conn, PERF_B)
        .await
        .unwrap();
    let song_after = load_song(&f.db, ARCADIA).await;

    assert_eq!(first, second);
    assert_eq!(count, 1);
    assert_eq!(count, count_again);
    assert_eq!(
        song_before.current_honking_performance_id,
        song_after.current_honking_performance_id
    );
    assert_eq!(
        song_before.current_honking_vote_count,
        song_after.current_honking_vote_count
    );
}

#[tokio::test]
async fn test_recompute_missing_rows_is_benign() {
    let f = fixture().await;
    let conn = f.db.connection();

    assert_eq!(
        HonkingCacheService::recompute_performance_cache(conn, "no-such-performance")
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        HonkingCacheService::recompute_song_cache(conn, "no-such-song")
            .await
            .unwrap(),
        SongCache::default()
    );
    assert!(
        !HonkingCacheService::verify_cache_consistency(conn, "no-such-song")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_song_without_votes_stays_empty() {
    let f = fixture().await;

    let cache = HonkingCacheService::recompute_song_cache(f.db.connection(), SILENT)
        .await
        .unwrap();

    assert_eq!(cache, SongCache::default());
    let song = load_song(&f.db, SILENT).await;
    assert!(song.current_honking_performance_id.is_none());
    assert_eq!(song.current_honking_vote_count, 0);
    assert!(f.cache.verify(SILENT).await.unwrap());
}

#[tokio::test]
async fn test_verify_flags_stale_count_on_unvoted_performance() {
    let f = fixture().await;

    f.votes.set_vote("v1", ARCADIA, PERF_A).await.unwrap();
    assert!(f.cache.verify(ARCADIA).await.unwrap());

    set_performance_count(&f.db, PERF_C, 2).await;
    assert!(!f.cache.verify(ARCADIA).await.unwrap());
}

#[tokio::test]
async fn test_revote_for_same_performance_is_a_noop() {
    let f = fixture().await;

    f.votes.set_vote("v1", ARCADIA, PERF_A).await.unwrap();
    let outcome = f.votes.set_vote("v1", ARCADIA, PERF_A).await.unwrap();

    assert!(!outcome.is_new());
    assert_eq!(outcome.previous_performance_id.as_deref(), Some(PERF_A));
    assert_eq!(outcome.honking_version.vote_count, 1);
    assert_eq!(load_performance(&f.db, PERF_A).await.honking_vote_count, 1);
    assert_cache_matches_ledger(&f).await;
}

#[tokio::test]
async fn test_invalid_votes_are_rejected_without_writes() {
    let f = fixture().await;

    let result = f.votes.set_vote("v1", "no-such-song", PERF_A).await;
    assert!(matches!(result, Err(AppError::SongNotFound(_))));

    let result = f.votes.set_vote("v1", ARCADIA, "no-such-performance").await;
    assert!(matches!(result, Err(AppError::PerformanceNotFound(_))));

    let result = f.votes.set_vote("v1", ARCADIA, PERF_M).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    let result = f.votes.delete_vote("v1", ARCADIA).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    assert!(f.votes.list_user_votes("v1", 0, 50).await.unwrap().is_empty());
    assert_cache_matches_ledger(&f).await;
}

#[tokio::test]
async fn test_failed_cache_write_rolls_back_the_vote() {
    let f = fixture().await;
    let conn = f.db.connection();

    conn.execute_unprepared(
        "CREATE TRIGGER fail_song_cache BEFORE UPDATE ON song \
         BEGIN SELECT RAISE(ABORT, 'cache write failed'); END;",
    )
    .await
    .unwrap();

    let result = f.votes.set_vote("v1", ARCADIA, PERF_A).await;
    assert!(matches!(result, Err(AppError::Database(_))));

    assert!(f.votes.get_user_vote("v1", ARCADIA).await.unwrap().is_none());
    assert_eq!(load_performance(&f.db, PERF_A).await.honking_vote_count, 0);

    conn.execute_unprepared("DROP TRIGGER fail_song_cache")
        .await
        .unwrap();

    f.votes.set_vote("v1", ARCADIA, PERF_A).await.unwrap();
    assert_cache_matches_ledger(&f).await;
}

#[tokio::test]
async fn test_mixed_vote_sequence_keeps_cache_consistent() {
    let f = fixture().await;

    f.votes.set_vote("v1", ARCADIA, PERF_A).await.unwrap();
    f.votes.set_vote("v2", ARCADIA, PERF_B).await.unwrap();
    f.votes.set_vote("v3", ARCADIA, PERF_B).await.unwrap();
    f.votes.set_vote("v1", MADHUVAN, PERF_M).await.unwrap();
    assert_cache_matches_ledger(&f).await;

    f.votes.set_vote("v2", ARCADIA, PERF_C).await.unwrap();
    f.votes.delete_vote("v3", ARCADIA).await.unwrap();
    assert_cache_matches_ledger(&f).await;

    let song = load_song(&f.db, ARCADIA).await;
    assert_eq!(song.current_honking_performance_id.as_deref(), Some(PERF_A));
    assert_eq!(song.current_honking_vote_count, 1);

    let listed = f.votes.list_user_votes("v1", 0, 50).await.unwrap();
    assert_eq!(listed.len(), 2);

    let view = f.votes.get_song_honking_version(ARCADIA).await.unwrap();
    assert_eq!(view.honking_version.map(|p| p.id).as_deref(), Some(PERF_A));
    let tally: Vec<_> = view.tally.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(tally, vec![PERF_A, PERF_C]);

    assert!(f.votes.check_song_consistency(ARCADIA).await.unwrap());
    assert_eq!(
        f.votes.get_performance_votes(PERF_B).await.unwrap().honking_vote_count,
        0
    );
}
