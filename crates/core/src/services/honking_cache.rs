//! Honking version cache.
//!
//! Songs and performances carry denormalized honking-vote counters so read
//! paths never aggregate the vote ledger. This module recomputes those
//! counters from the ledger, hooks recomputation into vote mutations,
//! verifies the stored values and repairs them in bulk.
//!
//! Functions taking a `conn` run on whatever connection they are handed.
//! Vote mutations pass their open transaction, so the ledger change and the
//! cache update commit or roll back together.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use honk_common::{AppError, AppResult};
use honk_db::{
    entities::{honking_vote, performance, song},
    repositories::{
        HonkingVoteRepository, PerformanceRepository, PerformanceTally, SongRepository,
    },
};
use sea_orm::{ConnectionTrait, DatabaseConnection, DatabaseTransaction, Set, TransactionTrait};
use serde::Serialize;

/// Songs between two backfill progress lines.
const PROGRESS_INTERVAL: u64 = 10;

/// Cached honking version of a song: the winning performance and its votes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SongCache {
    /// Winning performance, `None` when the song has no votes.
    pub performance_id: Option<String>,
    /// Votes of the winning performance, 0 when the song has no votes.
    pub vote_count: i32,
}

/// Pick the honking version from a per-performance tally.
///
/// The highest count wins. Among performances sharing the highest count the
/// lowest performance ID wins, independent of the order the tally came in.
#[must_use]
pub fn pick_winner(tally: &[PerformanceTally]) -> Option<&PerformanceTally> {
    tally.iter().max_by(|a, b| {
        a.vote_count
            .cmp(&b.vote_count)
            .then_with(|| b.performance_id.cmp(&a.performance_id))
    })
}

fn cache_count<T>(n: T) -> AppResult<i32>
where
    T: TryInto<i32> + fmt::Display + Copy,
{
    n.try_into()
        .map_err(|_| AppError::Internal(format!("Vote count {n} does not fit the cache column")))
}

fn db_err(e: sea_orm::DbErr) -> AppError {
    AppError::Database(e.to_string())
}

/// Commit `txn` when `result` is `Ok`, roll it back otherwise.
pub(crate) async fn finish_transaction<T>(
    txn: DatabaseTransaction,
    result: AppResult<T>,
) -> AppResult<T> {
    match result {
        Ok(value) => {
            txn.commit().await.map_err(db_err)?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = txn.rollback().await {
                tracing::error!(error = %rollback, "Failed to roll back transaction");
            }
            Err(e)
        }
    }
}

/// Backfill run mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackfillMode {
    /// Count inconsistencies without writing anything.
    VerifyOnly,
    /// Recompute every cache entry of every voted song, then verify.
    Backfill,
}

impl fmt::Display for BackfillMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VerifyOnly => f.write_str("VERIFY-ONLY"),
            Self::Backfill => f.write_str("BACKFILL"),
        }
    }
}

/// Summary of a backfill run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillReport {
    /// Mode the run used.
    pub mode: BackfillMode,
    /// Songs with votes that were visited.
    pub songs_processed: u64,
    /// Performance caches recomputed (always 0 when verifying only).
    pub performances_updated: u64,
    /// Songs found inconsistent before any write.
    pub initial_inconsistencies: u64,
    /// Songs still inconsistent after the run.
    pub final_inconsistencies: u64,
}

impl BackfillReport {
    const fn new(mode: BackfillMode) -> Self {
        Self {
            mode,
            songs_processed: 0,
            performances_updated: 0,
            initial_inconsistencies: 0,
            final_inconsistencies: 0,
        }
    }

    /// Whether the final verification pass found no drift.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.final_inconsistencies == 0
    }
}

impl fmt::Display for BackfillReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Songs processed:         {}", self.songs_processed)?;
        writeln!(f, "Performances updated:    {}", self.performances_updated)?;
        writeln!(f, "Initial inconsistencies: {}", self.initial_inconsistencies)?;
        writeln!(f, "Final inconsistencies:   {}", self.final_inconsistencies)?;
        write!(f, "Mode:                    {}", self.mode)
    }
}

/// Honking cache service.
///
/// The recompute, orchestration and verification functions are associated
/// functions generic over the connection; the methods taking `&self` drive
/// batch work over the service's own pool.
#[derive(Clone)]
pub struct HonkingCacheService {
    db: Arc<DatabaseConnection>,
}

impl HonkingCacheService {
    /// Create a new honking cache service.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    // === Recalculation ===

    /// Recount the votes pointing at a performance and store the count.
    ///
    /// A missing performance is not an error: the caller may be racing its
    /// deletion. Returns the stored count, or 0 when nothing was stored.
    pub async fn recompute_performance_cache<C>(conn: &C, performance_id: &str) -> AppResult<i32>
    where
        C: ConnectionTrait,
    {
        let Some(perf) = PerformanceRepository::find_by_id_in(conn, performance_id).await? else {
            tracing::debug!(performance_id, "Performance gone, skipping cache recompute");
            return Ok(0);
        };

        let count =
            cache_count(HonkingVoteRepository::count_by_performance_in(conn, performance_id).await?)?;

        let mut active: performance::ActiveModel = perf.into();
        active.honking_vote_count = Set(count);
        active.honking_votes_updated_at = Set(Some(Utc::now().into()));
        PerformanceRepository::update_in(conn, active).await?;

        tracing::debug!(performance_id, votes = count, "Performance honking cache recomputed");
        Ok(count)
    }

    /// Recompute a song's honking version from the ledger and store it.
    ///
    /// Holds the song row lock until the enclosing transaction ends. A
    /// missing song yields an empty cache without error.
    pub async fn recompute_song_cache<C>(conn: &C, song_id: &str) -> AppResult<SongCache>
    where
        C: ConnectionTrait,
    {
        let song = SongRepository::lock_by_id_in(conn, song_id).await?;
        Self::store_song_cache(conn, song_id, song).await
    }

    /// Recompute and store the honking version of a song the caller has
    /// already locked.
    async fn store_song_cache<C>(
        conn: &C,
        song_id: &str,
        song: Option<song::Model>,
    ) -> AppResult<SongCache>
    where
        C: ConnectionTrait,
    {
        let Some(song) = song else {
            tracing::debug!(song_id, "Song gone, skipping cache recompute");
            return Ok(SongCache::default());
        };

        let tally = HonkingVoteRepository::tally_by_song_in(conn, song_id).await?;
        let cache = match pick_winner(&tally) {
            Some(winner) => SongCache {
                performance_id: Some(winner.performance_id.clone()),
                vote_count: cache_count(winner.vote_count)?,
            },
            None => SongCache::default(),
        };

        let mut active: song::ActiveModel = song.into();
        active.current_honking_performance_id = Set(cache.performance_id.clone());
        active.current_honking_vote_count = Set(cache.vote_count);
        active.honking_version_updated_at = Set(Some(Utc::now().into()));
        SongRepository::update_in(conn, active).await?;

        tracing::debug!(
            song_id,
            performance_id = ?cache.performance_id,
            votes = cache.vote_count,
            "Song honking cache recomputed"
        );
        Ok(cache)
    }

    // === Orchestration ===
    //
    // Called after the ledger write is staged and before commit. Each entry
    // point locks the song first so concurrent votes on one song serialize
    // their whole recompute sequence. The `*_locked` variants are for
    // callers that took the lock before staging the write; the lock is
    // taken once per mutation.

    /// Refresh caches after a vote was inserted.
    pub async fn on_vote_created<C>(conn: &C, vote: &honking_vote::Model) -> AppResult<SongCache>
    where
        C: ConnectionTrait,
    {
        let song = SongRepository::lock_by_id_in(conn, &vote.song_id).await?;
        Self::vote_created_locked(conn, song, vote).await
    }

    pub(crate) async fn vote_created_locked<C>(
        conn: &C,
        song: Option<song::Model>,
        vote: &honking_vote::Model,
    ) -> AppResult<SongCache>
    where
        C: ConnectionTrait,
    {
        tracing::info!(
            user_id = %vote.user_id,
            song_id = %vote.song_id,
            performance_id = %vote.performance_id,
            "Honking vote created"
        );

        Self::recompute_performance_cache(conn, &vote.performance_id).await?;
        Self::store_song_cache(conn, &vote.song_id, song).await
    }

    /// Refresh caches after a vote moved from `old_performance_id` to
    /// `vote.performance_id`.
    pub async fn on_vote_changed<C>(
        conn: &C,
        old_performance_id: &str,
        vote: &honking_vote::Model,
    ) -> AppResult<SongCache>
    where
        C: ConnectionTrait,
    {
        let song = SongRepository::lock_by_id_in(conn, &vote.song_id).await?;
        Self::vote_changed_locked(conn, song, old_performance_id, vote).await
    }

    pub(crate) async fn vote_changed_locked<C>(
        conn: &C,
        song: Option<song::Model>,
        old_performance_id: &str,
        vote: &honking_vote::Model,
    ) -> AppResult<SongCache>
    where
        C: ConnectionTrait,
    {
        tracing::info!(
            user_id = %vote.user_id,
            song_id = %vote.song_id,
            from = old_performance_id,
            to = %vote.performance_id,
            "Honking vote changed"
        );

        if old_performance_id != vote.performance_id {
            Self::recompute_performance_cache(conn, old_performance_id).await?;
            Self::recompute_performance_cache(conn, &vote.performance_id).await?;
        }
        Self::store_song_cache(conn, &vote.song_id, song).await
    }

    /// Refresh caches after a vote was deleted.
    pub async fn on_vote_deleted<C>(
        conn: &C,
        song_id: &str,
        performance_id: &str,
    ) -> AppResult<SongCache>
    where
        C: ConnectionTrait,
    {
        let song = SongRepository::lock_by_id_in(conn, song_id).await?;
        Self::vote_deleted_locked(conn, song, song_id, performance_id).await
    }

    pub(crate) async fn vote_deleted_locked<C>(
        conn: &C,
        song: Option<song::Model>,
        song_id: &str,
        performance_id: &str,
    ) -> AppResult<SongCache>
    where
        C: ConnectionTrait,
    {
        tracing::info!(song_id, performance_id, "Honking vote deleted");

        Self::recompute_performance_cache(conn, performance_id).await?;
        Self::store_song_cache(conn, song_id, song).await
    }

    // === Verification ===

    /// Compare a song's stored caches against the ledger without writing.
    ///
    /// Checks every performance holding votes for the song, every performance
    /// of the song with a stale non-zero count, and the song's winner. Each
    /// mismatch is logged with expected and actual values. A missing song is
    /// reported inconsistent.
    pub async fn verify_cache_consistency<C>(conn: &C, song_id: &str) -> AppResult<bool>
    where
        C: ConnectionTrait,
    {
        let Some(song) = SongRepository::find_by_id_in(conn, song_id).await? else {
            tracing::warn!(song_id, "Song not found during cache verification");
            return Ok(false);
        };

        let tally = HonkingVoteRepository::tally_by_song_in(conn, song_id).await?;
        let performances: HashMap<String, performance::Model> =
            PerformanceRepository::find_by_song_in(conn, song_id)
                .await?
                .into_iter()
                .map(|p| (p.id.clone(), p))
                .collect();

        let mut consistent = true;

        for entry in &tally {
            let stored = match performances.get(&entry.performance_id) {
                Some(p) => Some(p.honking_vote_count),
                // Vote pointing at a performance of another song
                None => PerformanceRepository::find_by_id_in(conn, &entry.performance_id)
                    .await?
                    .map(|p| p.honking_vote_count),
            };

            match stored {
                Some(actual) if i64::from(actual) == entry.vote_count => {}
                Some(actual) => {
                    tracing::warn!(
                        song_id,
                        performance_id = %entry.performance_id,
                        expected = entry.vote_count,
                        actual,
                        "Performance honking count mismatch"
                    );
                    consistent = false;
                }
                None => {
                    tracing::warn!(
                        song_id,
                        performance_id = %entry.performance_id,
                        "Honking votes reference a missing performance"
                    );
                    consistent = false;
                }
            }
        }

        for perf in performances.values() {
            let voted = tally.iter().any(|t| t.performance_id == perf.id);
            if !voted && perf.honking_vote_count != 0 {
                tracing::warn!(
                    song_id,
                    performance_id = %perf.id,
                    expected = 0,
                    actual = perf.honking_vote_count,
                    "Performance honking count mismatch"
                );
                consistent = false;
            }
        }

        let winner = pick_winner(&tally);
        let expected_id = winner.map(|w| w.performance_id.as_str());
        let expected_count = winner.map_or(0, |w| w.vote_count);
        if song.current_honking_performance_id.as_deref() != expected_id
            || i64::from(song.current_honking_vote_count) != expected_count
        {
            tracing::warn!(
                song_id,
                expected_performance_id = ?expected_id,
                actual_performance_id = ?song.current_honking_performance_id,
                expected_count,
                actual_count = song.current_honking_vote_count,
                "Song honking version mismatch"
            );
            consistent = false;
        }

        Ok(consistent)
    }

    /// Verify a song's caches on the service's pool.
    pub async fn verify(&self, song_id: &str) -> AppResult<bool> {
        Self::verify_cache_consistency(self.db.as_ref(), song_id).await
    }

    // === Backfill ===

    /// Recompute the song cache and every performance cache of one song.
    /// Returns the number of performances recomputed.
    async fn rebuild_song_in<C>(conn: &C, song_id: &str) -> AppResult<u64>
    where
        C: ConnectionTrait,
    {
        Self::recompute_song_cache(conn, song_id).await?;

        let performance_ids = PerformanceRepository::ids_by_song_in(conn, song_id).await?;
        for performance_id in &performance_ids {
            Self::recompute_performance_cache(conn, performance_id).await?;
        }

        Ok(performance_ids.len() as u64)
    }

    /// Recompute every cache entry of every song with votes in one
    /// transaction. Returns `(songs_updated, performances_updated)`.
    pub async fn rebuild_all_cache(&self) -> AppResult<(u64, u64)> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let result = async {
            let mut songs = 0u64;
            let mut performances = 0u64;
            for song_id in HonkingVoteRepository::song_ids_with_votes_in(&txn).await? {
                performances += Self::rebuild_song_in(&txn, &song_id).await?;
                songs += 1;
            }
            Ok::<_, AppError>((songs, performances))
        }
        .await;

        let (songs, performances) = finish_transaction(txn, result).await?;
        tracing::info!(songs, performances, "Honking cache rebuilt");
        Ok((songs, performances))
    }

    /// Run a backfill over every song with votes.
    ///
    /// Each song is verified before it is touched. In backfill mode all
    /// writes share one transaction committed after the full pass, so a
    /// failure leaves nothing half-written. A final verification pass then
    /// counts residual drift, which points at a recompute bug rather than
    /// bad data.
    pub async fn run_backfill(&self, mode: BackfillMode) -> AppResult<BackfillReport> {
        tracing::info!(mode = %mode, "Starting honking cache backfill");

        let txn = self.db.begin().await.map_err(db_err)?;
        let result = Self::backfill_pass(&txn, mode).await;
        let (song_ids, mut report) = match mode {
            BackfillMode::Backfill => finish_transaction(txn, result).await?,
            // Nothing was written; release the snapshot.
            BackfillMode::VerifyOnly => {
                txn.rollback().await.map_err(db_err)?;
                result?
            }
        };

        tracing::info!("Running final verification pass");
        for song_id in &song_ids {
            if !self.verify(song_id).await? {
                report.final_inconsistencies += 1;
            }
        }

        if report.is_consistent() {
            tracing::info!(
                songs = report.songs_processed,
                performances = report.performances_updated,
                initial = report.initial_inconsistencies,
                "Honking cache is fully consistent"
            );
        } else {
            tracing::warn!(
                remaining = report.final_inconsistencies,
                "Honking cache inconsistencies remain"
            );
        }

        Ok(report)
    }

    async fn backfill_pass(
        txn: &DatabaseTransaction,
        mode: BackfillMode,
    ) -> AppResult<(Vec<String>, BackfillReport)> {
        let song_ids = HonkingVoteRepository::song_ids_with_votes_in(txn).await?;
        tracing::info!(songs = song_ids.len(), "Found songs with honking votes");

        let mut report = BackfillReport::new(mode);
        for song_id in &song_ids {
            if !Self::verify_cache_consistency(txn, song_id).await? {
                report.initial_inconsistencies += 1;
                tracing::warn!(song_id = %song_id, "Cache inconsistency detected");
            }

            match mode {
                BackfillMode::VerifyOnly => report.songs_processed += 1,
                BackfillMode::Backfill => {
                    report.performances_updated += Self::rebuild_song_in(txn, song_id).await?;
                    report.songs_processed += 1;
                    if report.songs_processed % PROGRESS_INTERVAL == 0 {
                        tracing::info!(songs = report.songs_processed, "Backfill progress");
                    }
                }
            }
        }

        Ok((song_ids, report))
    }
}
