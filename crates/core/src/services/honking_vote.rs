//! Honking vote service.

use std::sync::Arc;

use chrono::Utc;
use honk_common::{AppError, AppResult};
use honk_db::{
    entities::{honking_vote, performance, song},
    repositories::{HonkingVoteRepository, PerformanceRepository, SongRepository},
};
use sea_orm::{ConnectionTrait, DatabaseConnection, Set, TransactionTrait};

use super::honking_cache::{HonkingCacheService, SongCache, finish_transaction};
use crate::generate_id;

/// Performances listed in a song's honking tally.
const TALLY_LIMIT: u64 = 100;

/// Result of setting a vote.
#[derive(Debug, Clone)]
pub struct SetVoteOutcome {
    /// The vote as stored.
    pub vote: honking_vote::Model,
    /// Performance the vote pointed at before, `None` for a new vote.
    pub previous_performance_id: Option<String>,
    /// The song's honking version after the vote.
    pub honking_version: SongCache,
}

impl SetVoteOutcome {
    /// Whether the vote was newly inserted.
    #[must_use]
    pub const fn is_new(&self) -> bool {
        self.previous_performance_id.is_none()
    }
}

/// A song's honking version as read from the cache columns.
#[derive(Debug, Clone)]
pub struct HonkingVersionView {
    /// The song with its cache columns.
    pub song: song::Model,
    /// Winning performance, if the song has votes.
    pub honking_version: Option<performance::Model>,
    /// Performances with at least one vote, most votes first.
    pub tally: Vec<performance::Model>,
}

/// Honking vote service for business logic.
///
/// Every ledger mutation runs in its own transaction together with the cache
/// recompute it triggers. Reads only touch the cache columns.
#[derive(Clone)]
pub struct HonkingVoteService {
    db: Arc<DatabaseConnection>,
    song_repo: SongRepository,
    performance_repo: PerformanceRepository,
    vote_repo: HonkingVoteRepository,
    cache: HonkingCacheService,
}

impl HonkingVoteService {
    /// Create a new honking vote service.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            song_repo: SongRepository::new(Arc::clone(&db)),
            performance_repo: PerformanceRepository::new(Arc::clone(&db)),
            vote_repo: HonkingVoteRepository::new(Arc::clone(&db)),
            cache: HonkingCacheService::new(Arc::clone(&db)),
            db,
        }
    }

    /// Set a user's honking vote for a song, replacing any earlier vote.
    pub async fn set_vote(
        &self,
        user_id: &str,
        song_id: &str,
        performance_id: &str,
    ) -> AppResult<SetVoteOutcome> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let result = Self::set_vote_in(&txn, user_id, song_id, performance_id).await;
        finish_transaction(txn, result).await
    }

    async fn set_vote_in<C>(
        conn: &C,
        user_id: &str,
        song_id: &str,
        performance_id: &str,
    ) -> AppResult<SetVoteOutcome>
    where
        C: ConnectionTrait,
    {
        // Lock before reading the existing vote so two requests from one
        // user cannot both take the insert path.
        let song = SongRepository::lock_by_id_in(conn, song_id)
            .await?
            .ok_or_else(|| AppError::SongNotFound(song_id.to_string()))?;

        let performance = PerformanceRepository::find_by_id_in(conn, performance_id)
            .await?
            .ok_or_else(|| AppError::PerformanceNotFound(performance_id.to_string()))?;
        if performance.song_id != song.id {
            return Err(AppError::BadRequest(
                "Performance does not belong to this song".to_string(),
            ));
        }

        let now = Utc::now();
        match HonkingVoteRepository::find_by_user_and_song_in(conn, user_id, song_id).await? {
            Some(existing) => {
                let previous = existing.performance_id.clone();

                let mut active: honking_vote::ActiveModel = existing.into();
                active.performance_id = Set(performance_id.to_string());
                active.updated_at = Set(now.into());
                let vote = HonkingVoteRepository::update_in(conn, active).await?;

                let honking_version =
                    HonkingCacheService::vote_changed_locked(conn, Some(song), &previous, &vote)
                        .await?;

                Ok(SetVoteOutcome {
                    vote,
                    previous_performance_id: Some(previous),
                    honking_version,
                })
            }
            None => {
                let model = honking_vote::ActiveModel {
                    id: Set(generate_id()),
                    user_id: Set(user_id.to_string()),
                    song_id: Set(song_id.to_string()),
                    performance_id: Set(performance_id.to_string()),
                    created_at: Set(now.into()),
                    updated_at: Set(now.into()),
                };
                let vote = HonkingVoteRepository::insert_in(conn, model).await?;

                let honking_version =
                    HonkingCacheService::vote_created_locked(conn, Some(song), &vote).await?;

                Ok(SetVoteOutcome {
                    vote,
                    previous_performance_id: None,
                    honking_version,
                })
            }
        }
    }

    /// Remove a user's honking vote for a song.
    pub async fn delete_vote(&self, user_id: &str, song_id: &str) -> AppResult<SongCache> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let result = Self::delete_vote_in(&txn, user_id, song_id).await;
        finish_transaction(txn, result).await
    }

    async fn delete_vote_in<C>(conn: &C, user_id: &str, song_id: &str) -> AppResult<SongCache>
    where
        C: ConnectionTrait,
    {
        let song = SongRepository::lock_by_id_in(conn, song_id)
            .await?
            .ok_or_else(|| AppError::SongNotFound(song_id.to_string()))?;

        let vote = HonkingVoteRepository::find_by_user_and_song_in(conn, user_id, song_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound("No honking version found for this song".to_string())
            })?;

        let performance_id = vote.performance_id.clone();
        HonkingVoteRepository::delete_in(conn, vote).await?;

        HonkingCacheService::vote_deleted_locked(conn, Some(song), song_id, &performance_id).await
    }

    /// Get a user's vote for a song.
    pub async fn get_user_vote(
        &self,
        user_id: &str,
        song_id: &str,
    ) -> AppResult<Option<honking_vote::Model>> {
        self.vote_repo.find_by_user_and_song(user_id, song_id).await
    }

    /// List a user's votes (paginated, most recently changed first).
    pub async fn list_user_votes(
        &self,
        user_id: &str,
        skip: u64,
        limit: u64,
    ) -> AppResult<Vec<honking_vote::Model>> {
        self.vote_repo.find_by_user(user_id, skip, limit).await
    }

    /// Get a song's honking version from the cache columns.
    pub async fn get_song_honking_version(&self, song_id: &str) -> AppResult<HonkingVersionView> {
        let song = self.song_repo.get_by_id(song_id).await?;

        let honking_version = match &song.current_honking_performance_id {
            Some(id) => self.performance_repo.find_by_id(id).await?,
            None => None,
        };
        let tally = self
            .performance_repo
            .find_voted_by_song(song_id, TALLY_LIMIT)
            .await?;

        Ok(HonkingVersionView {
            song,
            honking_version,
            tally,
        })
    }

    /// Get a performance with its cached vote count.
    pub async fn get_performance_votes(&self, performance_id: &str) -> AppResult<performance::Model> {
        self.performance_repo.get_by_id(performance_id).await
    }

    /// Verify a song's caches against the ledger.
    pub async fn check_song_consistency(&self, song_id: &str) -> AppResult<bool> {
        self.song_repo.get_by_id(song_id).await?;
        self.cache.verify(song_id).await
    }
}
