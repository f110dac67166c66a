//! Honking vote repository (the vote ledger).

use std::sync::Arc;

use crate::entities::{HonkingVote, honking_vote};
use honk_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    FromQueryResult, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::Serialize;

/// Number of ledger votes pointing at one performance.
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult, Serialize)]
pub struct PerformanceTally {
    /// Performance the votes point at.
    pub performance_id: String,
    /// Number of votes.
    pub vote_count: i64,
}

/// Honking vote repository for database operations.
///
/// Ledger aggregates are exposed as `_in` functions taking an explicit
/// connection, so cache recomputation reads the same transaction that
/// staged the vote mutation.
#[derive(Clone)]
pub struct HonkingVoteRepository {
    db: Arc<DatabaseConnection>,
}

impl HonkingVoteRepository {
    /// Create a new honking vote repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a user's vote for a song.
    pub async fn find_by_user_and_song(
        &self,
        user_id: &str,
        song_id: &str,
    ) -> AppResult<Option<honking_vote::Model>> {
        Self::find_by_user_and_song_in(self.db.as_ref(), user_id, song_id).await
    }

    /// Get a user's votes (paginated, newest first).
    pub async fn find_by_user(
        &self,
        user_id: &str,
        skip: u64,
        limit: u64,
    ) -> AppResult<Vec<honking_vote::Model>> {
        HonkingVote::find()
            .filter(honking_vote::Column::UserId.eq(user_id))
            .order_by_desc(honking_vote::Column::UpdatedAt)
            .order_by_asc(honking_vote::Column::Id)
            .offset(skip)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count a user's votes.
    pub async fn count_by_user(&self, user_id: &str) -> AppResult<u64> {
        HonkingVote::find()
            .filter(honking_vote::Column::UserId.eq(user_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user's vote for a song on the given connection.
    pub async fn find_by_user_and_song_in<C>(
        conn: &C,
        user_id: &str,
        song_id: &str,
    ) -> AppResult<Option<honking_vote::Model>>
    where
        C: ConnectionTrait,
    {
        HonkingVote::find()
            .filter(honking_vote::Column::UserId.eq(user_id))
            .filter(honking_vote::Column::SongId.eq(song_id))
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a vote on the given connection.
    pub async fn insert_in<C>(
        conn: &C,
        model: honking_vote::ActiveModel,
    ) -> AppResult<honking_vote::Model>
    where
        C: ConnectionTrait,
    {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a vote on the given connection.
    pub async fn update_in<C>(
        conn: &C,
        model: honking_vote::ActiveModel,
    ) -> AppResult<honking_vote::Model>
    where
        C: ConnectionTrait,
    {
        model
            .update(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a vote on the given connection.
    pub async fn delete_in<C>(conn: &C, vote: honking_vote::Model) -> AppResult<()>
    where
        C: ConnectionTrait,
    {
        vote.delete(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Count the votes pointing at a performance.
    pub async fn count_by_performance_in<C>(conn: &C, performance_id: &str) -> AppResult<u64>
    where
        C: ConnectionTrait,
    {
        HonkingVote::find()
            .filter(honking_vote::Column::PerformanceId.eq(performance_id))
            .count(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Votes for a song grouped by performance, ordered by performance ID.
    /// Performances without votes do not appear.
    pub async fn tally_by_song_in<C>(conn: &C, song_id: &str) -> AppResult<Vec<PerformanceTally>>
    where
        C: ConnectionTrait,
    {
        HonkingVote::find()
            .select_only()
            .column(honking_vote::Column::PerformanceId)
            .column_as(honking_vote::Column::Id.count(), "vote_count")
            .filter(honking_vote::Column::SongId.eq(song_id))
            .group_by(honking_vote::Column::PerformanceId)
            .order_by_asc(honking_vote::Column::PerformanceId)
            .into_model::<PerformanceTally>()
            .all(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// IDs of every song with at least one vote, ordered by ID.
    pub async fn song_ids_with_votes_in<C>(conn: &C) -> AppResult<Vec<String>>
    where
        C: ConnectionTrait,
    {
        HonkingVote::find()
            .select_only()
            .column(honking_vote::Column::SongId)
            .distinct()
            .order_by_asc(honking_vote::Column::SongId)
            .into_tuple::<String>()
            .all(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_vote(id: &str, user_id: &str, song_id: &str, perf_id: &str) -> honking_vote::Model {
        honking_vote::Model {
            id: id.to_string(),
            user_id: user_id.to_string(),
            song_id: song_id.to_string(),
            performance_id: perf_id.to_string(),
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_find_by_user_and_song_found() {
        let vote = create_test_vote("v1", "user1", "song1", "perf1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[vote.clone()]])
                .into_connection(),
        );

        let repo = HonkingVoteRepository::new(db);
        let result = repo.find_by_user_and_song("user1", "song1").await.unwrap();

        assert_eq!(result.unwrap().performance_id, "perf1");
    }

    #[tokio::test]
    async fn test_find_by_user_and_song_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<honking_vote::Model>::new()])
                .into_connection(),
        );

        let repo = HonkingVoteRepository::new(db);
        let result = repo.find_by_user_and_song("user1", "song2").await.unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_find_by_user() {
        let v1 = create_test_vote("v1", "user1", "song1", "perf1");
        let v2 = create_test_vote("v2", "user1", "song2", "perf7");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[v1, v2]])
                .into_connection(),
        );

        let repo = HonkingVoteRepository::new(db);
        let result = repo.find_by_user("user1", 0, 50).await.unwrap();

        assert_eq!(result.len(), 2);
    }
}
