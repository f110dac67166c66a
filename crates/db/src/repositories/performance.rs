//! Performance repository.

use std::sync::Arc;

use crate::entities::{Performance, performance};
use honk_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect,
};

/// Performance repository for database operations.
#[derive(Clone)]
pub struct PerformanceRepository {
    db: Arc<DatabaseConnection>,
}

impl PerformanceRepository {
    /// Create a new performance repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a performance by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<performance::Model>> {
        Self::find_by_id_in(self.db.as_ref(), id).await
    }

    /// Get a performance by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<performance::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::PerformanceNotFound(id.to_string()))
    }

    /// Create a new performance.
    pub async fn create(&self, model: performance::ActiveModel) -> AppResult<performance::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Performances of a song that currently hold honking votes, ordered by
    /// cached vote count (highest first) then ID. Reads cache columns only.
    pub async fn find_voted_by_song(
        &self,
        song_id: &str,
        limit: u64,
    ) -> AppResult<Vec<performance::Model>> {
        Performance::find()
            .filter(performance::Column::SongId.eq(song_id))
            .filter(performance::Column::HonkingVoteCount.gt(0))
            .order_by_desc(performance::Column::HonkingVoteCount)
            .order_by_asc(performance::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a performance by ID on the given connection.
    pub async fn find_by_id_in<C>(conn: &C, id: &str) -> AppResult<Option<performance::Model>>
    where
        C: ConnectionTrait,
    {
        Performance::find_by_id(id)
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All performances of a song on the given connection, ordered by ID.
    pub async fn find_by_song_in<C>(conn: &C, song_id: &str) -> AppResult<Vec<performance::Model>>
    where
        C: ConnectionTrait,
    {
        Performance::find()
            .filter(performance::Column::SongId.eq(song_id))
            .order_by_asc(performance::Column::Id)
            .all(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// IDs of all performances of a song on the given connection, ordered by ID.
    pub async fn ids_by_song_in<C>(conn: &C, song_id: &str) -> AppResult<Vec<String>>
    where
        C: ConnectionTrait,
    {
        Performance::find()
            .select_only()
            .column(performance::Column::Id)
            .filter(performance::Column::SongId.eq(song_id))
            .order_by_asc(performance::Column::Id)
            .into_tuple::<String>()
            .all(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a performance on the given connection.
    pub async fn update_in<C>(
        conn: &C,
        model: performance::ActiveModel,
    ) -> AppResult<performance::Model>
    where
        C: ConnectionTrait,
    {
        model
            .update(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
