//! Song repository.

use std::sync::Arc;

use crate::entities::{Song, song};
use honk_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QuerySelect,
};

/// Song repository for database operations.
///
/// Methods suffixed with `_in` take an explicit connection so they can run
/// inside a caller-owned transaction.
#[derive(Clone)]
pub struct SongRepository {
    db: Arc<DatabaseConnection>,
}

impl SongRepository {
    /// Create a new song repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a song by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<song::Model>> {
        Self::find_by_id_in(self.db.as_ref(), id).await
    }

    /// Get a song by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<song::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::SongNotFound(id.to_string()))
    }

    /// Create a new song.
    pub async fn create(&self, model: song::ActiveModel) -> AppResult<song::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a song by ID on the given connection.
    pub async fn find_by_id_in<C>(conn: &C, id: &str) -> AppResult<Option<song::Model>>
    where
        C: ConnectionTrait,
    {
        Song::find_by_id(id)
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a song by ID and take an exclusive row lock on it until the
    /// enclosing transaction ends. SQLite has no row locks; its writers are
    /// serialized by the database lock instead.
    pub async fn lock_by_id_in<C>(conn: &C, id: &str) -> AppResult<Option<song::Model>>
    where
        C: ConnectionTrait,
    {
        Song::find_by_id(id)
            .lock_exclusive()
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a song on the given connection.
    pub async fn update_in<C>(conn: &C, model: song::ActiveModel) -> AppResult<song::Model>
    where
        C: ConnectionTrait,
    {
        model
            .update(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
