//! Test utilities for database operations.
//!
//! Provides helpers for setting up test databases and seeding the rows the
//! honking vote tests need. [`TestDatabase::in_memory`] needs nothing but the
//! SQLite driver; [`TestDatabase::new`] expects a running `PostgreSQL`.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ConnectOptions, ConnectionTrait, Database, DatabaseBackend,
    DatabaseConnection, DbErr, Set, Statement,
};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::entities::{honking_vote, performance, show, song, user};
use crate::migrations::Migrator;

/// Tables truncated by [`TestDatabase::cleanup`], children first.
const TABLES: [&str; 5] = ["honking_vote", "performance", "song", "show", "user"];

/// Test database configuration.
#[derive(Debug, Clone)]
pub struct TestDbConfig {
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database username.
    pub username: String,
    /// Database password.
    pub password: String,
    /// Database name.
    pub database: String,
}

impl Default for TestDbConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("TEST_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("TEST_DB_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5433),
            username: std::env::var("TEST_DB_USER").unwrap_or_else(|_| "honk_test".to_string()),
            password: std::env::var("TEST_DB_PASSWORD")
                .unwrap_or_else(|_| "honk_test".to_string()),
            database: std::env::var("TEST_DB_NAME").unwrap_or_else(|_| "honk_test".to_string()),
        }
    }
}

impl TestDbConfig {
    /// Get the database URL.
    #[must_use]
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}

/// A migrated test database.
pub struct TestDatabase {
    /// Shared database connection, ready to hand to repositories and services.
    pub conn: Arc<DatabaseConnection>,
}

impl TestDatabase {
    /// Connect to the `PostgreSQL` test database from the environment and
    /// run migrations.
    pub async fn new() -> Result<Self, DbErr> {
        Self::with_config(TestDbConfig::default()).await
    }

    /// Connect to a `PostgreSQL` test database and run migrations.
    pub async fn with_config(config: TestDbConfig) -> Result<Self, DbErr> {
        let conn = Database::connect(&config.database_url()).await?;
        Migrator::up(&conn, None).await?;

        info!(database = %config.database, "Connected to test database");

        Ok(Self {
            conn: Arc::new(conn),
        })
    }

    /// Create a fresh, migrated in-memory SQLite database.
    ///
    /// The pool is pinned to a single connection: every connection to
    /// `sqlite::memory:` would otherwise open its own empty database.
    pub async fn in_memory() -> Result<Self, DbErr> {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1)
            .min_connections(1)
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;
        Migrator::up(&conn, None).await?;

        Ok(Self {
            conn: Arc::new(conn),
        })
    }

    /// Get the database connection.
    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        self.conn.as_ref()
    }

    /// Remove all rows from the honk tables.
    pub async fn cleanup(&self) -> Result<(), DbErr> {
        let backend = self.conn.get_database_backend();

        for table in TABLES {
            let sql = match backend {
                DatabaseBackend::Postgres => format!("TRUNCATE TABLE \"{table}\" CASCADE"),
                _ => format!("DELETE FROM \"{table}\""),
            };
            self.conn
                .execute(Statement::from_string(backend, sql))
                .await?;
        }

        info!("Cleaned up test database");
        Ok(())
    }

    /// Insert a user whose bearer token is `{username}-token`.
    pub async fn seed_user(&self, id: &str, username: &str) -> Result<user::Model, DbErr> {
        user::ActiveModel {
            id: Set(id.to_string()),
            username: Set(username.to_string()),
            token: Set(Some(format!("{username}-token"))),
            created_at: Set(Utc::now().into()),
        }
        .insert(self.conn.as_ref())
        .await
    }

    /// Insert a show.
    pub async fn seed_show(&self, id: &str, date: &str) -> Result<show::Model, DbErr> {
        show::ActiveModel {
            id: Set(id.to_string()),
            date: Set(date.to_string()),
            venue: Set("Capitol Theatre".to_string()),
            location: Set("Port Chester, NY".to_string()),
        }
        .insert(self.conn.as_ref())
        .await
    }

    /// Insert a song with an empty honking cache.
    pub async fn seed_song(&self, id: &str, name: &str) -> Result<song::Model, DbErr> {
        song::ActiveModel {
            id: Set(id.to_string()),
            name: Set(name.to_string()),
            slug: Set(name.to_lowercase().replace(' ', "-")),
            artist: Set("Goose".to_string()),
            current_honking_performance_id: Set(None),
            current_honking_vote_count: Set(0),
            honking_version_updated_at: Set(None),
        }
        .insert(self.conn.as_ref())
        .await
    }

    /// Insert a performance with an empty honking cache.
    pub async fn seed_performance(
        &self,
        id: &str,
        song_id: &str,
        show_id: &str,
        position: i32,
    ) -> Result<performance::Model, DbErr> {
        performance::ActiveModel {
            id: Set(id.to_string()),
            song_id: Set(song_id.to_string()),
            show_id: Set(show_id.to_string()),
            position: Set(position),
            set_number: Set(1),
            notes: Set(None),
            honking_vote_count: Set(0),
            honking_votes_updated_at: Set(None),
        }
        .insert(self.conn.as_ref())
        .await
    }

    /// Insert a ledger row directly, bypassing cache maintenance. Used to
    /// build drifted states for the verifier and backfill tests.
    pub async fn seed_raw_vote(
        &self,
        id: &str,
        user_id: &str,
        song_id: &str,
        performance_id: &str,
    ) -> Result<honking_vote::Model, DbErr> {
        let now = Utc::now();
        honking_vote::ActiveModel {
            id: Set(id.to_string()),
            user_id: Set(user_id.to_string()),
            song_id: Set(song_id.to_string()),
            performance_id: Set(performance_id.to_string()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(self.conn.as_ref())
        .await
    }
}
