//! Database migrations.
//!
//! Schema migrations for the database.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20250101_000001_create_user_table;
mod m20250101_000002_create_show_table;
mod m20250101_000003_create_song_table;
mod m20250101_000004_create_performance_table;
mod m20250101_000005_create_honking_vote_table;
mod m20250101_000006_add_honking_cache_fields;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_user_table::Migration),
            Box::new(m20250101_000002_create_show_table::Migration),
            Box::new(m20250101_000003_create_song_table::Migration),
            Box::new(m20250101_000004_create_performance_table::Migration),
            Box::new(m20250101_000005_create_honking_vote_table::Migration),
            Box::new(m20250101_000006_add_honking_cache_fields::Migration),
        ]
    }
}
