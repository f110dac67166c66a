//! Migration adding the honking-version cache columns to `performance` and `song`.
//!
//! Each column is added with its own ALTER statement; SQLite rejects
//! multiple alterations in one statement. Existing rows start at zero and
//! must be populated with `honk-backfill` after this migration runs.
//!
//! The winner reference is declared inline: SQLite cannot add a foreign key
//! constraint to an existing table, only a column carrying one.

use sea_orm_migration::prelude::*;

/// Deleting the winning performance clears the song's winner.
const WINNER_REFERENCES: &str = "REFERENCES performance (id) ON DELETE SET NULL";

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Performance cache: vote count and last recompute
        manager
            .alter_table(
                Table::alter()
                    .table(Performance::Table)
                    .add_column(
                        ColumnDef::new(Performance::HonkingVoteCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(Performance::Table)
                    .add_column(
                        ColumnDef::new(Performance::HonkingVotesUpdatedAt)
                            .timestamp_with_time_zone(),
                    )
                    .to_owned(),
            )
            .await?;

        // Song cache: winner, its count and last recompute
        manager
            .alter_table(
                Table::alter()
                    .table(Song::Table)
                    .add_column(
                        ColumnDef::new(Song::CurrentHonkingPerformanceId)
                            .string_len(32)
                            .extra(WINNER_REFERENCES),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(Song::Table)
                    .add_column(
                        ColumnDef::new(Song::CurrentHonkingVoteCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(Song::Table)
                    .add_column(
                        ColumnDef::new(Song::HonkingVersionUpdatedAt)
                            .timestamp_with_time_zone(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(Performance::Table)
                    .drop_column(Performance::HonkingVoteCount)
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(Performance::Table)
                    .drop_column(Performance::HonkingVotesUpdatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(Song::Table)
                    .drop_column(Song::CurrentHonkingPerformanceId)
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(Song::Table)
                    .drop_column(Song::CurrentHonkingVoteCount)
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(Song::Table)
                    .drop_column(Song::HonkingVersionUpdatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(Iden)]
enum Performance {
    Table,
    HonkingVoteCount,
    HonkingVotesUpdatedAt,
}

#[derive(Iden)]
enum Song {
    Table,
    CurrentHonkingPerformanceId,
    CurrentHonkingVoteCount,
    HonkingVersionUpdatedAt,
}
