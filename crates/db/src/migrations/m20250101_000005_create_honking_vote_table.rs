//! Create honking vote table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(HonkingVote::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(HonkingVote::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(HonkingVote::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(HonkingVote::SongId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(HonkingVote::PerformanceId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(HonkingVote::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(HonkingVote::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_honking_vote_user")
                            .from(HonkingVote::Table, HonkingVote::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_honking_vote_song")
                            .from(HonkingVote::Table, HonkingVote::SongId)
                            .to(Song::Table, Song::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_honking_vote_performance")
                            .from(HonkingVote::Table, HonkingVote::PerformanceId)
                            .to(Performance::Table, Performance::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (user_id, song_id) - one honking vote per user per song
        manager
            .create_index(
                Index::create()
                    .name("idx_honking_vote_user_song")
                    .table(HonkingVote::Table)
                    .col(HonkingVote::UserId)
                    .col(HonkingVote::SongId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: song_id (for tallying a song)
        manager
            .create_index(
                Index::create()
                    .name("idx_honking_vote_song_id")
                    .table(HonkingVote::Table)
                    .col(HonkingVote::SongId)
                    .to_owned(),
            )
            .await?;

        // Index: performance_id (for counting a performance)
        manager
            .create_index(
                Index::create()
                    .name("idx_honking_vote_performance_id")
                    .table(HonkingVote::Table)
                    .col(HonkingVote::PerformanceId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(HonkingVote::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum HonkingVote {
    Table,
    Id,
    UserId,
    SongId,
    PerformanceId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}

#[derive(Iden)]
enum Song {
    Table,
    Id,
}

#[derive(Iden)]
enum Performance {
    Table,
    Id,
}
