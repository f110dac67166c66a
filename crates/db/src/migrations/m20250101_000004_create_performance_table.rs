//! Create performance table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Performance::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Performance::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Performance::SongId).string_len(32).not_null())
                    .col(ColumnDef::new(Performance::ShowId).string_len(32).not_null())
                    .col(ColumnDef::new(Performance::Position).integer().not_null())
                    .col(
                        ColumnDef::new(Performance::SetNumber)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(ColumnDef::new(Performance::Notes).text())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_performance_song")
                            .from(Performance::Table, Performance::SongId)
                            .to(Song::Table, Song::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_performance_show")
                            .from(Performance::Table, Performance::ShowId)
                            .to(Show::Table, Show::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: song_id (for listing performances of a song)
        manager
            .create_index(
                Index::create()
                    .name("idx_performance_song_id")
                    .table(Performance::Table)
                    .col(Performance::SongId)
                    .to_owned(),
            )
            .await?;

        // Index: show_id (for setlists)
        manager
            .create_index(
                Index::create()
                    .name("idx_performance_show_id")
                    .table(Performance::Table)
                    .col(Performance::ShowId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Performance::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Performance {
    Table,
    Id,
    SongId,
    ShowId,
    Position,
    SetNumber,
    Notes,
}

#[derive(Iden)]
enum Song {
    Table,
    Id,
}

#[derive(Iden)]
enum Show {
    Table,
    Id,
}
