//! Create song table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Song::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Song::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Song::Name).string_len(256).not_null())
                    .col(ColumnDef::new(Song::Slug).string_len(256).not_null())
                    .col(
                        ColumnDef::new(Song::Artist)
                            .string_len(256)
                            .not_null()
                            .default("Goose"),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_song_slug")
                    .table(Song::Table)
                    .col(Song::Slug)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_song_name")
                    .table(Song::Table)
                    .col(Song::Name)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Song::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Song {
    Table,
    Id,
    Name,
    Slug,
    Artist,
}
