//! Create show table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Show::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Show::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Show::Date).string_len(10).not_null())
                    .col(ColumnDef::new(Show::Venue).string_len(256).not_null())
                    .col(ColumnDef::new(Show::Location).string_len(256).not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_show_date")
                    .table(Show::Table)
                    .col(Show::Date)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Show::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Show {
    Table,
    Id,
    Date,
    Venue,
    Location,
}
