//! Migration to create the reactions table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Reactions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Reactions::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Reactions::UserId).uuid().not_null())
                    .col(ColumnDef::new(Reactions::SourceVideoUrl).text().not_null())
                    .col(ColumnDef::new(Reactions::SourceVideoId).uuid().null())
                    .col(
                        ColumnDef::new(Reactions::ReactionVideoStoragePath)
                            .text()
                            .null(),
                    )
                    .col(ColumnDef::new(Reactions::Title).text().not_null())
                    .col(
                        ColumnDef::new(Reactions::Status)
                            .text()
                            .not_null()
                            .default("pending_upload"),
                    )
                    .col(ColumnDef::new(Reactions::ThumbnailUrl).text().null())
                    .col(
                        ColumnDef::new(Reactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Reactions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reactions_user_id")
                    .table(Reactions::Table)
                    .col(Reactions::UserId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_reactions_user_id").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Reactions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Reactions {
    Table,
    Id,
    UserId,
    SourceVideoUrl,
    SourceVideoId,
    ReactionVideoStoragePath,
    Title,
    Status,
    ThumbnailUrl,
    CreatedAt,
    UpdatedAt,
}
