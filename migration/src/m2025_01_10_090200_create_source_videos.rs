//! Migration to create the source_videos table.
//!
//! Source videos are downloaded from external URLs by the acquisition
//! pipeline; `storage_path` stays NULL until the download completes.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SourceVideos::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SourceVideos::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SourceVideos::UserId).uuid().not_null())
                    .col(ColumnDef::new(SourceVideos::OriginalUrl).text().not_null())
                    .col(ColumnDef::new(SourceVideos::StoragePath).text().null())
                    .col(ColumnDef::new(SourceVideos::Title).text().null())
                    .col(ColumnDef::new(SourceVideos::ThumbnailUrl).text().null())
                    .col(
                        ColumnDef::new(SourceVideos::Status)
                            .text()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(SourceVideos::FolderId).uuid().null())
                    .col(ColumnDef::new(SourceVideos::DurationSeconds).integer().null())
                    .col(ColumnDef::new(SourceVideos::FileFormat).text().null())
                    .col(ColumnDef::new(SourceVideos::FileSize).big_integer().null())
                    .col(ColumnDef::new(SourceVideos::ErrorMessage).text().null())
                    .col(
                        ColumnDef::new(SourceVideos::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(SourceVideos::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_source_videos_folder_id")
                            .from(SourceVideos::Table, SourceVideos::FolderId)
                            .to(Folders::Table, Folders::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_source_videos_user_id")
                    .table(SourceVideos::Table)
                    .col(SourceVideos::UserId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_source_videos_user_id").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(SourceVideos::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SourceVideos {
    Table,
    Id,
    UserId,
    OriginalUrl,
    StoragePath,
    Title,
    ThumbnailUrl,
    Status,
    FolderId,
    DurationSeconds,
    FileFormat,
    FileSize,
    ErrorMessage,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Folders {
    Table,
    Id,
}
