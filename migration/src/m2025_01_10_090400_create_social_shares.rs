//! Migration to create the social_shares table.
//!
//! Each row is one publishing attempt of a reaction to one provider.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SocialShares::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SocialShares::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SocialShares::UserId).uuid().not_null())
                    .col(ColumnDef::new(SocialShares::ReactionId).uuid().not_null())
                    .col(ColumnDef::new(SocialShares::Provider).text().not_null())
                    .col(ColumnDef::new(SocialShares::SocialAccountId).uuid().null())
                    .col(ColumnDef::new(SocialShares::ProviderPostId).text().null())
                    .col(ColumnDef::new(SocialShares::ProviderPostUrl).text().null())
                    .col(
                        ColumnDef::new(SocialShares::Status)
                            .text()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(SocialShares::ScheduledFor)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SocialShares::PublishedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(SocialShares::Metadata).json_binary().null())
                    .col(ColumnDef::new(SocialShares::Analytics).json_binary().null())
                    .col(
                        ColumnDef::new(SocialShares::LastAnalyticsSyncAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SocialShares::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(SocialShares::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_social_shares_reaction_id")
                            .from(SocialShares::Table, SocialShares::ReactionId)
                            .to(Reactions::Table, Reactions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_social_shares_user_reaction")
                    .table(SocialShares::Table)
                    .col(SocialShares::UserId)
                    .col(SocialShares::ReactionId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_social_shares_provider_post")
                    .table(SocialShares::Table)
                    .col(SocialShares::Provider)
                    .col(SocialShares::ProviderPostId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_social_shares_user_reaction")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_social_shares_provider_post")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(SocialShares::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SocialShares {
    Table,
    Id,
    UserId,
    ReactionId,
    Provider,
    SocialAccountId,
    ProviderPostId,
    ProviderPostUrl,
    Status,
    ScheduledFor,
    PublishedAt,
    Metadata,
    Analytics,
    LastAnalyticsSyncAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Reactions {
    Table,
    Id,
}
