//! Migration to create the social_accounts table.
//!
//! One row per user connection to a social provider, holding the OAuth
//! tokens issued during the (external) connect flow.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SocialAccounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SocialAccounts::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SocialAccounts::UserId).uuid().not_null())
                    .col(ColumnDef::new(SocialAccounts::Provider).text().not_null())
                    .col(
                        ColumnDef::new(SocialAccounts::ProviderAccountId)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SocialAccounts::ProviderUsername)
                            .text()
                            .null(),
                    )
                    .col(ColumnDef::new(SocialAccounts::AccessToken).text().not_null())
                    .col(ColumnDef::new(SocialAccounts::RefreshToken).text().null())
                    .col(
                        ColumnDef::new(SocialAccounts::TokenExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(SocialAccounts::ProfileData).json_binary().null())
                    .col(ColumnDef::new(SocialAccounts::Scope).text().null())
                    .col(
                        ColumnDef::new(SocialAccounts::Status)
                            .text()
                            .not_null()
                            .default("active"),
                    )
                    .col(
                        ColumnDef::new(SocialAccounts::LastSyncAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SocialAccounts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(SocialAccounts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Not unique: several accounts per (user, provider) may exist.
        manager
            .create_index(
                Index::create()
                    .name("idx_social_accounts_user_provider")
                    .table(SocialAccounts::Table)
                    .col(SocialAccounts::UserId)
                    .col(SocialAccounts::Provider)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_social_accounts_user_provider")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(SocialAccounts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SocialAccounts {
    Table,
    Id,
    UserId,
    Provider,
    ProviderAccountId,
    ProviderUsername,
    AccessToken,
    RefreshToken,
    TokenExpiresAt,
    ProfileData,
    Scope,
    Status,
    LastSyncAt,
    CreatedAt,
    UpdatedAt,
}
