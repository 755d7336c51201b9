//! Social account entity model
//!
//! One user's connection to one social provider. Rows are created by the
//! OAuth connect flow; this service only reads them, refreshes their tokens
//! and marks them disconnected.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "social_accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Provider identifier (e.g. "youtube", "tiktok")
    pub provider: String,

    /// Account id on the provider side
    pub provider_account_id: String,

    pub provider_username: Option<String>,

    /// OAuth access token. Never serialized into API responses.
    pub access_token: String,

    pub refresh_token: Option<String>,

    pub token_expires_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(column_type = "JsonBinary")]
    pub profile_data: Option<JsonValue>,

    /// Granted OAuth scope string
    pub scope: Option<String>,

    pub status: AccountStatus,

    pub last_sync_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    #[sea_orm(string_value = "active")]
    #[default]
    Active,

    #[sea_orm(string_value = "token_expired")]
    TokenExpired,

    #[sea_orm(string_value = "disconnected")]
    Disconnected,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Account representation for API responses (tokens excluded)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SocialAccountResponse {
    pub id: Uuid,
    pub provider: String,
    pub provider_account_id: String,
    pub provider_username: Option<String>,
    pub status: AccountStatus,
    #[schema(value_type = Option<String>, example = "2025-01-01T12:00:00Z")]
    pub token_expires_at: Option<DateTimeWithTimeZone>,
    #[schema(value_type = Option<String>, example = "2025-01-01T12:00:00Z")]
    pub last_sync_at: Option<DateTimeWithTimeZone>,
    pub has_refresh_token: bool,
}

impl From<Model> for SocialAccountResponse {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            provider: model.provider,
            provider_account_id: model.provider_account_id,
            provider_username: model.provider_username,
            status: model.status,
            token_expires_at: model.token_expires_at,
            last_sync_at: model.last_sync_at,
            has_refresh_token: model.refresh_token.is_some(),
        }
    }
}
