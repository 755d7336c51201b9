//! Social share entity model
//!
//! One publishing attempt of a reaction to one provider. A share is created
//! `pending` and moves exactly once to `published`, `scheduled` or `failed`.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "social_shares")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub reaction_id: Uuid,
    pub provider: String,
    /// Account the attempt was made with
    pub social_account_id: Option<Uuid>,
    pub provider_post_id: Option<String>,
    pub provider_post_url: Option<String>,
    pub status: ShareStatus,
    pub scheduled_for: Option<DateTimeWithTimeZone>,
    pub published_at: Option<DateTimeWithTimeZone>,
    /// Title/description/privacy/tags, plus `error` on failure
    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: Option<JsonValue>,
    /// Last normalized analytics snapshot
    #[sea_orm(column_type = "JsonBinary")]
    pub analytics: Option<JsonValue>,
    pub last_analytics_sync_at: Option<DateTimeWithTimeZone>,
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
pub enum ShareStatus {
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,

    #[sea_orm(string_value = "scheduled")]
    Scheduled,

    #[sea_orm(string_value = "published")]
    Published,

    #[sea_orm(string_value = "failed")]
    Failed,
}

impl ShareStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Published | Self::Failed)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::reaction::Entity",
        from = "Column::ReactionId",
        to = "super::reaction::Column::Id"
    )]
    Reaction,
}

impl Related<super::reaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SocialShareResponse {
    pub id: Uuid,
    pub reaction_id: Uuid,
    pub provider: String,
    pub provider_post_id: Option<String>,
    pub provider_post_url: Option<String>,
    pub status: ShareStatus,
    #[schema(value_type = Option<String>, example = "2025-01-01T12:00:00Z")]
    pub scheduled_for: Option<DateTimeWithTimeZone>,
    #[schema(value_type = Option<String>, example = "2025-01-01T12:00:00Z")]
    pub published_at: Option<DateTimeWithTimeZone>,
    pub metadata: JsonValue,
    pub analytics: Option<JsonValue>,
    #[schema(value_type = Option<String>, example = "2025-01-01T12:00:00Z")]
    pub last_analytics_sync_at: Option<DateTimeWithTimeZone>,
    #[schema(value_type = String, example = "2025-01-01T12:00:00Z")]
    pub created_at: DateTimeWithTimeZone,
}

impl From<Model> for SocialShareResponse {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            reaction_id: model.reaction_id,
            provider: model.provider,
            provider_post_id: model.provider_post_id,
            provider_post_url: model.provider_post_url,
            status: model.status,
            scheduled_for: model.scheduled_for,
            published_at: model.published_at,
            metadata: model.metadata.unwrap_or_default(),
            analytics: model.analytics,
            last_analytics_sync_at: model.last_analytics_sync_at,
            created_at: model.created_at,
        }
    }
}
