//! Reaction entity model

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A user-recorded reaction video tied to a source video
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "reactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub source_video_url: String,
    pub source_video_id: Option<Uuid>,
    /// Blob path of the recorded reaction, set once the client confirms its upload
    pub reaction_video_storage_path: Option<String>,
    pub title: String,
    pub status: ReactionStatus,
    pub thumbnail_url: Option<String>,
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
pub enum ReactionStatus {
    #[sea_orm(string_value = "pending_upload")]
    #[default]
    PendingUpload,

    #[sea_orm(string_value = "downloading")]
    Downloading,

    #[sea_orm(string_value = "uploaded")]
    Uploaded,

    #[sea_orm(string_value = "processing")]
    Processing,

    #[sea_orm(string_value = "published")]
    Published,

    #[sea_orm(string_value = "error")]
    Error,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::social_share::Entity")]
    SocialShare,
}

impl Related<super::social_share::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SocialShare.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReactionResponse {
    pub id: Uuid,
    pub source_video_url: String,
    pub source_video_id: Option<Uuid>,
    pub reaction_video_storage_path: Option<String>,
    pub title: String,
    pub status: ReactionStatus,
    pub thumbnail_url: Option<String>,
    #[schema(value_type = String, example = "2025-01-01T12:00:00Z")]
    pub created_at: DateTimeWithTimeZone,
    #[schema(value_type = String, example = "2025-01-01T12:05:00Z")]
    pub updated_at: DateTimeWithTimeZone,
}

impl From<Model> for ReactionResponse {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            source_video_url: model.source_video_url,
            source_video_id: model.source_video_id,
            reaction_video_storage_path: model.reaction_video_storage_path,
            title: model.title,
            status: model.status,
            thumbnail_url: model.thumbnail_url,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
