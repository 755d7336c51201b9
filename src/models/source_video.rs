//! Source video entity model
//!
//! An externally downloaded video that reactions respond to. The acquisition
//! pipeline owns the status transitions; `storage_path` is only ever set
//! together with `status = completed`.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "source_videos")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub original_url: String,
    pub storage_path: Option<String>,
    pub title: Option<String>,
    pub thumbnail_url: Option<String>,
    pub status: SourceVideoStatus,
    pub folder_id: Option<Uuid>,
    pub duration_seconds: Option<i32>,
    pub file_format: Option<String>,
    pub file_size: Option<i64>,
    /// Operator-facing failure detail, never returned to clients verbatim
    pub error_message: Option<String>,
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
pub enum SourceVideoStatus {
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,

    #[sea_orm(string_value = "downloading")]
    Downloading,

    #[sea_orm(string_value = "processing")]
    Processing,

    #[sea_orm(string_value = "completed")]
    Completed,

    #[sea_orm(string_value = "error")]
    Error,
}

impl SourceVideoStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::folder::Entity",
        from = "Column::FolderId",
        to = "super::folder::Column::Id"
    )]
    Folder,
}

impl Related<super::folder::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Folder.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SourceVideoResponse {
    pub id: Uuid,
    pub original_url: String,
    pub storage_path: Option<String>,
    pub title: Option<String>,
    pub thumbnail_url: Option<String>,
    pub status: SourceVideoStatus,
    pub folder_id: Option<Uuid>,
    pub duration_seconds: Option<i32>,
    pub file_format: Option<String>,
    pub file_size: Option<i64>,
    #[schema(value_type = String, example = "2025-01-01T12:00:00Z")]
    pub created_at: DateTimeWithTimeZone,
    #[schema(value_type = String, example = "2025-01-01T12:05:00Z")]
    pub updated_at: DateTimeWithTimeZone,
}

impl From<Model> for SourceVideoResponse {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            original_url: model.original_url,
            storage_path: model.storage_path,
            title: model.title,
            thumbnail_url: model.thumbnail_url,
            status: model.status,
            folder_id: model.folder_id,
            duration_seconds: model.duration_seconds,
            file_format: model.file_format,
            file_size: model.file_size,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
