//! Source video repository
//!
//! Status is only written at creation and at terminal states; `storage_path`
//! is written in the same update that sets `completed`.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{RecordError, now};
use crate::models::source_video::{self, Entity as SourceVideo, SourceVideoStatus};

/// Metadata recorded when a download completes
#[derive(Debug, Clone, Default)]
pub struct CompletedDownload {
    pub storage_path: String,
    pub title: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: Option<i32>,
    pub file_format: Option<String>,
    pub file_size: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct SourceVideoRepository {
    db: Arc<DatabaseConnection>,
}

impl SourceVideoRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Register a download request in `downloading` status.
    pub async fn create_downloading(
        &self,
        owner: Uuid,
        original_url: String,
        folder_id: Option<Uuid>,
    ) -> Result<source_video::Model, RecordError> {
        let timestamp = now();
        let model = source_video::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(owner),
            original_url: Set(original_url),
            storage_path: Set(None),
            title: Set(None),
            thumbnail_url: Set(None),
            status: Set(SourceVideoStatus::Downloading),
            folder_id: Set(folder_id),
            duration_seconds: Set(None),
            file_format: Set(None),
            file_size: Set(None),
            error_message: Set(None),
            created_at: Set(timestamp),
            updated_at: Set(timestamp),
        };
        Ok(model.insert(&*self.db).await?)
    }

    pub async fn mark_completed(
        &self,
        id: Uuid,
        download: CompletedDownload,
    ) -> Result<source_video::Model, RecordError> {
        let video = SourceVideo::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or(RecordError::NotFound)?;
        let mut active = video.into_active_model();
        active.storage_path = Set(Some(download.storage_path));
        active.title = Set(download.title);
        active.thumbnail_url = Set(download.thumbnail_url);
        active.duration_seconds = Set(download.duration_seconds);
        active.file_format = Set(download.file_format);
        active.file_size = Set(download.file_size);
        active.error_message = Set(None);
        active.status = Set(SourceVideoStatus::Completed);
        active.updated_at = Set(now());
        Ok(active.update(&*self.db).await?)
    }

    /// Mark a download failed. Clears any storage path.
    pub async fn mark_error(
        &self,
        id: Uuid,
        message: String,
    ) -> Result<source_video::Model, RecordError> {
        let video = SourceVideo::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or(RecordError::NotFound)?;
        let mut active = video.into_active_model();
        active.storage_path = Set(None);
        active.error_message = Set(Some(message));
        active.status = Set(SourceVideoStatus::Error);
        active.updated_at = Set(now());
        Ok(active.update(&*self.db).await?)
    }

    pub async fn find_owned(
        &self,
        owner: Uuid,
        id: Uuid,
    ) -> Result<Option<source_video::Model>, RecordError> {
        Ok(SourceVideo::find_by_id(id)
            .filter(source_video::Column::UserId.eq(owner))
            .one(&*self.db)
            .await?)
    }

    /// Owned videos, newest first, optionally restricted to one folder.
    pub async fn list_for_owner(
        &self,
        owner: Uuid,
        folder_id: Option<Uuid>,
    ) -> Result<Vec<source_video::Model>, RecordError> {
        let mut query = SourceVideo::find().filter(source_video::Column::UserId.eq(owner));
        if let Some(folder_id) = folder_id {
            query = query.filter(source_video::Column::FolderId.eq(folder_id));
        }
        Ok(query
            .order_by_desc(source_video::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Delete the owned subset of `ids`, returning the deleted rows.
    ///
    /// Ids owned by someone else are silently skipped.
    pub async fn delete_owned(
        &self,
        owner: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<source_video::Model>, RecordError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let owned = SourceVideo::find()
            .filter(source_video::Column::UserId.eq(owner))
            .filter(source_video::Column::Id.is_in(ids.iter().copied()))
            .all(&*self.db)
            .await?;
        if owned.is_empty() {
            return Ok(owned);
        }

        SourceVideo::delete_many()
            .filter(source_video::Column::UserId.eq(owner))
            .filter(source_video::Column::Id.is_in(owned.iter().map(|v| v.id)))
            .exec(&*self.db)
            .await?;

        Ok(owned)
    }

    pub async fn move_to_folder(
        &self,
        owner: Uuid,
        id: Uuid,
        folder_id: Option<Uuid>,
    ) -> Result<source_video::Model, RecordError> {
        let video = self.find_owned(owner, id).await?.ok_or(RecordError::NotFound)?;
        let mut active = video.into_active_model();
        active.folder_id = Set(folder_id);
        active.updated_at = Set(now());
        Ok(active.update(&*self.db).await?)
    }
}
