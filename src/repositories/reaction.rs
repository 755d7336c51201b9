//! Reaction repository

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set, sea_query::Expr,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{RecordError, now};
use crate::models::reaction::{self, Entity as Reaction, ReactionStatus};

/// Fields of a newly registered reaction
#[derive(Debug, Clone)]
pub struct NewReaction {
    pub source_video_url: String,
    pub source_video_id: Option<Uuid>,
    pub title: String,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReactionRepository {
    db: Arc<DatabaseConnection>,
}

impl ReactionRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        owner: Uuid,
        new: NewReaction,
    ) -> Result<reaction::Model, RecordError> {
        let timestamp = now();
        let model = reaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(owner),
            source_video_url: Set(new.source_video_url),
            source_video_id: Set(new.source_video_id),
            reaction_video_storage_path: Set(None),
            title: Set(new.title),
            status: Set(ReactionStatus::PendingUpload),
            thumbnail_url: Set(new.thumbnail_url),
            created_at: Set(timestamp),
            updated_at: Set(timestamp),
        };
        Ok(model.insert(&*self.db).await?)
    }

    pub async fn find_owned(
        &self,
        owner: Uuid,
        id: Uuid,
    ) -> Result<Option<reaction::Model>, RecordError> {
        Ok(Reaction::find_by_id(id)
            .filter(reaction::Column::UserId.eq(owner))
            .one(&*self.db)
            .await?)
    }

    pub async fn list_for_owner(&self, owner: Uuid) -> Result<Vec<reaction::Model>, RecordError> {
        Ok(Reaction::find()
            .filter(reaction::Column::UserId.eq(owner))
            .order_by_desc(reaction::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Record the uploaded blob path and mark the reaction `uploaded`.
    ///
    /// Overwrites any previous path; the last call wins.
    pub async fn complete_upload(
        &self,
        owner: Uuid,
        id: Uuid,
        storage_path: String,
    ) -> Result<reaction::Model, RecordError> {
        let reaction = self.find_owned(owner, id).await?.ok_or(RecordError::NotFound)?;
        let mut active = reaction.into_active_model();
        active.reaction_video_storage_path = Set(Some(storage_path));
        active.status = Set(ReactionStatus::Uploaded);
        active.updated_at = Set(now());
        Ok(active.update(&*self.db).await?)
    }

    pub async fn set_status(
        &self,
        id: Uuid,
        status: ReactionStatus,
    ) -> Result<reaction::Model, RecordError> {
        let reaction = Reaction::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or(RecordError::NotFound)?;
        let mut active = reaction.into_active_model();
        active.status = Set(status);
        active.updated_at = Set(now());
        Ok(active.update(&*self.db).await?)
    }

    /// Move a reaction out of `processing`. Returns false when another
    /// attempt already settled it.
    pub async fn leave_processing(
        &self,
        id: Uuid,
        status: ReactionStatus,
    ) -> Result<bool, RecordError> {
        let result = Reaction::update_many()
            .col_expr(reaction::Column::Status, Expr::value(status))
            .col_expr(reaction::Column::UpdatedAt, Expr::value(now()))
            .filter(reaction::Column::Id.eq(id))
            .filter(reaction::Column::Status.eq(ReactionStatus::Processing))
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }
}
