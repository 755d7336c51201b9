//! Folder repository

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait, sea_query::Expr,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{RecordError, now};
use crate::models::folder::{self, Entity as Folder};
use crate::models::source_video::{self, Entity as SourceVideo};

#[derive(Debug, Clone)]
pub struct FolderRepository {
    db: Arc<DatabaseConnection>,
}

impl FolderRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        owner: Uuid,
        name: String,
        description: Option<String>,
    ) -> Result<folder::Model, RecordError> {
        let timestamp = now();
        let model = folder::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(owner),
            name: Set(name),
            description: Set(description),
            created_at: Set(timestamp),
            updated_at: Set(timestamp),
        };
        Ok(model.insert(&*self.db).await?)
    }

    pub async fn list_for_owner(&self, owner: Uuid) -> Result<Vec<folder::Model>, RecordError> {
        Ok(Folder::find()
            .filter(folder::Column::UserId.eq(owner))
            .order_by_asc(folder::Column::Name)
            .all(&*self.db)
            .await?)
    }

    pub async fn find_owned(
        &self,
        owner: Uuid,
        id: Uuid,
    ) -> Result<Option<folder::Model>, RecordError> {
        Ok(Folder::find_by_id(id)
            .filter(folder::Column::UserId.eq(owner))
            .one(&*self.db)
            .await?)
    }

    /// Delete an owned folder; videos filed under it get `folder_id = NULL`.
    ///
    /// Returns the number of videos that were unfiled.
    pub async fn delete_owned(&self, owner: Uuid, id: Uuid) -> Result<u64, RecordError> {
        let folder = self.find_owned(owner, id).await?.ok_or(RecordError::NotFound)?;

        let txn = self.db.begin().await?;
        let unfiled = SourceVideo::update_many()
            .col_expr(source_video::Column::FolderId, Expr::value(Option::<Uuid>::None))
            .col_expr(source_video::Column::UpdatedAt, Expr::value(now()))
            .filter(source_video::Column::UserId.eq(owner))
            .filter(source_video::Column::FolderId.eq(id))
            .exec(&txn)
            .await?
            .rows_affected;
        folder.delete(&txn).await?;
        txn.commit().await?;

        tracing::info!(folder_id = %id, unfiled, "Folder deleted");
        Ok(unfiled)
    }
}
