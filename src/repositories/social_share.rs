//! Social share repository
//!
//! Transitions out of `pending` are conditional on the row still being
//! `pending`, so a settled share is never moved again by this repository.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set, prelude::DateTimeWithTimeZone, sea_query::Expr,
};
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use uuid::Uuid;

use super::{RecordError, now};
use crate::models::social_share::{self, Entity as SocialShare, ShareStatus};

/// Fields of a new publish attempt
#[derive(Debug, Clone)]
pub struct NewShare {
    pub reaction_id: Uuid,
    pub provider: String,
    pub social_account_id: Option<Uuid>,
    pub metadata: JsonValue,
    pub scheduled_for: Option<DateTimeWithTimeZone>,
}

#[derive(Debug, Clone)]
pub struct SocialShareRepository {
    db: Arc<DatabaseConnection>,
}

impl SocialShareRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn create_pending(
        &self,
        owner: Uuid,
        new: NewShare,
    ) -> Result<social_share::Model, RecordError> {
        let timestamp = now();
        let model = social_share::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(owner),
            reaction_id: Set(new.reaction_id),
            provider: Set(new.provider),
            social_account_id: Set(new.social_account_id),
            provider_post_id: Set(None),
            provider_post_url: Set(None),
            status: Set(ShareStatus::Pending),
            scheduled_for: Set(new.scheduled_for),
            published_at: Set(None),
            metadata: Set(Some(new.metadata)),
            analytics: Set(None),
            last_analytics_sync_at: Set(None),
            created_at: Set(timestamp),
            updated_at: Set(timestamp),
        };
        Ok(model.insert(&*self.db).await?)
    }

    async fn get(&self, id: Uuid) -> Result<social_share::Model, RecordError> {
        SocialShare::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or(RecordError::NotFound)
    }

    /// `pending -> failed`, recording `error` into metadata.
    pub async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
    ) -> Result<social_share::Model, RecordError> {
        let share = self.get(id).await?;
        if share.status != ShareStatus::Pending {
            tracing::warn!(share_id = %id, status = ?share.status, "Refusing to fail a settled share");
            return Ok(share);
        }

        let mut metadata = match share.metadata.clone() {
            Some(JsonValue::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        metadata.insert("error".to_string(), json!(error));

        let result = SocialShare::update_many()
            .col_expr(social_share::Column::Status, Expr::value(ShareStatus::Failed))
            .col_expr(
                social_share::Column::Metadata,
                Expr::value(JsonValue::Object(metadata)),
            )
            .col_expr(social_share::Column::UpdatedAt, Expr::value(now()))
            .filter(social_share::Column::Id.eq(id))
            .filter(social_share::Column::Status.eq(ShareStatus::Pending))
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            tracing::warn!(share_id = %id, "Share settled concurrently; failure not recorded");
        }
        self.get(id).await
    }

    /// `pending -> published` with the provider-assigned identifiers.
    pub async fn mark_published(
        &self,
        id: Uuid,
        provider_post_id: String,
        provider_post_url: Option<String>,
        published_at: DateTimeWithTimeZone,
    ) -> Result<social_share::Model, RecordError> {
        self.settle_upload(
            id,
            ShareStatus::Published,
            provider_post_id,
            provider_post_url,
            published_at,
        )
        .await
    }

    /// `pending -> scheduled`: the provider holds the post until `publish_at`.
    pub async fn mark_scheduled(
        &self,
        id: Uuid,
        provider_post_id: String,
        provider_post_url: Option<String>,
        publish_at: DateTimeWithTimeZone,
    ) -> Result<social_share::Model, RecordError> {
        self.settle_upload(
            id,
            ShareStatus::Scheduled,
            provider_post_id,
            provider_post_url,
            publish_at,
        )
        .await
    }

    async fn settle_upload(
        &self,
        id: Uuid,
        status: ShareStatus,
        provider_post_id: String,
        provider_post_url: Option<String>,
        published_at: DateTimeWithTimeZone,
    ) -> Result<social_share::Model, RecordError> {
        let result = SocialShare::update_many()
            .col_expr(social_share::Column::Status, Expr::value(status))
            .col_expr(
                social_share::Column::ProviderPostId,
                Expr::value(Some(provider_post_id)),
            )
            .col_expr(
                social_share::Column::ProviderPostUrl,
                Expr::value(provider_post_url),
            )
            .col_expr(
                social_share::Column::PublishedAt,
                Expr::value(Some(published_at)),
            )
            .col_expr(social_share::Column::UpdatedAt, Expr::value(now()))
            .filter(social_share::Column::Id.eq(id))
            .filter(social_share::Column::Status.eq(ShareStatus::Pending))
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            tracing::warn!(share_id = %id, ?status, "Share was not pending; upload result not recorded");
        }
        self.get(id).await
    }

    pub async fn record_analytics(
        &self,
        id: Uuid,
        analytics: JsonValue,
    ) -> Result<social_share::Model, RecordError> {
        let share = self.get(id).await?;
        let timestamp = now();
        let mut active = share.into_active_model();
        active.analytics = Set(Some(analytics));
        active.last_analytics_sync_at = Set(Some(timestamp));
        active.updated_at = Set(timestamp);
        Ok(active.update(&*self.db).await?)
    }

    pub async fn find_owned(
        &self,
        owner: Uuid,
        id: Uuid,
    ) -> Result<Option<social_share::Model>, RecordError> {
        Ok(SocialShare::find_by_id(id)
            .filter(social_share::Column::UserId.eq(owner))
            .one(&*self.db)
            .await?)
    }

    pub async fn find_by_provider_post(
        &self,
        owner: Uuid,
        provider: &str,
        provider_post_id: &str,
    ) -> Result<Option<social_share::Model>, RecordError> {
        Ok(SocialShare::find()
            .filter(social_share::Column::UserId.eq(owner))
            .filter(social_share::Column::Provider.eq(provider))
            .filter(social_share::Column::ProviderPostId.eq(provider_post_id))
            .order_by_desc(social_share::Column::CreatedAt)
            .one(&*self.db)
            .await?)
    }

    /// Owned shares, newest first, optionally for one reaction.
    pub async fn list_for_owner(
        &self,
        owner: Uuid,
        reaction_id: Option<Uuid>,
    ) -> Result<Vec<social_share::Model>, RecordError> {
        let mut query = SocialShare::find().filter(social_share::Column::UserId.eq(owner));
        if let Some(reaction_id) = reaction_id {
            query = query.filter(social_share::Column::ReactionId.eq(reaction_id));
        }
        Ok(query
            .order_by_desc(social_share::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    pub async fn has_pending(
        &self,
        owner: Uuid,
        reaction_id: Uuid,
        provider: &str,
    ) -> Result<bool, RecordError> {
        Ok(SocialShare::find()
            .filter(social_share::Column::UserId.eq(owner))
            .filter(social_share::Column::ReactionId.eq(reaction_id))
            .filter(social_share::Column::Provider.eq(provider))
            .filter(social_share::Column::Status.eq(ShareStatus::Pending))
            .one(&*self.db)
            .await?
            .is_some())
    }
}
