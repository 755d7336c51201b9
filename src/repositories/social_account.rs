//! Social account repository

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set, prelude::DateTimeWithTimeZone,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{RecordError, now};
use crate::models::social_account::{self, AccountStatus, Entity as SocialAccount};

/// Outcome of resolving the authoritative account for a provider.
#[derive(Debug, Clone, PartialEq)]
pub enum ActiveAccount {
    Found(social_account::Model),
    /// Several active accounts exist and no single one is authoritative
    Ambiguous(usize),
    None,
}

#[derive(Debug, Clone)]
pub struct SocialAccountRepository {
    db: Arc<DatabaseConnection>,
}

impl SocialAccountRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// All accounts of `owner`, newest first.
    pub async fn list_for_owner(
        &self,
        owner: Uuid,
    ) -> Result<Vec<social_account::Model>, RecordError> {
        Ok(SocialAccount::find()
            .filter(social_account::Column::UserId.eq(owner))
            .order_by_desc(social_account::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    pub async fn find_owned(
        &self,
        owner: Uuid,
        id: Uuid,
    ) -> Result<Option<social_account::Model>, RecordError> {
        Ok(SocialAccount::find_by_id(id)
            .filter(social_account::Column::UserId.eq(owner))
            .one(&*self.db)
            .await?)
    }

    /// Resolve the account publishing and analytics act through.
    ///
    /// Only `active` accounts qualify. With `single_active` the most recently
    /// synced one wins; otherwise more than one candidate is reported as
    /// [`ActiveAccount::Ambiguous`].
    pub async fn active_for_provider(
        &self,
        owner: Uuid,
        provider: &str,
        single_active: bool,
    ) -> Result<ActiveAccount, RecordError> {
        let mut candidates = SocialAccount::find()
            .filter(social_account::Column::UserId.eq(owner))
            .filter(social_account::Column::Provider.eq(provider))
            .filter(social_account::Column::Status.eq(AccountStatus::Active))
            .order_by_desc(social_account::Column::UpdatedAt)
            .all(&*self.db)
            .await?;

        // NULL last_sync_at sorts after any synced account
        candidates.sort_by(|a, b| b.last_sync_at.cmp(&a.last_sync_at));

        Ok(match candidates.len() {
            0 => ActiveAccount::None,
            1 => ActiveAccount::Found(candidates.remove(0)),
            n if single_active => {
                tracing::debug!(
                    owner = %owner,
                    provider,
                    candidates = n,
                    "Multiple active accounts; using most recently synced"
                );
                ActiveAccount::Found(candidates.remove(0))
            }
            n => ActiveAccount::Ambiguous(n),
        })
    }

    /// Mark an owned account disconnected.
    pub async fn disconnect(
        &self,
        owner: Uuid,
        id: Uuid,
    ) -> Result<social_account::Model, RecordError> {
        let account = self.find_owned(owner, id).await?.ok_or(RecordError::NotFound)?;
        let mut active = account.into_active_model();
        active.status = Set(AccountStatus::Disconnected);
        active.updated_at = Set(now());
        Ok(active.update(&*self.db).await?)
    }

    /// Persist a refreshed token pair and reactivate the account.
    pub async fn store_refreshed_token(
        &self,
        id: Uuid,
        access_token: String,
        refresh_token: Option<String>,
        expires_at: Option<DateTimeWithTimeZone>,
    ) -> Result<social_account::Model, RecordError> {
        let account = SocialAccount::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or(RecordError::NotFound)?;
        let mut active = account.into_active_model();
        active.access_token = Set(access_token);
        if let Some(refresh_token) = refresh_token {
            active.refresh_token = Set(Some(refresh_token));
        }
        active.token_expires_at = Set(expires_at);
        active.status = Set(AccountStatus::Active);
        active.updated_at = Set(now());
        Ok(active.update(&*self.db).await?)
    }

    pub async fn set_status(
        &self,
        id: Uuid,
        status: AccountStatus,
    ) -> Result<social_account::Model, RecordError> {
        let account = SocialAccount::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or(RecordError::NotFound)?;
        let mut active = account.into_active_model();
        active.status = Set(status);
        active.updated_at = Set(now());
        Ok(active.update(&*self.db).await?)
    }

    pub async fn touch_last_sync(&self, id: Uuid) -> Result<(), RecordError> {
        SocialAccount::update_many()
            .col_expr(
                social_account::Column::LastSyncAt,
                sea_orm::sea_query::Expr::value(Some(now())),
            )
            .filter(social_account::Column::Id.eq(id))
            .exec(&*self.db)
            .await?;
        Ok(())
    }
}
