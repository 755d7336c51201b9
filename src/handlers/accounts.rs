//! # Accounts API Handlers
//!
//! Listing and disconnecting the caller's connected social accounts, and
//! capability queries against them.

use crate::auth::CurrentUser;
use crate::error::{ApiError, not_found, validation_error};
use crate::models::social_account::SocialAccountResponse;
use crate::providers::Capability;
use crate::repositories::RecordError;
use crate::server::AppState;
use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Response wrapper for account listing
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AccountsResponse {
    pub accounts: Vec<SocialAccountResponse>,
}

/// Capability answer for one account
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CapabilityResponse {
    pub account_id: Uuid,
    pub provider: String,
    pub capability: Capability,
    pub supported: bool,
}

/// Lists the caller's connected accounts, newest first
#[utoipa::path(
    get,
    path = "/accounts",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Connected accounts", body = AccountsResponse),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    tag = "accounts"
)]
pub async fn list_accounts(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<AccountsResponse>, ApiError> {
    let accounts = state
        .accounts
        .list_for_owner(user.id())
        .await?
        .into_iter()
        .map(SocialAccountResponse::from)
        .collect();
    Ok(Json(AccountsResponse { accounts }))
}

/// Marks an account disconnected; tokens are kept but never used again
#[utoipa::path(
    delete,
    path = "/accounts/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account disconnected", body = SocialAccountResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "Account not found", body = ApiError)
    ),
    tag = "accounts"
)]
pub async fn disconnect_account(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SocialAccountResponse>, ApiError> {
    let account = state
        .accounts
        .disconnect(user.id(), id)
        .await
        .map_err(|err| match err {
            RecordError::NotFound => not_found(Some("Account not found")),
            other => other.into(),
        })?;
    tracing::info!(account_id = %id, provider = %account.provider, "Account disconnected");
    Ok(Json(account.into()))
}

/// Whether the account's platform offers a capability
#[utoipa::path(
    get,
    path = "/accounts/{id}/capabilities/{capability}",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Account id"),
        ("capability" = String, Path, description = "upload, playlists, analytics, scheduling or monetization")
    ),
    responses(
        (status = 200, description = "Capability answer", body = CapabilityResponse),
        (status = 400, description = "Unknown capability", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "Account not found", body = ApiError)
    ),
    tag = "accounts"
)]
pub async fn account_capability(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((id, capability)): Path<(Uuid, String)>,
) -> Result<Json<CapabilityResponse>, ApiError> {
    let capability: Capability = capability.parse().map_err(|message: String| {
        validation_error(
            &message,
            serde_json::json!({ "capability": ["unknown capability"] }),
        )
    })?;

    let account = state
        .accounts
        .find_owned(user.id(), id)
        .await?
        .ok_or_else(|| not_found(Some("Account not found")))?;

    Ok(Json(CapabilityResponse {
        supported: state.capabilities.has_capability(&account, capability),
        account_id: account.id,
        provider: account.provider,
        capability,
    }))
}
