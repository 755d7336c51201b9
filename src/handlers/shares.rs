//! # Share API Handlers
//!
//! Read access to publish attempts.

use crate::auth::CurrentUser;
use crate::error::{ApiError, not_found};
use crate::models::social_share::SocialShareResponse;
use crate::server::AppState;
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Deserialize, Serialize, IntoParams, ToSchema)]
pub struct ListSharesQuery {
    /// Only shares of this reaction
    pub reaction_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SharesResponse {
    pub shares: Vec<SocialShareResponse>,
}

/// Lists the caller's shares, newest first
#[utoipa::path(
    get,
    path = "/shares",
    security(("bearer_auth" = [])),
    params(ListSharesQuery),
    responses(
        (status = 200, description = "Shares", body = SharesResponse),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    tag = "shares"
)]
pub async fn list_shares(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListSharesQuery>,
) -> Result<Json<SharesResponse>, ApiError> {
    let shares = state
        .shares
        .list_for_owner(user.id(), query.reaction_id)
        .await?
        .into_iter()
        .map(SocialShareResponse::from)
        .collect();
    Ok(Json(SharesResponse { shares }))
}

#[utoipa::path(
    get,
    path = "/shares/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Share id")),
    responses(
        (status = 200, description = "Share", body = SocialShareResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "Share not found", body = ApiError)
    ),
    tag = "shares"
)]
pub async fn get_share(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SocialShareResponse>, ApiError> {
    let share = state
        .shares
        .find_owned(user.id(), id)
        .await?
        .ok_or_else(|| not_found(Some("Share not found")))?;
    Ok(Json(share.into()))
}
