//! # Reaction API Handlers
//!
//! Registering reactions, the two-step upload flow (request a target, then
//! confirm completion) and publishing to a connected platform.

use crate::auth::CurrentUser;
use crate::error::{ApiError, not_found};
use crate::models::reaction::ReactionResponse;
use crate::models::social_share::SocialShareResponse;
use crate::providers::PublishMetadata;
use crate::publishing::PublishOptions;
use crate::repositories::reaction::NewReaction;
use crate::server::AppState;
use crate::uploads::SIGNED_URL_TTL;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateReactionRequest {
    /// URL of the video being reacted to
    pub source_video_url: String,
    /// Library video the reaction was recorded against
    pub source_video_id: Option<Uuid>,
    #[schema(example = "My reaction to the trailer")]
    pub title: String,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReactionsResponse {
    pub reactions: Vec<ReactionResponse>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UploadTargetRequest {
    #[schema(example = "take 1.mp4")]
    pub file_name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadTargetResponse {
    /// Path to confirm with complete-upload
    pub storage_path: String,
    /// Signed URL accepting a `PUT` of the recording
    pub upload_url: String,
    pub expires_in_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CompleteUploadRequest {
    pub storage_path: String,
}

/// Publish request: target platform plus post metadata
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct PublishRequest {
    #[schema(example = "youtube")]
    pub provider: String,
    pub title: String,
    pub description: Option<String>,
    /// Provider privacy setting (e.g. "public", "private", "unlisted")
    pub privacy: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Publish through this account instead of the active one
    pub account_id: Option<Uuid>,
    /// Release time for providers that support scheduling
    #[schema(value_type = Option<String>, example = "2025-06-01T18:00:00Z")]
    pub scheduled_for: Option<DateTime<Utc>>,
}

impl PublishRequest {
    fn into_parts(self) -> (String, PublishMetadata, PublishOptions) {
        (
            self.provider,
            PublishMetadata {
                title: self.title,
                description: self.description,
                privacy: self.privacy,
                tags: self.tags,
                publish_at: None,
            },
            PublishOptions {
                account_id: self.account_id,
                scheduled_for: self.scheduled_for,
            },
        )
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PlaybackUrlResponse {
    pub url: String,
    pub expires_in_seconds: u64,
}

/// Registers a reaction awaiting its upload
#[utoipa::path(
    post,
    path = "/reactions",
    security(("bearer_auth" = [])),
    request_body = CreateReactionRequest,
    responses(
        (status = 201, description = "Reaction created in pending_upload", body = ReactionResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "Source video not found", body = ApiError)
    ),
    tag = "reactions"
)]
pub async fn create_reaction(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateReactionRequest>,
) -> Result<(StatusCode, Json<ReactionResponse>), ApiError> {
    let reaction = state
        .uploads
        .create(
            user.id(),
            NewReaction {
                source_video_url: request.source_video_url,
                source_video_id: request.source_video_id,
                title: request.title,
                thumbnail_url: request.thumbnail_url,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(reaction.into())))
}

/// Lists the caller's reactions, newest first
#[utoipa::path(
    get,
    path = "/reactions",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Reactions", body = ReactionsResponse),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    tag = "reactions"
)]
pub async fn list_reactions(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ReactionsResponse>, ApiError> {
    let reactions = state
        .reactions
        .list_for_owner(user.id())
        .await?
        .into_iter()
        .map(ReactionResponse::from)
        .collect();
    Ok(Json(ReactionsResponse { reactions }))
}

#[utoipa::path(
    get,
    path = "/reactions/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Reaction id")),
    responses(
        (status = 200, description = "Reaction", body = ReactionResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "Reaction not found", body = ApiError)
    ),
    tag = "reactions"
)]
pub async fn get_reaction(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ReactionResponse>, ApiError> {
    let reaction = state
        .reactions
        .find_owned(user.id(), id)
        .await?
        .ok_or_else(|| not_found(Some("Reaction not found")))?;
    Ok(Json(reaction.into()))
}

/// Issues the owner-scoped storage path and a signed upload URL
#[utoipa::path(
    post,
    path = "/reactions/{id}/upload-target",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Reaction id")),
    request_body = UploadTargetRequest,
    responses(
        (status = 200, description = "Upload target", body = UploadTargetResponse),
        (status = 400, description = "Invalid file name", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "Reaction not found", body = ApiError)
    ),
    tag = "reactions"
)]
pub async fn request_upload_target(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UploadTargetRequest>,
) -> Result<Json<UploadTargetResponse>, ApiError> {
    let target = state
        .uploads
        .request_upload_target(id, user.id(), &request.file_name)
        .await?;
    Ok(Json(UploadTargetResponse {
        storage_path: target.storage_path,
        upload_url: target.upload_url,
        expires_in_seconds: SIGNED_URL_TTL.as_secs(),
    }))
}

/// Records that the client finished uploading; repeat calls overwrite the path
#[utoipa::path(
    post,
    path = "/reactions/{id}/complete-upload",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Reaction id")),
    request_body = CompleteUploadRequest,
    responses(
        (status = 200, description = "Reaction marked uploaded", body = ReactionResponse),
        (status = 400, description = "Storage path not issued for this reaction", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "Reaction not found", body = ApiError)
    ),
    tag = "reactions"
)]
pub async fn complete_upload(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<CompleteUploadRequest>,
) -> Result<Json<ReactionResponse>, ApiError> {
    let reaction = state
        .uploads
        .complete_upload(id, user.id(), &request.storage_path)
        .await?;
    Ok(Json(reaction.into()))
}

/// Publishes the reaction to one provider and returns the settled share
///
/// A failed attempt still leaves a `failed` share; the error details carry
/// its `share_id`.
#[utoipa::path(
    post,
    path = "/reactions/{id}/publish",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Reaction id")),
    request_body = PublishRequest,
    responses(
        (status = 201, description = "Share published or scheduled", body = SocialShareResponse),
        (status = 400, description = "Unknown provider, unsupported feature or invalid metadata", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "Reaction or account not found", body = ApiError),
        (status = 409, description = "Media not ready, ambiguous account or publish already pending", body = ApiError),
        (status = 502, description = "Provider rejected the publish", body = ApiError),
        (status = 503, description = "Provider unreachable or not configured", body = ApiError)
    ),
    tag = "reactions"
)]
pub async fn publish_reaction(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<PublishRequest>,
) -> Result<(StatusCode, Json<SocialShareResponse>), ApiError> {
    let (provider, metadata, options) = request.into_parts();
    let share = state
        .publisher
        .publish(id, &provider, user.id(), metadata, options)
        .await?;
    Ok((StatusCode::CREATED, Json(share.into())))
}

/// Signed, time-limited URL for watching an uploaded reaction
#[utoipa::path(
    get,
    path = "/reactions/{id}/playback-url",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Reaction id")),
    responses(
        (status = 200, description = "Signed playback URL", body = PlaybackUrlResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "Reaction not found or not uploaded", body = ApiError)
    ),
    tag = "reactions"
)]
pub async fn playback_url(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PlaybackUrlResponse>, ApiError> {
    let url = state
        .uploads
        .playback_url(user.id(), id, SIGNED_URL_TTL)
        .await?;
    Ok(Json(PlaybackUrlResponse {
        url,
        expires_in_seconds: SIGNED_URL_TTL.as_secs(),
    }))
}
