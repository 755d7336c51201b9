//! # Source Video API Handlers
//!
//! Submitting downloads, polling their status and managing the library.

use crate::auth::CurrentUser;
use crate::error::{ApiError, not_found, validation_error};
use crate::models::source_video::SourceVideoResponse;
use crate::repositories::RecordError;
use crate::server::AppState;
use crate::storage::{BlobStore, Bucket};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

const MAX_BULK_DELETE: usize = 500;

/// Download request
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct SubmitSourceVideoRequest {
    /// Page URL of the video to fetch
    #[schema(example = "https://www.youtube.com/watch?v=dQw4w9WgXcQ")]
    pub url: String,
    pub folder_id: Option<Uuid>,
}

/// Query parameters for source video listing
#[derive(Debug, Deserialize, Serialize, IntoParams, ToSchema)]
pub struct ListSourceVideosQuery {
    /// Only videos filed in this folder
    pub folder_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SourceVideosResponse {
    pub source_videos: Vec<SourceVideoResponse>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct BulkDeleteRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BulkDeleteResponse {
    /// Number of owned videos that were deleted
    pub deleted: usize,
}

/// Target folder; `null` unfiles the video
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct MoveSourceVideoRequest {
    pub folder_id: Option<Uuid>,
}

/// Registers a download and runs it in the background
#[utoipa::path(
    post,
    path = "/source-videos",
    security(("bearer_auth" = [])),
    request_body = SubmitSourceVideoRequest,
    responses(
        (status = 202, description = "Download accepted; poll the returned id", body = SourceVideoResponse),
        (status = 400, description = "Invalid URL", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "Folder not found", body = ApiError),
        (status = 503, description = "Shutting down", body = ApiError)
    ),
    tag = "source-videos"
)]
pub async fn submit_source_video(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<SubmitSourceVideoRequest>,
) -> Result<(StatusCode, Json<SourceVideoResponse>), ApiError> {
    let record = state
        .acquisition
        .submit(user.id(), &request.url, request.folder_id)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(record.into())))
}

/// Lists the caller's source videos, newest first
#[utoipa::path(
    get,
    path = "/source-videos",
    security(("bearer_auth" = [])),
    params(ListSourceVideosQuery),
    responses(
        (status = 200, description = "Source videos", body = SourceVideosResponse),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    tag = "source-videos"
)]
pub async fn list_source_videos(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListSourceVideosQuery>,
) -> Result<Json<SourceVideosResponse>, ApiError> {
    let source_videos = state
        .videos
        .list_for_owner(user.id(), query.folder_id)
        .await?
        .into_iter()
        .map(SourceVideoResponse::from)
        .collect();
    Ok(Json(SourceVideosResponse { source_videos }))
}

/// Fetches one source video; used to poll download status
#[utoipa::path(
    get,
    path = "/source-videos/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Source video id")),
    responses(
        (status = 200, description = "Source video", body = SourceVideoResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "Source video not found", body = ApiError)
    ),
    tag = "source-videos"
)]
pub async fn get_source_video(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SourceVideoResponse>, ApiError> {
    let video = state
        .videos
        .find_owned(user.id(), id)
        .await?
        .ok_or_else(|| not_found(Some("Source video not found")))?;
    Ok(Json(video.into()))
}

/// Deletes the caller's videos among `ids`; others' ids are ignored
#[utoipa::path(
    post,
    path = "/source-videos/bulk-delete",
    security(("bearer_auth" = [])),
    request_body = BulkDeleteRequest,
    responses(
        (status = 200, description = "Videos deleted", body = BulkDeleteResponse),
        (status = 400, description = "Too many ids", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    tag = "source-videos"
)]
pub async fn bulk_delete_source_videos(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<BulkDeleteRequest>,
) -> Result<Json<BulkDeleteResponse>, ApiError> {
    if request.ids.len() > MAX_BULK_DELETE {
        return Err(validation_error(
            &format!("at most {MAX_BULK_DELETE} ids per request"),
            serde_json::json!({ "ids": ["too many ids"] }),
        ));
    }

    let deleted = state.videos.delete_owned(user.id(), &request.ids).await?;

    for video in &deleted {
        let Some(path) = video.storage_path.as_deref() else {
            continue;
        };
        if let Err(err) = state.blob_store.delete(Bucket::SourceVideos, path).await {
            tracing::warn!(source_video_id = %video.id, error = %err, "Failed to delete source video blob");
        }
    }

    tracing::info!(owner = %user.id(), deleted = deleted.len(), "Source videos deleted");
    Ok(Json(BulkDeleteResponse {
        deleted: deleted.len(),
    }))
}

/// Files a video under a folder, or unfiles it
#[utoipa::path(
    put,
    path = "/source-videos/{id}/folder",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Source video id")),
    request_body = MoveSourceVideoRequest,
    responses(
        (status = 200, description = "Video moved", body = SourceVideoResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "Source video or folder not found", body = ApiError)
    ),
    tag = "source-videos"
)]
pub async fn move_source_video(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<MoveSourceVideoRequest>,
) -> Result<Json<SourceVideoResponse>, ApiError> {
    if let Some(folder_id) = request.folder_id {
        state
            .folders
            .find_owned(user.id(), folder_id)
            .await?
            .ok_or_else(|| not_found(Some("Folder not found")))?;
    }

    let video = state
        .videos
        .move_to_folder(user.id(), id, request.folder_id)
        .await
        .map_err(|err| match err {
            RecordError::NotFound => not_found(Some("Source video not found")),
            other => other.into(),
        })?;
    Ok(Json(video.into()))
}
