//! # Folder API Handlers

use crate::auth::CurrentUser;
use crate::error::{ApiError, not_found, validation_error};
use crate::models::folder::FolderResponse;
use crate::repositories::RecordError;
use crate::server::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

const MAX_FOLDER_NAME_LEN: usize = 120;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateFolderRequest {
    #[schema(example = "Reaction candidates")]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FoldersResponse {
    pub folders: Vec<FolderResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteFolderResponse {
    /// Videos that were filed in the folder and are now unfiled
    pub unfiled_videos: u64,
}

/// Creates a folder
#[utoipa::path(
    post,
    path = "/folders",
    security(("bearer_auth" = [])),
    request_body = CreateFolderRequest,
    responses(
        (status = 201, description = "Folder created", body = FolderResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    tag = "folders"
)]
pub async fn create_folder(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateFolderRequest>,
) -> Result<(StatusCode, Json<FolderResponse>), ApiError> {
    let name = request.name.trim();
    if name.is_empty() || name.chars().count() > MAX_FOLDER_NAME_LEN {
        return Err(validation_error(
            "Invalid folder name",
            serde_json::json!({
                "name": [format!("must be 1 to {MAX_FOLDER_NAME_LEN} characters")]
            }),
        ));
    }
    let description = request
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    let folder = state
        .folders
        .create(user.id(), name.to_string(), description)
        .await?;
    Ok((StatusCode::CREATED, Json(folder.into())))
}

/// Lists the caller's folders by name
#[utoipa::path(
    get,
    path = "/folders",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Folders", body = FoldersResponse),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    tag = "folders"
)]
pub async fn list_folders(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<FoldersResponse>, ApiError> {
    let folders = state
        .folders
        .list_for_owner(user.id())
        .await?
        .into_iter()
        .map(FolderResponse::from)
        .collect();
    Ok(Json(FoldersResponse { folders }))
}

#[utoipa::path(
    get,
    path = "/folders/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Folder id")),
    responses(
        (status = 200, description = "Folder", body = FolderResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "Folder not found", body = ApiError)
    ),
    tag = "folders"
)]
pub async fn get_folder(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<FolderResponse>, ApiError> {
    let folder = state
        .folders
        .find_owned(user.id(), id)
        .await?
        .ok_or_else(|| not_found(Some("Folder not found")))?;
    Ok(Json(folder.into()))
}

/// Deletes a folder; its videos are kept and unfiled
#[utoipa::path(
    delete,
    path = "/folders/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Folder id")),
    responses(
        (status = 200, description = "Folder deleted", body = DeleteFolderResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "Folder not found", body = ApiError)
    ),
    tag = "folders"
)]
pub async fn delete_folder(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteFolderResponse>, ApiError> {
    let unfiled_videos = state
        .folders
        .delete_owned(user.id(), id)
        .await
        .map_err(|err| match err {
            RecordError::NotFound => not_found(Some("Folder not found")),
            other => other.into(),
        })?;
    Ok(Json(DeleteFolderResponse { unfiled_videos }))
}
