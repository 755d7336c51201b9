//! # Signed Blob Handlers
//!
//! Serves `LocalBlobStore` objects behind HMAC-signed URLs. These routes
//! carry no session; the `expires`/`signature` pair is the authorization.

use crate::error::{ApiError, not_found, unauthorized};
use crate::server::AppState;
use crate::storage::{BlobStore, Bucket, SignedAccess};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Deserialize, Serialize, IntoParams, ToSchema)]
pub struct SignedBlobQuery {
    /// Unix timestamp after which the URL is rejected
    pub expires: i64,
    /// Hex HMAC over access, bucket, path and expiry
    pub signature: String,
}

fn content_type_for(path: &str) -> &'static str {
    let extension = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => OCTET_STREAM,
    }
}

fn authorize(
    state: &AppState,
    access: SignedAccess,
    bucket: &str,
    path: &str,
    query: &SignedBlobQuery,
) -> Result<Bucket, ApiError> {
    let bucket = Bucket::parse(bucket).ok_or_else(|| not_found(Some("Unknown bucket")))?;
    if !state
        .blob_store
        .verify_signature(access, bucket, path, query.expires, &query.signature)
    {
        tracing::debug!(bucket = %bucket, path, "Rejected blob signature");
        return Err(unauthorized(Some("Invalid or expired signature")));
    }
    Ok(bucket)
}

/// Downloads an object through a signed read URL
#[utoipa::path(
    get,
    path = "/blobs/{bucket}/{path}",
    params(
        ("bucket" = String, Path, description = "source-videos or reactions"),
        ("path" = String, Path, description = "Object path inside the bucket"),
        SignedBlobQuery
    ),
    responses(
        (status = 200, description = "Object bytes"),
        (status = 401, description = "Invalid or expired signature", body = ApiError),
        (status = 404, description = "Object not found", body = ApiError)
    ),
    tag = "blobs"
)]
pub async fn read_blob(
    State(state): State<AppState>,
    Path((bucket, path)): Path<(String, String)>,
    Query(query): Query<SignedBlobQuery>,
) -> Result<Response, ApiError> {
    let bucket = authorize(&state, SignedAccess::Read, &bucket, &path, &query)?;
    let data = state.blob_store.download(bucket, &path).await?;
    Ok(([(CONTENT_TYPE, content_type_for(&path))], data).into_response())
}

/// Uploads an object through a signed write URL
#[utoipa::path(
    put,
    path = "/blobs/{bucket}/{path}",
    params(
        ("bucket" = String, Path, description = "source-videos or reactions"),
        ("path" = String, Path, description = "Object path inside the bucket"),
        SignedBlobQuery
    ),
    request_body(content = String, content_type = "application/octet-stream", description = "Raw object bytes"),
    responses(
        (status = 201, description = "Object stored"),
        (status = 400, description = "Invalid path or empty body", body = ApiError),
        (status = 401, description = "Invalid or expired signature", body = ApiError)
    ),
    tag = "blobs"
)]
pub async fn write_blob(
    State(state): State<AppState>,
    Path((bucket, path)): Path<(String, String)>,
    Query(query): Query<SignedBlobQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let bucket = authorize(&state, SignedAccess::Write, &bucket, &path, &query)?;
    if body.is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_FAILED",
            "Request body is empty",
        ));
    }

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_else(|| content_type_for(&path))
        .to_string();
    state
        .blob_store
        .upload(bucket, &path, body.to_vec(), &content_type)
        .await?;
    Ok(StatusCode::CREATED)
}
