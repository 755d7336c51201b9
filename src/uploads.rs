//! # Reaction Upload & Completion
//!
//! The client uploads reaction bytes straight to the blob store. This module
//! only hands out an owner-scoped path (with a signed write URL) and records
//! completion on the reaction.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{ApiError, not_found, validation_error};
use crate::models::reaction;
use crate::repositories::reaction::NewReaction;
use crate::repositories::{ReactionRepository, RecordError, SourceVideoRepository};
use crate::storage::{BlobStore, Bucket, StorageError, validate_path};

/// Lifetime of signed upload and playback URLs.
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(15 * 60);

const MAX_TITLE_LEN: usize = 200;

static UNSAFE_FILE_CHARS: OnceLock<Regex> = OnceLock::new();

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_file_name(file_name: &str) -> String {
    UNSAFE_FILE_CHARS
        .get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]").expect("static regex is valid"))
        .replace_all(file_name, "_")
        .into_owned()
}

/// Storage path of a reaction recording: `{owner}/{reaction}/{file}`.
pub fn reaction_storage_path(owner: Uuid, reaction_id: Uuid, file_name: &str) -> String {
    format!("{owner}/{reaction_id}/{}", sanitize_file_name(file_name))
}

#[derive(Debug, Error)]
pub enum UploadFlowError {
    #[error("reaction not found")]
    NotFound,
    #[error("source video not found")]
    SourceVideoNotFound,
    #[error("invalid file name")]
    InvalidFileName,
    #[error("storage path does not belong to this reaction")]
    ForeignStoragePath,
    #[error("invalid reaction: {0}")]
    Invalid(&'static str),
    #[error("reaction has no uploaded video")]
    NotUploaded,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Record(RecordError),
}

impl From<RecordError> for UploadFlowError {
    fn from(error: RecordError) -> Self {
        match error {
            RecordError::NotFound => UploadFlowError::NotFound,
            other => UploadFlowError::Record(other),
        }
    }
}

impl From<UploadFlowError> for ApiError {
    fn from(error: UploadFlowError) -> Self {
        match error {
            UploadFlowError::NotFound => not_found(Some("Reaction not found")),
            UploadFlowError::SourceVideoNotFound => not_found(Some("Source video not found")),
            UploadFlowError::InvalidFileName => validation_error(
                "Invalid file name",
                serde_json::json!({ "file_name": "must contain at least one letter or digit" }),
            ),
            UploadFlowError::ForeignStoragePath => validation_error(
                "Invalid storage path",
                serde_json::json!({ "storage_path": "must be the path issued for this reaction" }),
            ),
            UploadFlowError::Invalid(field) => validation_error(
                "Invalid reaction",
                serde_json::json!({ field: "is empty or too long" }),
            ),
            UploadFlowError::NotUploaded => not_found(Some("Reaction has no uploaded video")),
            UploadFlowError::Storage(err) => err.into(),
            UploadFlowError::Record(err) => err.into(),
        }
    }
}

/// Client-usable upload destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub storage_path: String,
    pub upload_url: String,
}

#[derive(Clone)]
pub struct ReactionUploads {
    reactions: ReactionRepository,
    videos: SourceVideoRepository,
    blobs: Arc<dyn BlobStore>,
}

impl ReactionUploads {
    pub fn new(
        reactions: ReactionRepository,
        videos: SourceVideoRepository,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            reactions,
            videos,
            blobs,
        }
    }

    /// Register a reaction in `pending_upload`. A referenced source video must
    /// belong to the owner.
    pub async fn create(
        &self,
        owner: Uuid,
        new: NewReaction,
    ) -> Result<reaction::Model, UploadFlowError> {
        let title = new.title.trim();
        if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
            return Err(UploadFlowError::Invalid("title"));
        }
        if new.source_video_url.trim().is_empty() {
            return Err(UploadFlowError::Invalid("source_video_url"));
        }
        if let Some(video_id) = new.source_video_id {
            self.videos
                .find_owned(owner, video_id)
                .await?
                .ok_or(UploadFlowError::SourceVideoNotFound)?;
        }

        let reaction = self
            .reactions
            .create(
                owner,
                NewReaction {
                    title: title.to_string(),
                    ..new
                },
            )
            .await?;
        info!(reaction_id = %reaction.id, "Reaction registered");
        Ok(reaction)
    }

    /// Issue the storage path the client uploads the recording to.
    ///
    /// Deterministic for a given owner, reaction and file name.
    #[instrument(skip_all, fields(owner = %owner, reaction_id = %reaction_id))]
    pub async fn request_upload_target(
        &self,
        reaction_id: Uuid,
        owner: Uuid,
        file_name: &str,
    ) -> Result<UploadTarget, UploadFlowError> {
        self.reactions
            .find_owned(owner, reaction_id)
            .await?
            .ok_or(UploadFlowError::NotFound)?;

        if !file_name.chars().any(|c| c.is_ascii_alphanumeric()) {
            return Err(UploadFlowError::InvalidFileName);
        }

        let storage_path = reaction_storage_path(owner, reaction_id, file_name);
        let upload_url =
            self.blobs
                .signed_upload_url(Bucket::Reactions, &storage_path, SIGNED_URL_TTL)?;

        Ok(UploadTarget {
            storage_path,
            upload_url,
        })
    }

    /// Record a finished client upload. Repeated calls overwrite the path.
    #[instrument(skip_all, fields(owner = %owner, reaction_id = %reaction_id))]
    pub async fn complete_upload(
        &self,
        reaction_id: Uuid,
        owner: Uuid,
        storage_path: &str,
    ) -> Result<reaction::Model, UploadFlowError> {
        self.reactions
            .find_owned(owner, reaction_id)
            .await?
            .ok_or(UploadFlowError::NotFound)?;

        let prefix = format!("{owner}/{reaction_id}/");
        let file_part = storage_path
            .strip_prefix(&prefix)
            .ok_or(UploadFlowError::ForeignStoragePath)?;
        if file_part.contains('/') || validate_path(storage_path).is_err() {
            return Err(UploadFlowError::ForeignStoragePath);
        }

        let updated = self
            .reactions
            .complete_upload(owner, reaction_id, storage_path.to_string())
            .await?;
        info!(storage_path, "Reaction upload completed");
        Ok(updated)
    }

    /// Signed read URL for an uploaded reaction.
    pub async fn playback_url(
        &self,
        owner: Uuid,
        reaction_id: Uuid,
        ttl: Duration,
    ) -> Result<String, UploadFlowError> {
        let reaction = self
            .reactions
            .find_owned(owner, reaction_id)
            .await?
            .ok_or(UploadFlowError::NotFound)?;
        let path = reaction
            .reaction_video_storage_path
            .ok_or(UploadFlowError::NotUploaded)?;
        Ok(self.blobs.signed_url(Bucket::Reactions, &path, ttl)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizer_replaces_unsafe_characters() {
        assert_eq!(sanitize_file_name("my video!!.mp4"), "my_video__.mp4");
        assert_eq!(sanitize_file_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_file_name("clip-01_final.webm"), "clip-01_final.webm");
        assert_eq!(sanitize_file_name("réaction.mp4"), "r_action.mp4");
    }

    #[test]
    fn storage_path_is_deterministic() {
        let owner = Uuid::new_v4();
        let reaction = Uuid::new_v4();

        let first = reaction_storage_path(owner, reaction, "my video!!.mp4");
        let second = reaction_storage_path(owner, reaction, "my video!!.mp4");

        assert_eq!(first, second);
        assert_eq!(first, format!("{owner}/{reaction}/my_video__.mp4"));
    }
}
