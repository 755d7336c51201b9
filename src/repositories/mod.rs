//! # Repository Layer
//!
//! Owner-scoped record-store access. Every lookup that takes an `owner`
//! filters on `user_id`; a row owned by someone else is indistinguishable
//! from a missing row.

use sea_orm::DbErr;
use thiserror::Error;

use crate::error::{ApiError, not_found};

pub mod folder;
pub mod reaction;
pub mod social_account;
pub mod social_share;
pub mod source_video;

pub use folder::FolderRepository;
pub use reaction::ReactionRepository;
pub use social_account::SocialAccountRepository;
pub use social_share::SocialShareRepository;
pub use source_video::SourceVideoRepository;

/// Record-store failure.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

impl From<RecordError> for ApiError {
    fn from(error: RecordError) -> Self {
        match error {
            RecordError::NotFound => not_found(None),
            RecordError::Database(err) => err.into(),
        }
    }
}

pub(crate) fn now() -> sea_orm::prelude::DateTimeWithTimeZone {
    chrono::Utc::now().fixed_offset()
}
