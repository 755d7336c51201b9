//! # Data Models
//!
//! This module contains all the data models used throughout the ReactShare service.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod folder;
pub mod reaction;
pub mod social_account;
pub mod social_share;
pub mod source_video;

pub use folder::Entity as Folder;
pub use reaction::Entity as Reaction;
pub use social_account::Entity as SocialAccount;
pub use social_share::Entity as SocialShare;
pub use source_video::Entity as SourceVideo;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "reactshare".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
