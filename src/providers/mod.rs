//! Social platform integration layer.
//!
//! [`ProviderId`] is the closed set of supported platforms. Static
//! per-platform configuration lives in [`registry`], capability lookups in
//! [`capabilities`], and the platform HTTP clients behind the
//! [`ProviderClient`] trait in [`youtube`] and [`tiktok`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;

pub mod capabilities;
pub mod multipart;
pub mod registry;
pub mod tiktok;
pub mod youtube;

pub use capabilities::CapabilityService;
pub use registry::{ProviderRegistry, SocialProviderConfig};

/// Supported social platforms
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    #[serde(rename = "youtube")]
    YouTube,
    #[serde(rename = "tiktok")]
    TikTok,
    Instagram,
    Twitter,
    Facebook,
}

impl ProviderId {
    pub const ALL: [ProviderId; 5] = [
        ProviderId::YouTube,
        ProviderId::TikTok,
        ProviderId::Instagram,
        ProviderId::Twitter,
        ProviderId::Facebook,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ProviderId::YouTube => "youtube",
            ProviderId::TikTok => "tiktok",
            ProviderId::Instagram => "instagram",
            ProviderId::Twitter => "twitter",
            ProviderId::Facebook => "facebook",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown provider '{0}'")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderId {
    type Err = UnknownProvider;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ProviderId::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| UnknownProvider(value.to_string()))
    }
}

/// Named provider features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Upload,
    Playlists,
    Analytics,
    Scheduling,
    Monetization,
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "upload" => Ok(Capability::Upload),
            "playlists" => Ok(Capability::Playlists),
            "analytics" => Ok(Capability::Analytics),
            "scheduling" => Ok(Capability::Scheduling),
            "monetization" => Ok(Capability::Monetization),
            other => Err(format!("unknown capability '{other}'")),
        }
    }
}

/// Kind of access an operation needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    Read,
    Write,
    Upload,
}

/// User-supplied publish metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PublishMetadata {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Provider privacy setting (e.g. "public", "private", "unlisted")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Provider-side scheduled release time
    #[serde(skip)]
    pub publish_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A video to hand to a provider
#[derive(Debug, Clone)]
pub struct UploadRequest<'a> {
    pub file_path: &'a Path,
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub metadata: &'a PublishMetadata,
}

/// Provider-assigned identifiers of a published post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub post_id: String,
    pub post_url: Option<String>,
}

/// Basic per-video counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoStatistics {
    pub views: u64,
    pub likes: u64,
    pub dislikes: u64,
    pub comments: u64,
    pub favorites: u64,
    pub shares: u64,
}

/// Time-series and audience data from a provider's analytics API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RichAnalytics {
    pub minutes_watched: f64,
    /// Seconds
    pub average_view_duration: f64,
    pub average_view_percentage: f64,
    /// Only set when the analytics report counts shares itself
    pub shares: Option<u64>,
    pub age_groups: BTreeMap<String, f64>,
    pub gender: BTreeMap<String, f64>,
    pub countries: BTreeMap<String, u64>,
}

/// Errors from provider HTTP APIs
#[derive(Debug, Error)]
pub enum ProviderClientError {
    /// Non-success HTTP status; `body` is the raw provider payload
    #[error("{provider} returned HTTP {status}: {body}")]
    Http {
        provider: ProviderId,
        status: u16,
        body: String,
    },
    /// Success status carrying an error payload
    #[error("{provider} rejected the request: {body}")]
    Rejected { provider: ProviderId, body: String },
    #[error("malformed {provider} response: {details}")]
    Malformed {
        provider: ProviderId,
        details: String,
    },
    #[error("{provider} does not define a {endpoint} endpoint")]
    MissingEndpoint {
        provider: ProviderId,
        endpoint: &'static str,
    },
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to read upload file: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderClientError {
    /// Text worth recording against the affected entity.
    pub fn diagnostic(&self) -> String {
        match self {
            ProviderClientError::Http { body, status, .. } => format!("HTTP {status}: {body}"),
            ProviderClientError::Rejected { body, .. } => body.clone(),
            other => other.to_string(),
        }
    }
}

/// Per-platform content API.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn provider(&self) -> ProviderId;

    async fn upload_video(
        &self,
        access_token: &str,
        request: UploadRequest<'_>,
    ) -> Result<UploadOutcome, ProviderClientError>;

    async fn fetch_statistics(
        &self,
        access_token: &str,
        post_id: &str,
    ) -> Result<VideoStatistics, ProviderClientError>;

    /// Richer analytics; `Ok(None)` when the platform has no such API.
    async fn fetch_rich_analytics(
        &self,
        _access_token: &str,
        _post_id: &str,
    ) -> Result<Option<RichAnalytics>, ProviderClientError> {
        Ok(None)
    }
}

/// Shared HTTP client for provider calls.
pub fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("reactshare/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(600))
        .build()
}

/// Read a response body for diagnostics, tolerating read failures.
pub(crate) async fn error_body(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|e| format!("<unreadable body: {e}>"))
}
