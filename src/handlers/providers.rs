//! # Providers API Handlers
//!
//! Public listing of the social platforms users can connect.

use crate::error::ApiError;
use crate::providers::registry::{FeatureSet, OAuthScopes};
use crate::providers::{ProviderId, SocialProviderConfig};
use crate::server::AppState;
use axum::{extract::State, response::Json};
use serde::Serialize;
use utoipa::ToSchema;

/// Provider information for public listing
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct ProviderInfo {
    /// Provider identifier (e.g., "youtube", "tiktok")
    pub id: ProviderId,
    pub display_name: String,
    /// OAuth scopes requested per access kind
    pub scopes: OAuthScopes,
    pub features: FeatureSet,
    /// Metrics the provider can report
    pub metrics: Vec<String>,
    /// Dashboard location after a successful OAuth handshake
    pub success_redirect: String,
}

impl From<&SocialProviderConfig> for ProviderInfo {
    fn from(config: &SocialProviderConfig) -> Self {
        Self {
            id: config.id,
            display_name: config.display_name.clone(),
            scopes: config.scopes.clone(),
            features: config.features,
            metrics: config.metrics.clone(),
            success_redirect: config.success_redirect.clone(),
        }
    }
}

/// Response containing the list of available providers
#[derive(Debug, Serialize, ToSchema)]
pub struct ProvidersResponse {
    pub providers: Vec<ProviderInfo>,
}

/// Public endpoint to list all available providers
#[utoipa::path(
    get,
    path = "/providers",
    responses(
        (status = 200, description = "Available providers in identifier order", body = ProvidersResponse, example = json!({
            "providers": [
                {
                    "id": "youtube",
                    "display_name": "YouTube",
                    "scopes": {
                        "read": "https://www.googleapis.com/auth/youtube.readonly",
                        "write": "https://www.googleapis.com/auth/youtube",
                        "upload": "https://www.googleapis.com/auth/youtube.upload"
                    },
                    "features": {"upload": true, "playlists": true, "analytics": true, "scheduling": true, "monetization": true},
                    "metrics": ["views", "likes", "comments"],
                    "success_redirect": "http://localhost:3000/dashboard/accounts?connected=youtube"
                }
            ]
        })),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "providers"
)]
pub async fn list_providers(State(state): State<AppState>) -> Json<ProvidersResponse> {
    let providers = state
        .registry
        .list_available()
        .into_iter()
        .map(ProviderInfo::from)
        .collect();
    Json(ProvidersResponse { providers })
}
