//! # Analytics API Handler

use crate::analytics::{AnalyticsTarget, NormalizedAnalytics};
use crate::auth::CurrentUser;
use crate::error::{ApiError, validation_error};
use crate::server::AppState;
use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Either `share_id`, or `provider` together with `post_id`
#[derive(Debug, Default, Deserialize, Serialize, IntoParams, ToSchema)]
pub struct AnalyticsQuery {
    /// Share to fetch analytics for; the result is stored on the share
    pub share_id: Option<Uuid>,
    /// Provider of a post looked up directly
    pub provider: Option<String>,
    /// Provider-side post id
    pub post_id: Option<String>,
}

impl AnalyticsQuery {
    fn into_target(self) -> Result<AnalyticsTarget, ApiError> {
        match (self.share_id, self.provider, self.post_id) {
            (Some(share_id), None, None) => Ok(AnalyticsTarget::Share(share_id)),
            (None, Some(provider), Some(post_id))
                if !provider.trim().is_empty() && !post_id.trim().is_empty() =>
            {
                Ok(AnalyticsTarget::ProviderPost { provider, post_id })
            }
            _ => Err(validation_error(
                "Provide either share_id, or provider and post_id",
                serde_json::json!({
                    "share_id": ["mutually exclusive with provider/post_id"],
                    "post_id": ["required together with provider"],
                }),
            )),
        }
    }
}

/// Fetches normalized analytics for a published post
#[utoipa::path(
    get,
    path = "/analytics",
    security(("bearer_auth" = [])),
    params(AnalyticsQuery),
    responses(
        (status = 200, description = "Normalized analytics", body = NormalizedAnalytics),
        (status = 400, description = "Invalid query or provider without analytics", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "Share or account not found", body = ApiError),
        (status = 409, description = "Share not published or account ambiguous", body = ApiError),
        (status = 502, description = "Provider error", body = ApiError)
    ),
    tag = "analytics"
)]
pub async fn get_analytics(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<NormalizedAnalytics>, ApiError> {
    let target = query.into_target()?;
    let analytics = state.analytics.fetch(target, user.id()).await?;
    Ok(Json(analytics))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_id_alone_targets_the_share() {
        let id = Uuid::new_v4();
        let query = AnalyticsQuery {
            share_id: Some(id),
            ..Default::default()
        };
        assert_eq!(query.into_target().unwrap(), AnalyticsTarget::Share(id));
    }

    #[test]
    fn provider_post_requires_both_fields() {
        let query = AnalyticsQuery {
            provider: Some("youtube".to_string()),
            post_id: Some("abc123".to_string()),
            ..Default::default()
        };
        assert_eq!(
            query.into_target().unwrap(),
            AnalyticsTarget::ProviderPost {
                provider: "youtube".to_string(),
                post_id: "abc123".to_string(),
            }
        );

        let missing_post = AnalyticsQuery {
            provider: Some("youtube".to_string()),
            ..Default::default()
        };
        assert!(missing_post.into_target().is_err());
    }

    #[test]
    fn mixed_or_empty_queries_are_rejected() {
        assert!(AnalyticsQuery::default().into_target().is_err());

        let mixed = AnalyticsQuery {
            share_id: Some(Uuid::new_v4()),
            provider: Some("tiktok".to_string()),
            post_id: Some("1".to_string()),
        };
        let err = mixed.into_target().unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
    }
}
