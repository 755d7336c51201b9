//! # Analytics Fetcher
//!
//! Pulls per-post statistics from a provider and normalizes them into
//! [`NormalizedAnalytics`]. The basic statistics call must succeed; the
//! richer analytics call is best-effort and only fills in extra fields.

use std::collections::BTreeMap;
use std::sync::Arc;

use metrics::counter;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::PolicyConfig;
use crate::error::{ApiError, conflict, not_found, provider_error, service_unavailable, validation_error};
use crate::models::social_account::{self, AccountStatus};
use crate::providers::{
    Capability, CapabilityService, ProviderClientError, ProviderId, ProviderRegistry,
    RichAnalytics, VideoStatistics,
};
use crate::repositories::social_account::ActiveAccount;
use crate::repositories::{RecordError, SocialAccountRepository, SocialShareRepository};
use crate::token_refresh::{RefreshError, TokenManager};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WatchTime {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl WatchTime {
    pub fn from_minutes(minutes: f64) -> Self {
        let total = (minutes.max(0.0) * 60.0).round() as u64;
        Self {
            hours: total / 3600,
            minutes: (total % 3600) / 60,
            seconds: total % 60,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Demographics {
    /// Viewer percentage per age group
    pub age_groups: BTreeMap<String, f64>,
    /// Viewer percentage per gender
    pub gender: BTreeMap<String, f64>,
    /// Views per country code
    pub countries: BTreeMap<String, u64>,
}

/// Provider-independent analytics snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NormalizedAnalytics {
    pub views: u64,
    pub likes: u64,
    pub dislikes: u64,
    pub comments: u64,
    pub favorites: u64,
    pub shares: u64,
    pub watch_time: WatchTime,
    /// Seconds
    pub average_view_duration: f64,
    pub average_view_percentage: f64,
    pub demographics: Demographics,
}

impl NormalizedAnalytics {
    pub fn from_parts(stats: &VideoStatistics, rich: Option<&RichAnalytics>) -> Self {
        let mut normalized = Self {
            views: stats.views,
            likes: stats.likes,
            dislikes: stats.dislikes,
            comments: stats.comments,
            favorites: stats.favorites,
            shares: stats.shares,
            ..Self::default()
        };

        if let Some(rich) = rich {
            if let Some(shares) = rich.shares {
                normalized.shares = shares;
            }
            normalized.watch_time = WatchTime::from_minutes(rich.minutes_watched);
            normalized.average_view_duration = rich.average_view_duration;
            normalized.average_view_percentage = rich.average_view_percentage;
            normalized.demographics = Demographics {
                age_groups: rich.age_groups.clone(),
                gender: rich.gender.clone(),
                countries: rich.countries.clone(),
            };
        }
        normalized
    }
}

/// What the analytics are requested for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalyticsTarget {
    /// A share of the caller; the result is persisted on it
    Share(Uuid),
    /// A provider post id, looked up directly
    ProviderPost { provider: String, post_id: String },
}

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("share not found")]
    ShareNotFound,
    #[error("share has not been published")]
    NotPublished,
    #[error("unknown provider '{0}'")]
    UnknownProvider(String),
    #[error("provider {0} does not offer analytics")]
    Unsupported(ProviderId),
    #[error("no active {0} account")]
    AccountNotFound(ProviderId),
    #[error("{count} active {provider} accounts; cannot choose one")]
    AmbiguousAccount { provider: ProviderId, count: usize },
    #[error(transparent)]
    TokenRefresh(#[from] RefreshError),
    #[error(transparent)]
    Provider(#[from] ProviderClientError),
    #[error(transparent)]
    Record(#[from] RecordError),
}

impl From<AnalyticsError> for ApiError {
    fn from(error: AnalyticsError) -> Self {
        match error {
            AnalyticsError::ShareNotFound => not_found(Some("Share not found")),
            AnalyticsError::NotPublished => conflict("Share has not been published"),
            AnalyticsError::UnknownProvider(_) | AnalyticsError::Unsupported(_) => {
                let message = error.to_string();
                validation_error(&message, serde_json::json!({}))
            }
            AnalyticsError::AccountNotFound(provider) => {
                not_found(Some(&format!("No active {provider} account connected")))
            }
            AnalyticsError::AmbiguousAccount { .. } => conflict(&error.to_string()),
            AnalyticsError::TokenRefresh(RefreshError::Provider { status, .. }) => ApiError::new(
                axum::http::StatusCode::BAD_GATEWAY,
                "PROVIDER_ERROR",
                "Provider rejected the token refresh; reconnect the account",
            )
            .with_details(serde_json::json!({ "status": status })),
            AnalyticsError::TokenRefresh(RefreshError::Record(err)) => err.into(),
            AnalyticsError::TokenRefresh(other) => {
                warn!(error = %other, "Token refresh unavailable");
                service_unavailable(Some("Provider token could not be refreshed"))
            }
            AnalyticsError::Provider(ProviderClientError::Http {
                provider,
                status,
                body,
            }) => provider_error(provider.to_string(), status, Some(body)),
            AnalyticsError::Provider(ProviderClientError::Rejected { provider, body }) => {
                provider_error(provider.to_string(), 200, Some(body))
            }
            AnalyticsError::Provider(other) => {
                warn!(error = %other, "Provider statistics unavailable");
                service_unavailable(Some("Provider statistics unavailable"))
            }
            AnalyticsError::Record(err) => err.into(),
        }
    }
}

#[derive(Clone)]
pub struct AnalyticsFetcher {
    registry: Arc<ProviderRegistry>,
    capabilities: CapabilityService,
    accounts: SocialAccountRepository,
    shares: SocialShareRepository,
    tokens: TokenManager,
    policy: PolicyConfig,
}

impl AnalyticsFetcher {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        accounts: SocialAccountRepository,
        shares: SocialShareRepository,
        tokens: TokenManager,
        policy: PolicyConfig,
    ) -> Self {
        Self {
            capabilities: CapabilityService::new(Arc::clone(&registry)),
            registry,
            accounts,
            shares,
            tokens,
            policy,
        }
    }

    #[instrument(skip_all, fields(owner = %owner))]
    pub async fn fetch(
        &self,
        target: AnalyticsTarget,
        owner: Uuid,
    ) -> Result<NormalizedAnalytics, AnalyticsError> {
        let (provider_id, post_id, share, persist) = match target {
            AnalyticsTarget::Share(share_id) => {
                let share = self
                    .shares
                    .find_owned(owner, share_id)
                    .await?
                    .ok_or(AnalyticsError::ShareNotFound)?;
                let post_id = share
                    .provider_post_id
                    .clone()
                    .ok_or(AnalyticsError::NotPublished)?;
                let provider_id = self.resolve_provider(&share.provider)?;
                (provider_id, post_id, Some(share), true)
            }
            AnalyticsTarget::ProviderPost { provider, post_id } => {
                let provider_id = self.resolve_provider(&provider)?;
                let share = self
                    .shares
                    .find_by_provider_post(owner, provider_id.as_str(), &post_id)
                    .await?;
                (provider_id, post_id, share, false)
            }
        };

        if !self
            .capabilities
            .provider_supports(provider_id.as_str(), Capability::Analytics)
        {
            return Err(AnalyticsError::Unsupported(provider_id));
        }
        let client = self
            .registry
            .client(provider_id)
            .ok_or(AnalyticsError::Unsupported(provider_id))?;

        let preferred = share.as_ref().and_then(|s| s.social_account_id);
        let account = self.resolve_account(owner, provider_id, preferred).await?;
        let access_token = self.tokens.ensure_fresh(&account).await?;

        let labels = vec![("provider", provider_id.as_str().to_string())];
        let stats = match client.fetch_statistics(&access_token, &post_id).await {
            Ok(stats) => stats,
            Err(err) => {
                counter!("analytics_fetch_failure_total", &labels).increment(1);
                return Err(err.into());
            }
        };

        let rich = match client.fetch_rich_analytics(&access_token, &post_id).await {
            Ok(rich) => rich,
            Err(err) => {
                counter!("analytics_rich_degraded_total", &labels).increment(1);
                warn!(post_id = %post_id, error = %err, "Rich analytics unavailable; using basic statistics");
                None
            }
        };

        let normalized = NormalizedAnalytics::from_parts(&stats, rich.as_ref());

        if persist && let Some(share) = &share {
            match serde_json::to_value(&normalized) {
                Ok(value) => {
                    self.shares.record_analytics(share.id, value).await?;
                }
                Err(err) => warn!(error = %err, "Failed to serialize analytics snapshot"),
            }
        }
        self.accounts.touch_last_sync(account.id).await?;

        counter!("analytics_fetch_success_total", &labels).increment(1);
        info!(provider = %provider_id, post_id = %post_id, views = normalized.views, "Analytics fetched");
        Ok(normalized)
    }

    fn resolve_provider(&self, provider: &str) -> Result<ProviderId, AnalyticsError> {
        self.registry
            .lookup(provider)
            .map(|config| config.id)
            .ok_or_else(|| AnalyticsError::UnknownProvider(provider.to_string()))
    }

    async fn resolve_account(
        &self,
        owner: Uuid,
        provider: ProviderId,
        preferred: Option<Uuid>,
    ) -> Result<social_account::Model, AnalyticsError> {
        if let Some(account_id) = preferred
            && let Some(account) = self.accounts.find_owned(owner, account_id).await?
            && account.status != AccountStatus::Disconnected
        {
            return Ok(account);
        }

        match self
            .accounts
            .active_for_provider(owner, provider.as_str(), self.policy.single_active_account)
            .await?
        {
            ActiveAccount::Found(account) => Ok(account),
            ActiveAccount::None => Err(AnalyticsError::AccountNotFound(provider)),
            ActiveAccount::Ambiguous(count) => {
                Err(AnalyticsError::AmbiguousAccount { provider, count })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_time_splits_minutes() {
        assert_eq!(
            WatchTime::from_minutes(125.5),
            WatchTime {
                hours: 2,
                minutes: 5,
                seconds: 30
            }
        );
        assert_eq!(WatchTime::from_minutes(0.0), WatchTime::default());
    }

    #[test]
    fn basic_statistics_only_leave_rich_fields_at_defaults() {
        let stats = VideoStatistics {
            views: 10,
            likes: 2,
            comments: 1,
            ..VideoStatistics::default()
        };
        let normalized = NormalizedAnalytics::from_parts(&stats, None);

        assert_eq!(normalized.views, 10);
        assert_eq!(normalized.likes, 2);
        assert_eq!(normalized.watch_time, WatchTime::default());
        assert_eq!(normalized.average_view_duration, 0.0);
        assert!(normalized.demographics.countries.is_empty());
    }

    #[test]
    fn rich_share_count_takes_precedence() {
        let stats = VideoStatistics {
            views: 10,
            shares: 1,
            ..VideoStatistics::default()
        };
        let rich = RichAnalytics {
            minutes_watched: 61.0,
            average_view_duration: 30.5,
            shares: Some(4),
            countries: BTreeMap::from([("US".to_string(), 7)]),
            ..RichAnalytics::default()
        };
        let normalized = NormalizedAnalytics::from_parts(&stats, Some(&rich));

        assert_eq!(normalized.shares, 4);
        assert_eq!(normalized.watch_time.hours, 1);
        assert_eq!(normalized.watch_time.minutes, 1);
        assert_eq!(normalized.average_view_duration, 30.5);
        assert_eq!(normalized.demographics.countries["US"], 7);
    }
}
