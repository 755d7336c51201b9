//! # Token Lifecycle
//!
//! Expiry detection and the OAuth refresh handshake for stored social
//! accounts. Refresh runs only on demand, right before a provider call; there
//! is no retry loop here, callers decide whether to try again.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use metrics::{counter, histogram};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::models::social_account::{self, AccountStatus};
use crate::providers::{ProviderId, ProviderRegistry};
use crate::repositories::{RecordError, SocialAccountRepository};

/// Tokens expiring within this window are refreshed before use.
pub const EXPIRY_SAFETY_BUFFER_SECS: i64 = 5 * 60;

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("account has no refresh token")]
    MissingRefreshToken,
    #[error("unknown provider '{0}'")]
    UnknownProvider(String),
    #[error("{provider} OAuth client credentials are not configured")]
    MissingCredentials { provider: ProviderId },
    /// The token endpoint answered with an error payload
    #[error("token refresh rejected by provider: {body}")]
    Provider { status: u16, body: String },
    #[error("token refresh request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed token response: {0}")]
    Malformed(String),
    #[error(transparent)]
    Record(#[from] RecordError),
}

impl RefreshError {
    /// Whether the stored credentials are known to be unusable.
    pub fn invalidates_account(&self) -> bool {
        matches!(
            self,
            RefreshError::Provider { .. } | RefreshError::MissingRefreshToken
        )
    }
}

/// New credentials after a successful refresh.
#[derive(Debug, Clone)]
pub struct RefreshedToken {
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    error: Option<serde_json::Value>,
}

/// True iff an expiry is stored and `now + buffer >= expiry`.
pub fn is_expired_at(account: &social_account::Model, now: DateTime<Utc>) -> bool {
    account
        .token_expires_at
        .is_some_and(|expiry| now + Duration::seconds(EXPIRY_SAFETY_BUFFER_SECS) >= expiry)
}

pub fn is_expired(account: &social_account::Model) -> bool {
    is_expired_at(account, Utc::now())
}

/// Refreshes provider tokens and persists the outcome on the account.
#[derive(Clone)]
pub struct TokenManager {
    registry: Arc<ProviderRegistry>,
    accounts: SocialAccountRepository,
    http: reqwest::Client,
}

impl TokenManager {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        accounts: SocialAccountRepository,
        http: reqwest::Client,
    ) -> Self {
        Self {
            registry,
            accounts,
            http,
        }
    }

    /// Access token usable right now, refreshing first when expired.
    pub async fn ensure_fresh(
        &self,
        account: &social_account::Model,
    ) -> Result<String, RefreshError> {
        if !is_expired(account) {
            return Ok(account.access_token.clone());
        }
        Ok(self.refresh(account).await?.access_token)
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// On success the account is reactivated with the new token and expiry.
    /// When the provider rejects the refresh the account is marked
    /// `token_expired` and the provider's body is returned in the error.
    #[instrument(skip_all, fields(account_id = %account.id, provider = %account.provider))]
    pub async fn refresh(
        &self,
        account: &social_account::Model,
    ) -> Result<RefreshedToken, RefreshError> {
        let started = std::time::Instant::now();
        let labels = vec![("provider", account.provider.clone())];

        let result = self.exchange(account).await;

        match &result {
            Ok(token) => {
                self.accounts
                    .store_refreshed_token(
                        account.id,
                        token.access_token.clone(),
                        token.refresh_token.clone(),
                        token.expires_at.map(|at| at.fixed_offset()),
                    )
                    .await?;
                histogram!("token_refresh_latency_ms")
                    .record(started.elapsed().as_secs_f64() * 1_000.0);
                counter!("token_refresh_success_total", &labels).increment(1);
                info!("Refreshed account token");
            }
            Err(err) => {
                counter!("token_refresh_failure_total", &labels).increment(1);
                if err.invalidates_account() {
                    warn!(error = %err, "Token refresh rejected; marking account token_expired");
                    self.accounts
                        .set_status(account.id, AccountStatus::TokenExpired)
                        .await?;
                } else {
                    warn!(error = %err, "Token refresh failed");
                }
            }
        }

        result.map(|token| RefreshedToken {
            access_token: token.access_token,
            expires_at: token.expires_at,
        })
    }

    async fn exchange(&self, account: &social_account::Model) -> Result<Exchanged, RefreshError> {
        let refresh_token = account
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(RefreshError::MissingRefreshToken)?;

        let provider = self
            .registry
            .lookup(&account.provider)
            .ok_or_else(|| RefreshError::UnknownProvider(account.provider.clone()))?;
        let client = provider
            .oauth_client
            .as_ref()
            .ok_or(RefreshError::MissingCredentials {
                provider: provider.id,
            })?;

        let params = [
            (client.id_param, client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .http
            .post(&provider.endpoints.token_refresh)
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        if !(200..300).contains(&status) {
            return Err(RefreshError::Provider { status, body });
        }

        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| RefreshError::Malformed(e.to_string()))?;

        match parsed.access_token.filter(|t| !t.is_empty()) {
            Some(access_token) => {
                let expires_at = match parsed.expires_in {
                    Some(ttl) => Some(
                        Duration::try_seconds(ttl)
                            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
                            .ok_or_else(|| {
                                RefreshError::Malformed(format!("expires_in {ttl} is out of range"))
                            })?,
                    ),
                    None => None,
                };
                Ok(Exchanged {
                    access_token,
                    refresh_token: parsed.refresh_token.filter(|t| !t.is_empty()),
                    expires_at,
                })
            }
            None if parsed.error.is_some() => Err(RefreshError::Provider { status, body }),
            None => Err(RefreshError::Malformed(
                "response has no access_token".to_string(),
            )),
        }
    }
}

struct Exchanged {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}
