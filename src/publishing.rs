//! # Publishing Orchestrator
//!
//! Publishes an uploaded reaction to one provider account. Every attempt is
//! recorded as a share created `pending` before any provider traffic and
//! settled exactly once: `published` (or `scheduled`) on success, `failed`
//! with the error text in its metadata otherwise.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::PolicyConfig;
use crate::error::{
    ApiError, conflict, internal_error, not_found, provider_error, service_unavailable,
    validation_error,
};
use crate::models::reaction::ReactionStatus;
use crate::models::social_account::{self, AccountStatus};
use crate::models::social_share;
use crate::providers::{
    Capability, CapabilityService, ProviderClient, ProviderClientError, ProviderId,
    ProviderRegistry, PublishMetadata, UploadOutcome, UploadRequest,
};
use crate::repositories::social_account::ActiveAccount;
use crate::repositories::social_share::NewShare;
use crate::repositories::{
    ReactionRepository, RecordError, SocialAccountRepository, SocialShareRepository,
};
use crate::storage::{BlobStore, Bucket, StorageError};
use crate::token_refresh::{RefreshError, TokenManager};

/// Optional knobs of a publish request.
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    /// Publish through this account instead of resolving the active one
    pub account_id: Option<Uuid>,
    /// Ask the provider to release the post at this time
    pub scheduled_for: Option<DateTime<Utc>>,
}

/// Reasons an attempt failed after its share was created.
#[derive(Debug, Error)]
pub enum PublishFailure {
    #[error(transparent)]
    TokenRefresh(#[from] RefreshError),
    #[error("failed to fetch reaction media: {0}")]
    Media(#[from] StorageError),
    #[error("scratch file error: {0}")]
    Scratch(#[from] std::io::Error),
    #[error(transparent)]
    Provider(#[from] ProviderClientError),
}

impl PublishFailure {
    /// Text recorded under `error` in the share metadata.
    fn diagnostic(&self) -> String {
        match self {
            PublishFailure::TokenRefresh(RefreshError::Provider { body, .. }) => {
                format!("token refresh failed: {body}")
            }
            PublishFailure::Provider(err) => err.diagnostic(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("unknown provider '{0}'")]
    UnknownProvider(String),
    #[error("provider {0} is not available")]
    ProviderUnavailable(ProviderId),
    #[error("provider {provider} does not support {capability:?}")]
    Unsupported {
        provider: ProviderId,
        capability: Capability,
    },
    #[error("invalid publish request: {0}")]
    Invalid(&'static str),
    #[error("no active {0} account")]
    AccountNotFound(ProviderId),
    #[error("{count} active {provider} accounts; choose one")]
    AmbiguousAccount { provider: ProviderId, count: usize },
    #[error("reaction not found")]
    ReactionNotFound,
    #[error("reaction media is not uploaded yet")]
    MediaNotReady,
    #[error("a publish to {0} is already pending for this reaction")]
    DuplicatePending(ProviderId),
    #[error("publish attempt {} failed: {cause}", share.id)]
    Failed {
        share: Box<social_share::Model>,
        cause: PublishFailure,
    },
    #[error(transparent)]
    Record(#[from] RecordError),
}

impl From<PublishError> for ApiError {
    fn from(error: PublishError) -> Self {
        match error {
            PublishError::UnknownProvider(_)
            | PublishError::ProviderUnavailable(_)
            | PublishError::Unsupported { .. }
            | PublishError::Invalid(_) => {
                let message = error.to_string();
                validation_error(&message, json!({}))
            }
            PublishError::AccountNotFound(provider) => {
                not_found(Some(&format!("No active {provider} account connected")))
            }
            PublishError::AmbiguousAccount { .. } | PublishError::DuplicatePending(_) => {
                conflict(&error.to_string())
            }
            PublishError::ReactionNotFound => not_found(Some("Reaction not found")),
            PublishError::MediaNotReady => conflict("Reaction media is not uploaded yet"),
            PublishError::Failed { share, cause } => failure_response(&share, cause),
            PublishError::Record(err) => err.into(),
        }
    }
}

fn failure_response(share: &social_share::Model, cause: PublishFailure) -> ApiError {
    let mut api_error = match cause {
        PublishFailure::TokenRefresh(RefreshError::Provider { status, body }) => {
            provider_error(share.provider.clone(), status, Some(body))
        }
        PublishFailure::TokenRefresh(RefreshError::MissingCredentials { .. }) => {
            service_unavailable(Some("Provider credentials are not configured"))
        }
        PublishFailure::Provider(ProviderClientError::Http { status, body, .. }) => {
            provider_error(share.provider.clone(), status, Some(body))
        }
        PublishFailure::Provider(ProviderClientError::Rejected { body, .. }) => {
            provider_error(share.provider.clone(), 200, Some(body))
        }
        PublishFailure::Provider(ProviderClientError::Transport(_)) => {
            service_unavailable(Some("Provider could not be reached"))
        }
        _ => internal_error(),
    };

    let mut details = api_error
        .details
        .take()
        .map(|d| *d)
        .unwrap_or_else(|| json!({}));
    if let Some(map) = details.as_object_mut() {
        map.insert("share_id".to_string(), json!(share.id));
        map.insert("share_status".to_string(), json!(share.status));
    }
    api_error.with_details(details)
}

#[derive(Clone)]
pub struct PublishOrchestrator {
    registry: Arc<ProviderRegistry>,
    capabilities: CapabilityService,
    accounts: SocialAccountRepository,
    reactions: ReactionRepository,
    shares: SocialShareRepository,
    tokens: TokenManager,
    blobs: Arc<dyn BlobStore>,
    scratch_dir: PathBuf,
    policy: PolicyConfig,
}

impl PublishOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<ProviderRegistry>,
        accounts: SocialAccountRepository,
        reactions: ReactionRepository,
        shares: SocialShareRepository,
        tokens: TokenManager,
        blobs: Arc<dyn BlobStore>,
        scratch_dir: PathBuf,
        policy: PolicyConfig,
    ) -> Self {
        Self {
            capabilities: CapabilityService::new(Arc::clone(&registry)),
            registry,
            accounts,
            reactions,
            shares,
            tokens,
            blobs,
            scratch_dir,
            policy,
        }
    }

    /// Publish `reaction_id` to `provider` and return the settled share.
    #[instrument(
        skip_all,
        fields(owner = %owner, reaction_id = %reaction_id, provider = %provider)
    )]
    pub async fn publish(
        &self,
        reaction_id: Uuid,
        provider: &str,
        owner: Uuid,
        metadata: PublishMetadata,
        options: PublishOptions,
    ) -> Result<social_share::Model, PublishError> {
        let config = self
            .registry
            .lookup(provider)
            .ok_or_else(|| PublishError::UnknownProvider(provider.to_string()))?;
        let provider_id = config.id;
        let client = self
            .registry
            .client(provider_id)
            .filter(|_| config.is_available)
            .ok_or(PublishError::ProviderUnavailable(provider_id))?;

        self.check_request(provider_id, &metadata, &options)?;

        let account = self.resolve_account(owner, provider_id, options.account_id).await?;

        let reaction = self
            .reactions
            .find_owned(owner, reaction_id)
            .await?
            .ok_or(PublishError::ReactionNotFound)?;
        let storage_path = reaction
            .reaction_video_storage_path
            .clone()
            .filter(|p| !p.is_empty())
            .ok_or(PublishError::MediaNotReady)?;

        if self.policy.dedupe_concurrent_publish
            && self
                .shares
                .has_pending(owner, reaction_id, provider_id.as_str())
                .await?
        {
            return Err(PublishError::DuplicatePending(provider_id));
        }

        let share = self
            .shares
            .create_pending(
                owner,
                NewShare {
                    reaction_id,
                    provider: provider_id.as_str().to_string(),
                    social_account_id: Some(account.id),
                    metadata: serde_json::to_value(&metadata).unwrap_or_else(|_| json!({})),
                    scheduled_for: options.scheduled_for.map(|at| at.fixed_offset()),
                },
            )
            .await?;
        info!(share_id = %share.id, account_id = %account.id, "Publish attempt started");

        let previous_status = reaction.status;
        if let Err(err) = self
            .reactions
            .set_status(reaction_id, ReactionStatus::Processing)
            .await
        {
            warn!(share_id = %share.id, error = %err, "Could not mark reaction as processing");
            self.shares.mark_failed(share.id, &err.to_string()).await?;
            return Err(err.into());
        }

        let labels = vec![("provider", provider_id.as_str().to_string())];
        counter!("publish_attempts_total", &labels).increment(1);
        let started = Instant::now();

        let metadata = PublishMetadata {
            publish_at: options.scheduled_for,
            ..metadata
        };
        let attempt = self
            .attempt(&share, &account, client.as_ref(), &storage_path, &metadata)
            .await;
        histogram!("publish_duration_ms", &labels)
            .record(started.elapsed().as_secs_f64() * 1_000.0);

        match attempt {
            Ok(outcome) => {
                counter!("publish_success_total", &labels).increment(1);
                let settled = match options.scheduled_for {
                    Some(at) => {
                        self.shares
                            .mark_scheduled(
                                share.id,
                                outcome.post_id,
                                outcome.post_url,
                                at.fixed_offset(),
                            )
                            .await?
                    }
                    None => {
                        self.shares
                            .mark_published(
                                share.id,
                                outcome.post_id,
                                outcome.post_url,
                                Utc::now().fixed_offset(),
                            )
                            .await?
                    }
                };
                self.reactions
                    .set_status(reaction_id, ReactionStatus::Published)
                    .await?;
                info!(
                    share_id = %settled.id,
                    post_id = settled.provider_post_id.as_deref().unwrap_or_default(),
                    status = ?settled.status,
                    "Publish attempt succeeded"
                );
                Ok(settled)
            }
            Err(cause) => {
                counter!("publish_failure_total", &labels).increment(1);
                warn!(share_id = %share.id, error = %cause, "Publish attempt failed");
                let failed = self.shares.mark_failed(share.id, &cause.diagnostic()).await?;
                if !self
                    .reactions
                    .leave_processing(reaction_id, previous_status)
                    .await?
                {
                    debug!(reaction_id = %reaction_id, "Reaction already settled by another attempt");
                }
                Err(PublishError::Failed {
                    share: Box::new(failed),
                    cause,
                })
            }
        }
    }

    fn check_request(
        &self,
        provider: ProviderId,
        metadata: &PublishMetadata,
        options: &PublishOptions,
    ) -> Result<(), PublishError> {
        if !self
            .capabilities
            .provider_supports(provider.as_str(), Capability::Upload)
        {
            return Err(PublishError::Unsupported {
                provider,
                capability: Capability::Upload,
            });
        }
        if let Some(at) = options.scheduled_for {
            if !self
                .capabilities
                .provider_supports(provider.as_str(), Capability::Scheduling)
            {
                return Err(PublishError::Unsupported {
                    provider,
                    capability: Capability::Scheduling,
                });
            }
            if at <= Utc::now() {
                return Err(PublishError::Invalid("scheduled_for must be in the future"));
            }
        }
        if metadata.title.trim().is_empty() {
            return Err(PublishError::Invalid("title must not be empty"));
        }
        Ok(())
    }

    async fn resolve_account(
        &self,
        owner: Uuid,
        provider: ProviderId,
        account_id: Option<Uuid>,
    ) -> Result<social_account::Model, PublishError> {
        if let Some(account_id) = account_id {
            return self
                .accounts
                .find_owned(owner, account_id)
                .await?
                .filter(|a| a.provider == provider.as_str() && a.status == AccountStatus::Active)
                .ok_or(PublishError::AccountNotFound(provider));
        }

        match self
            .accounts
            .active_for_provider(owner, provider.as_str(), self.policy.single_active_account)
            .await?
        {
            ActiveAccount::Found(account) => Ok(account),
            ActiveAccount::None => Err(PublishError::AccountNotFound(provider)),
            ActiveAccount::Ambiguous(count) => {
                Err(PublishError::AmbiguousAccount { provider, count })
            }
        }
    }

    /// Token check, media fetch and provider upload. The scratch file is
    /// removed on every exit path.
    async fn attempt(
        &self,
        share: &social_share::Model,
        account: &social_account::Model,
        client: &dyn ProviderClient,
        storage_path: &str,
        metadata: &PublishMetadata,
    ) -> Result<UploadOutcome, PublishFailure> {
        let access_token = self.tokens.ensure_fresh(account).await?;

        let file_name = storage_path
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("reaction.mp4");
        let scratch_path = self
            .scratch_dir
            .join(format!("publish-{}-{}", share.id, file_name));

        let _cleanup = scopeguard::guard(scratch_path.clone(), |path| {
            if let Err(err) = std::fs::remove_file(&path)
                && err.kind() != std::io::ErrorKind::NotFound
            {
                warn!(path = %path.display(), error = %err, "Failed to remove scratch file");
            }
        });

        let data = self.blobs.download(Bucket::Reactions, storage_path).await?;
        tokio::fs::create_dir_all(&self.scratch_dir).await?;
        tokio::fs::write(&scratch_path, &data).await?;
        drop(data);

        let outcome = client
            .upload_video(
                &access_token,
                UploadRequest {
                    file_path: &scratch_path,
                    file_name,
                    content_type: content_type_for(file_name),
                    metadata,
                },
            )
            .await?;
        Ok(outcome)
    }
}

fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        _ => "video/mp4",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_follow_extension() {
        assert_eq!(content_type_for("take.MOV"), "video/quicktime");
        assert_eq!(content_type_for("take.webm"), "video/webm");
        assert_eq!(content_type_for("take"), "video/mp4");
    }

    #[test]
    fn refresh_rejection_is_recorded_verbatim() {
        let failure = PublishFailure::TokenRefresh(RefreshError::Provider {
            status: 400,
            body: "{\"error\":\"invalid_grant\"}".to_string(),
        });
        assert_eq!(
            failure.diagnostic(),
            "token refresh failed: {\"error\":\"invalid_grant\"}"
        );
    }

    #[test]
    fn provider_rejection_keeps_body() {
        let failure = PublishFailure::Provider(ProviderClientError::Rejected {
            provider: ProviderId::TikTok,
            body: "{\"error\":{\"code\":\"spam\"}}".to_string(),
        });
        assert_eq!(failure.diagnostic(), "{\"error\":{\"code\":\"spam\"}}");
    }
}
