//! Capability queries answered from the provider registry.

use std::sync::Arc;

use super::registry::{ProviderEndpoints, ProviderRegistry};
use super::{Capability, ProviderId, ScopeKind};
use crate::models::social_account;

/// Pure lookups over the registry. No network or storage access.
#[derive(Clone)]
pub struct CapabilityService {
    registry: Arc<ProviderRegistry>,
}

impl CapabilityService {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    /// Whether the account's provider supports `capability`. Account status
    /// is not considered; unknown providers support nothing.
    pub fn has_capability(&self, account: &social_account::Model, capability: Capability) -> bool {
        self.provider_supports(&account.provider, capability)
    }

    pub fn provider_supports(&self, provider: &str, capability: Capability) -> bool {
        self.registry
            .lookup(provider)
            .is_some_and(|config| config.features.supports(capability))
    }

    pub fn required_scopes(&self, provider: ProviderId, kind: ScopeKind) -> Option<&str> {
        self.registry
            .get(provider)
            .map(|config| config.scopes.for_kind(kind))
    }

    pub fn endpoints(&self, provider: ProviderId) -> Option<&ProviderEndpoints> {
        self.registry.get(provider).map(|config| &config.endpoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::models::social_account::AccountStatus;
    use chrono::Utc;
    use uuid::Uuid;

    fn service() -> CapabilityService {
        CapabilityService::new(Arc::new(ProviderRegistry::from_config(
            &AppConfig::default(),
            reqwest::Client::new(),
        )))
    }

    fn account(provider: &str, status: AccountStatus) -> social_account::Model {
        let now = Utc::now().fixed_offset();
        social_account::Model {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            provider: provider.to_string(),
            provider_account_id: "acct".to_string(),
            provider_username: None,
            access_token: "token".to_string(),
            refresh_token: None,
            token_expires_at: None,
            profile_data: None,
            scope: None,
            status,
            last_sync_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn tiktok_cannot_schedule_regardless_of_status() {
        let service = service();
        for status in [
            AccountStatus::Active,
            AccountStatus::TokenExpired,
            AccountStatus::Disconnected,
        ] {
            let tiktok = account("tiktok", status);
            assert!(!service.has_capability(&tiktok, Capability::Scheduling));
            assert!(service.has_capability(&tiktok, Capability::Upload));
        }
    }

    #[test]
    fn youtube_supports_everything() {
        let service = service();
        let yt = account("youtube", AccountStatus::Active);
        for capability in [
            Capability::Upload,
            Capability::Playlists,
            Capability::Analytics,
            Capability::Scheduling,
            Capability::Monetization,
        ] {
            assert!(service.has_capability(&yt, capability));
        }
    }

    #[test]
    fn unknown_provider_has_no_capabilities() {
        let service = service();
        assert!(!service.has_capability(&account("vine", AccountStatus::Active), Capability::Upload));
    }

    #[test]
    fn scopes_and_partial_endpoints() {
        let service = service();
        assert_eq!(
            service.required_scopes(ProviderId::YouTube, ScopeKind::Upload),
            Some("https://www.googleapis.com/auth/youtube.upload")
        );
        assert_eq!(
            service.required_scopes(ProviderId::TikTok, ScopeKind::Read),
            Some("user.info.basic,video.list")
        );

        let tiktok = service.endpoints(ProviderId::TikTok).unwrap();
        assert!(tiktok.analytics.is_none());
        assert!(tiktok.upload.is_some());
    }
}
