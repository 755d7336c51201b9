//! Provider registry
//!
//! Static catalog of supported platforms built once at startup from
//! configuration. Lookups of unknown providers are a normal negative result.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use super::{Capability, ProviderClient, ProviderId, ScopeKind, tiktok, youtube};
use crate::config::AppConfig;

/// Providers with a content client; the rest are defined but disabled.
const IMPLEMENTED: [ProviderId; 2] = [ProviderId::YouTube, ProviderId::TikTok];

/// OAuth scope strings per access kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct OAuthScopes {
    pub read: String,
    pub write: String,
    pub upload: String,
}

impl OAuthScopes {
    fn new(read: &str, write: &str, upload: &str) -> Self {
        Self {
            read: read.to_string(),
            write: write.to_string(),
            upload: upload.to_string(),
        }
    }

    pub fn for_kind(&self, kind: ScopeKind) -> &str {
        match kind {
            ScopeKind::Read => &self.read,
            ScopeKind::Write => &self.write,
            ScopeKind::Upload => &self.upload,
        }
    }
}

/// Named API endpoints. Every provider has user info and token refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderEndpoints {
    pub user_info: String,
    pub token_refresh: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub videos: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlists: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analytics: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct FeatureSet {
    pub upload: bool,
    pub playlists: bool,
    pub analytics: bool,
    pub scheduling: bool,
    pub monetization: bool,
}

impl FeatureSet {
    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Upload => self.upload,
            Capability::Playlists => self.playlists,
            Capability::Analytics => self.analytics,
            Capability::Scheduling => self.scheduling,
            Capability::Monetization => self.monetization,
        }
    }
}

/// Process-wide OAuth client credentials for one provider
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthClient {
    /// Form field name carrying the client id (`client_key` on TikTok)
    pub id_param: &'static str,
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for OAuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClient")
            .field("id_param", &self.id_param)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Static configuration for one platform
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SocialProviderConfig {
    pub id: ProviderId,
    pub display_name: String,
    pub scopes: OAuthScopes,
    pub endpoints: ProviderEndpoints,
    pub metrics: Vec<String>,
    pub features: FeatureSet,
    pub is_available: bool,
    /// Where the dashboard lands after a successful OAuth handshake
    pub success_redirect: String,
    #[serde(skip)]
    pub oauth_client: Option<OAuthClient>,
}

impl ProviderId {
    fn display_name(self) -> &'static str {
        match self {
            ProviderId::YouTube => "YouTube",
            ProviderId::TikTok => "TikTok",
            ProviderId::Instagram => "Instagram",
            ProviderId::Twitter => "Twitter",
            ProviderId::Facebook => "Facebook",
        }
    }

    fn client_id_param(self) -> &'static str {
        match self {
            ProviderId::TikTok => "client_key",
            _ => "client_id",
        }
    }

    fn scopes(self) -> OAuthScopes {
        match self {
            ProviderId::YouTube => OAuthScopes::new(
                "https://www.googleapis.com/auth/youtube.readonly",
                "https://www.googleapis.com/auth/youtube",
                "https://www.googleapis.com/auth/youtube.upload",
            ),
            ProviderId::TikTok => {
                OAuthScopes::new("user.info.basic,video.list", "video.publish", "video.upload")
            }
            ProviderId::Instagram => OAuthScopes::new(
                "instagram_basic",
                "instagram_content_publish",
                "instagram_content_publish",
            ),
            ProviderId::Twitter => {
                OAuthScopes::new("tweet.read users.read", "tweet.write", "media.write")
            }
            ProviderId::Facebook => {
                OAuthScopes::new("public_profile", "pages_manage_posts", "publish_video")
            }
        }
    }

    fn features(self) -> FeatureSet {
        match self {
            ProviderId::YouTube => FeatureSet {
                upload: true,
                playlists: true,
                analytics: true,
                scheduling: true,
                monetization: true,
            },
            ProviderId::TikTok => FeatureSet {
                upload: true,
                analytics: true,
                ..FeatureSet::default()
            },
            ProviderId::Instagram => FeatureSet {
                upload: true,
                analytics: true,
                scheduling: true,
                ..FeatureSet::default()
            },
            ProviderId::Twitter => FeatureSet {
                upload: true,
                analytics: true,
                ..FeatureSet::default()
            },
            ProviderId::Facebook => FeatureSet {
                upload: true,
                playlists: true,
                analytics: true,
                scheduling: true,
                monetization: true,
            },
        }
    }

    fn metrics(self) -> &'static [&'static str] {
        match self {
            ProviderId::YouTube => &[
                "views",
                "likes",
                "dislikes",
                "comments",
                "shares",
                "estimatedMinutesWatched",
                "averageViewDuration",
                "averageViewPercentage",
                "subscribersGained",
            ],
            ProviderId::TikTok => &["view_count", "like_count", "comment_count", "share_count"],
            ProviderId::Instagram => &["impressions", "reach", "likes", "comments", "saved"],
            ProviderId::Twitter => &[
                "impression_count",
                "like_count",
                "reply_count",
                "retweet_count",
            ],
            ProviderId::Facebook => &[
                "total_video_views",
                "total_video_reactions_by_type_total",
                "total_video_avg_time_watched",
            ],
        }
    }

    fn default_api_base(self) -> &'static str {
        match self {
            ProviderId::YouTube => "https://www.googleapis.com",
            ProviderId::TikTok => "https://open.tiktokapis.com",
            ProviderId::Instagram => "https://graph.instagram.com",
            ProviderId::Twitter => "https://api.twitter.com",
            ProviderId::Facebook => "https://graph.facebook.com",
        }
    }

    fn default_oauth_base(self) -> &'static str {
        match self {
            ProviderId::YouTube => "https://oauth2.googleapis.com",
            other => other.default_api_base(),
        }
    }

    /// Endpoint map rooted at the given bases. `api_overridden` routes
    /// auxiliary hosts (YouTube analytics, Twitter/Facebook upload) to the
    /// API base as well.
    fn endpoints(self, api: &str, oauth: &str, api_overridden: bool) -> ProviderEndpoints {
        match self {
            ProviderId::YouTube => {
                let analytics = if api_overridden {
                    api
                } else {
                    "https://youtubeanalytics.googleapis.com"
                };
                ProviderEndpoints {
                    user_info: format!("{api}/youtube/v3/channels?part=snippet&mine=true"),
                    token_refresh: format!("{oauth}/token"),
                    videos: Some(format!("{api}/youtube/v3/videos")),
                    playlists: Some(format!("{api}/youtube/v3/playlists")),
                    upload: Some(format!("{api}/upload/youtube/v3/videos")),
                    analytics: Some(format!("{analytics}/v2/reports")),
                }
            }
            ProviderId::TikTok => ProviderEndpoints {
                user_info: format!("{api}/v2/user/info/"),
                token_refresh: format!("{oauth}/v2/oauth/token/"),
                videos: Some(format!("{api}/v2/video/query/")),
                playlists: None,
                upload: Some(format!("{api}/v2/post/publish/video/upload/")),
                analytics: None,
            },
            ProviderId::Instagram => ProviderEndpoints {
                user_info: format!("{api}/me"),
                token_refresh: format!("{oauth}/refresh_access_token"),
                videos: Some(format!("{api}/me/media")),
                playlists: None,
                upload: Some(format!("{api}/me/media")),
                analytics: Some(format!("{api}/insights")),
            },
            ProviderId::Twitter => {
                let upload = if api_overridden {
                    api
                } else {
                    "https://upload.twitter.com"
                };
                ProviderEndpoints {
                    user_info: format!("{api}/2/users/me"),
                    token_refresh: format!("{oauth}/2/oauth2/token"),
                    videos: Some(format!("{api}/2/tweets")),
                    playlists: None,
                    upload: Some(format!("{upload}/1.1/media/upload.json")),
                    analytics: None,
                }
            }
            ProviderId::Facebook => {
                let upload = if api_overridden {
                    api
                } else {
                    "https://graph-video.facebook.com"
                };
                ProviderEndpoints {
                    user_info: format!("{api}/v18.0/me"),
                    token_refresh: format!("{oauth}/v18.0/oauth/access_token"),
                    videos: Some(format!("{api}/v18.0/me/videos")),
                    playlists: Some(format!("{api}/v18.0/me/video_lists")),
                    upload: Some(format!("{upload}/v18.0/me/videos")),
                    analytics: Some(format!("{api}/v18.0/insights")),
                }
            }
        }
    }
}

/// Immutable provider catalog plus the content clients of available providers.
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: BTreeMap<ProviderId, SocialProviderConfig>,
    clients: HashMap<ProviderId, Arc<dyn ProviderClient>>,
}

impl ProviderRegistry {
    /// Build the catalog from configuration: base URL overrides, OAuth
    /// credentials and `DISABLED_PROVIDERS`.
    pub fn from_config(config: &AppConfig, http: reqwest::Client) -> Self {
        let base_url = config.app_base_url.trim_end_matches('/');
        let mut providers = BTreeMap::new();
        let mut clients: HashMap<ProviderId, Arc<dyn ProviderClient>> = HashMap::new();

        for id in ProviderId::ALL {
            let credentials = config.provider_credentials(id.as_str());
            let api = credentials
                .api_base
                .as_deref()
                .unwrap_or(id.default_api_base())
                .trim_end_matches('/')
                .to_string();
            let oauth = credentials
                .oauth_base
                .as_deref()
                .unwrap_or(id.default_oauth_base())
                .trim_end_matches('/')
                .to_string();
            let endpoints = id.endpoints(&api, &oauth, credentials.api_base.is_some());

            let is_available =
                IMPLEMENTED.contains(&id) && !config.is_provider_disabled(id.as_str());

            let oauth_client = match (&credentials.client_id, &credentials.client_secret) {
                (Some(client_id), Some(client_secret)) if credentials.is_complete() => {
                    Some(OAuthClient {
                        id_param: id.client_id_param(),
                        client_id: client_id.clone(),
                        client_secret: client_secret.clone(),
                    })
                }
                _ => None,
            };

            if is_available {
                if oauth_client.is_none() {
                    tracing::warn!(provider = %id, "Provider has no OAuth client credentials; token refresh will fail");
                }
                let client: Arc<dyn ProviderClient> = match id {
                    ProviderId::TikTok => {
                        Arc::new(tiktok::TikTokClient::new(http.clone(), &endpoints))
                    }
                    _ => Arc::new(youtube::YouTubeClient::new(http.clone(), &endpoints)),
                };
                clients.insert(id, client);
            }

            providers.insert(
                id,
                SocialProviderConfig {
                    id,
                    display_name: id.display_name().to_string(),
                    scopes: id.scopes(),
                    endpoints,
                    metrics: id.metrics().iter().map(|m| m.to_string()).collect(),
                    features: id.features(),
                    is_available,
                    success_redirect: format!("{base_url}/dashboard/accounts?connected={id}"),
                    oauth_client,
                },
            );
        }

        tracing::info!(
            available = ?clients.keys().map(|id| id.as_str()).collect::<Vec<_>>(),
            "Provider registry initialized"
        );

        Self { providers, clients }
    }

    /// Look up a provider by identifier; unknown identifiers yield `None`.
    pub fn lookup(&self, id: &str) -> Option<&SocialProviderConfig> {
        let id = id.parse::<ProviderId>().ok()?;
        self.get(id)
    }

    pub fn get(&self, id: ProviderId) -> Option<&SocialProviderConfig> {
        self.providers.get(&id)
    }

    /// Available providers in stable identifier order.
    pub fn list_available(&self) -> Vec<&SocialProviderConfig> {
        self.providers.values().filter(|p| p.is_available).collect()
    }

    pub fn available_ids(&self) -> Vec<&'static str> {
        self.list_available()
            .into_iter()
            .map(|p| p.id.as_str())
            .collect()
    }

    /// Content client of an available provider.
    pub fn client(&self, id: ProviderId) -> Option<Arc<dyn ProviderClient>> {
        self.clients.get(&id).cloned()
    }

    /// Replace the content client of a provider.
    pub fn with_client(mut self, id: ProviderId, client: Arc<dyn ProviderClient>) -> Self {
        self.clients.insert(id, client);
        self
    }
}
