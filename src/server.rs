//! # Server Configuration
//!
//! Application state, router assembly and the HTTP server lifecycle.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::acquisition::{AcquisitionPipeline, VideoDownloader, YtDlpDownloader};
use crate::analytics::AnalyticsFetcher;
use crate::auth::{CurrentUserResolver, JwtUserResolver, auth_middleware};
use crate::config::AppConfig;
use crate::handlers;
use crate::providers::{self, CapabilityService, ProviderRegistry};
use crate::publishing::PublishOrchestrator;
use crate::repositories::{
    FolderRepository, ReactionRepository, SocialAccountRepository, SocialShareRepository,
    SourceVideoRepository,
};
use crate::storage::{BlobStore, LocalBlobStore};
use crate::telemetry::trace_context_middleware;
use crate::token_refresh::TokenManager;
use crate::uploads::ReactionUploads;

/// Largest body accepted by the signed blob upload route.
const MAX_BLOB_BYTES: usize = 1024 * 1024 * 1024;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Arc<DatabaseConnection>,
    pub registry: Arc<ProviderRegistry>,
    pub capabilities: CapabilityService,
    pub accounts: SocialAccountRepository,
    pub folders: FolderRepository,
    pub videos: SourceVideoRepository,
    pub reactions: ReactionRepository,
    pub shares: SocialShareRepository,
    pub blob_store: Arc<LocalBlobStore>,
    pub acquisition: AcquisitionPipeline,
    pub uploads: ReactionUploads,
    pub publisher: PublishOrchestrator,
    pub analytics: AnalyticsFetcher,
    pub auth: Arc<dyn CurrentUserResolver>,
}

/// Collaborators injected into [`AppState`]; tests swap in fakes here.
pub struct Services {
    pub registry: ProviderRegistry,
    pub blob_store: LocalBlobStore,
    pub downloader: Arc<dyn VideoDownloader>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: AppConfig, db: DatabaseConnection, services: Services) -> Self {
        let db = Arc::new(db);
        let registry = Arc::new(services.registry);
        let blob_store = Arc::new(services.blob_store);
        let blobs: Arc<dyn BlobStore> = blob_store.clone();
        let scratch_dir = config.storage.scratch_dir.clone();

        let accounts = SocialAccountRepository::new(Arc::clone(&db));
        let folders = FolderRepository::new(Arc::clone(&db));
        let videos = SourceVideoRepository::new(Arc::clone(&db));
        let reactions = ReactionRepository::new(Arc::clone(&db));
        let shares = SocialShareRepository::new(Arc::clone(&db));

        let tokens = TokenManager::new(Arc::clone(&registry), accounts.clone(), services.http);

        let acquisition = AcquisitionPipeline::new(
            videos.clone(),
            folders.clone(),
            Arc::clone(&blobs),
            services.downloader,
            scratch_dir.clone(),
            config.acquisition.concurrency,
        );
        let uploads = ReactionUploads::new(reactions.clone(), videos.clone(), Arc::clone(&blobs));
        let publisher = PublishOrchestrator::new(
            Arc::clone(&registry),
            accounts.clone(),
            reactions.clone(),
            shares.clone(),
            tokens.clone(),
            blobs,
            scratch_dir,
            config.policy.clone(),
        );
        let analytics = AnalyticsFetcher::new(
            Arc::clone(&registry),
            accounts.clone(),
            shares.clone(),
            tokens,
            config.policy.clone(),
        );

        let auth: Arc<dyn CurrentUserResolver> =
            Arc::new(JwtUserResolver::new(config.auth_jwt_secret.as_deref()));

        Self {
            capabilities: CapabilityService::new(Arc::clone(&registry)),
            config: Arc::new(config),
            db,
            registry,
            accounts,
            folders,
            videos,
            reactions,
            shares,
            blob_store,
            acquisition,
            uploads,
            publisher,
            analytics,
            auth,
        }
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/accounts", get(handlers::accounts::list_accounts))
        .route(
            "/accounts/{id}",
            delete(handlers::accounts::disconnect_account),
        )
        .route(
            "/accounts/{id}/capabilities/{capability}",
            get(handlers::accounts::account_capability),
        )
        .route(
            "/source-videos",
            post(handlers::source_videos::submit_source_video)
                .get(handlers::source_videos::list_source_videos),
        )
        .route(
            "/source-videos/bulk-delete",
            post(handlers::source_videos::bulk_delete_source_videos),
        )
        .route(
            "/source-videos/{id}",
            get(handlers::source_videos::get_source_video),
        )
        .route(
            "/source-videos/{id}/folder",
            put(handlers::source_videos::move_source_video),
        )
        .route(
            "/folders",
            post(handlers::folders::create_folder).get(handlers::folders::list_folders),
        )
        .route(
            "/folders/{id}",
            get(handlers::folders::get_folder).delete(handlers::folders::delete_folder),
        )
        .route(
            "/reactions",
            post(handlers::reactions::create_reaction).get(handlers::reactions::list_reactions),
        )
        .route("/reactions/{id}", get(handlers::reactions::get_reaction))
        .route(
            "/reactions/{id}/upload-target",
            post(handlers::reactions::request_upload_target),
        )
        .route(
            "/reactions/{id}/complete-upload",
            post(handlers::reactions::complete_upload),
        )
        .route(
            "/reactions/{id}/publish",
            post(handlers::reactions::publish_reaction),
        )
        .route(
            "/reactions/{id}/playback-url",
            get(handlers::reactions::playback_url),
        )
        .route("/shares", get(handlers::shares::list_shares))
        .route("/shares/{id}", get(handlers::shares::get_share))
        .route("/analytics", get(handlers::analytics::get_analytics))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.auth),
            auth_middleware,
        ));

    let blobs = Router::new()
        .route(
            "/blobs/{bucket}/{*path}",
            get(handlers::blobs::read_blob).put(handlers::blobs::write_blob),
        )
        .layer(DefaultBodyLimit::max(MAX_BLOB_BYTES));

    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route("/providers", get(handlers::providers::list_providers))
        .merge(protected)
        .merge(blobs)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_context_middleware))
}

/// Builds the production collaborators and serves until ctrl-c.
///
/// On shutdown the listener stops accepting requests, in-flight requests
/// drain, then background downloads are cancelled and awaited.
pub async fn run_server(config: AppConfig, db: DatabaseConnection) -> anyhow::Result<()> {
    let http = providers::http_client().context("building provider HTTP client")?;
    let registry = ProviderRegistry::from_config(&config, http.clone());
    config.validate(&registry.available_ids())?;

    let blob_store = LocalBlobStore::from_config(&config.storage).await?;
    tokio::fs::create_dir_all(&config.storage.scratch_dir)
        .await
        .with_context(|| {
            format!(
                "creating scratch directory {}",
                config.storage.scratch_dir.display()
            )
        })?;
    let downloader: Arc<dyn VideoDownloader> =
        Arc::new(YtDlpDownloader::new(&config.acquisition));

    let addr = config.bind_addr().context("invalid server address")?;
    let profile = config.profile.clone();

    let state = AppState::new(
        config,
        db,
        Services {
            registry,
            blob_store,
            downloader,
            http,
        },
    );
    let acquisition = state.acquisition.clone();
    let app = create_app(state);

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received");
            shutdown.cancel();
        }
    });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, profile = %profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    acquisition.shutdown().await;
    Ok(())
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::readyz,
        crate::handlers::providers::list_providers,
        crate::handlers::accounts::list_accounts,
        crate::handlers::accounts::disconnect_account,
        crate::handlers::accounts::account_capability,
        crate::handlers::source_videos::submit_source_video,
        crate::handlers::source_videos::list_source_videos,
        crate::handlers::source_videos::get_source_video,
        crate::handlers::source_videos::bulk_delete_source_videos,
        crate::handlers::source_videos::move_source_video,
        crate::handlers::folders::create_folder,
        crate::handlers::folders::list_folders,
        crate::handlers::folders::get_folder,
        crate::handlers::folders::delete_folder,
        crate::handlers::reactions::create_reaction,
        crate::handlers::reactions::list_reactions,
        crate::handlers::reactions::get_reaction,
        crate::handlers::reactions::request_upload_target,
        crate::handlers::reactions::complete_upload,
        crate::handlers::reactions::publish_reaction,
        crate::handlers::reactions::playback_url,
        crate::handlers::shares::list_shares,
        crate::handlers::shares::get_share,
        crate::handlers::analytics::get_analytics,
        crate::handlers::blobs::read_blob,
        crate::handlers::blobs::write_blob,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::error::ApiError,
            crate::handlers::HealthResponse,
            crate::handlers::providers::ProviderInfo,
            crate::handlers::providers::ProvidersResponse,
            crate::handlers::accounts::AccountsResponse,
            crate::handlers::accounts::CapabilityResponse,
            crate::handlers::source_videos::SubmitSourceVideoRequest,
            crate::handlers::source_videos::SourceVideosResponse,
            crate::handlers::source_videos::BulkDeleteRequest,
            crate::handlers::source_videos::BulkDeleteResponse,
            crate::handlers::source_videos::MoveSourceVideoRequest,
            crate::handlers::folders::CreateFolderRequest,
            crate::handlers::folders::FoldersResponse,
            crate::handlers::folders::DeleteFolderResponse,
            crate::handlers::reactions::CreateReactionRequest,
            crate::handlers::reactions::ReactionsResponse,
            crate::handlers::reactions::UploadTargetRequest,
            crate::handlers::reactions::UploadTargetResponse,
            crate::handlers::reactions::CompleteUploadRequest,
            crate::handlers::reactions::PublishRequest,
            crate::handlers::reactions::PlaybackUrlResponse,
            crate::handlers::shares::SharesResponse,
            crate::models::social_account::SocialAccountResponse,
            crate::models::social_account::AccountStatus,
            crate::models::source_video::SourceVideoResponse,
            crate::models::source_video::SourceVideoStatus,
            crate::models::folder::FolderResponse,
            crate::models::reaction::ReactionResponse,
            crate::models::reaction::ReactionStatus,
            crate::models::social_share::SocialShareResponse,
            crate::models::social_share::ShareStatus,
            crate::analytics::NormalizedAnalytics,
            crate::analytics::WatchTime,
            crate::analytics::Demographics,
            crate::providers::ProviderId,
            crate::providers::Capability,
        )
    ),
    modifiers(&BearerAuth),
    info(
        title = "ReactShare API",
        description = "Social platform integration: provider accounts, media acquisition, reaction uploads, publishing and analytics",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;


#[cfg(test)]
mod tests {
    use super::test_support::test_state;
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn openapi_document_is_served() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_app(test_state(dir.path()).await);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(doc["paths"]["/reactions/{id}/publish"]["post"].is_object());
        assert!(doc["components"]["securitySchemes"]["bearer_auth"].is_object());
    }

    #[tokio::test]
    async fn protected_routes_require_a_session() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_app(test_state(dir.path()).await);

        for uri in ["/accounts", "/reactions", "/shares", "/analytics?share_id=x"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_app(test_state(dir.path()).await);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/accounts")
                    .header("x-request-id", "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers().get("x-request-id").unwrap(), "req-42");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(error["trace_id"], "req-42");
    }
}
