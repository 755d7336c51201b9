//! Shared fixtures for integration tests.
//!
//! Builds an [`AppState`] over an in-memory SQLite database, a blob store in
//! a temp directory and provider clients pointed at a wiremock server.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use migration::{Migrator, MigratorTrait};
use reactshare::acquisition::{DownloadedFile, DownloaderError, VideoDownloader};
use reactshare::auth::SessionClaims;
use reactshare::config::{AppConfig, ProviderCredentials, StorageConfig};
use reactshare::models::social_account::{self, AccountStatus};
use reactshare::providers::ProviderRegistry;
use reactshare::repositories::reaction::NewReaction;
use reactshare::server::{AppState, Services};
use reactshare::storage::{BlobStore, Bucket, LocalBlobStore, UrlSigner};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, Set, Statement,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

pub const JWT_SECRET: &str = "integration-test-secret";
pub const SIGNING_SECRET: &str = "integration-signing-secret";

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;

    // Fixtures reference users that live in the auth service.
    db.execute(Statement::from_string(
        db.get_database_backend(),
        "PRAGMA foreign_keys = OFF".to_string(),
    ))
    .await?;

    Ok(db)
}

/// What [`FakeDownloader`] does when asked for a video.
#[derive(Clone)]
pub enum FakeDownload {
    /// Write these bytes as `<id>.mp4` into the output directory
    Succeed(Vec<u8>),
    /// Fail the way a non-zero downloader exit does
    Fail(String),
}

pub struct FakeDownloader {
    pub behavior: FakeDownload,
}

impl FakeDownloader {
    pub fn succeeding(bytes: &[u8]) -> Arc<dyn VideoDownloader> {
        Arc::new(Self {
            behavior: FakeDownload::Succeed(bytes.to_vec()),
        })
    }

    pub fn failing(stderr: &str) -> Arc<dyn VideoDownloader> {
        Arc::new(Self {
            behavior: FakeDownload::Fail(stderr.to_string()),
        })
    }
}

#[async_trait]
impl VideoDownloader for FakeDownloader {
    async fn download(
        &self,
        _url: &str,
        output_dir: &Path,
    ) -> Result<DownloadedFile, DownloaderError> {
        match &self.behavior {
            FakeDownload::Succeed(bytes) => {
                let path = output_dir.join("dQw4w9WgXcQ.mp4");
                tokio::fs::write(&path, bytes)
                    .await
                    .map_err(DownloaderError::Spawn)?;
                Ok(DownloadedFile {
                    path,
                    title: Some("Source clip".to_string()),
                    thumbnail_url: Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/hq.jpg".to_string()),
                    duration_seconds: Some(212),
                    file_format: Some("mp4".to_string()),
                })
            }
            FakeDownload::Fail(stderr) => Err(DownloaderError::Failed {
                status: "exit status: 1".to_string(),
                stderr: stderr.clone(),
            }),
        }
    }
}

/// Owns the temp directory backing a test [`AppState`].
pub struct TestApp {
    pub state: AppState,
    pub dir: TempDir,
}

impl TestApp {
    pub fn scratch_dir(&self) -> std::path::PathBuf {
        self.state.config.storage.scratch_dir.clone()
    }

    /// Entries left in the scratch directory.
    pub fn scratch_entries(&self) -> Vec<String> {
        match std::fs::read_dir(self.scratch_dir()) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Config with YouTube and TikTok credentials whose API and OAuth hosts
/// both point at `provider_base` (usually a wiremock server URI).
pub fn test_config(dir: &Path, provider_base: Option<&str>) -> AppConfig {
    let mut config = AppConfig {
        profile: "test".to_string(),
        auth_jwt_secret: Some(JWT_SECRET.to_string()),
        storage: StorageConfig {
            root: dir.join("blobs"),
            scratch_dir: dir.join("scratch"),
            signing_secret: Some(SIGNING_SECRET.to_string()),
            ..Default::default()
        },
        ..AppConfig::default()
    };
    for provider in ["youtube", "tiktok"] {
        config.providers.insert(
            provider.to_string(),
            ProviderCredentials {
                client_id: Some(format!("{provider}-client")),
                client_secret: Some(format!("{provider}-secret")),
                api_base: provider_base.map(str::to_string),
                oauth_base: provider_base.map(str::to_string),
            },
        );
    }
    config
}

pub async fn build_app(
    provider_base: Option<&str>,
    downloader: Arc<dyn VideoDownloader>,
) -> Result<TestApp> {
    let dir = TempDir::new()?;
    let config = test_config(dir.path(), provider_base);
    let db = setup_test_db().await?;
    let http = reqwest::Client::new();
    let blob_store = LocalBlobStore::new(
        &config.storage.root,
        &config.storage.public_base_url,
        UrlSigner::new(SIGNING_SECRET)?,
    )
    .await?;
    tokio::fs::create_dir_all(&config.storage.scratch_dir).await?;

    let state = AppState::new(
        config.clone(),
        db,
        Services {
            registry: ProviderRegistry::from_config(&config, http.clone()),
            blob_store,
            downloader,
            http,
        },
    );
    Ok(TestApp { state, dir })
}

/// HS256 session token for `user`, valid for an hour.
pub fn session_token(user: Uuid) -> String {
    let claims = SessionClaims {
        sub: user.to_string(),
        exp: (Utc::now().timestamp() + 3600) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

/// Inserts an active provider account the way the connect flow would.
pub async fn seed_account(
    db: &DatabaseConnection,
    owner: Uuid,
    provider: &str,
    token_expires_at: Option<DateTime<Utc>>,
    refresh_token: Option<&str>,
) -> Result<social_account::Model> {
    let now = Utc::now().fixed_offset();
    let account = social_account::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(owner),
        provider: Set(provider.to_string()),
        provider_account_id: Set(format!("{provider}-{}", Uuid::new_v4().simple())),
        provider_username: Set(Some("reactor".to_string())),
        access_token: Set("stored-access-token".to_string()),
        refresh_token: Set(refresh_token.map(str::to_string)),
        token_expires_at: Set(token_expires_at.map(|at| at.fixed_offset())),
        profile_data: Set(None),
        scope: Set(None),
        status: Set(AccountStatus::Active),
        last_sync_at: Set(Some(now)),
        created_at: Set(now),
        updated_at: Set(now),
    };
    Ok(account.insert(db).await?)
}

/// Registers a reaction and uploads `bytes` as its recording.
pub async fn seed_uploaded_reaction(
    state: &AppState,
    owner: Uuid,
    bytes: &[u8],
) -> Result<reactshare::models::reaction::Model> {
    let reaction = seed_reaction(state, owner).await?;
    let target = state
        .uploads
        .request_upload_target(reaction.id, owner, "take.mp4")
        .await?;
    state
        .blob_store
        .upload(
            Bucket::Reactions,
            &target.storage_path,
            bytes.to_vec(),
            "video/mp4",
        )
        .await?;
    Ok(state
        .uploads
        .complete_upload(reaction.id, owner, &target.storage_path)
        .await?)
}

/// Registers a reaction without uploading a recording.
pub async fn seed_reaction(
    state: &AppState,
    owner: Uuid,
) -> Result<reactshare::models::reaction::Model> {
    Ok(state
        .uploads
        .create(
            owner,
            NewReaction {
                source_video_url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
                source_video_id: None,
                title: "My reaction".to_string(),
                thumbnail_url: None,
            },
        )
        .await?)
}
