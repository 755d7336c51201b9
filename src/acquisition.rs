//! # Media Acquisition Pipeline
//!
//! Downloads an external video with the downloader collaborator, stores it in
//! the blob store and records the outcome on the source video row.
//!
//! Status is written only at creation (`downloading`) and at a terminal
//! state. `completed` is written after the blob is stored and carries its
//! path in the same update, so a completed row always points at a real blob.
//!
//! Submitted downloads run on a [`TaskTracker`] detached from the request.
//! [`AcquisitionPipeline::shutdown`] cancels in-flight work, which marks it
//! `error`, and waits for every task to finish.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::AcquisitionConfig;
use crate::error::{ApiError, internal_error, not_found, service_unavailable, validation_error};
use crate::models::source_video;
use crate::repositories::source_video::CompletedDownload;
use crate::repositories::{FolderRepository, RecordError, SourceVideoRepository};
use crate::storage::{BlobStore, Bucket, StorageError};

/// Failures of the external downloader.
#[derive(Debug, Error)]
pub enum DownloaderError {
    #[error("failed to start downloader: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("downloader exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("downloader produced no usable output: {0}")]
    NoOutput(String),
}

/// A file produced by the downloader.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub title: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: Option<i32>,
    pub file_format: Option<String>,
}

/// Fetches a remote video into a local directory.
#[async_trait]
pub trait VideoDownloader: Send + Sync {
    async fn download(
        &self,
        url: &str,
        output_dir: &Path,
    ) -> Result<DownloadedFile, DownloaderError>;
}

/// `yt-dlp` command-line downloader.
///
/// Prefers an mp4 video stream no taller than `max_height` with m4a audio,
/// merged into mp4.
pub struct YtDlpDownloader {
    bin: String,
    max_height: u32,
}

#[derive(Debug, Deserialize)]
struct YtDlpReport {
    filepath: Option<String>,
    title: Option<String>,
    thumbnail: Option<String>,
    duration: Option<f64>,
    ext: Option<String>,
}

impl YtDlpDownloader {
    pub fn new(config: &AcquisitionConfig) -> Self {
        Self {
            bin: config.downloader_bin.clone(),
            max_height: config.max_height,
        }
    }

    fn format_selector(&self) -> String {
        let h = self.max_height;
        format!(
            "bestvideo[height<={h}][ext=mp4]+bestaudio[ext=m4a]/best[height<={h}][ext=mp4]/best[height<={h}]"
        )
    }

    fn parse_report(stdout: &str) -> Result<DownloadedFile, DownloaderError> {
        let line = stdout
            .lines()
            .rev()
            .find(|line| line.trim_start().starts_with('{'))
            .ok_or_else(|| DownloaderError::NoOutput("no report line".to_string()))?;
        let report: YtDlpReport = serde_json::from_str(line)
            .map_err(|e| DownloaderError::NoOutput(format!("unreadable report: {e}")))?;
        let path = report
            .filepath
            .filter(|p| !p.is_empty())
            .ok_or_else(|| DownloaderError::NoOutput("report has no filepath".to_string()))?;

        Ok(DownloadedFile {
            path: PathBuf::from(path),
            title: report.title,
            thumbnail_url: report.thumbnail,
            duration_seconds: report.duration.map(|d| d.round() as i32),
            file_format: report.ext,
        })
    }
}

#[async_trait]
impl VideoDownloader for YtDlpDownloader {
    async fn download(
        &self,
        url: &str,
        output_dir: &Path,
    ) -> Result<DownloadedFile, DownloaderError> {
        let template = output_dir.join("%(id)s.%(ext)s");
        let output = Command::new(&self.bin)
            .arg("--no-playlist")
            .arg("--no-progress")
            .arg("-f")
            .arg(self.format_selector())
            .arg("--merge-output-format")
            .arg("mp4")
            .arg("-o")
            .arg(&template)
            .arg("--print")
            .arg("after_move:%(.{filepath,title,thumbnail,duration,ext})j")
            .arg("--")
            .arg(url)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(DownloaderError::Spawn)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr
                .lines()
                .rev()
                .take(5)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            return Err(DownloaderError::Failed {
                status: output.status.to_string(),
                stderr: tail,
            });
        }

        Self::parse_report(&String::from_utf8_lossy(&output.stdout))
    }
}

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("invalid source URL: {0}")]
    InvalidUrl(String),
    #[error("folder not found")]
    FolderNotFound,
    #[error("acquisition pipeline is shutting down")]
    ShuttingDown,
    #[error("download cancelled")]
    Cancelled,
    #[error(transparent)]
    Download(#[from] DownloaderError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("scratch file error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Record(#[from] RecordError),
}

impl From<AcquisitionError> for ApiError {
    fn from(error: AcquisitionError) -> Self {
        match error {
            AcquisitionError::InvalidUrl(reason) => validation_error(
                "Invalid source URL",
                serde_json::json!({ "url": reason }),
            ),
            AcquisitionError::FolderNotFound => not_found(Some("Folder not found")),
            AcquisitionError::ShuttingDown => {
                service_unavailable(Some("Service is shutting down"))
            }
            AcquisitionError::Record(err) => err.into(),
            other => {
                error!(error = %other, "Acquisition failed");
                internal_error()
            }
        }
    }
}

struct Worker {
    videos: SourceVideoRepository,
    blobs: Arc<dyn BlobStore>,
    downloader: Arc<dyn VideoDownloader>,
    scratch_dir: PathBuf,
    permits: Semaphore,
}

/// Submission front-end for background downloads.
#[derive(Clone)]
pub struct AcquisitionPipeline {
    worker: Arc<Worker>,
    folders: FolderRepository,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl AcquisitionPipeline {
    pub fn new(
        videos: SourceVideoRepository,
        folders: FolderRepository,
        blobs: Arc<dyn BlobStore>,
        downloader: Arc<dyn VideoDownloader>,
        scratch_dir: PathBuf,
        concurrency: usize,
    ) -> Self {
        Self {
            worker: Arc::new(Worker {
                videos,
                blobs,
                downloader,
                scratch_dir,
                permits: Semaphore::new(concurrency.max(1)),
            }),
            folders,
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    async fn register(
        &self,
        owner: Uuid,
        url: &str,
        folder_id: Option<Uuid>,
    ) -> Result<source_video::Model, AcquisitionError> {
        if self.tracker.is_closed() {
            return Err(AcquisitionError::ShuttingDown);
        }

        let parsed = url::Url::parse(url.trim())
            .map_err(|e| AcquisitionError::InvalidUrl(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AcquisitionError::InvalidUrl(
                "only http and https URLs are supported".to_string(),
            ));
        }

        if let Some(folder_id) = folder_id {
            self.folders
                .find_owned(owner, folder_id)
                .await?
                .ok_or(AcquisitionError::FolderNotFound)?;
        }

        Ok(self
            .worker
            .videos
            .create_downloading(owner, parsed.to_string(), folder_id)
            .await?)
    }

    /// Register the download and run it in the background.
    ///
    /// Returns the `downloading` row immediately; its id is the handle for
    /// polling.
    pub async fn submit(
        &self,
        owner: Uuid,
        url: &str,
        folder_id: Option<Uuid>,
    ) -> Result<source_video::Model, AcquisitionError> {
        let record = self.register(owner, url, folder_id).await?;

        let worker = Arc::clone(&self.worker);
        let shutdown = self.shutdown.clone();
        let job = record.clone();
        let span = info_span!("acquisition", source_video_id = %record.id, owner = %owner);
        self.tracker.spawn(
            async move {
                worker.run(job, shutdown).await;
            }
            .instrument(span),
        );

        counter!("acquisition_submitted_total").increment(1);
        info!(source_video_id = %record.id, "Source video download submitted");
        Ok(record)
    }

    /// Register and run a download to its terminal state.
    pub async fn acquire(
        &self,
        owner: Uuid,
        url: &str,
        folder_id: Option<Uuid>,
    ) -> Result<source_video::Model, AcquisitionError> {
        let record = self.register(owner, url, folder_id).await?;
        Ok(self.worker.run(record, self.shutdown.clone()).await)
    }

    /// Number of downloads still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for all submitted downloads without cancelling them.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    /// Stop accepting work, cancel in-flight downloads and wait for them to
    /// record a terminal state.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.shutdown.cancel();
        self.tracker.wait().await;
        info!("Acquisition pipeline stopped");
    }
}

impl Worker {
    /// Drive one download to a terminal state and return the final row.
    async fn run(
        &self,
        record: source_video::Model,
        shutdown: CancellationToken,
    ) -> source_video::Model {
        let started = Instant::now();

        let outcome = tokio::select! {
            outcome = self.fetch_and_store(&record) => outcome,
            _ = shutdown.cancelled() => Err(AcquisitionError::Cancelled),
        };

        let finished = match outcome {
            Ok(stored) => match self.videos.mark_completed(record.id, stored.clone()).await {
                Ok(model) => {
                    counter!("acquisition_completed_total").increment(1);
                    info!(
                        storage_path = %stored.storage_path,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Source video stored"
                    );
                    Ok(model)
                }
                Err(err) => {
                    // The row could not reference the blob, so drop it.
                    if let Err(delete_err) = self
                        .blobs
                        .delete(Bucket::SourceVideos, &stored.storage_path)
                        .await
                    {
                        warn!(error = %delete_err, "Failed to remove unreferenced blob");
                    }
                    Err(AcquisitionError::Record(err))
                }
            },
            Err(err) => Err(err),
        };

        histogram!("acquisition_duration_ms").record(started.elapsed().as_secs_f64() * 1_000.0);

        match finished {
            Ok(model) => model,
            Err(err) => {
                counter!("acquisition_failed_total").increment(1);
                warn!(error = %err, "Source video download failed");
                match self.videos.mark_error(record.id, err.to_string()).await {
                    Ok(model) => model,
                    Err(mark_err) => {
                        error!(error = %mark_err, "Failed to record download failure");
                        source_video::Model {
                            status: source_video::SourceVideoStatus::Error,
                            storage_path: None,
                            error_message: Some(err.to_string()),
                            ..record
                        }
                    }
                }
            }
        }
    }

    async fn fetch_and_store(
        &self,
        record: &source_video::Model,
    ) -> Result<CompletedDownload, AcquisitionError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| AcquisitionError::ShuttingDown)?;

        let work_dir = self.scratch_dir.join(format!("acquire-{}", record.id));
        tokio::fs::create_dir_all(&work_dir).await?;
        let _cleanup = scopeguard::guard(work_dir.clone(), |dir| {
            if let Err(err) = std::fs::remove_dir_all(&dir)
                && err.kind() != std::io::ErrorKind::NotFound
            {
                warn!(dir = %dir.display(), error = %err, "Failed to remove scratch directory");
            }
        });

        let file = self
            .downloader
            .download(&record.original_url, &work_dir)
            .await?;
        let data = tokio::fs::read(&file.path).await?;
        let size = data.len() as i64;

        let ext = file
            .file_format
            .clone()
            .or_else(|| {
                file.path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "mp4".to_string());
        let path = format!("{}/{}.{}", record.user_id, record.id, ext);
        let content_type = if ext == "webm" { "video/webm" } else { "video/mp4" };

        let storage_path = self
            .blobs
            .upload(Bucket::SourceVideos, &path, data, content_type)
            .await?;

        Ok(CompletedDownload {
            storage_path,
            title: file.title,
            thumbnail_url: file.thumbnail_url,
            duration_seconds: file.duration_seconds,
            file_format: Some(ext),
            file_size: Some(size),
        })
    }
}
