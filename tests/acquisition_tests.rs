mod test_utils;

use reactshare::acquisition::AcquisitionError;
use reactshare::models::source_video::SourceVideoStatus;
use reactshare::storage::{BlobStore, Bucket};
use test_utils::{FakeDownloader, build_app};
use uuid::Uuid;

const SOURCE_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

#[tokio::test]
async fn successful_download_is_stored_under_owner_prefix() {
    let app = build_app(None, FakeDownloader::succeeding(b"source-bytes"))
        .await
        .unwrap();
    let owner = Uuid::new_v4();

    let video = app
        .state
        .acquisition
        .acquire(owner, SOURCE_URL, None)
        .await
        .unwrap();

    assert_eq!(video.status, SourceVideoStatus::Completed);
    let storage_path = video.storage_path.clone().unwrap();
    assert_eq!(storage_path, format!("{owner}/{}.mp4", video.id));
    assert_eq!(video.title.as_deref(), Some("Source clip"));
    assert_eq!(video.duration_seconds, Some(212));
    assert_eq!(video.file_size, Some(12));
    assert_eq!(video.error_message, None);

    let stored = app
        .state
        .blob_store
        .download(Bucket::SourceVideos, &storage_path)
        .await
        .unwrap();
    assert_eq!(stored, b"source-bytes");
    assert!(app.scratch_entries().is_empty());
}

#[tokio::test]
async fn failed_download_never_reaches_completed() {
    let app = build_app(None, FakeDownloader::failing("ERROR: Video unavailable"))
        .await
        .unwrap();
    let owner = Uuid::new_v4();

    let video = app
        .state
        .acquisition
        .acquire(owner, SOURCE_URL, None)
        .await
        .unwrap();

    assert_eq!(video.status, SourceVideoStatus::Error);
    assert_eq!(video.storage_path, None);
    assert!(
        video
            .error_message
            .as_deref()
            .unwrap()
            .contains("Video unavailable")
    );

    let persisted = app
        .state
        .videos
        .find_owned(owner, video.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(persisted.status, SourceVideoStatus::Error);
    assert!(
        !app.dir
            .path()
            .join("blobs/source-videos")
            .join(owner.to_string())
            .exists()
    );
    assert!(app.scratch_entries().is_empty());
}

#[tokio::test]
async fn submitted_download_starts_downloading_and_settles() {
    let app = build_app(None, FakeDownloader::succeeding(b"bytes"))
        .await
        .unwrap();
    let owner = Uuid::new_v4();

    let submitted = app
        .state
        .acquisition
        .submit(owner, SOURCE_URL, None)
        .await
        .unwrap();
    assert_eq!(submitted.status, SourceVideoStatus::Downloading);
    assert_eq!(submitted.storage_path, None);

    app.state.acquisition.drain().await;
    assert_eq!(app.state.acquisition.in_flight(), 0);

    let settled = app
        .state
        .videos
        .find_owned(owner, submitted.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(settled.status, SourceVideoStatus::Completed);
    assert!(settled.storage_path.is_some());

    let err = app
        .state
        .acquisition
        .submit(owner, SOURCE_URL, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AcquisitionError::ShuttingDown));
}

#[tokio::test]
async fn invalid_urls_and_foreign_folders_create_no_row() {
    let app = build_app(None, FakeDownloader::succeeding(b"bytes"))
        .await
        .unwrap();
    let owner = Uuid::new_v4();
    let stranger = Uuid::new_v4();

    let err = app
        .state
        .acquisition
        .acquire(owner, "ftp://example.com/video.mp4", None)
        .await
        .unwrap_err();
    assert!(matches!(err, AcquisitionError::InvalidUrl(_)));

    let folder = app
        .state
        .folders
        .create(stranger, "Theirs".to_string(), None)
        .await
        .unwrap();
    let err = app
        .state
        .acquisition
        .acquire(owner, SOURCE_URL, Some(folder.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AcquisitionError::FolderNotFound));

    let videos = app.state.videos.list_for_owner(owner, None).await.unwrap();
    assert!(videos.is_empty());
}
