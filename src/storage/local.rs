use async_trait::async_trait;
use rand::RngCore;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use url::Url;

use super::{
    BlobStore, Bucket, SignedAccess, StorageError, StorageResult, UrlSigner, validate_path,
};
use crate::config::StorageConfig;

/// Local filesystem blob store.
///
/// Objects are stored at `{root}/{bucket}/{path}`. Writes go to a temporary
/// sibling first and are renamed into place, so readers never observe a
/// partially written object.
#[derive(Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: Url,
    signer: UrlSigner,
}

impl LocalBlobStore {
    pub async fn new(
        root: impl Into<PathBuf>,
        public_base_url: &str,
        signer: UrlSigner,
    ) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::Config(format!(
                "failed to create storage directory {}: {}",
                root.display(),
                e
            ))
        })?;

        let public_base_url = Url::parse(public_base_url)
            .map_err(|e| StorageError::Config(format!("invalid public base URL: {e}")))?;
        if public_base_url.cannot_be_a_base() {
            return Err(StorageError::Config(
                "public base URL cannot be a base".to_string(),
            ));
        }

        Ok(Self {
            root,
            public_base_url,
            signer,
        })
    }

    /// Build from configuration. Without a configured signing secret a random
    /// per-process key is used, so signed URLs do not survive restarts.
    pub async fn from_config(config: &StorageConfig) -> StorageResult<Self> {
        let signer = match &config.signing_secret {
            Some(secret) => UrlSigner::new(secret)?,
            None => {
                tracing::warn!("No storage signing secret configured; using an ephemeral key");
                let mut key = [0u8; 32];
                rand::thread_rng().fill_bytes(&mut key);
                UrlSigner::new(key)?
            }
        };
        Self::new(&config.root, &config.public_base_url, signer).await
    }

    fn object_path(&self, bucket: Bucket, path: &str) -> StorageResult<PathBuf> {
        validate_path(path)?;
        Ok(self.root.join(bucket.as_str()).join(path))
    }

    fn object_url(&self, bucket: Bucket, path: &str) -> StorageResult<Url> {
        validate_path(path)?;
        let mut url = self.public_base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StorageError::Config("public base URL cannot be a base".into()))?;
            segments.pop_if_empty().push(bucket.as_str());
            segments.extend(path.split('/'));
        }
        Ok(url)
    }

    fn signed(
        &self,
        access: SignedAccess,
        bucket: Bucket,
        path: &str,
        ttl: Duration,
    ) -> StorageResult<String> {
        let expires = chrono::Utc::now().timestamp() + ttl.as_secs() as i64;
        let signature = self.signer.sign(access, bucket, path, expires);
        let mut url = self.object_url(bucket, path)?;
        url.query_pairs_mut()
            .append_pair("expires", &expires.to_string())
            .append_pair("signature", &signature);
        Ok(url.to_string())
    }

    /// Check a signature presented on a blob URL.
    pub fn verify_signature(
        &self,
        access: SignedAccess,
        bucket: Bucket,
        path: &str,
        expires: i64,
        signature: &str,
    ) -> bool {
        self.signer.verify(
            access,
            bucket,
            path,
            expires,
            signature,
            chrono::Utc::now().timestamp(),
        )
    }

    async fn write_atomically(&self, target: &Path, data: &[u8]) -> StorageResult<()> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = target.with_extension(format!("partial-{}", uuid::Uuid::new_v4().simple()));

        let result = async {
            let mut file = fs::File::create(&tmp).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
            fs::rename(&tmp, target).await
        }
        .await;

        if let Err(err) = result {
            let _ = fs::remove_file(&tmp).await;
            return Err(StorageError::UploadFailed(format!(
                "failed to write {}: {}",
                target.display(),
                err
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(
        &self,
        bucket: Bucket,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String> {
        let target = self.object_path(bucket, path)?;
        let start = Instant::now();

        self.write_atomically(&target, &data).await?;

        tracing::info!(
            bucket = %bucket,
            path,
            content_type,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Blob stored"
        );
        Ok(path.to_string())
    }

    async fn download(&self, bucket: Bucket, path: &str) -> StorageResult<Vec<u8>> {
        let target = self.object_path(bucket, path)?;
        match fs::read(&target).await {
            Ok(data) => {
                tracing::debug!(bucket = %bucket, path, size_bytes = data.len(), "Blob read");
                Ok(data)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(format!("{bucket}/{path}")))
            }
            Err(err) => Err(StorageError::DownloadFailed(format!(
                "failed to read {}: {}",
                target.display(),
                err
            ))),
        }
    }

    async fn delete(&self, bucket: Bucket, path: &str) -> StorageResult<()> {
        let target = self.object_path(bucket, path)?;
        match fs::remove_file(&target).await {
            Ok(()) => {
                tracing::info!(bucket = %bucket, path, "Blob deleted");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn exists(&self, bucket: Bucket, path: &str) -> StorageResult<bool> {
        let target = self.object_path(bucket, path)?;
        Ok(fs::try_exists(&target).await?)
    }

    fn public_url(&self, bucket: Bucket, path: &str) -> StorageResult<String> {
        Ok(self.object_url(bucket, path)?.to_string())
    }

    fn signed_url(&self, bucket: Bucket, path: &str, ttl: Duration) -> StorageResult<String> {
        self.signed(SignedAccess::Read, bucket, path, ttl)
    }

    fn signed_upload_url(
        &self,
        bucket: Bucket,
        path: &str,
        ttl: Duration,
    ) -> StorageResult<String> {
        self.signed(SignedAccess::Write, bucket, path, ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store(dir: &Path) -> LocalBlobStore {
        LocalBlobStore::new(
            dir,
            "http://localhost:8080/blobs",
            UrlSigner::new("0123456789abcdef").unwrap(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn upload_download_delete_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).await;

        store
            .upload(Bucket::Reactions, "u1/r1/take.mp4", b"video".to_vec(), "video/mp4")
            .await
            .unwrap();
        assert!(dir.path().join("reactions/u1/r1/take.mp4").exists());
        assert!(store.exists(Bucket::Reactions, "u1/r1/take.mp4").await.unwrap());
        assert_eq!(
            store.download(Bucket::Reactions, "u1/r1/take.mp4").await.unwrap(),
            b"video"
        );

        store.delete(Bucket::Reactions, "u1/r1/take.mp4").await.unwrap();
        store.delete(Bucket::Reactions, "u1/r1/take.mp4").await.unwrap();
        assert!(matches!(
            store.download(Bucket::Reactions, "u1/r1/take.mp4").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn upload_leaves_no_partial_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).await;

        store
            .upload(Bucket::SourceVideos, "u1/v1.mp4", vec![0u8; 1024], "video/mp4")
            .await
            .unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path().join("source-videos/u1"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["v1.mp4".to_string()]);
    }

    #[tokio::test]
    async fn traversal_paths_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).await;

        let result = store
            .upload(Bucket::Reactions, "../escape.mp4", vec![1], "video/mp4")
            .await;
        assert!(matches!(result, Err(StorageError::InvalidPath(_))));
    }

    #[tokio::test]
    async fn signed_url_carries_verifiable_signature() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).await;

        assert_eq!(
            store.public_url(Bucket::Reactions, "u1/r1/take.mp4").unwrap(),
            "http://localhost:8080/blobs/reactions/u1/r1/take.mp4"
        );

        let signed = store
            .signed_url(Bucket::Reactions, "u1/r1/take.mp4", Duration::from_secs(600))
            .unwrap();
        let url = Url::parse(&signed).unwrap();
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        let expires: i64 = params["expires"].parse().unwrap();

        assert!(store.verify_signature(
            SignedAccess::Read,
            Bucket::Reactions,
            "u1/r1/take.mp4",
            expires,
            &params["signature"],
        ));
        assert!(!store.verify_signature(
            SignedAccess::Write,
            Bucket::Reactions,
            "u1/r1/take.mp4",
            expires,
            &params["signature"],
        ));
    }
}
