//! TikTok Open API client.
//!
//! Uploads are a single multipart POST. TikTok answers HTTP 200 even for
//! failures, so every response is checked for `error.code == "ok"`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::multipart::MultipartBody;
use super::registry::ProviderEndpoints;
use super::{
    ProviderClient, ProviderClientError, ProviderId, UploadOutcome, UploadRequest,
    VideoStatistics, error_body,
};

const STAT_FIELDS: &str = "id,view_count,like_count,comment_count,share_count";

pub struct TikTokClient {
    http: reqwest::Client,
    upload_url: Option<String>,
    query_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    error: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    video_id: Option<String>,
    publish_id: Option<String>,
    share_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(default)]
    videos: Vec<VideoStats>,
}

#[derive(Debug, Deserialize)]
struct VideoStats {
    #[serde(default)]
    view_count: u64,
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    comment_count: u64,
    #[serde(default)]
    share_count: u64,
}

impl TikTokClient {
    pub fn new(http: reqwest::Client, endpoints: &ProviderEndpoints) -> Self {
        Self {
            http,
            upload_url: endpoints.upload.clone(),
            query_url: endpoints.videos.clone(),
        }
    }

    /// Parse a TikTok envelope, treating a non-"ok" error code as rejection.
    async fn read_envelope<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ProviderClientError> {
        if !response.status().is_success() {
            return Err(ProviderClientError::Http {
                provider: ProviderId::TikTok,
                status: response.status().as_u16(),
                body: error_body(response).await,
            });
        }

        let text = response.text().await?;
        let envelope: Envelope<T> =
            serde_json::from_str(&text).map_err(|e| ProviderClientError::Malformed {
                provider: ProviderId::TikTok,
                details: e.to_string(),
            })?;

        if let Some(status) = &envelope.error
            && status.code != "ok"
        {
            tracing::warn!(code = %status.code, message = %status.message, "TikTok rejected request");
            return Err(ProviderClientError::Rejected {
                provider: ProviderId::TikTok,
                body: text,
            });
        }

        envelope.data.ok_or_else(|| ProviderClientError::Malformed {
            provider: ProviderId::TikTok,
            details: "response has no data".to_string(),
        })
    }
}

#[async_trait]
impl ProviderClient for TikTokClient {
    fn provider(&self) -> ProviderId {
        ProviderId::TikTok
    }

    async fn upload_video(
        &self,
        access_token: &str,
        request: UploadRequest<'_>,
    ) -> Result<UploadOutcome, ProviderClientError> {
        let url = self
            .upload_url
            .as_deref()
            .ok_or(ProviderClientError::MissingEndpoint {
                provider: ProviderId::TikTok,
                endpoint: "upload",
            })?;

        let video = tokio::fs::read(request.file_path).await?;
        let metadata = request.metadata;

        let mut body = MultipartBody::with_random_boundary();
        body.text("title", &metadata.title);
        if let Some(description) = &metadata.description {
            body.text("description", description);
        }
        if let Some(privacy) = &metadata.privacy {
            body.text("privacy_level", privacy);
        }
        if !metadata.tags.is_empty() {
            body.text("tags", &metadata.tags.join(","));
        }
        body.file("video", request.file_name, request.content_type, &video);
        let content_type = body.content_type();
        let payload = body.finish();

        tracing::debug!(size_bytes = payload.len(), "Uploading video to TikTok");

        let response = self
            .http
            .post(url)
            .bearer_auth(access_token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(payload)
            .send()
            .await?;

        let data: UploadData = Self::read_envelope(response).await?;
        let post_id = data
            .video_id
            .or(data.publish_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ProviderClientError::Malformed {
                provider: ProviderId::TikTok,
                details: "upload response carries no video id".to_string(),
            })?;

        Ok(UploadOutcome {
            post_id,
            post_url: data.share_url,
        })
    }

    async fn fetch_statistics(
        &self,
        access_token: &str,
        post_id: &str,
    ) -> Result<VideoStatistics, ProviderClientError> {
        let url = self
            .query_url
            .as_deref()
            .ok_or(ProviderClientError::MissingEndpoint {
                provider: ProviderId::TikTok,
                endpoint: "videos",
            })?;

        let response = self
            .http
            .post(url)
            .query(&[("fields", STAT_FIELDS)])
            .bearer_auth(access_token)
            .json(&json!({ "filters": { "video_ids": [post_id] } }))
            .send()
            .await?;

        let data: QueryData = Self::read_envelope(response).await?;
        let video = data
            .videos
            .into_iter()
            .next()
            .ok_or_else(|| ProviderClientError::Malformed {
                provider: ProviderId::TikTok,
                details: format!("video {post_id} not found"),
            })?;

        Ok(VideoStatistics {
            views: video.view_count,
            likes: video.like_count,
            comments: video.comment_count,
            shares: video.share_count,
            ..VideoStatistics::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::PublishMetadata;
    use wiremock::matchers::{body_string_contains, header, header_regex, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> TikTokClient {
        let base = server.uri();
        TikTokClient::new(
            reqwest::Client::new(),
            &ProviderEndpoints {
                user_info: format!("{base}/v2/user/info/"),
                token_refresh: format!("{base}/v2/oauth/token/"),
                videos: Some(format!("{base}/v2/video/query/")),
                playlists: None,
                upload: Some(format!("{base}/v2/post/publish/video/upload/")),
                analytics: None,
            },
        )
    }

    #[tokio::test]
    async fn upload_sends_multipart_and_returns_video_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/post/publish/video/upload/"))
            .and(header("authorization", "Bearer tok"))
            .and(header_regex("content-type", "^multipart/form-data; boundary=----ReactShareBoundary"))
            .and(body_string_contains("name=\"title\"\r\n\r\nHello\r\n"))
            .and(body_string_contains("filename=\"take.mp4\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "video_id": "7311" },
                "error": { "code": "ok", "message": "" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("take.mp4");
        std::fs::write(&file, b"video-bytes").unwrap();
        let metadata = PublishMetadata {
            title: "Hello".to_string(),
            ..PublishMetadata::default()
        };

        let outcome = client(&server)
            .upload_video(
                "tok",
                UploadRequest {
                    file_path: &file,
                    file_name: "take.mp4",
                    content_type: "video/mp4",
                    metadata: &metadata,
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.post_id, "7311");
        assert_eq!(outcome.post_url, None);
    }

    #[tokio::test]
    async fn error_code_in_success_response_is_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/post/publish/video/upload/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": { "code": "spam_risk_too_many_posts", "message": "slow down" }
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("take.mp4");
        std::fs::write(&file, b"v").unwrap();
        let metadata = PublishMetadata::default();

        let err = client(&server)
            .upload_video(
                "tok",
                UploadRequest {
                    file_path: &file,
                    file_name: "take.mp4",
                    content_type: "video/mp4",
                    metadata: &metadata,
                },
            )
            .await
            .unwrap_err();

        match err {
            ProviderClientError::Rejected { body, .. } => {
                assert!(body.contains("spam_risk_too_many_posts"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn statistics_are_read_from_video_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/video/query/"))
            .and(query_param("fields", STAT_FIELDS))
            .and(body_string_contains("7311"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "videos": [{
                    "id": "7311", "view_count": 120, "like_count": 15,
                    "comment_count": 3, "share_count": 2
                }]},
                "error": { "code": "ok" }
            })))
            .mount(&server)
            .await;

        let stats = client(&server).fetch_statistics("tok", "7311").await.unwrap();
        assert_eq!(stats.views, 120);
        assert_eq!(stats.likes, 15);
        assert_eq!(stats.comments, 3);
        assert_eq!(stats.shares, 2);
        assert_eq!(stats.dislikes, 0);
    }

    #[tokio::test]
    async fn http_errors_keep_the_provider_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/video/query/"))
            .respond_with(ResponseTemplate::new(401).set_body_string("access_token_invalid"))
            .mount(&server)
            .await;

        let err = client(&server).fetch_statistics("tok", "1").await.unwrap_err();
        assert!(matches!(
            err,
            ProviderClientError::Http { status: 401, ref body, .. } if body == "access_token_invalid"
        ));
    }

    #[tokio::test]
    async fn rich_analytics_are_not_offered() {
        let server = MockServer::start().await;
        assert!(client(&server)
            .fetch_rich_analytics("tok", "1")
            .await
            .unwrap()
            .is_none());
    }
}
