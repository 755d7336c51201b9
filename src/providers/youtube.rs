//! YouTube Data and Analytics API client.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Deserializer};
use serde_json::{Value, json};

use super::registry::ProviderEndpoints;
use super::{
    ProviderClient, ProviderClientError, ProviderId, RichAnalytics, UploadOutcome, UploadRequest,
    VideoStatistics, error_body,
};

const REPORT_START_DATE: &str = "2005-01-01";
const SUMMARY_METRICS: &str =
    "views,estimatedMinutesWatched,averageViewDuration,averageViewPercentage,shares";

pub struct YouTubeClient {
    http: reqwest::Client,
    upload_url: Option<String>,
    videos_url: Option<String>,
    reports_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoResource {
    id: String,
}

#[derive(Debug, Deserialize)]
struct VideoList {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    #[serde(default)]
    statistics: Statistics,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    #[serde(default, deserialize_with = "count")]
    view_count: u64,
    #[serde(default, deserialize_with = "count")]
    like_count: u64,
    #[serde(default, deserialize_with = "count")]
    dislike_count: u64,
    #[serde(default, deserialize_with = "count")]
    favorite_count: u64,
    #[serde(default, deserialize_with = "count")]
    comment_count: u64,
}

/// YouTube reports counters as decimal strings.
fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    use serde::de::Error;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(0),
        Some(Value::String(s)) => s.parse().map_err(D::Error::custom),
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| D::Error::custom("count is not a non-negative integer")),
        Some(other) => Err(D::Error::custom(format!("unexpected count value {other}"))),
    }
}

/// Tabular Analytics API response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    #[serde(default)]
    column_headers: Vec<ColumnHeader>,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct ColumnHeader {
    name: String,
}

impl Report {
    fn column(&self, name: &str) -> Option<usize> {
        self.column_headers.iter().position(|c| c.name == name)
    }

    fn number(&self, row: &[Value], name: &str) -> Option<f64> {
        row.get(self.column(name)?)?.as_f64()
    }

    fn text<'a>(&self, row: &'a [Value], name: &str) -> Option<&'a str> {
        row.get(self.column(name)?)?.as_str()
    }
}

impl YouTubeClient {
    pub fn new(http: reqwest::Client, endpoints: &ProviderEndpoints) -> Self {
        Self {
            http,
            upload_url: endpoints.upload.clone(),
            videos_url: endpoints.videos.clone(),
            reports_url: endpoints.analytics.clone(),
        }
    }

    fn endpoint<'a>(
        url: &'a Option<String>,
        endpoint: &'static str,
    ) -> Result<&'a str, ProviderClientError> {
        url.as_deref().ok_or(ProviderClientError::MissingEndpoint {
            provider: ProviderId::YouTube,
            endpoint,
        })
    }

    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ProviderClientError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(ProviderClientError::Http {
                provider: ProviderId::YouTube,
                status: response.status().as_u16(),
                body: error_body(response).await,
            })
        }
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ProviderClientError> {
        let text = Self::ensure_success(response).await?.text().await?;
        serde_json::from_str(&text).map_err(|e| ProviderClientError::Malformed {
            provider: ProviderId::YouTube,
            details: e.to_string(),
        })
    }

    async fn report(
        &self,
        access_token: &str,
        post_id: &str,
        metrics: &str,
        dimensions: Option<&str>,
    ) -> Result<Report, ProviderClientError> {
        let url = Self::endpoint(&self.reports_url, "analytics")?;
        let end_date = Utc::now().format("%Y-%m-%d").to_string();
        let filters = format!("video=={post_id}");

        let mut query = vec![
            ("ids", "channel==MINE"),
            ("startDate", REPORT_START_DATE),
            ("endDate", end_date.as_str()),
            ("metrics", metrics),
            ("filters", filters.as_str()),
        ];
        if let Some(dimensions) = dimensions {
            query.push(("dimensions", dimensions));
        }

        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .query(&query)
            .send()
            .await?;
        Self::parse(response).await
    }
}

#[async_trait]
impl ProviderClient for YouTubeClient {
    fn provider(&self) -> ProviderId {
        ProviderId::YouTube
    }

    /// Resumable upload: open a session with the snippet, then PUT the bytes
    /// to the session URL returned in `Location`.
    async fn upload_video(
        &self,
        access_token: &str,
        request: UploadRequest<'_>,
    ) -> Result<UploadOutcome, ProviderClientError> {
        let url = Self::endpoint(&self.upload_url, "upload")?;
        let video = tokio::fs::read(request.file_path).await?;
        let metadata = request.metadata;

        // Scheduled videos must stay private until `publishAt`.
        let status = match metadata.publish_at {
            Some(at) => json!({
                "privacyStatus": "private",
                "publishAt": at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            }),
            None => json!({
                "privacyStatus": metadata.privacy.as_deref().unwrap_or("private"),
            }),
        };
        let resource = json!({
            "snippet": {
                "title": metadata.title,
                "description": metadata.description.clone().unwrap_or_default(),
                "tags": metadata.tags,
            },
            "status": status,
        });

        let session = self
            .http
            .post(url)
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(access_token)
            .header("X-Upload-Content-Type", request.content_type)
            .header("X-Upload-Content-Length", video.len().to_string())
            .json(&resource)
            .send()
            .await?;
        let session = Self::ensure_success(session).await?;

        let location = session
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ProviderClientError::Malformed {
                provider: ProviderId::YouTube,
                details: "resumable session has no Location header".to_string(),
            })?;

        tracing::debug!(size_bytes = video.len(), "Uploading video to YouTube session");

        let response = self
            .http
            .put(&location)
            .bearer_auth(access_token)
            .header(reqwest::header::CONTENT_TYPE, request.content_type)
            .body(video)
            .send()
            .await?;
        let created: VideoResource = Self::parse(response).await?;

        Ok(UploadOutcome {
            post_url: Some(format!("https://www.youtube.com/watch?v={}", created.id)),
            post_id: created.id,
        })
    }

    async fn fetch_statistics(
        &self,
        access_token: &str,
        post_id: &str,
    ) -> Result<VideoStatistics, ProviderClientError> {
        let url = Self::endpoint(&self.videos_url, "videos")?;
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .query(&[("part", "statistics"), ("id", post_id)])
            .send()
            .await?;

        let list: VideoList = Self::parse(response).await?;
        let stats = list
            .items
            .into_iter()
            .next()
            .ok_or_else(|| ProviderClientError::Malformed {
                provider: ProviderId::YouTube,
                details: format!("video {post_id} not found"),
            })?
            .statistics;

        Ok(VideoStatistics {
            views: stats.view_count,
            likes: stats.like_count,
            dislikes: stats.dislike_count,
            comments: stats.comment_count,
            favorites: stats.favorite_count,
            shares: 0,
        })
    }

    /// Summary report plus best-effort demographic and geography breakdowns.
    async fn fetch_rich_analytics(
        &self,
        access_token: &str,
        post_id: &str,
    ) -> Result<Option<RichAnalytics>, ProviderClientError> {
        let summary = self
            .report(access_token, post_id, SUMMARY_METRICS, None)
            .await?;

        let mut analytics = RichAnalytics::default();
        if let Some(row) = summary.rows.first() {
            analytics.minutes_watched = summary
                .number(row, "estimatedMinutesWatched")
                .unwrap_or_default();
            analytics.average_view_duration = summary
                .number(row, "averageViewDuration")
                .unwrap_or_default();
            analytics.average_view_percentage = summary
                .number(row, "averageViewPercentage")
                .unwrap_or_default();
            analytics.shares = summary.number(row, "shares").map(|v| v as u64);
        }

        match self
            .report(access_token, post_id, "viewerPercentage", Some("ageGroup,gender"))
            .await
        {
            Ok(report) => {
                let mut age_groups = BTreeMap::new();
                let mut gender = BTreeMap::new();
                for row in &report.rows {
                    let Some(pct) = report.number(row, "viewerPercentage") else {
                        continue;
                    };
                    if let Some(age) = report.text(row, "ageGroup") {
                        *age_groups.entry(age.to_string()).or_insert(0.0) += pct;
                    }
                    if let Some(g) = report.text(row, "gender") {
                        *gender.entry(g.to_string()).or_insert(0.0) += pct;
                    }
                }
                analytics.age_groups = age_groups;
                analytics.gender = gender;
            }
            Err(err) => {
                tracing::warn!(error = %err, "YouTube demographics report unavailable");
            }
        }

        match self
            .report(access_token, post_id, "views", Some("country"))
            .await
        {
            Ok(report) => {
                analytics.countries = report
                    .rows
                    .iter()
                    .filter_map(|row| {
                        let country = report.text(row, "country")?;
                        let views = report.number(row, "views")?;
                        Some((country.to_string(), views as u64))
                    })
                    .collect();
            }
            Err(err) => {
                tracing::warn!(error = %err, "YouTube geography report unavailable");
            }
        }

        Ok(Some(analytics))
    }
}
