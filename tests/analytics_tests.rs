mod test_utils;

use chrono::Utc;
use reactshare::analytics::{AnalyticsError, AnalyticsTarget};
use reactshare::models::social_share;
use reactshare::repositories::social_share::NewShare;
use serde_json::json;
use test_utils::{FakeDownloader, TestApp, build_app, seed_account, seed_uploaded_reaction};
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn published_share(
    app: &TestApp,
    owner: Uuid,
    provider: &str,
    post_id: &str,
) -> social_share::Model {
    let account = seed_account(&app.state.db, owner, provider, None, None)
        .await
        .unwrap();
    let reaction = seed_uploaded_reaction(&app.state, owner, b"bytes")
        .await
        .unwrap();
    let share = app
        .state
        .shares
        .create_pending(
            owner,
            NewShare {
                reaction_id: reaction.id,
                provider: provider.to_string(),
                social_account_id: Some(account.id),
                metadata: json!({ "title": "My reaction" }),
                scheduled_for: None,
            },
        )
        .await
        .unwrap();
    app.state
        .shares
        .mark_published(
            share.id,
            post_id.to_string(),
            None,
            Utc::now().fixed_offset(),
        )
        .await
        .unwrap()
}

async fn mount_youtube_statistics(server: &MockServer, post_id: &str) {
    Mock::given(method("GET"))
        .and(path("/youtube/v3/videos"))
        .and(query_param("part", "statistics"))
        .and(query_param("id", post_id))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "statistics": {
                "viewCount": "1500", "likeCount": "120",
                "favoriteCount": "3", "commentCount": "14"
            }}]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn malformed_rich_analytics_fall_back_to_basic_statistics() {
    let server = MockServer::start().await;
    mount_youtube_statistics(&server, "vid1").await;
    Mock::given(method("GET"))
        .and(path("/v2/reports"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&server)
        .await;

    let app = build_app(Some(&server.uri()), FakeDownloader::failing("unused"))
        .await
        .unwrap();
    let owner = Uuid::new_v4();
    let share = published_share(&app, owner, "youtube", "vid1").await;

    let analytics = app
        .state
        .analytics
        .fetch(AnalyticsTarget::Share(share.id), owner)
        .await
        .unwrap();

    assert_eq!(analytics.views, 1500);
    assert_eq!(analytics.likes, 120);
    assert_eq!(analytics.comments, 14);
    assert_eq!(analytics.favorites, 3);
    assert_eq!(analytics.watch_time.minutes, 0);
    assert!(analytics.demographics.age_groups.is_empty());

    let stored = app
        .state
        .shares
        .find_owned(owner, share.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.analytics.unwrap()["views"], json!(1500));
    assert!(stored.last_analytics_sync_at.is_some());
}

#[tokio::test]
async fn statistics_failure_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/youtube/v3/videos"))
        .respond_with(ResponseTemplate::new(403).set_body_string("quotaExceeded"))
        .mount(&server)
        .await;

    let app = build_app(Some(&server.uri()), FakeDownloader::failing("unused"))
        .await
        .unwrap();
    let owner = Uuid::new_v4();
    let share = published_share(&app, owner, "youtube", "vid1").await;

    let err = app
        .state
        .analytics
        .fetch(AnalyticsTarget::Share(share.id), owner)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalyticsError::Provider(_)));

    let stored = app
        .state
        .shares
        .find_owned(owner, share.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.analytics.is_none());
}

#[tokio::test]
async fn tiktok_post_lookup_does_not_need_a_share() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/video/query/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "videos": [{
                "id": "7311", "view_count": 120, "like_count": 15,
                "comment_count": 3, "share_count": 2
            }]},
            "error": { "code": "ok", "message": "" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = build_app(Some(&server.uri()), FakeDownloader::failing("unused"))
        .await
        .unwrap();
    let owner = Uuid::new_v4();
    seed_account(&app.state.db, owner, "tiktok", None, None)
        .await
        .unwrap();

    let analytics = app
        .state
        .analytics
        .fetch(
            AnalyticsTarget::ProviderPost {
                provider: "tiktok".to_string(),
                post_id: "7311".to_string(),
            },
            owner,
        )
        .await
        .unwrap();

    assert_eq!(analytics.views, 120);
    assert_eq!(analytics.shares, 2);
    assert_eq!(analytics.average_view_duration, 0.0);
}

#[tokio::test]
async fn other_users_shares_are_not_found() {
    let app = build_app(None, FakeDownloader::failing("unused"))
        .await
        .unwrap();
    let owner = Uuid::new_v4();
    let share = published_share(&app, owner, "youtube", "vid1").await;

    let err = app
        .state
        .analytics
        .fetch(AnalyticsTarget::Share(share.id), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AnalyticsError::ShareNotFound));
}

#[tokio::test]
async fn provider_post_lookup_matches_shares_case_insensitively() {
    let server = MockServer::start().await;
    mount_youtube_statistics(&server, "vid7").await;
    Mock::given(method("GET"))
        .and(path("/v2/reports"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let app = build_app(Some(&server.uri()), FakeDownloader::failing("unused"))
        .await
        .unwrap();
    let owner = Uuid::new_v4();
    let share = published_share(&app, owner, "youtube", "vid7").await;
    let other = seed_account(&app.state.db, owner, "youtube", None, None)
        .await
        .unwrap();
    let other_sync = app
        .state
        .accounts
        .find_owned(owner, other.id)
        .await
        .unwrap()
        .unwrap()
        .last_sync_at;
    let share_account_id = share.social_account_id.unwrap();
    let seeded_sync = app
        .state
        .accounts
        .find_owned(owner, share_account_id)
        .await
        .unwrap()
        .unwrap()
        .last_sync_at;

    let analytics = app
        .state
        .analytics
        .fetch(
            AnalyticsTarget::ProviderPost {
                provider: "YouTube".to_string(),
                post_id: "vid7".to_string(),
            },
            owner,
        )
        .await
        .unwrap();
    assert_eq!(analytics.views, 1500);

    let share_account = app
        .state
        .accounts
        .find_owned(owner, share_account_id)
        .await
        .unwrap()
        .unwrap();
    assert!(share_account.last_sync_at > seeded_sync);
    let untouched = app
        .state
        .accounts
        .find_owned(owner, other.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(untouched.last_sync_at, other_sync);
}
