mod test_utils;

use chrono::{Duration, Utc};
use reactshare::models::reaction::ReactionStatus;
use reactshare::models::social_account::AccountStatus;
use reactshare::models::social_share::ShareStatus;
use reactshare::providers::PublishMetadata;
use reactshare::publishing::{PublishError, PublishFailure, PublishOptions};
use reactshare::token_refresh::RefreshError;
use serde_json::json;
use test_utils::{FakeDownloader, build_app, seed_account, seed_reaction, seed_uploaded_reaction};
use uuid::Uuid;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const UPLOAD_PATH: &str = "/v2/post/publish/video/upload/";
const TOKEN_PATH: &str = "/v2/oauth/token/";

fn metadata() -> PublishMetadata {
    PublishMetadata {
        title: "Reacting to the classic".to_string(),
        description: Some("First watch".to_string()),
        ..PublishMetadata::default()
    }
}

fn tiktok_upload_ok(video_id: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "data": { "video_id": video_id },
        "error": { "code": "ok", "message": "" }
    }))
}

#[tokio::test]
async fn tiktok_publish_settles_share_as_published() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .and(header("authorization", "Bearer stored-access-token"))
        .and(body_string_contains("reaction-bytes"))
        .respond_with(tiktok_upload_ok("7311"))
        .expect(1)
        .mount(&server)
        .await;

    let app = build_app(Some(&server.uri()), FakeDownloader::failing("unused"))
        .await
        .unwrap();
    let owner = Uuid::new_v4();
    let account = seed_account(
        &app.state.db,
        owner,
        "tiktok",
        Some(Utc::now() + Duration::hours(2)),
        Some("refresh-1"),
    )
    .await
    .unwrap();
    let reaction = seed_uploaded_reaction(&app.state, owner, b"reaction-bytes")
        .await
        .unwrap();

    let share = app
        .state
        .publisher
        .publish(reaction.id, "tiktok", owner, metadata(), PublishOptions::default())
        .await
        .unwrap();

    assert_eq!(share.status, ShareStatus::Published);
    assert_eq!(share.provider, "tiktok");
    assert_eq!(share.provider_post_id.as_deref(), Some("7311"));
    assert_eq!(share.social_account_id, Some(account.id));
    assert!(share.published_at.is_some());

    let reaction = app
        .state
        .reactions
        .find_owned(owner, reaction.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reaction.status, ReactionStatus::Published);
    assert!(app.scratch_entries().is_empty());
}

#[tokio::test]
async fn rejected_refresh_fails_share_and_expires_account() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("client_key=tiktok-client"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .respond_with(tiktok_upload_ok("never"))
        .expect(0)
        .mount(&server)
        .await;

    let app = build_app(Some(&server.uri()), FakeDownloader::failing("unused"))
        .await
        .unwrap();
    let owner = Uuid::new_v4();
    let account = seed_account(
        &app.state.db,
        owner,
        "tiktok",
        Some(Utc::now() - Duration::hours(1)),
        Some("stale-refresh"),
    )
    .await
    .unwrap();
    let reaction = seed_uploaded_reaction(&app.state, owner, b"reaction-bytes")
        .await
        .unwrap();

    let err = app
        .state
        .publisher
        .publish(reaction.id, "tiktok", owner, metadata(), PublishOptions::default())
        .await
        .unwrap_err();

    let share = match err {
        PublishError::Failed { share, .. } => share,
        other => panic!("expected a failed attempt, got {other:?}"),
    };
    assert_eq!(share.status, ShareStatus::Failed);
    let recorded = share.metadata.as_ref().unwrap()["error"].as_str().unwrap();
    assert!(recorded.contains("invalid_grant"));

    let account = app
        .state
        .accounts
        .find_owned(owner, account.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.status, AccountStatus::TokenExpired);

    let reaction = app
        .state
        .reactions
        .find_owned(owner, reaction.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reaction.status, ReactionStatus::Uploaded);
    assert!(app.scratch_entries().is_empty());
}

#[tokio::test]
async fn expired_token_is_refreshed_before_upload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-access-token",
            "refresh_token": "refresh-2",
            "expires_in": 86400
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .and(header("authorization", "Bearer fresh-access-token"))
        .respond_with(tiktok_upload_ok("7312"))
        .expect(1)
        .mount(&server)
        .await;

    let app = build_app(Some(&server.uri()), FakeDownloader::failing("unused"))
        .await
        .unwrap();
    let owner = Uuid::new_v4();
    let account = seed_account(
        &app.state.db,
        owner,
        "tiktok",
        Some(Utc::now() + Duration::seconds(30)),
        Some("refresh-1"),
    )
    .await
    .unwrap();
    let reaction = seed_uploaded_reaction(&app.state, owner, b"reaction-bytes")
        .await
        .unwrap();

    let share = app
        .state
        .publisher
        .publish(reaction.id, "tiktok", owner, metadata(), PublishOptions::default())
        .await
        .unwrap();
    assert_eq!(share.provider_post_id.as_deref(), Some("7312"));

    let account = app
        .state
        .accounts
        .find_owned(owner, account.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.access_token, "fresh-access-token");
    assert_eq!(account.refresh_token.as_deref(), Some("refresh-2"));
    assert_eq!(account.status, AccountStatus::Active);
}

#[tokio::test]
async fn reaction_without_media_creates_no_share() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .respond_with(tiktok_upload_ok("never"))
        .expect(0)
        .mount(&server)
        .await;

    let app = build_app(Some(&server.uri()), FakeDownloader::failing("unused"))
        .await
        .unwrap();
    let owner = Uuid::new_v4();
    seed_account(&app.state.db, owner, "tiktok", None, None)
        .await
        .unwrap();
    let reaction = seed_reaction(&app.state, owner).await.unwrap();

    let err = app
        .state
        .publisher
        .publish(reaction.id, "tiktok", owner, metadata(), PublishOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::MediaNotReady));

    let shares = app.state.shares.list_for_owner(owner, None).await.unwrap();
    assert!(shares.is_empty());
}

#[tokio::test]
async fn scheduling_on_tiktok_is_rejected_before_any_share() {
    let app = build_app(None, FakeDownloader::failing("unused"))
        .await
        .unwrap();
    let owner = Uuid::new_v4();
    seed_account(&app.state.db, owner, "tiktok", None, None)
        .await
        .unwrap();
    let reaction = seed_uploaded_reaction(&app.state, owner, b"bytes")
        .await
        .unwrap();

    let err = app
        .state
        .publisher
        .publish(
            reaction.id,
            "tiktok",
            owner,
            metadata(),
            PublishOptions {
                scheduled_for: Some(Utc::now() + Duration::days(1)),
                ..PublishOptions::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::Unsupported { .. }));

    let shares = app.state.shares.list_for_owner(owner, None).await.unwrap();
    assert!(shares.is_empty());
}

#[tokio::test]
async fn missing_account_is_not_found() {
    let app = build_app(None, FakeDownloader::failing("unused"))
        .await
        .unwrap();
    let owner = Uuid::new_v4();
    let reaction = seed_uploaded_reaction(&app.state, owner, b"bytes")
        .await
        .unwrap();

    let err = app
        .state
        .publisher
        .publish(reaction.id, "youtube", owner, metadata(), PublishOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::AccountNotFound(_)));
}

#[tokio::test]
async fn out_of_range_token_lifetime_is_a_malformed_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-access-token",
            "expires_in": i64::MAX
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .respond_with(tiktok_upload_ok("never"))
        .expect(0)
        .mount(&server)
        .await;

    let app = build_app(Some(&server.uri()), FakeDownloader::failing("unused"))
        .await
        .unwrap();
    let owner = Uuid::new_v4();
    let account = seed_account(
        &app.state.db,
        owner,
        "tiktok",
        Some(Utc::now() - Duration::minutes(5)),
        Some("refresh-1"),
    )
    .await
    .unwrap();
    let reaction = seed_uploaded_reaction(&app.state, owner, b"reaction-bytes")
        .await
        .unwrap();

    let err = app
        .state
        .publisher
        .publish(reaction.id, "tiktok", owner, metadata(), PublishOptions::default())
        .await
        .unwrap_err();

    match err {
        PublishError::Failed { share, cause } => {
            assert_eq!(share.status, ShareStatus::Failed);
            assert!(matches!(
                cause,
                PublishFailure::TokenRefresh(RefreshError::Malformed(_))
            ));
        }
        other => panic!("expected a failed attempt, got {other:?}"),
    }

    let account = app
        .state
        .accounts
        .find_owned(owner, account.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.status, AccountStatus::Active);
    assert_eq!(account.access_token, "stored-access-token");
}

#[tokio::test]
async fn failed_attempt_does_not_undo_a_concurrent_publish() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/youtube/v3/videos"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_string("backend error")
                .set_delay(std::time::Duration::from_millis(500)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .respond_with(tiktok_upload_ok("7313"))
        .expect(1)
        .mount(&server)
        .await;

    let app = build_app(Some(&server.uri()), FakeDownloader::failing("unused"))
        .await
        .unwrap();
    let owner = Uuid::new_v4();
    for provider in ["youtube", "tiktok"] {
        seed_account(
            &app.state.db,
            owner,
            provider,
            Some(Utc::now() + Duration::hours(2)),
            None,
        )
        .await
        .unwrap();
    }
    let reaction = seed_uploaded_reaction(&app.state, owner, b"reaction-bytes")
        .await
        .unwrap();

    let publisher = &app.state.publisher;
    let slow = publisher.publish(
        reaction.id,
        "youtube",
        owner,
        metadata(),
        PublishOptions::default(),
    );
    let fast = async {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        publisher
            .publish(reaction.id, "tiktok", owner, metadata(), PublishOptions::default())
            .await
    };
    let (slow, fast) = tokio::join!(slow, fast);

    assert!(matches!(slow, Err(PublishError::Failed { .. })));
    assert_eq!(fast.unwrap().status, ShareStatus::Published);

    let reaction = app
        .state
        .reactions
        .find_owned(owner, reaction.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reaction.status, ReactionStatus::Published);
}
