//! HTTP API tests.
//!
//! Requests go through the full router (timeout and trace layers included)
//! with `tower::ServiceExt::oneshot`; no socket is opened.

use approval_engine::api::{self, CALLER_HEADER};
use approval_engine::db::{self, artifacts, pool::DbPool, users};
use approval_engine::models::ArtifactKind;
use approval_engine::services::email::LogTransport;
use approval_engine::services::engine::{ApprovalEngine, EngineOptions};
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

struct TestApp {
    _dir: TempDir,
    pool: DbPool,
    router: Router,
    project_id: i64,
}

async fn setup() -> TestApp {
    let dir = tempdir().unwrap();
    let pool = db::initialize(&dir.path().join("test.db")).await.unwrap();
    let project_id = artifacts::insert_project(&pool, "Apollo").await.unwrap();
    let engine = Arc::new(ApprovalEngine::new(
        pool.clone(),
        EngineOptions::default(),
        Arc::new(LogTransport),
    ));
    let router = api::router(engine, Duration::from_secs(10));

    TestApp {
        _dir: dir,
        pool,
        router,
        project_id,
    }
}

impl TestApp {
    async fn send(&self, method: Method, uri: &str, caller: Option<i64>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(caller) = caller {
            builder = builder.header(CALLER_HEADER, caller.to_string());
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn user(&self, name: &str) -> i64 {
        users::insert_user(&self.pool, Some(name), &format!("{}@example.test", name.to_lowercase()))
            .await
            .unwrap()
            .id
    }

    async fn artifact(&self, kind: ArtifactKind) -> i64 {
        artifacts::insert_artifact(&self.pool, self.project_id, kind, "Q3")
            .await
            .unwrap()
            .id
    }
}

#[tokio::test]
async fn test_missing_caller_is_unauthorized() {
    let app = setup().await;
    let artifact = app.artifact(ArtifactKind::Projection).await;

    let (status, body) = app
        .send(Method::GET, &format!("/api/artifacts/{}/votes", artifact), None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let mut request = Request::builder()
        .uri("/api/notifications")
        .body(Body::empty())
        .unwrap();
    request
        .headers_mut()
        .insert(CALLER_HEADER, "not-a-number".parse().unwrap());
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_round_vote_and_status_flow() {
    let app = setup().await;
    let lead = app.user("Lead").await;
    let ada = app.user("Ada").await;
    let bob = app.user("Bob").await;
    let artifact = app.artifact(ArtifactKind::Projection).await;

    let (status, round) = app
        .send(
            Method::POST,
            &format!("/api/artifacts/{}/rounds", artifact),
            Some(lead),
            Some(json!({ "reviewerIds": [ada, bob] })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(round["roundNumber"], 1);
    assert_eq!(round["delivery"]["succeeded"], 2);
    assert_eq!(round["votes"].as_array().unwrap().len(), 2);

    let ada_vote = round["votes"][0]["id"].as_i64().unwrap();

    // Bob may not touch Ada's vote.
    let (status, body) = app
        .send(
            Method::PATCH,
            &format!("/api/votes/{}", ada_vote),
            Some(bob),
            Some(json!({ "status": "approved" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, vote) = app
        .send(
            Method::PATCH,
            &format!("/api/votes/{}", ada_vote),
            Some(ada),
            Some(json!({ "status": "rejected", "comment": "numbers are off" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(vote["status"], "rejected");
    assert_eq!(vote["comment"], "numbers are off");
    assert!(vote["approvedAt"].is_null());
    assert!(vote["rejectedAt"].is_i64());

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/artifacts/{}/status", artifact),
            Some(lead),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "rejected");
    assert_eq!(body["artifactId"], artifact);

    let (status, votes) = app
        .send(
            Method::GET,
            &format!("/api/artifacts/{}/votes", artifact),
            Some(lead),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let votes = votes.as_array().unwrap();
    assert_eq!(votes.len(), 2);
    assert!(votes.iter().all(|v| v["reviewer"]["email"].is_string()));
}

#[tokio::test]
async fn test_decision_conflict_maps_to_409() {
    let app = setup().await;
    let ada = app.user("Ada").await;
    let artifact = app.artifact(ArtifactKind::Feature).await;
    let uri = format!("/api/artifacts/{}/decisions", artifact);

    let (status, body) = app
        .send(Method::POST, &uri, Some(ada), Some(json!({ "status": "approved" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["artifactStatus"], "approved");
    assert_eq!(body["vote"]["status"], "approved");

    let (status, body) = app
        .send(Method::POST, &uri, Some(ada), Some(json!({ "status": "rejected" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn test_bad_input_and_missing_resources() {
    let app = setup().await;
    let ada = app.user("Ada").await;
    let feature = app.artifact(ArtifactKind::Feature).await;
    let projection = app.artifact(ArtifactKind::Projection).await;

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/artifacts/{}/decisions", feature),
            Some(ada),
            Some(json!({ "status": "pending" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_ARGUMENT");

    let (status, _) = app
        .send(
            Method::POST,
            &format!("/api/artifacts/{}/rounds", projection),
            Some(ada),
            Some(json!({ "reviewerIds": [] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(Method::GET, "/api/artifacts/9999/status", Some(ada), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = app
        .send(
            Method::PATCH,
            "/api/votes/9999",
            Some(ada),
            Some(json!({ "status": "approved" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_bodies_and_paths_are_invalid_argument() {
    let app = setup().await;
    let ada = app.user("Ada").await;
    let feature = app.artifact(ArtifactKind::Feature).await;
    let projection = app.artifact(ArtifactKind::Projection).await;
    let decisions = format!("/api/artifacts/{}/decisions", feature);

    // Missing field.
    let (status, body) = app
        .send(Method::POST, &decisions, Some(ada), Some(json!({ "comment": "x" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_ARGUMENT");
    assert!(body["message"].as_str().unwrap().contains("status"));

    // Wrong type.
    let (status, body) = app
        .send(Method::POST, &decisions, Some(ada), Some(json!({ "status": 5 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_ARGUMENT");

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/artifacts/{}/rounds", projection),
            Some(ada),
            Some(json!({ "reviewerIds": "everyone" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_ARGUMENT");

    let (status, body) = app
        .send(
            Method::PATCH,
            "/api/votes/not-a-number",
            Some(ada),
            Some(json!({ "status": "approved" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_ARGUMENT");

    // Nothing was recorded.
    let (_, votes) = app
        .send(Method::GET, &format!("/api/artifacts/{}/votes", feature), Some(ada), None)
        .await;
    assert!(votes.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_notification_feed_and_mark_read() {
    let app = setup().await;
    let lead = app.user("Lead").await;
    let ada = app.user("Ada").await;
    let artifact = app.artifact(ArtifactKind::Projection).await;

    for _ in 0..2 {
        let (status, _) = app
            .send(
                Method::POST,
                &format!("/api/artifacts/{}/rounds", artifact),
                Some(lead),
                Some(json!({ "reviewerIds": [ada] })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, feed) = app.send(Method::GET, "/api/notifications", Some(ada), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(feed["unreadCount"], 2);
    let first = &feed["notifications"][0];
    assert_eq!(first["type"], "approval_request");
    assert_eq!(first["title"], "New Approval Request");
    assert_eq!(first["read"], false);
    let first_id = first["id"].as_i64().unwrap();

    let (status, body) = app
        .send(
            Method::PATCH,
            "/api/notifications",
            Some(ada),
            Some(json!({ "notificationId": first_id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 1);

    let (_, feed) = app.send(Method::GET, "/api/notifications", Some(ada), None).await;
    assert_eq!(feed["unreadCount"], 1);

    let (status, body) = app
        .send(
            Method::PATCH,
            "/api/notifications",
            Some(ada),
            Some(json!({ "markAllRead": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 1);

    let (status, _) = app
        .send(Method::PATCH, "/api/notifications", Some(ada), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
