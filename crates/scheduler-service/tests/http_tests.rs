//! HTTP API integration tests.
//!
//! Drives the full router with `oneshot` requests over in-memory storage,
//! using a static token map for identities. Covers:
//!
//! - status mapping for 400/401/403/404/409
//! - the meeting lifecycle from create to finalize
//! - paginated search responses
//! - `/health` and `/metrics`
//!
//! One test runs against a real listener with signed JWTs.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use metrics_exporter_prometheus::PrometheusBuilder;
use scheduler_service::identity::mock::StaticIdentityProvider;
use scheduler_service::models::{CreateUserRequest, Meeting, Position, User};
use scheduler_service::repositories::memory::InMemoryRepository;
use scheduler_service::routes::{build_routes, AppState, StorageBackend};
use scheduler_test_utils::{
    admin_ctx, at, identity, meeting_request, seed_users, test_config, TestSchedulerServer,
    TestTokenBuilder,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const ANN: &str = "ann-token";
const BEN: &str = "ben-token";
const CAL: &str = "cal-token";
const ADMIN: &str = "admin-token";

struct TestApp {
    router: Router,
    ann: User,
    ben: User,
    cal: User,
}

impl TestApp {
    async fn new() -> Self {
        let users = Arc::new(InMemoryRepository::<User>::new());
        let meetings = Arc::new(InMemoryRepository::<Meeting>::linked_to(Arc::clone(&users)));
        let [ann, ben, cal]: [User; 3] = seed_users(users.as_ref(), &["Ann", "Ben", "Cal"])
            .await
            .try_into()
            .expect("three users");

        let provider = StaticIdentityProvider::new()
            .with_token(ANN, identity(ann.id, "ann"))
            .with_token(BEN, identity(ben.id, "ben"))
            .with_token(CAL, identity(cal.id, "cal"))
            .with_token(ADMIN, admin_ctx().current().cloned().expect("admin identity"));

        let state = AppState::new(
            test_config(),
            meetings,
            users,
            Arc::new(provider),
            StorageBackend::Memory,
        );
        let metrics = PrometheusBuilder::new().build_recorder().handle();

        Self {
            router: build_routes(Arc::new(state), metrics),
            ann,
            ben,
            cal,
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// Creates a draft between `manager` and `employee` as `token`.
    async fn create_meeting(
        &self,
        token: &str,
        manager: &User,
        employee: &User,
        (start_hour, start_minute): (u32, u32),
        (end_hour, end_minute): (u32, u32),
    ) -> i64 {
        let request = meeting_request(
            manager.id,
            employee.id,
            at(start_hour, start_minute),
            at(end_hour, end_minute),
        );
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/meetings",
                Some(token),
                Some(serde_json::to_value(request).unwrap()),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap()
    }
}

fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}

#[tokio::test]
async fn test_health_reports_memory_storage() -> Result<()> {
    let app = TestApp::new().await;
    let (status, body) = app.send(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"], "memory");
    assert!(body.get("database").is_none());
    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_is_public() -> Result<()> {
    let app = TestApp::new().await;
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_missing_or_bad_credentials_are_unauthorized() -> Result<()> {
    let app = TestApp::new().await;
    let id = app
        .create_meeting(ANN, &app.ann, &app.ben, (9, 0), (10, 0))
        .await;
    let uri = format!("/api/v1/meetings/{id}");

    let (status, body) = app.send(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "UNAUTHENTICATED");

    let (status, _) = app.send(Method::GET, &uri, Some("nope"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(&uri)
                .header(header::AUTHORIZATION, "Basic YW5uOnB3")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    Ok(())
}

#[tokio::test]
async fn test_non_participant_is_forbidden() -> Result<()> {
    let app = TestApp::new().await;
    let id = app
        .create_meeting(ANN, &app.ann, &app.ben, (9, 0), (10, 0))
        .await;
    let uri = format!("/api/v1/meetings/{id}");

    let (status, body) = app.send(Method::GET, &uri, Some(CAL), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "ACCESS_DENIED");

    let (status, _) = app
        .send(Method::POST, &format!("{uri}/finalize"), Some(CAL), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Creating a meeting one does not take part in is also refused.
    let request = meeting_request(app.ann.id, app.ben.id, at(11, 0), at(12, 0));
    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/meetings",
            Some(CAL),
            Some(serde_json::to_value(request)?),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.send(Method::GET, &uri, Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_unknown_resources_are_not_found() -> Result<()> {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(Method::GET, "/api/v1/meetings/9999", Some(ANN), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NOT_FOUND");
    assert_eq!(body["error"]["message"], "Meeting not found.");

    let (status, _) = app
        .send(Method::POST, "/api/v1/meetings/9999/finalize", Some(ADMIN), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let request = meeting_request(app.ann.id, 9999, at(9, 0), at(10, 0));
    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/meetings",
            Some(ANN),
            Some(serde_json::to_value(request)?),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "User not found.");
    Ok(())
}

#[tokio::test]
async fn test_invalid_input_is_bad_request() -> Result<()> {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/meetings",
            Some(ANN),
            Some(json!({ "title": "missing fields" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "BAD_REQUEST");

    let request = meeting_request(app.ann.id, app.ben.id, at(10, 0), at(10, 0));
    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/meetings",
            Some(ANN),
            Some(serde_json::to_value(request)?),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["message"],
        "Meeting start date must be before end date."
    );
    Ok(())
}

#[tokio::test]
async fn test_unparseable_query_uses_error_envelope() -> Result<()> {
    let app = TestApp::new().await;

    for uri in [
        "/api/v1/meetings?start=garbage",
        "/api/v1/meetings?page=-1",
        "/api/v1/users?position=astronaut",
        "/api/v1/users?date_of_birth=yesterday",
    ] {
        let (status, body) = app.send(Method::GET, uri, Some(ANN), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(error_code(&body), "BAD_REQUEST", "{uri}");
        assert_eq!(body["error"]["message"], "Invalid query parameters", "{uri}");
    }
    Ok(())
}

#[tokio::test]
async fn test_meeting_lifecycle() -> Result<()> {
    let app = TestApp::new().await;
    let id = app
        .create_meeting(ANN, &app.ann, &app.ben, (9, 0), (10, 0))
        .await;
    let uri = format!("/api/v1/meetings/{id}");

    let (status, body) = app
        .send(
            Method::PUT,
            &uri,
            Some(BEN),
            Some(json!({ "title": "Quarterly review" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Quarterly review");
    assert_eq!(body["is_finalized"], false);

    let (status, body) = app
        .send(Method::POST, &format!("{uri}/finalize"), Some(ANN), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_finalized"], true);

    let (status, body) = app
        .send(Method::POST, &format!("{uri}/finalize"), Some(ANN), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["message"], "Meeting is already finalized.");

    let (status, _) = app
        .send(Method::PUT, &uri, Some(ANN), Some(json!({ "title": "x" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app.send(Method::DELETE, &uri, Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app.send(Method::GET, &uri, Some(BEN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Quarterly review");
    Ok(())
}

#[tokio::test]
async fn test_overlapping_finalize_conflicts() -> Result<()> {
    let app = TestApp::new().await;
    let first = app
        .create_meeting(ANN, &app.ann, &app.ben, (10, 0), (11, 0))
        .await;
    let second = app
        .create_meeting(CAL, &app.cal, &app.ben, (10, 30), (11, 30))
        .await;
    let unrelated = app
        .create_meeting(CAL, &app.cal, &app.ann, (11, 0), (12, 0))
        .await;

    let (status, _) = app
        .send(
            Method::POST,
            &format!("/api/v1/meetings/{first}/finalize"),
            Some(ANN),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/v1/meetings/{second}/finalize"),
            Some(CAL),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body["error"]["message"],
        "Another finalized meeting already exists in the selected time range."
    );

    // Touches the first meeting's end without overlapping it.
    let (status, _) = app
        .send(
            Method::POST,
            &format!("/api/v1/meetings/{unrelated}/finalize"),
            Some(CAL),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_delete_draft_meeting() -> Result<()> {
    let app = TestApp::new().await;
    let id = app
        .create_meeting(ANN, &app.ann, &app.ben, (9, 0), (10, 0))
        .await;
    let uri = format!("/api/v1/meetings/{id}");

    let (status, _) = app.send(Method::DELETE, &uri, Some(CAL), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.send(Method::DELETE, &uri, Some(BEN), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, _) = app.send(Method::GET, &uri, Some(BEN), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_search_pagination() -> Result<()> {
    let app = TestApp::new().await;
    for hour in 8..13 {
        app.create_meeting(ANN, &app.ann, &app.ben, (hour, 0), (hour, 30))
            .await;
    }
    app.create_meeting(CAL, &app.cal, &app.ben, (14, 0), (15, 0))
        .await;

    let (status, body) = app
        .send(Method::GET, "/api/v1/meetings?page=1&size=2", Some(ANN), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_elements"], 5);
    assert_eq!(body["page"], 1);
    assert_eq!(body["content"].as_array().map(Vec::len), Some(2));

    let (_, body) = app
        .send(Method::GET, "/api/v1/meetings?title=one-on", Some(BEN), None)
        .await;
    assert_eq!(body["total_elements"], 6);

    // Nothing visible is an empty page, not an error.
    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/v1/meetings?participant_id={}", app.cal.id),
            Some(ANN),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_elements"], 0);
    Ok(())
}

#[tokio::test]
async fn test_user_endpoints() -> Result<()> {
    let app = TestApp::new().await;
    let new_user = json!({
        "full_name": "Dee Park",
        "email": "dee@example.com",
        "position": "manager",
        "date_of_birth": "1985-07-01",
        "username": "dee"
    });

    let (status, body) = app
        .send(Method::POST, "/api/v1/users", Some(ADMIN), Some(new_user.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["full_name"], "Dee Park");
    assert!(body.get("username").is_none());
    let dee_id = body["id"].as_i64().unwrap();

    let (status, body) = app
        .send(Method::POST, "/api/v1/users", Some(ADMIN), Some(new_user))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["message"], "A user with this email already exists.");

    let (status, _) = app
        .send(Method::GET, &format!("/api/v1/users/{dee_id}"), Some(ANN), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/api/v1/users/{}", app.ann.id),
            Some(ANN),
            Some(json!({ "email": "ben@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (status, body) = app
        .send(Method::GET, "/api/v1/users?position=manager", Some(ADMIN), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_elements"], 1);

    let (status, _) = app
        .send(Method::DELETE, &format!("/api/v1/users/{dee_id}"), Some(ADMIN), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    Ok(())
}

#[tokio::test]
async fn test_signed_tokens_against_live_server() -> Result<()> {
    let server = TestSchedulerServer::spawn_in_memory().await?;
    let users = &server.state().users;

    let mut seeded = Vec::new();
    for (name, account) in [("Mia Lund", "mia"), ("Eli Roth", "eli")] {
        let request = CreateUserRequest {
            full_name: name.to_string(),
            email: format!("{account}@example.com"),
            position: Position::Employee,
            date_of_birth: chrono::NaiveDate::from_ymd_opt(1992, 3, 4).unwrap(),
            username: Some(account.to_string()),
        };
        seeded.push(users.create(&admin_ctx(), request).await?);
    }
    let [mia, eli]: [User; 2] = seeded.try_into().unwrap();

    let client = reqwest::Client::new();
    let mia_token = TestTokenBuilder::new().for_user(mia.id, "mia").sign();

    let response = client
        .post(format!("{}/api/v1/meetings", server.url()))
        .bearer_auth(&mia_token)
        .json(&meeting_request(mia.id, eli.id, at(9, 0), at(10, 0)))
        .send()
        .await?;
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);
    let created: Value = response.json().await?;
    let id = created["id"].as_i64().unwrap();

    let response = client
        .post(format!("{}/api/v1/meetings/{id}/finalize", server.url()))
        .bearer_auth(&mia_token)
        .send()
        .await?;
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let expired = TestTokenBuilder::new()
        .for_user(eli.id, "eli")
        .expires_in(-3600)
        .sign();
    let response = client
        .get(format!("{}/api/v1/meetings/{id}", server.url()))
        .bearer_auth(expired)
        .send()
        .await?;
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);

    let forged = TestTokenBuilder::new()
        .for_user(eli.id, "eli")
        .with_role("admin")
        .signed_with("some-other-secret-that-is-long-enough")
        .sign();
    let response = client
        .get(format!("{}/api/v1/meetings/{id}", server.url()))
        .bearer_auth(forged)
        .send()
        .await?;
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);

    let response = client.get(format!("{}/health", server.url())).send().await?;
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    Ok(())
}
