//! End-to-end HTTP tests through the full router
//!
//! Tests cover:
//! - Register and login response shapes
//! - Uniform 401 bodies for every kind of bad token
//! - Logout revokes; refresh rotates and accepts expired tokens in window
//! - Validation errors as 422 with per-field messages
//! - Route policy: public, bearer and unlisted routes
//! - Blocklist outages surface as 503, not 401

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tower::ServiceExt;
use warden_auth::clock::ManualClock;
use warden_auth::{
    Algorithm, AuthError, AuthGateway, AuthResult, Blocklist, KeyRing, KeySet,
    MemoryUserDirectory, SigningKey, TokenAuthority, TokenPolicy,
};
use warden_server::{AppState, router};

const SECRET: &[u8] = b"http-test-secret-0123456789abcdef0123";

struct TestApp {
    app: Router,
    clock: ManualClock,
}

#[derive(Debug)]
struct UnreachableBlocklist;

#[async_trait]
impl Blocklist for UnreachableBlocklist {
    async fn contains(&self, _token_id: &str) -> AuthResult<bool> {
        Err(AuthError::Blocklist("connection refused".to_string()))
    }

    async fn insert_if_absent(&self, _token_id: &str, _ttl: Duration) -> AuthResult<bool> {
        Err(AuthError::Blocklist("connection refused".to_string()))
    }

    async fn purge_expired(&self) -> AuthResult<usize> {
        Err(AuthError::Blocklist("connection refused".to_string()))
    }
}

fn test_app() -> TestApp {
    build_app(None)
}

fn build_app(blocklist: Option<Arc<dyn Blocklist>>) -> TestApp {
    let clock = ManualClock::at_unix(1_000);
    let key = SigningKey::hmac("k1", Algorithm::HS256, SECRET).unwrap();
    let ring = Arc::new(KeyRing::new(KeySet::new(vec![key]).unwrap()));
    let mut builder = TokenAuthority::builder()
        .keys(ring)
        .policy(TokenPolicy::default())
        .clock(Arc::new(clock.clone()));
    if let Some(blocklist) = blocklist {
        builder = builder.blocklist(blocklist);
    }
    let authority = builder.build().unwrap();
    let directory = Arc::new(MemoryUserDirectory::for_tests().unwrap());
    let gateway = AuthGateway::new(authority, directory.clone(), directory);

    TestApp {
        app: router(AppState::new(gateway), 64 * 1024),
        clock,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn with_token(&self, method: &str, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    async fn register(&self, email: &str) -> String {
        let (status, body) = self
            .post_json(
                "/api/auth/register",
                json!({"name": "Ann Example", "email": email, "password": "secret1"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["authorisation"]["token"].as_str().unwrap().to_string()
    }
}

fn unauthorized() -> Value {
    json!({"status": "error", "message": "Unauthorized"})
}

#[tokio::test]
async fn test_register_response_shape() {
    let app = test_app();
    let (status, body) = app
        .post_json(
            "/api/auth/register",
            json!({"name": "Ann Example", "email": "ann@example.com", "password": "secret1"}),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "User created successfully");
    assert_eq!(body["user"]["email"], "ann@example.com");
    assert_eq!(body["user"]["name"], "Ann Example");
    assert!(body["user"].get("password").is_none());
    assert_eq!(body["authorisation"]["type"], "bearer");
    assert_eq!(body["authorisation"]["expires_in"], 3600);
    assert_eq!(
        body["authorisation"]["token"].as_str().unwrap().split('.').count(),
        3
    );
}

#[tokio::test]
async fn test_login_success_and_failure() {
    let app = test_app();
    app.register("ann@example.com").await;

    let (status, body) = app
        .post_json(
            "/api/auth/login",
            json!({"email": "ann@example.com", "password": "secret1"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert!(body.get("message").is_none());
    assert_eq!(body["user"]["email"], "ann@example.com");

    let (status, wrong) = app
        .post_json(
            "/api/auth/login",
            json!({"email": "ann@example.com", "password": "nope-nope"}),
        )
        .await;
    let (_, unknown) = app
        .post_json(
            "/api/auth/login",
            json!({"email": "who@example.com", "password": "secret1"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong, unauthorized());
    assert_eq!(unknown, unauthorized());
}

#[tokio::test]
async fn test_validation_errors_are_422() {
    let app = test_app();
    let (status, body) = app
        .post_json(
            "/api/auth/register",
            json!({"name": "", "email": "not-an-email", "password": "123"}),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], "error");
    assert_eq!(body["errors"]["name"][0], "The name field is required.");
    assert_eq!(
        body["errors"]["email"][0],
        "The email field must be a valid email address."
    );
    assert_eq!(
        body["errors"]["password"][0],
        "The password field must be at least 6 characters."
    );
}

#[tokio::test]
async fn test_malformed_body_is_400() {
    let app = test_app();
    let (status, body) = app
        .send(
            Request::post("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let app = test_app();
    let token = app.register("ann@example.com").await;

    let (status, body) = app.with_token("POST", "/api/auth/logout", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status": "success", "message": "Successfully logged out"})
    );

    let (status, body) = app.with_token("POST", "/api/auth/logout", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, unauthorized());

    let (status, _) = app.with_token("GET", "/api/auth/me", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_rotates_and_accepts_expired_in_window() {
    let app = test_app();
    let token = app.register("ann@example.com").await;

    // past ttl, inside the refresh window
    app.clock.set_unix(1_000 + 3_700);
    let (status, _) = app.with_token("GET", "/api/auth/me", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.with_token("POST", "/api/auth/refresh", &token).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["user"]["email"], "ann@example.com");
    let fresh = body["authorisation"]["token"].as_str().unwrap().to_string();
    assert_ne!(fresh, token);

    let (status, body) = app.with_token("POST", "/api/auth/refresh", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, unauthorized());

    let (status, body) = app.with_token("GET", "/api/auth/me", &fresh).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "ann@example.com");
}

#[tokio::test]
async fn test_refresh_past_window_is_unauthorized() {
    let app = test_app();
    let token = app.register("ann@example.com").await;

    app.clock.set_unix(1_000 + 7_201);
    let (status, body) = app.with_token("POST", "/api/auth/refresh", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, unauthorized());
}

#[tokio::test]
async fn test_bad_tokens_get_identical_responses() {
    let app = test_app();
    let token = app.register("ann@example.com").await;

    let mut tampered = token.clone();
    tampered.pop();
    tampered.push(if token.ends_with('A') { 'B' } else { 'A' });

    for bad in ["garbage", "a.b.c", tampered.as_str()] {
        let (status, body) = app.with_token("POST", "/api/auth/logout", bad).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{bad}");
        assert_eq!(body, unauthorized());
    }

    let (status, body) = app
        .send(
            Request::post("/api/auth/logout")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, unauthorized());
}

#[tokio::test]
async fn test_unauthorized_carries_bearer_challenge() {
    let app = test_app();
    let response = app
        .app
        .clone()
        .oneshot(
            Request::post("/api/auth/refresh")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
        "Bearer"
    );
}

#[tokio::test]
async fn test_route_policy() {
    let app = test_app();

    let (status, body) = app
        .send(Request::get("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));

    // unlisted routes need a token before they can 404
    let (status, _) = app
        .send(Request::get("/api/unknown").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = app.register("ann@example.com").await;
    let (status, body) = app.with_token("GET", "/api/unknown", &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"status": "error", "message": "Not found"}));
}

#[tokio::test]
async fn test_blocklist_outage_is_503() {
    let app = build_app(Some(Arc::new(UnreachableBlocklist)));
    let token = app.register("ann@example.com").await;
    let unavailable = json!({"status": "error", "message": "Service unavailable"});

    let (status, body) = app.with_token("POST", "/api/auth/logout", &token).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, unavailable);

    let (status, body) = app.with_token("GET", "/api/auth/me", &token).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, unavailable);

    let (status, _) = app.with_token("POST", "/api/auth/refresh", &token).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
