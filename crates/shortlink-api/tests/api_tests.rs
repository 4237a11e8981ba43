//! API Integration Tests
//!
//! Every test runs the full router against in-memory user and session
//! backends.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use shortlink_api::create_router;
use shortlink_api::testing::{test_context, TestContext};
use shortlink_core::UserRepository;
use tower::ServiceExt;

const PASSWORD: &str = "1wE$Rty2";

/// Helper to create a test request
fn create_json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn authorized(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let mut request = create_json_request(method, uri, body);
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {token}").parse().unwrap(),
    );
    request
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn app(ctx: &TestContext) -> Router {
    create_router(ctx.state.clone())
}

async fn sign_up(app: &Router, username: &str, email: &str) -> Response {
    send(
        app,
        create_json_request(
            "POST",
            "/api/v1/auth/sign-up",
            Some(json!({ "username": username, "email": email, "password": PASSWORD })),
        ),
    )
    .await
}

/// Sign in and return `(accessToken, refreshToken)`
async fn sign_in(app: &Router, login: &str) -> (String, String) {
    let response = send(
        app,
        create_json_request(
            "POST",
            "/api/v1/auth/sign-in",
            Some(json!({ "login": login, "password": PASSWORD })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    (
        json["accessToken"].as_str().unwrap().to_string(),
        json["refreshToken"].as_str().unwrap().to_string(),
    )
}

// =============================================================================
// Health Check
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let ctx = test_context();
    let response = send(
        &app(&ctx),
        Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-store"
    );

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

// =============================================================================
// Sign-up
// =============================================================================

#[tokio::test]
async fn test_sign_up_returns_created_user() {
    let ctx = test_context();
    let app = app(&ctx);

    let response = sign_up(&app, "kenplix", "kenplix@example.com").await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["username"], "kenplix");
    assert_eq!(json["email"], "kenplix@example.com");
    assert!(json["id"].is_string());
    assert!(json["createdAt"].is_string());
    assert!(json.get("passwordHash").is_none());
}

#[tokio::test]
async fn test_sign_up_duplicate_email() {
    let ctx = test_context();
    let app = app(&ctx);

    assert_eq!(
        sign_up(&app, "kenplix", "kenplix@example.com").await.status(),
        StatusCode::CREATED
    );

    let response = sign_up(&app, "another", "kenplix@example.com").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let json = body_json(response).await;
    assert_eq!(json[0]["code"], "ALREADY_EXISTS");
    assert_eq!(json[0]["field"], "email");
}

#[tokio::test]
async fn test_sign_up_duplicate_username() {
    let ctx = test_context();
    let app = app(&ctx);

    sign_up(&app, "kenplix", "kenplix@example.com").await;
    let response = sign_up(&app, "kenplix", "other@example.com").await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json[0]["code"], "ALREADY_EXISTS");
    assert_eq!(json[0]["field"], "username");
}

#[tokio::test]
async fn test_sign_up_field_errors() {
    let ctx = test_context();
    let response = send(
        &app(&ctx),
        create_json_request(
            "POST",
            "/api/v1/auth/sign-up",
            Some(json!({ "username": "kenplix", "email": "not-an-email", "password": "" })),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    let errors = json.as_array().unwrap();
    assert_eq!(errors.len(), 2);

    assert_eq!(errors[0]["field"], "email");
    assert_eq!(errors[0]["code"], "INVALID_FIELD");
    assert_eq!(errors[1]["field"], "password");
    assert_eq!(errors[1]["code"], "MISSING_FIELD");
}

#[tokio::test]
async fn test_malformed_json_is_parsing_error() {
    let ctx = test_context();
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/sign-up")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"username\": "))
        .unwrap();

    let response = send(&app(&ctx), request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await[0]["code"], "PARSING_ERROR");
}

#[tokio::test]
async fn test_wrong_field_type_is_invalid_schema() {
    let ctx = test_context();
    let response = send(
        &app(&ctx),
        create_json_request(
            "POST",
            "/api/v1/auth/sign-in",
            Some(json!({ "login": 42, "password": PASSWORD })),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await[0]["code"], "INVALID_SCHEMA");
}

// =============================================================================
// Sign-in / sign-out
// =============================================================================

#[tokio::test]
async fn test_sign_in_by_username_or_email() {
    let ctx = test_context();
    let app = app(&ctx);
    sign_up(&app, "kenplix", "kenplix@example.com").await;

    let (access, refresh) = sign_in(&app, "kenplix").await;
    assert!(!access.is_empty());
    assert_ne!(access, refresh);

    sign_in(&app, "kenplix@example.com").await;
}

#[tokio::test]
async fn test_sign_in_wrong_credentials() {
    let ctx = test_context();
    let app = app(&ctx);
    sign_up(&app, "kenplix", "kenplix@example.com").await;

    for (login, password) in [("kenplix", "Wrong$Pass1"), ("nobody", PASSWORD)] {
        let response = send(
            &app,
            create_json_request(
                "POST",
                "/api/v1/auth/sign-in",
                Some(json!({ "login": login, "password": password })),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json[0]["code"], "INCORRECT_CREDENTIALS");
        assert!(json[0].get("field").is_none());
    }
}

#[tokio::test]
async fn test_me_and_sign_out() {
    let ctx = test_context();
    let app = app(&ctx);
    sign_up(&app, "kenplix", "kenplix@example.com").await;
    let (access, _) = sign_in(&app, "kenplix").await;

    let response = send(&app, authorized("GET", "/api/v1/users/me", &access, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["username"], "kenplix");

    let response = send(
        &app,
        authorized("POST", "/api/v1/auth/sign-out", &access, None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&app, authorized("GET", "/api/v1/users/me", &access, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await[0]["code"], "UNAUTHORIZED_ACCESS");
}

#[tokio::test]
async fn test_protected_route_without_token() {
    let ctx = test_context();
    let response = send(
        &app(&ctx),
        create_json_request("GET", "/api/v1/users/me", None),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Refresh
// =============================================================================

#[tokio::test]
async fn test_refresh_rotates_tokens() {
    let ctx = test_context();
    let app = app(&ctx);
    sign_up(&app, "kenplix", "kenplix@example.com").await;
    let (old_access, old_refresh) = sign_in(&app, "kenplix").await;

    let response = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/refresh",
            Some(json!({ "refreshToken": old_refresh })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let new_access = json["accessToken"].as_str().unwrap().to_string();

    // The old pair is dead, the new one works
    let response = send(
        &app,
        authorized("GET", "/api/v1/users/me", &old_access, None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(
        &app,
        authorized("GET", "/api/v1/users/me", &new_access, None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Reusing the spent refresh token is rejected
    let response = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/refresh",
            Some(json!({ "refreshToken": old_refresh })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_with_garbage_token() {
    let ctx = test_context();
    let response = send(
        &app(&ctx),
        create_json_request(
            "POST",
            "/api/v1/auth/refresh",
            Some(json!({ "refreshToken": "not.a.token" })),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json[0]["code"], "INVALID_FIELD");
    assert_eq!(json[0]["field"], "refreshToken");
}

#[tokio::test]
async fn test_access_token_cannot_refresh() {
    let ctx = test_context();
    let app = app(&ctx);
    sign_up(&app, "kenplix", "kenplix@example.com").await;
    let (access, _) = sign_in(&app, "kenplix").await;

    let response = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/refresh",
            Some(json!({ "refreshToken": access })),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// =============================================================================
// Suspension and password change
// =============================================================================

#[tokio::test]
async fn test_suspended_user_is_forbidden() {
    let ctx = test_context();
    let app = app(&ctx);
    let response = sign_up(&app, "kenplix", "kenplix@example.com").await;
    let user_id = body_json(response).await["id"].as_str().unwrap().to_string();
    let (access, _) = sign_in(&app, "kenplix").await;

    ctx.users
        .set_suspended(&user_id, Some(chrono::Utc::now()))
        .await
        .unwrap();

    let response = send(&app, authorized("GET", "/api/v1/users/me", &access, None)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await[0]["code"], "CURRENT_USER_SUSPENDED");
}

#[tokio::test]
async fn test_change_password() {
    let ctx = test_context();
    let app = app(&ctx);
    sign_up(&app, "kenplix", "kenplix@example.com").await;
    let (access, _) = sign_in(&app, "kenplix").await;

    let response = send(
        &app,
        authorized(
            "PUT",
            "/api/v1/users/me/password",
            &access,
            Some(json!({ "currentPassword": "Wrong$Pass1", "newPassword": "N3w$ecret" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await[0]["field"], "currentPassword");

    let response = send(
        &app,
        authorized(
            "PUT",
            "/api/v1/users/me/password",
            &access,
            Some(json!({ "currentPassword": PASSWORD, "newPassword": "N3w$ecret" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Sessions are revoked and only the new password works
    let response = send(&app, authorized("GET", "/api/v1/users/me", &access, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/sign-in",
            Some(json!({ "login": "kenplix", "password": "N3w$ecret" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}
