//! Integration tests for the session layer.
//!
//! Tests cover:
//! - Anonymous and authenticated session accessor
//! - Invalid, foreign-issuer and revoked token rejection
//! - Sign-out revocation

mod common;

use axum::http::{Method, StatusCode};
use common::{mint_token, response_json, TestApp};
use estoque_api::auth::{AuthConfig, AuthService, TokenSubject};
use std::time::Duration;
use uuid::Uuid;

#[tokio::test]
async fn anonymous_session_reports_not_authenticated() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/auth/session", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"], serde_json::json!({ "authenticated": false }));
}

#[tokio::test]
async fn authenticated_session_returns_user() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(Method::GET, "/api/v1/auth/session", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["authenticated"], true);
    assert_eq!(body["data"]["usuario"]["user_id"], serde_json::json!(app.user_id));
    assert_eq!(body["data"]["nome_exibicao"], "Operadora Ana");
}

#[tokio::test]
async fn garbage_token_is_rejected_not_downgraded() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/api/v1/produtos", None, Some("not-a-jwt"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response).await;
    assert_eq!(body["error"]["code"], "AUTH_INVALID_TOKEN");
}

#[tokio::test]
async fn token_from_another_issuer_is_rejected() {
    let app = TestApp::new().await;

    let foreign = AuthService::new(
        AuthConfig::new(
            common::TEST_SECRET.to_string(),
            "estoque-api".to_string(),
            "someone-else".to_string(),
            Duration::from_secs(600),
        ),
        app.state.db.clone(),
    );
    let token = foreign
        .generate_token(&TokenSubject {
            id: Uuid::new_v4(),
            name: None,
            email: None,
        })
        .unwrap();

    let response = app
        .request(Method::GET, "/api/v1/auth/session", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn sign_out_revokes_the_token() {
    let app = TestApp::new().await;
    let token = mint_token(&app.auth_service(), Uuid::new_v4(), Some("Carla"), None);

    let response = app
        .request(Method::POST, "/api/v1/auth/sign-out", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["message"], "Sessão encerrada");

    let response = app
        .request(Method::GET, "/api/v1/auth/session", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response).await;
    assert_eq!(body["error"]["code"], "AUTH_REVOKED_TOKEN");

    // The harness token is unaffected
    let response = app
        .request_authenticated(Method::GET, "/api/v1/auth/session", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn sign_out_without_session_is_unauthorized() {
    let app = TestApp::new().await;
    let response = app
        .request(Method::POST, "/api/v1/auth/sign-out", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_and_status_respond() {
    let app = TestApp::new().await;

    for uri in ["/health", "/health/live", "/health/ready", "/api/v1/status"] {
        let response = app.request(Method::GET, uri, None, None).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
    }

    let response = app.request(Method::GET, "/api/v1/status", None, None).await;
    assert!(response.headers().contains_key("x-request-id"));
}
