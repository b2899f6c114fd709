//! End-to-end tests for the resource server.
//!
//! Runs the store behind a real `StoreServer` and drives both the
//! authorization router and the resource router against it through the RPC
//! transport, the way the deployed services talk to each other.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use resource_service::{AppState, ProfileResponse, ResourceVerifier};
use serde_json::{json, Value};
use store_rpc::{ClientConfig, StoreClient, StoreServer};
use tokio::sync::oneshot;
use token_store::{AccessToken, InMemoryStore, TokenStore};
use tower::ServiceExt;

// ============================================================================
// Helpers
// ============================================================================

struct Deployment {
    store: Arc<InMemoryStore>,
    auth: Router,
    resource: Router,
    _stop: oneshot::Sender<()>,
}

async fn deploy() -> Deployment {
    let store = Arc::new(InMemoryStore::with_fixtures().unwrap());
    let listener = StoreServer::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());

    let (stop, stopped) = oneshot::channel::<()>();
    let server = StoreServer::new(store.clone());
    tokio::spawn(async move {
        server
            .serve(listener, async {
                let _ = stopped.await;
            })
            .await;
    });

    let auth_store = StoreClient::new(ClientConfig::new(url.clone())).unwrap();
    auth_store.wait_ready().await.unwrap();
    let config = auth_service::Config::default();
    let service = auth_service::TokenService::new(Arc::new(auth_store), config.jwt_secret.clone());
    let auth = auth_service::router(Arc::new(auth_service::AppState { service, config }));

    let resource_store = StoreClient::new(ClientConfig::new(url)).unwrap();
    let resource = resource_service::router(Arc::new(AppState {
        verifier: ResourceVerifier::new(Arc::new(resource_store)),
    }));

    Deployment {
        store,
        auth,
        resource,
        _stop: stop,
    }
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn post_json(app: &Router, uri: &str, body: Value) -> Value {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, body) = call(app, request).await;
    assert_eq!(status, StatusCode::OK, "{uri}: {body}");
    body
}

async fn get_with_bearer(app: &Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    call(app, builder.body(Body::empty()).unwrap()).await
}

fn access_token(token: &str, expires_in: Duration, scope: &str) -> AccessToken {
    AccessToken {
        token: token.to_string(),
        user_id: "0".to_string(),
        client_id: "500".to_string(),
        expires_at: Utc::now() + expires_in,
        scope: scope.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_full_flow_over_rpc() {
    let deployment = deploy().await;

    let body = post_json(
        &deployment.auth,
        "/api/v1/authentication",
        json!({"client_id": "501", "user_id": "1", "password": "password"}),
    )
    .await;
    let jwt = body["jwt"].as_str().unwrap().to_string();

    let body = post_json(
        &deployment.auth,
        "/api/v1/authorization",
        json!({"jwt": jwt, "client_id": "501", "response_type": "code", "scope": "profile:view"}),
    )
    .await;
    let code = body["code"].as_str().unwrap().to_string();

    let body = post_json(
        &deployment.auth,
        "/api/v1/accesstoken",
        json!({"grant_type": "authorization_code", "client_id": "501", "client_secret": "secret", "code": code}),
    )
    .await;
    let access = body["access_token"].as_str().unwrap().to_string();
    let refresh = body["refresh_token"].as_str().unwrap().to_string();

    let stored = deployment.store.get_access_token(&access).await.unwrap();
    assert_eq!(stored.user_id, "1");
    assert_eq!(stored.client_id, "501");
    assert_eq!(stored.scope, "profile:view");

    let (status, body) = get_with_bearer(&deployment.resource, "/api/v1/profile", Some(&access)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let profile: ProfileResponse = serde_json::from_value(body).unwrap();
    assert_eq!(profile.user_id, "1");
    assert_eq!(profile.name, "Hanako");
    assert_eq!(profile.age, 20);
    assert_eq!(profile.profile, "Hello🌸");

    // A rotated pair works as well
    let body = post_json(
        &deployment.auth,
        "/api/v1/accesstoken",
        json!({"grant_type": "refresh_token", "client_id": "501", "client_secret": "secret", "refresh_token": refresh}),
    )
    .await;
    let rotated = body["access_token"].as_str().unwrap().to_string();
    let (status, _) = get_with_bearer(&deployment.resource, "/api/v1/profile", Some(&rotated)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_status_requires_a_live_token() {
    let deployment = deploy().await;
    deployment
        .store
        .create_access_token(access_token("live", Duration::days(3), "profile:view"))
        .await
        .unwrap();

    let (status, _) = get_with_bearer(&deployment.resource, "/api/v1/status", Some("live")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = get_with_bearer(&deployment.resource, "/api/v1/status", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = get_with_bearer(&deployment.resource, "/api/v1/status", Some("unknown")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_expired_token_is_unauthorized() {
    let deployment = deploy().await;
    deployment
        .store
        .create_access_token(access_token("expired", Duration::seconds(-1), "profile:view"))
        .await
        .unwrap();

    let (status, body) = get_with_bearer(&deployment.resource, "/api/v1/profile", Some("expired")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn test_wrong_scope_is_forbidden() {
    let deployment = deploy().await;
    deployment
        .store
        .create_access_token(access_token("narrow", Duration::days(3), "status:view"))
        .await
        .unwrap();

    let (status, body) = get_with_bearer(&deployment.resource, "/api/v1/profile", Some("narrow")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "insufficient_scope");

    // Scope only matters for the profile
    let (status, _) = get_with_bearer(&deployment.resource, "/api/v1/status", Some("narrow")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_malformed_authorization_header_is_forbidden() {
    let deployment = deploy().await;
    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/v1/profile")
        .header(header::AUTHORIZATION, "Token abc")
        .body(Body::empty())
        .unwrap();
    let (status, _) = call(&deployment.resource, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
