//! OhAuth resource server
//!
//! Serves user profiles to holders of a live access token with the
//! `profile:view` scope. Tokens are resolved through a
//! [`token_store::TokenStore`], normally the store RPC client.

pub mod auth;
pub mod error;
pub mod routes;
pub mod verifier;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

pub use error::ResourceError;
pub use routes::ProfileResponse;
pub use verifier::{require_scope, ResourceVerifier};

/// Shared application state
pub struct AppState {
    pub verifier: ResourceVerifier,
}

/// Build the bearer-protected `/api/v1` router.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/status", get(routes::status))
        .route("/profile", get(routes::profile))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_bearer));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
