//! OhAuth authorization server
//!
//! Provides:
//! - Password authentication issuing short-lived HS256 assertions
//! - Authorization codes minted from a valid assertion
//! - Access/refresh token issuance and rotation
//! - Public client lookup for the sign-in UI
//!
//! All state lives in a [`token_store::TokenStore`], either in-process or
//! behind the store RPC server.

pub mod claims;
pub mod config;
pub mod error;
pub mod oauth;
pub mod service;

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub use claims::{parse_claims, sign_claims, Claims, ISSUER};
pub use config::Config;
pub use error::AuthError;
pub use service::{TokenPair, TokenService};

/// Shared application state
pub struct AppState {
    pub service: TokenService,
    pub config: Config,
}

/// Build the `/api/v1` router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/api/v1/clients/{client_id}", get(oauth::clients::handler))
        .route("/api/v1/authentication", post(oauth::authenticate::handler))
        .route("/api/v1/authorization", post(oauth::authorize::handler))
        .route("/api/v1/accesstoken", post(oauth::token::handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Ignoring invalid allowed origin {:?}: {}", origin, e);
                None
            }
        })
        .collect();
    tracing::info!("Allowed origins: {:?}", origins);

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::CONTENT_LENGTH,
            header::ACCEPT_ENCODING,
            header::AUTHORIZATION,
        ])
}
