//! Bearer token middleware
//!
//! Every `/api/v1` route sits behind this layer. A request passes only with
//! `Authorization: Bearer <token>` naming a live access token; the token row
//! is then available to handlers as an `Extension<AccessToken>`.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ResourceError;
use crate::routes::error_response;
use crate::AppState;

/// The token from an `Authorization: Bearer ...` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

pub async fn require_bearer(State(state): State<Arc<AppState>>, mut request: Request, next: Next) -> Response {
    let Some(token) = bearer_token(request.headers()).map(str::to_string) else {
        tracing::debug!("Missing or malformed Authorization header");
        return error_response(StatusCode::FORBIDDEN, "forbidden", "Forbidden");
    };

    match state.verifier.verify_access_token(&token).await {
        Ok(row) => {
            request.extensions_mut().insert(row);
            next.run(request).await
        }
        Err(e) if e.is_not_found() => {
            tracing::debug!("Unknown access token");
            error_response(StatusCode::FORBIDDEN, "forbidden", "Forbidden")
        }
        Err(ResourceError::AccessTokenExpired) => {
            tracing::debug!("Expired access token");
            (
                [(header::WWW_AUTHENTICATE, "Bearer error=\"invalid_token\"")],
                error_response(StatusCode::UNAUTHORIZED, "invalid_token", "Access token is expired"),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("Failed to verify access token: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "server_error", "Internal Server Error")
        }
    }
}
