//! Authorization endpoint
//!
//! Trades a valid authentication assertion for an authorization code. The
//! code is returned in the body; the sign-in UI forwards it to the client's
//! redirect URI.

use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use token_store::PROFILE_VIEW_SCOPE;

use super::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AuthorizationRequest {
    pub jwt: String,
    pub client_id: String,
    /// Must be "code"
    pub response_type: String,
    pub scope: String,
}

#[derive(Debug, Serialize)]
pub struct AuthorizationResponse {
    pub code: String,
}

/// Handler for `POST /api/v1/authorization`
pub async fn handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AuthorizationRequest>, JsonRejection>,
) -> Result<Json<AuthorizationResponse>, ApiError> {
    let Json(request) = payload?;

    if request.response_type != "code" {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "unsupported_response_type",
            "Only response_type=code is supported",
        ));
    }
    if request.scope != PROFILE_VIEW_SCOPE {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "invalid_scope",
            format!("Only {} is supported", PROFILE_VIEW_SCOPE),
        ));
    }

    let claims = state.service.verify(&request.jwt).map_err(|e| {
        tracing::info!("Rejected assertion: {}", e);
        ApiError::invalid_request("Invalid or expired jwt")
    })?;
    if claims.client_id != request.client_id {
        tracing::info!(
            "Assertion was issued for client {}, not {}",
            claims.client_id,
            request.client_id
        );
        return Err(ApiError::invalid_request("client_id does not match"));
    }

    let code = state
        .service
        .new_authorization_code(&claims.sub, &claims.client_id)
        .await
        .map_err(ApiError::server_error)?;

    Ok(Json(AuthorizationResponse { code: code.code }))
}
