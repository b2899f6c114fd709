//! Authentication endpoint: user id and password in, signed assertion out.

use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::error::AuthError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AuthenticationRequest {
    pub client_id: String,
    pub user_id: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthenticationResponse {
    pub jwt: String,
}

/// Handler for `POST /api/v1/authentication`
pub async fn handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AuthenticationRequest>, JsonRejection>,
) -> Result<Json<AuthenticationResponse>, ApiError> {
    let Json(request) = payload?;
    tracing::info!("Authentication request for user {} at client {}", request.user_id, request.client_id);

    let claims = match state
        .service
        .authenticate(&request.user_id, &request.password, &request.client_id)
        .await
    {
        Ok(claims) => claims,
        Err(e) if e.is_not_found() || matches!(e, AuthError::NoMatchPassword) => {
            tracing::info!("Authentication failed for user {}: {}", request.user_id, e);
            return Err(ApiError::invalid_request("Invalid Id or Password"));
        }
        Err(e) => return Err(ApiError::server_error(e)),
    };

    let jwt = state.service.sign(&claims).map_err(ApiError::server_error)?;
    Ok(Json(AuthenticationResponse { jwt }))
}
