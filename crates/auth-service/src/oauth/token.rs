//! Token endpoint
//!
//! Handles:
//! - Authorization code exchange
//! - Refresh token grants (rotation: a new refresh token every time)

use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::error::AuthError;
use crate::service::TokenPair;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    /// "authorization_code" or "refresh_token"
    pub grant_type: String,
    pub client_id: String,
    pub client_secret: String,

    /// For the authorization_code grant
    #[serde(default)]
    pub code: Option<String>,

    /// For the refresh_token grant
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires
    pub expires_in: u64,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        let remaining = pair.access.expires_at - Utc::now();
        Self {
            access_token: pair.access.token,
            refresh_token: pair.refresh.token,
            expires_in: remaining.num_seconds().max(0) as u64,
        }
    }
}

/// Handler for `POST /api/v1/accesstoken`
pub async fn handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(request) = payload?;

    match state
        .service
        .verify_client(&request.client_id, &request.client_secret)
        .await
    {
        Ok(_) => {}
        Err(AuthError::InvalidClient) => {
            tracing::info!("Rejected credentials for client {}", request.client_id);
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                "invalid_client",
                "Unknown client or wrong client_secret",
            ));
        }
        Err(e) => return Err(ApiError::server_error(e)),
    }

    let result = match request.grant_type.as_str() {
        "authorization_code" => {
            let code = non_empty(request.code.as_deref(), "code")?;
            state.service.new_access_token(code).await
        }
        "refresh_token" => {
            let token = non_empty(request.refresh_token.as_deref(), "refresh_token")?;
            state.service.update_access_token(token).await
        }
        _ => {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                "unsupported_grant_type",
                "Only authorization_code and refresh_token grants are supported",
            ));
        }
    };

    match result {
        Ok(pair) => Ok(Json(pair.into())),
        Err(e @ (AuthError::AuthorizationCodeExpired | AuthError::RefreshTokenExpired)) => {
            tracing::info!("Rejected grant for client {}: {}", request.client_id, e);
            Err(ApiError::invalid_grant(e.to_string()))
        }
        Err(e) if e.is_not_found() => {
            tracing::info!("Rejected grant for client {}: {}", request.client_id, e);
            Err(ApiError::invalid_grant("Authorization code or refresh token is invalid"))
        }
        Err(e) => Err(ApiError::server_error(e)),
    }
}

fn non_empty<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, ApiError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::invalid_request(format!("{} is required", field))),
    }
}
