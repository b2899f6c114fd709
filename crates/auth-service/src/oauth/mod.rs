//! HTTP handlers for the authorization server
//!
//! Implements, under `/api/v1`:
//! - `GET /clients/{client_id}`: public client details
//! - `POST /authentication`: password check, returns a signed assertion
//! - `POST /authorization`: assertion for an authorization code
//! - `POST /accesstoken`: code or refresh token for a token pair

pub mod authenticate;
pub mod authorize;
pub mod clients;
pub mod token;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Error body shared by every endpoint
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

/// An error response: status plus an OAuth-style error body
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, error: &str, description: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.to_string(),
                error_description: Some(description.into()),
            },
        }
    }

    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", description)
    }

    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_grant", description)
    }

    pub fn server_error(err: impl std::fmt::Display) -> Self {
        tracing::error!("Request failed: {}", err);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "server_error", "Internal Server Error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!("Rejected request body: {}", rejection);
        ApiError::invalid_request(rejection.body_text())
    }
}
