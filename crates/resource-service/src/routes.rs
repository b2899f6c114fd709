//! Protected resource handlers.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use token_store::{AccessToken, PROFILE_VIEW_SCOPE};

use crate::verifier::require_scope;
use crate::AppState;

/// JSON error body in the same shape the authorization server uses
pub fn error_response(status: StatusCode, error: &str, description: &str) -> Response {
    (
        status,
        Json(json!({"error": error, "error_description": description})),
    )
        .into_response()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub user_id: String,
    pub name: String,
    pub age: u32,
    pub profile: String,
}

/// Handler for `GET /api/v1/status`
pub async fn status() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Handler for `GET /api/v1/profile`
pub async fn profile(State(state): State<Arc<AppState>>, Extension(token): Extension<AccessToken>) -> Response {
    if let Err(e) = require_scope(&token, PROFILE_VIEW_SCOPE) {
        tracing::info!("Rejected profile request: {}", e);
        return error_response(StatusCode::FORBIDDEN, "insufficient_scope", &e.to_string());
    }

    match state.verifier.view_user_profile(&token.user_id).await {
        Ok(user) => Json(ProfileResponse {
            user_id: user.id,
            name: user.name,
            age: user.age,
            profile: user.profile,
        })
        .into_response(),
        Err(e) => {
            tracing::error!("Cannot load profile of user {}: {}", token.user_id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "server_error", "Internal Server Error")
        }
    }
}
