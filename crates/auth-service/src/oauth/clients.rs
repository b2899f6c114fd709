//! Public client details for the sign-in UI.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use super::ApiError;
use crate::AppState;

/// Client details safe to show a user (no secret)
#[derive(Debug, Serialize)]
pub struct ClientResponse {
    pub client_id: String,
    pub name: String,
    pub scope: String,
    pub redirect_uri: String,
}

/// Handler for `GET /api/v1/clients/{client_id}`
pub async fn handler(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
) -> Result<Json<ClientResponse>, ApiError> {
    let client = match state.service.get_client(&client_id).await {
        Ok(client) => client,
        Err(e) if e.is_not_found() => {
            tracing::debug!("Unknown client {}", client_id);
            return Err(ApiError::new(StatusCode::NOT_FOUND, "not_found", "Not Found"));
        }
        Err(e) => return Err(ApiError::server_error(e)),
    };

    Ok(Json(ClientResponse {
        client_id: client.id,
        name: client.name,
        scope: client.scope,
        redirect_uri: client.redirect_uri,
    }))
}
