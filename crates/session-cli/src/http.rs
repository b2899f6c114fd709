//! HTTP clients for the authorization and resource servers.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::endpoint::{ClientCredentials, Profile, ResourceEndpoint, TokenEndpoint, TokenGrant};
use crate::error::{Result, SessionError};

fn request_error(err: reqwest::Error) -> SessionError {
    SessionError::Request(err.to_string())
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    error_description: Option<String>,
}

/// Best human-readable message for a failed response
fn error_message(status: StatusCode, text: &str) -> String {
    match serde_json::from_str::<ErrorBody>(text) {
        Ok(body) => body
            .error_description
            .or(body.error)
            .unwrap_or_else(|| status.to_string()),
        Err(_) if !text.trim().is_empty() => text.trim().to_string(),
        Err(_) => status.to_string(),
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    Err(SessionError::Http {
        status: status.as_u16(),
        message: error_message(status, &text),
    })
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

/// `POST /api/v1/accesstoken` on the authorization server
#[derive(Debug, Clone)]
pub struct HttpTokenEndpoint {
    client: Client,
    base_url: String,
}

impl HttpTokenEndpoint {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    async fn request(&self, body: &TokenRequest<'_>) -> Result<TokenGrant> {
        debug!("Requesting token with grant {}", body.grant_type);
        let response = self
            .client
            .post(format!("{}/api/v1/accesstoken", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(request_error)?;
        check_status(response)
            .await?
            .json()
            .await
            .map_err(request_error)
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn exchange_code(&self, client: &ClientCredentials, code: &str) -> Result<TokenGrant> {
        self.request(&TokenRequest {
            grant_type: "authorization_code",
            client_id: &client.client_id,
            client_secret: &client.client_secret,
            code: Some(code),
            refresh_token: None,
        })
        .await
    }

    async fn refresh(&self, client: &ClientCredentials, refresh_token: &str) -> Result<TokenGrant> {
        self.request(&TokenRequest {
            grant_type: "refresh_token",
            client_id: &client.client_id,
            client_secret: &client.client_secret,
            code: None,
            refresh_token: Some(refresh_token),
        })
        .await
    }
}

/// `GET /api/v1/profile` on the resource server
#[derive(Debug, Clone)]
pub struct HttpResourceEndpoint {
    client: Client,
    base_url: String,
}

impl HttpResourceEndpoint {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }
}

#[async_trait]
impl ResourceEndpoint for HttpResourceEndpoint {
    async fn view_profile(&self, access_token: &str) -> Result<Profile> {
        let response = self
            .client
            .get(format!("{}/api/v1/profile", self.base_url))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(request_error)?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(SessionError::AccessTokenExpired);
        }
        check_status(response)
            .await?
            .json()
            .await
            .map_err(request_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message() {
        let body = r#"{"error":"invalid_grant","error_description":"refresh token is expired"}"#;
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, body),
            "refresh token is expired"
        );

        let body = r#"{"error":"insufficient_scope"}"#;
        assert_eq!(error_message(StatusCode::FORBIDDEN, body), "insufficient_scope");

        assert_eq!(error_message(StatusCode::BAD_GATEWAY, "upstream down\n"), "upstream down");
        assert_eq!(
            error_message(StatusCode::FORBIDDEN, ""),
            StatusCode::FORBIDDEN.to_string()
        );
    }

    #[test]
    fn test_token_request_body() {
        let body = TokenRequest {
            grant_type: "refresh_token",
            client_id: "501",
            client_secret: "secret",
            code: None,
            refresh_token: Some("r"),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["grant_type"], "refresh_token");
        assert_eq!(value["refresh_token"], "r");
        assert!(value.get("code").is_none());
    }

    #[test]
    fn test_base_url_is_trimmed() {
        let endpoint = HttpTokenEndpoint::new(Client::new(), "http://localhost:3001/");
        assert_eq!(endpoint.base_url, "http://localhost:3001");
    }
}
