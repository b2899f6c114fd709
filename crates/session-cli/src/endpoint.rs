//! Seams between the session and the outside world.
//!
//! The session only talks to these traits; `http` and `receiver` provide the
//! real implementations, tests provide fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// A relying party's credentials at the token endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Token endpoint response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: u64,
}

/// Profile returned by the resource server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub name: String,
    pub age: u32,
    pub profile: String,
}

#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchange an authorization code for a token pair
    async fn exchange_code(&self, client: &ClientCredentials, code: &str) -> Result<TokenGrant>;

    /// Trade a refresh token for a new token pair
    async fn refresh(&self, client: &ClientCredentials, refresh_token: &str) -> Result<TokenGrant>;
}

#[async_trait]
pub trait ResourceEndpoint: Send + Sync {
    /// Fails with `AccessTokenExpired` when the server says the token is stale
    async fn view_profile(&self, access_token: &str) -> Result<Profile>;
}

/// Where authorization codes come from during login
#[async_trait]
pub trait CodeSource: Send + Sync {
    /// Wait for one code, giving up with `Canceled` once `cancel` fires.
    async fn receive_code(&self, cancel: &CancellationToken) -> Result<String>;
}
