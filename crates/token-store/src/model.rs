//! Stored entities.
//!
//! All rows are immutable once created. They serialize with serde because
//! the RPC transport carries them as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user who signs in through OhAuth
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Stored in cleartext; this system has no password hashing
    pub password: String,
    pub name: String,
    pub age: u32,
    pub profile: String,
}

/// A registered relying party
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceClient {
    pub id: String,
    pub secret: String,
    pub name: String,
    pub redirect_uri: String,
    pub scope: String,
}

/// A pending authorization code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationCode {
    pub code: String,
    pub user_id: String,
    pub client_id: String,
    pub expires_at: DateTime<Utc>,
    pub scope: String,
}

/// A bearer access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub token: String,
    pub user_id: String,
    pub client_id: String,
    pub expires_at: DateTime<Utc>,
    pub scope: String,
}

/// A refresh token, always minted together with an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshToken {
    pub token: String,
    pub user_id: String,
    pub client_id: String,
    pub expires_at: DateTime<Utc>,
    pub scope: String,
}

/// Expiry rule shared by every credential: rejected once `now` is strictly
/// after `expires_at`.
pub fn is_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now > expires_at
}

impl AuthorizationCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        is_expired(self.expires_at, now)
    }
}

impl AccessToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        is_expired(self.expires_at, now)
    }
}

impl RefreshToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        is_expired(self.expires_at, now)
    }
}
