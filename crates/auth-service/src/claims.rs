//! The signed authentication assertion handed from the authentication step
//! to the authorization step.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// `iss` of every assertion this service mints
pub const ISSUER: &str = "OhAuth0.1";

/// How long an assertion stays valid, in minutes
pub const ASSERTION_TTL_MINUTES: i64 = 10;

/// Offset assertion expiry is computed in (UTC+9)
const ASSERTION_UTC_OFFSET_SECS: i32 = 9 * 3600;

/// Assertion claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    /// User id
    pub sub: String,
    /// Expiry, seconds since the epoch
    pub exp: i64,
    pub client_id: String,
}

impl Claims {
    /// Claims for `user_id` signing in to `client_id`, expiring
    /// [`ASSERTION_TTL_MINUTES`] after `now`.
    pub fn new(user_id: &str, client_id: &str, now: DateTime<Utc>) -> Self {
        let local = match FixedOffset::east_opt(ASSERTION_UTC_OFFSET_SECS) {
            Some(offset) => now.with_timezone(&offset),
            None => now.fixed_offset(),
        };
        Self {
            iss: ISSUER.to_string(),
            sub: user_id.to_string(),
            exp: (local + Duration::minutes(ASSERTION_TTL_MINUTES)).timestamp(),
            client_id: client_id.to_string(),
        }
    }
}

/// Sign `claims` with HS256.
pub fn sign_claims(claims: &Claims, secret: &[u8]) -> Result<String, AuthError> {
    encode(&Header::default(), claims, &EncodingKey::from_secret(secret))
        .map_err(|e| AuthError::Signing(e.to_string()))
}

/// Verify signature and expiry (no leeway) and return the claims.
pub fn parse_claims(token: &str, secret: &[u8]) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_issuer(&[ISSUER]);

    decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .map_err(|e| AuthError::InvalidToken(e.to_string()))
}
