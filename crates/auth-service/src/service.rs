//! Token lifecycle: authentication, authorization codes, access/refresh
//! issuance and rotation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Months, Utc};
use token_store::{
    AccessToken, AuthorizationCode, RefreshToken, ServiceClient, TokenStore, PROFILE_VIEW_SCOPE,
};

use crate::claims::{parse_claims, sign_claims, Claims};
use crate::error::AuthError;

pub type Result<T> = std::result::Result<T, AuthError>;

/// Authorization codes live this many minutes
pub const AUTHORIZATION_CODE_TTL_MINUTES: i64 = 10;

/// Access tokens live this many days
pub const ACCESS_TOKEN_TTL_DAYS: i64 = 3;

const AUTHORIZATION_CODE_LEN: usize = 32;
const TOKEN_LEN: usize = 48;

/// Generate a random alphanumeric string
pub fn generate_random_string(len: usize) -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..len)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}

/// A freshly minted access token and the refresh token minted with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access: AccessToken,
    pub refresh: RefreshToken,
}

/// Refresh tokens live one calendar month.
fn refresh_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_add_months(Months::new(1))
        .unwrap_or_else(|| now + Duration::days(30))
}

/// Issues and checks credentials against a [`TokenStore`].
pub struct TokenService {
    store: Arc<dyn TokenStore>,
    jwt_secret: Vec<u8>,
}

impl TokenService {
    pub fn new(store: Arc<dyn TokenStore>, jwt_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            store,
            jwt_secret: jwt_secret.into(),
        }
    }

    /// Check a user's password and build the assertion claims for
    /// `client_id`. Unknown users surface as a store `NotFound`.
    pub async fn authenticate(&self, user_id: &str, password: &str, client_id: &str) -> Result<Claims> {
        let user = self.store.get_user(user_id).await?;
        if user.password != password {
            return Err(AuthError::NoMatchPassword);
        }
        Ok(Claims::new(&user.id, client_id, Utc::now()))
    }

    pub fn sign(&self, claims: &Claims) -> Result<String> {
        sign_claims(claims, &self.jwt_secret)
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        parse_claims(token, &self.jwt_secret)
    }

    /// Mint and persist an authorization code for `user_id` at `client_id`.
    pub async fn new_authorization_code(&self, user_id: &str, client_id: &str) -> Result<AuthorizationCode> {
        let row = AuthorizationCode {
            code: generate_random_string(AUTHORIZATION_CODE_LEN),
            user_id: user_id.to_string(),
            client_id: client_id.to_string(),
            expires_at: Utc::now() + Duration::minutes(AUTHORIZATION_CODE_TTL_MINUTES),
            scope: PROFILE_VIEW_SCOPE.to_string(),
        };
        self.store.create_authorization_code(row.clone()).await?;
        tracing::info!("Issued authorization code for user {} at client {}", user_id, client_id);
        Ok(row)
    }

    /// Exchange an authorization code for a token pair.
    ///
    /// The code is not consumed; it stays usable until it expires.
    pub async fn new_access_token(&self, code: &str) -> Result<TokenPair> {
        let authorization = self.store.get_authorization_code(code).await?;
        let now = Utc::now();
        if authorization.is_expired(now) {
            return Err(AuthError::AuthorizationCodeExpired);
        }
        let pair = self
            .mint_pair(&authorization.user_id, &authorization.client_id, &authorization.scope, now)
            .await?;
        tracing::info!("Issued access token for client {}", authorization.client_id);
        Ok(pair)
    }

    /// Mint a new token pair from a refresh token. The old refresh token
    /// stays valid.
    pub async fn update_access_token(&self, refresh_token: &str) -> Result<TokenPair> {
        let refresh = self.store.get_refresh_token(refresh_token).await?;
        let now = Utc::now();
        if refresh.is_expired(now) {
            return Err(AuthError::RefreshTokenExpired);
        }
        let pair = self
            .mint_pair(&refresh.user_id, &refresh.client_id, &refresh.scope, now)
            .await?;
        tracing::info!("Refreshed access token for client {}", refresh.client_id);
        Ok(pair)
    }

    pub async fn get_client(&self, client_id: &str) -> Result<ServiceClient> {
        Ok(self.store.get_client(client_id).await?)
    }

    /// Check a client's credentials. Unknown clients and wrong secrets both
    /// come back as [`AuthError::InvalidClient`].
    pub async fn verify_client(&self, client_id: &str, secret: &str) -> Result<ServiceClient> {
        let client = match self.store.get_client(client_id).await {
            Ok(client) => client,
            Err(e) if e.is_not_found() => return Err(AuthError::InvalidClient),
            Err(e) => return Err(e.into()),
        };
        if client.secret.as_bytes() != secret.as_bytes() {
            return Err(AuthError::InvalidClient);
        }
        Ok(client)
    }

    async fn mint_pair(&self, user_id: &str, client_id: &str, scope: &str, now: DateTime<Utc>) -> Result<TokenPair> {
        let access = AccessToken {
            token: generate_random_string(TOKEN_LEN),
            user_id: user_id.to_string(),
            client_id: client_id.to_string(),
            expires_at: now + Duration::days(ACCESS_TOKEN_TTL_DAYS),
            scope: scope.to_string(),
        };
        let refresh = RefreshToken {
            token: generate_random_string(TOKEN_LEN),
            user_id: user_id.to_string(),
            client_id: client_id.to_string(),
            expires_at: refresh_expiry(now),
            scope: scope.to_string(),
        };

        self.store.create_access_token(access.clone()).await?;
        self.store.create_refresh_token(refresh.clone()).await?;
        Ok(TokenPair { access, refresh })
    }
}
