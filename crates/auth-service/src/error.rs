use thiserror::Error;
use token_store::StoreError;

/// Errors from the token service
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("password does not match")]
    NoMatchPassword,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("authorization code is expired")]
    AuthorizationCodeExpired,

    #[error("refresh token is expired")]
    RefreshTokenExpired,

    #[error("unknown client or wrong client secret")]
    InvalidClient,

    #[error("failed to sign assertion: {0}")]
    Signing(String),
}

impl AuthError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AuthError::Store(e) if e.is_not_found())
    }
}
