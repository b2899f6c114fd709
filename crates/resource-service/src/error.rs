use thiserror::Error;
use token_store::StoreError;

/// Errors from verifying a bearer token
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("access token is expired")]
    AccessTokenExpired,

    #[error("access token has scope {actual:?}, {required:?} is required")]
    TokenInadequateScope { required: String, actual: String },
}

impl ResourceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResourceError::Store(e) if e.is_not_found())
    }
}
