//! token-store: the repository behind the OhAuth services.
//!
//! This crate provides:
//! - The five stored entity kinds (users, service clients, authorization
//!   codes, access tokens, refresh tokens)
//! - The `TokenStore` trait, implemented in-process by `InMemoryStore` and
//!   remotely by the `store-rpc` client
//! - Fixture data seeded into a fresh store

pub mod error;
pub mod fixtures;
pub mod memory;
pub mod model;

use async_trait::async_trait;

pub use error::{Result, StoreError};
pub use fixtures::{seed_fixtures, PROFILE_VIEW_SCOPE};
pub use memory::InMemoryStore;
pub use model::{is_expired, AccessToken, AuthorizationCode, RefreshToken, ServiceClient, User};

/// Create/get access to the stored entities.
///
/// There is no update and no delete: rotation creates new rows and old rows
/// are left behind. Every `create_*` fails with [`StoreError::AlreadyExists`]
/// when the key is taken, every `get_*` fails with [`StoreError::NotFound`]
/// when it is absent.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Look up a user by id
    async fn get_user(&self, id: &str) -> Result<User>;

    /// Look up a service client (relying party) by id
    async fn get_client(&self, id: &str) -> Result<ServiceClient>;

    /// Look up an authorization code
    async fn get_authorization_code(&self, code: &str) -> Result<AuthorizationCode>;

    /// Store a new authorization code
    async fn create_authorization_code(&self, row: AuthorizationCode) -> Result<()>;

    /// Look up an access token
    async fn get_access_token(&self, token: &str) -> Result<AccessToken>;

    /// Store a new access token
    async fn create_access_token(&self, row: AccessToken) -> Result<()>;

    /// Look up a refresh token
    async fn get_refresh_token(&self, token: &str) -> Result<RefreshToken>;

    /// Store a new refresh token
    async fn create_refresh_token(&self, row: RefreshToken) -> Result<()>;
}
