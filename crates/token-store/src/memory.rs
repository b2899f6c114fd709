//! In-process store.
//!
//! All five maps sit behind one lock. `create_*` checks and inserts under the
//! write guard, so two writers racing on the same key see exactly one
//! success. Reads take the same lock.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{Result, StoreError};
use crate::fixtures::seed_fixtures;
use crate::model::{AccessToken, AuthorizationCode, RefreshToken, ServiceClient, User};
use crate::TokenStore;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<String, User>,
    clients: HashMap<String, ServiceClient>,
    codes: HashMap<String, AuthorizationCode>,
    access_tokens: HashMap<String, AccessToken>,
    refresh_tokens: HashMap<String, RefreshToken>,
}

/// Store backed by process memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with the fixture users and clients
    pub fn with_fixtures() -> Result<Self> {
        let store = Self::new();
        seed_fixtures(&store)?;
        Ok(store)
    }

    /// Register a user. Only used for seeding.
    pub fn insert_user(&self, user: User) -> Result<()> {
        let key = user.id.clone();
        insert(&mut self.write()?.users, key, user, "user")
    }

    /// Register a service client. Only used for seeding.
    pub fn insert_client(&self, client: ServiceClient) -> Result<()> {
        let key = client.id.clone();
        insert(&mut self.write()?.clients, key, client, "client")
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::Internal("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::Internal("store lock poisoned".to_string()))
    }
}

fn insert<T>(map: &mut HashMap<String, T>, key: String, row: T, kind: &str) -> Result<()> {
    match map.entry(key) {
        Entry::Occupied(entry) => Err(StoreError::AlreadyExists(format!("{} {}", kind, entry.key()))),
        Entry::Vacant(entry) => {
            entry.insert(row);
            Ok(())
        }
    }
}

fn lookup<T: Clone>(map: &HashMap<String, T>, key: &str, kind: &str) -> Result<T> {
    map.get(key)
        .cloned()
        .ok_or_else(|| StoreError::NotFound(format!("{} {}", kind, key)))
}

#[async_trait]
impl TokenStore for InMemoryStore {
    async fn get_user(&self, id: &str) -> Result<User> {
        lookup(&self.read()?.users, id, "user")
    }

    async fn get_client(&self, id: &str) -> Result<ServiceClient> {
        lookup(&self.read()?.clients, id, "client")
    }

    async fn get_authorization_code(&self, code: &str) -> Result<AuthorizationCode> {
        lookup(&self.read()?.codes, code, "authorization code")
    }

    async fn create_authorization_code(&self, row: AuthorizationCode) -> Result<()> {
        let key = row.code.clone();
        insert(&mut self.write()?.codes, key, row, "authorization code")
    }

    async fn get_access_token(&self, token: &str) -> Result<AccessToken> {
        lookup(&self.read()?.access_tokens, token, "access token")
    }

    async fn create_access_token(&self, row: AccessToken) -> Result<()> {
        let key = row.token.clone();
        insert(&mut self.write()?.access_tokens, key, row, "access token")
    }

    async fn get_refresh_token(&self, token: &str) -> Result<RefreshToken> {
        lookup(&self.read()?.refresh_tokens, token, "refresh token")
    }

    async fn create_refresh_token(&self, row: RefreshToken) -> Result<()> {
        let key = row.token.clone();
        insert(&mut self.write()?.refresh_tokens, key, row, "refresh token")
    }
}
