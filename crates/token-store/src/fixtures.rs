//! Seed data for a fresh store.

use crate::error::Result;
use crate::memory::InMemoryStore;
use crate::model::{ServiceClient, User};

/// The one scope this system hands out
pub const PROFILE_VIEW_SCOPE: &str = "profile:view";

/// Where the CLI listens for authorization-code redirects
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:7777/";

pub fn users() -> Vec<User> {
    vec![
        User {
            id: "0".to_string(),
            password: "password".to_string(),
            name: "Taro".to_string(),
            age: 20,
            profile: "Hello🎈".to_string(),
        },
        User {
            id: "1".to_string(),
            password: "password".to_string(),
            name: "Hanako".to_string(),
            age: 20,
            profile: "Hello🌸".to_string(),
        },
    ]
}

pub fn service_clients() -> Vec<ServiceClient> {
    vec![
        ServiceClient {
            id: "500".to_string(),
            secret: "secret".to_string(),
            name: "ABC-App".to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scope: PROFILE_VIEW_SCOPE.to_string(),
        },
        ServiceClient {
            id: "501".to_string(),
            secret: "secret".to_string(),
            name: "ZZZ-App".to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scope: PROFILE_VIEW_SCOPE.to_string(),
        },
    ]
}

/// Install the fixture users and clients into `store`
pub fn seed_fixtures(store: &InMemoryStore) -> Result<()> {
    for user in users() {
        store.insert_user(user)?;
    }
    for client in service_clients() {
        store.insert_client(client)?;
    }
    tracing::debug!("Seeded fixture users and service clients");
    Ok(())
}
