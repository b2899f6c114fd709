//! Bearer token verification against the token store.

use std::sync::Arc;

use chrono::Utc;
use token_store::{AccessToken, TokenStore, User};

use crate::error::ResourceError;

pub type Result<T> = std::result::Result<T, ResourceError>;

/// Resolves access tokens and the users behind them.
pub struct ResourceVerifier {
    store: Arc<dyn TokenStore>,
}

impl ResourceVerifier {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Look up `token` and reject it once expired. Unknown tokens surface
    /// as a store `NotFound`.
    pub async fn verify_access_token(&self, token: &str) -> Result<AccessToken> {
        let row = self.store.get_access_token(token).await?;
        if row.is_expired(Utc::now()) {
            return Err(ResourceError::AccessTokenExpired);
        }
        Ok(row)
    }

    pub async fn view_user_profile(&self, user_id: &str) -> Result<User> {
        Ok(self.store.get_user(user_id).await?)
    }
}

/// Exact scope match; this system has no scope hierarchy.
pub fn require_scope(token: &AccessToken, required: &str) -> Result<()> {
    if token.scope != required {
        return Err(ResourceError::TokenInadequateScope {
            required: required.to_string(),
            actual: token.scope.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use token_store::{InMemoryStore, PROFILE_VIEW_SCOPE};

    fn token(token: &str, expires_in: Duration, scope: &str) -> AccessToken {
        AccessToken {
            token: token.to_string(),
            user_id: "1".to_string(),
            client_id: "501".to_string(),
            expires_at: Utc::now() + expires_in,
            scope: scope.to_string(),
        }
    }

    async fn verifier() -> ResourceVerifier {
        let store = InMemoryStore::with_fixtures().unwrap();
        store
            .create_access_token(token("live", Duration::days(3), PROFILE_VIEW_SCOPE))
            .await
            .unwrap();
        store
            .create_access_token(token("dead", Duration::seconds(-1), PROFILE_VIEW_SCOPE))
            .await
            .unwrap();
        ResourceVerifier::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_verify_access_token() {
        let verifier = verifier().await;

        assert_eq!(verifier.verify_access_token("live").await.unwrap().user_id, "1");
        assert!(matches!(
            verifier.verify_access_token("dead").await,
            Err(ResourceError::AccessTokenExpired)
        ));
        assert!(verifier.verify_access_token("missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_view_user_profile() {
        let verifier = verifier().await;
        assert_eq!(verifier.view_user_profile("1").await.unwrap().name, "Hanako");
        assert!(verifier.view_user_profile("9").await.unwrap_err().is_not_found());
    }

    #[test]
    fn test_require_scope_is_exact() {
        let row = token("t", Duration::days(1), PROFILE_VIEW_SCOPE);
        assert!(require_scope(&row, "profile:view").is_ok());
        assert!(matches!(
            require_scope(&row, "profile:edit"),
            Err(ResourceError::TokenInadequateScope { .. })
        ));

        let broader = token("t", Duration::days(1), "profile:view profile:edit");
        assert!(require_scope(&broader, "profile:view").is_err());
    }
}
