//! The interactive relying-party session.
//!
//! Tracks which site the user is browsing and the tokens issued for each
//! site. All commands run under one async lock, so a login waiting for its
//! authorization code blocks every other command until it finishes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::command::{Command, Output, Site};
use crate::endpoint::{ClientCredentials, CodeSource, ResourceEndpoint, TokenEndpoint, TokenGrant};
use crate::error::{Result, SessionError};

/// How long login waits for the redirect before giving up
pub const LOGIN_TIMEOUT: Duration = Duration::from_secs(3 * 60);

/// The relying parties the session can act as
pub fn default_sites() -> Vec<Site> {
    vec![Site::new("500", "ABC-App"), Site::new("501", "ZZZ-App")]
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub sites: Vec<Site>,
    /// Shared secret used for every site at the token endpoint
    pub client_secret: String,
    pub login_timeout: Duration,
    /// Where the user goes to sign in, e.g. `http://localhost:3000`
    pub ui_url: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sites: default_sites(),
            client_secret: "secret".to_string(),
            login_timeout: LOGIN_TIMEOUT,
            ui_url: "http://localhost:3000".to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    current_site: Option<String>,
    access_tokens: HashMap<String, String>,
    refresh_tokens: HashMap<String, String>,
}

impl SessionState {
    fn require_site(&self) -> Result<String> {
        self.current_site.clone().ok_or(SessionError::NoSite)
    }

    fn store_grant(&mut self, site: &str, grant: TokenGrant) -> String {
        self.refresh_tokens
            .insert(site.to_string(), grant.refresh_token);
        self.access_tokens
            .insert(site.to_string(), grant.access_token.clone());
        grant.access_token
    }
}

pub struct Session {
    config: SessionConfig,
    state: Mutex<SessionState>,
    codes: Arc<dyn CodeSource>,
    token_endpoint: Arc<dyn TokenEndpoint>,
    resources: Arc<dyn ResourceEndpoint>,
}

impl Session {
    pub fn new(
        config: SessionConfig,
        codes: Arc<dyn CodeSource>,
        token_endpoint: Arc<dyn TokenEndpoint>,
        resources: Arc<dyn ResourceEndpoint>,
    ) -> Self {
        Self {
            config,
            state: Mutex::new(SessionState::default()),
            codes,
            token_endpoint,
            resources,
        }
    }

    /// Run one command. Only `login` observes `cancel`.
    pub async fn execute(&self, command: Command, cancel: &CancellationToken) -> Result<Output> {
        debug!("Executing {:?}", command);
        match command {
            Command::Help => Ok(Output::Help),
            Command::Status => self.status().await,
            Command::ShowSites => Ok(Output::Sites(self.config.sites.clone())),
            Command::SwitchSite(id) => self.switch_site(&id).await,
            Command::Login => self.login(cancel).await,
            Command::Logout => self.logout().await,
            Command::ViewProfile => self.view_profile().await,
        }
    }

    async fn status(&self) -> Result<Output> {
        let state = self.state.lock().await;
        let logged_in = self
            .config
            .sites
            .iter()
            .filter(|site| state.access_tokens.contains_key(&site.id))
            .map(|site| site.id.clone())
            .collect();
        Ok(Output::Status {
            logged_in,
            current: state.current_site.clone(),
        })
    }

    async fn switch_site(&self, id: &str) -> Result<Output> {
        let site = self
            .config
            .sites
            .iter()
            .find(|site| site.id == id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownSite(id.to_string()))?;

        self.state.lock().await.current_site = Some(site.id.clone());
        Ok(Output::Switched(site))
    }

    async fn login(&self, cancel: &CancellationToken) -> Result<Output> {
        // Held until the tokens are stored
        let mut state = self.state.lock().await;
        let site = state.require_site()?;
        if state.access_tokens.contains_key(&site) {
            return Err(SessionError::AlreadyLogin(site));
        }

        info!(
            "Open {}/v1/auth?client_id={} in your browser to log in",
            self.config.ui_url.trim_end_matches('/'),
            site
        );

        let code = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SessionError::Canceled),
            received = tokio::time::timeout(self.config.login_timeout, self.codes.receive_code(cancel)) => {
                match received {
                    Ok(code) => code?,
                    Err(_) => return Err(SessionError::Timeout),
                }
            }
        };
        info!("Received authorization code");

        let grant = self
            .token_endpoint
            .exchange_code(&self.credentials(&site), &code)
            .await?;
        info!("Received access token");
        state.store_grant(&site, grant);

        Ok(Output::LoggedIn(site))
    }

    async fn logout(&self) -> Result<Output> {
        let mut state = self.state.lock().await;
        let site = state.require_site()?;
        // The refresh token stays, only a new login restores access
        state.access_tokens.remove(&site);
        Ok(Output::LoggedOut(site))
    }

    async fn view_profile(&self) -> Result<Output> {
        let mut state = self.state.lock().await;
        let site = state.require_site()?;
        let access_token = state
            .access_tokens
            .get(&site)
            .cloned()
            .ok_or_else(|| SessionError::TokenNotFound(site.clone()))?;

        match self.resources.view_profile(&access_token).await {
            Ok(profile) => Ok(Output::Profile(profile)),
            Err(SessionError::AccessTokenExpired) => {
                info!("Access token expired, refreshing");
                let refresh_token = state
                    .refresh_tokens
                    .get(&site)
                    .cloned()
                    .ok_or_else(|| SessionError::TokenNotFound(site.clone()))?;
                let grant = self
                    .token_endpoint
                    .refresh(&self.credentials(&site), &refresh_token)
                    .await?;
                let access_token = state.store_grant(&site, grant);

                let profile = self.resources.view_profile(&access_token).await?;
                Ok(Output::Profile(profile))
            }
            Err(e) => Err(e),
        }
    }

    fn credentials(&self, site: &str) -> ClientCredentials {
        ClientCredentials {
            client_id: site.to_string(),
            client_secret: self.config.client_secret.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Profile;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    // ========================================================================
    // Fakes
    // ========================================================================

    enum Codes {
        Immediate(&'static str),
        Never,
    }

    #[async_trait]
    impl CodeSource for Codes {
        async fn receive_code(&self, _cancel: &CancellationToken) -> Result<String> {
            match self {
                Codes::Immediate(code) => Ok(code.to_string()),
                Codes::Never => std::future::pending().await,
            }
        }
    }

    /// Exchanges always hand out `initial`, refreshes hand out `refreshed`
    struct Tokens {
        initial: &'static str,
        refreshed: &'static str,
        refreshes: StdMutex<Vec<String>>,
    }

    impl Tokens {
        fn new(initial: &'static str, refreshed: &'static str) -> Self {
            Self {
                initial,
                refreshed,
                refreshes: StdMutex::new(Vec::new()),
            }
        }

        fn grant(access: &str) -> TokenGrant {
            TokenGrant {
                access_token: access.to_string(),
                refresh_token: format!("{access}-refresh"),
                expires_in: 3600,
            }
        }
    }

    #[async_trait]
    impl TokenEndpoint for Tokens {
        async fn exchange_code(&self, client: &ClientCredentials, code: &str) -> Result<TokenGrant> {
            assert_eq!(client.client_secret, "secret");
            assert_eq!(code, "the-code");
            Ok(Self::grant(self.initial))
        }

        async fn refresh(&self, _client: &ClientCredentials, refresh_token: &str) -> Result<TokenGrant> {
            self.refreshes.lock().unwrap().push(refresh_token.to_string());
            Ok(Self::grant(self.refreshed))
        }
    }

    /// `stale` is expired, `broken` fails outright, anything else works
    #[derive(Default)]
    struct Resources {
        seen: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl ResourceEndpoint for Resources {
        async fn view_profile(&self, access_token: &str) -> Result<Profile> {
            self.seen.lock().unwrap().push(access_token.to_string());
            match access_token {
                "stale" => Err(SessionError::AccessTokenExpired),
                "broken" => Err(SessionError::Http {
                    status: 500,
                    message: "Internal Server Error".to_string(),
                }),
                _ => Ok(Profile {
                    user_id: "1".to_string(),
                    name: "Hanako".to_string(),
                    age: 20,
                    profile: "Hello🌸".to_string(),
                }),
            }
        }
    }

    struct Fixture {
        session: Session,
        tokens: Arc<Tokens>,
        resources: Arc<Resources>,
    }

    fn fixture(codes: Codes, tokens: Tokens) -> Fixture {
        fixture_with(codes, tokens, SessionConfig::default())
    }

    fn fixture_with(codes: Codes, tokens: Tokens, config: SessionConfig) -> Fixture {
        let tokens = Arc::new(tokens);
        let resources = Arc::new(Resources::default());
        let session = Session::new(config, Arc::new(codes), tokens.clone(), resources.clone());
        Fixture {
            session,
            tokens,
            resources,
        }
    }

    async fn run(session: &Session, command: Command) -> Result<Output> {
        session.execute(command, &CancellationToken::new()).await
    }

    async fn logged_in(fixture: &Fixture) {
        run(&fixture.session, Command::SwitchSite("501".to_string()))
            .await
            .unwrap();
        let output = run(&fixture.session, Command::Login).await.unwrap();
        assert_eq!(output, Output::LoggedIn("501".to_string()));
    }

    // ========================================================================
    // Tests
    // ========================================================================

    #[tokio::test]
    async fn test_commands_need_a_site() {
        let fixture = fixture(Codes::Immediate("the-code"), Tokens::new("live", "fresh"));
        for command in [Command::Login, Command::Logout, Command::ViewProfile] {
            let result = run(&fixture.session, command).await;
            assert!(matches!(result, Err(SessionError::NoSite)));
        }
    }

    #[tokio::test]
    async fn test_switch_to_unknown_site() {
        let fixture = fixture(Codes::Immediate("the-code"), Tokens::new("live", "fresh"));
        let result = run(&fixture.session, Command::SwitchSite("999".to_string())).await;
        assert!(matches!(result, Err(SessionError::UnknownSite(id)) if id == "999"));

        let output = run(&fixture.session, Command::Status).await.unwrap();
        assert_eq!(
            output,
            Output::Status {
                logged_in: vec![],
                current: None
            }
        );
    }

    #[tokio::test]
    async fn test_login_then_view_profile() {
        let fixture = fixture(Codes::Immediate("the-code"), Tokens::new("live", "fresh"));
        logged_in(&fixture).await;

        let output = run(&fixture.session, Command::Status).await.unwrap();
        assert_eq!(
            output,
            Output::Status {
                logged_in: vec!["501".to_string()],
                current: Some("501".to_string())
            }
        );

        let Output::Profile(profile) = run(&fixture.session, Command::ViewProfile).await.unwrap() else {
            panic!("expected a profile");
        };
        assert_eq!(profile.name, "Hanako");
        assert!(fixture.tokens.refreshes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_login_twice_is_rejected() {
        let fixture = fixture(Codes::Immediate("the-code"), Tokens::new("live", "fresh"));
        logged_in(&fixture).await;

        let result = run(&fixture.session, Command::Login).await;
        assert!(matches!(result, Err(SessionError::AlreadyLogin(id)) if id == "501"));
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_once() {
        let fixture = fixture(Codes::Immediate("the-code"), Tokens::new("stale", "fresh"));
        logged_in(&fixture).await;

        let output = run(&fixture.session, Command::ViewProfile).await.unwrap();
        assert!(matches!(output, Output::Profile(_)));

        // Retried with the new token, not the old one
        assert_eq!(*fixture.resources.seen.lock().unwrap(), vec!["stale", "fresh"]);
        assert_eq!(*fixture.tokens.refreshes.lock().unwrap(), vec!["stale-refresh"]);

        // The new token is kept
        run(&fixture.session, Command::ViewProfile).await.unwrap();
        assert_eq!(
            *fixture.resources.seen.lock().unwrap(),
            vec!["stale", "fresh", "fresh"]
        );
    }

    #[tokio::test]
    async fn test_refresh_is_not_repeated() {
        let fixture = fixture(Codes::Immediate("the-code"), Tokens::new("stale", "stale"));
        logged_in(&fixture).await;

        let result = run(&fixture.session, Command::ViewProfile).await;
        assert!(matches!(result, Err(SessionError::AccessTokenExpired)));
        assert_eq!(fixture.resources.seen.lock().unwrap().len(), 2);
        assert_eq!(fixture.tokens.refreshes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let fixture = fixture(Codes::Immediate("the-code"), Tokens::new("broken", "fresh"));
        logged_in(&fixture).await;

        let result = run(&fixture.session, Command::ViewProfile).await;
        assert!(matches!(result, Err(SessionError::Http { status: 500, .. })));
        assert_eq!(fixture.resources.seen.lock().unwrap().len(), 1);
        assert!(fixture.tokens.refreshes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_logout_keeps_refresh_token() {
        let fixture = fixture(Codes::Immediate("the-code"), Tokens::new("live", "fresh"));
        logged_in(&fixture).await;

        let output = run(&fixture.session, Command::Logout).await.unwrap();
        assert_eq!(output, Output::LoggedOut("501".to_string()));

        let result = run(&fixture.session, Command::ViewProfile).await;
        assert!(matches!(result, Err(SessionError::TokenNotFound(id)) if id == "501"));

        let state = fixture.session.state.lock().await;
        assert!(!state.access_tokens.contains_key("501"));
        assert_eq!(state.refresh_tokens.get("501").unwrap(), "live-refresh");
    }

    #[tokio::test]
    async fn test_login_can_be_canceled() {
        let fixture = fixture(Codes::Never, Tokens::new("live", "fresh"));
        run(&fixture.session, Command::SwitchSite("500".to_string()))
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = fixture.session.execute(Command::Login, &cancel).await;
        assert!(matches!(result, Err(SessionError::Canceled)));

        // Nothing was stored, so login is still possible
        let state = fixture.session.state.lock().await;
        assert!(state.access_tokens.is_empty());
    }

    #[tokio::test]
    async fn test_login_times_out() {
        let config = SessionConfig {
            login_timeout: Duration::from_millis(20),
            ..SessionConfig::default()
        };
        let fixture = fixture_with(Codes::Never, Tokens::new("live", "fresh"), config);
        run(&fixture.session, Command::SwitchSite("500".to_string()))
            .await
            .unwrap();

        let result = run(&fixture.session, Command::Login).await;
        assert!(matches!(result, Err(SessionError::Timeout)));
    }
}
