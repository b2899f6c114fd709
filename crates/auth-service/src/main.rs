//! auth-service: the OhAuth authorization server binary

use std::net::SocketAddr;
use std::sync::Arc;

use auth_service::{router, AppState, Config, TokenService};
use clap::Parser;
use store_rpc::{shutdown_signal, StoreClient};
use token_store::{InMemoryStore, TokenStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "auth-service")]
#[command(about = "OhAuth authorization server")]
struct Cli {
    /// Port to listen on
    #[arg(long, default_value_t = 3001, env = "AUTH_PORT")]
    port: u16,

    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0", env = "AUTH_BIND")]
    bind: String,

    /// Path to config directory
    #[arg(long, default_value = "./config", env = "AUTH_CONFIG_PATH")]
    config_path: String,

    /// Store server URL, overrides `store_url` from config.json
    #[arg(long, env = "STORE_URL")]
    store_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auth_service=info,store_rpc=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config_path)?;

    let store: Arc<dyn TokenStore> = match cli.store_url.as_deref().or(config.store_url.as_deref()) {
        Some(url) => {
            let client = StoreClient::new(config.store.client_config(url))?;
            client.wait_ready().await?;
            tracing::info!("Using store at {}", url);
            Arc::new(client)
        }
        None => {
            tracing::info!("No store_url configured, using an in-process store");
            Arc::new(InMemoryStore::with_fixtures()?)
        }
    };

    let service = TokenService::new(store, config.jwt_secret.clone());
    let app = router(Arc::new(AppState { service, config }));

    let addr: SocketAddr = format!("{}:{}", cli.bind, cli.port).parse()?;
    tracing::info!("Starting auth-service on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Auth service shut down");
    Ok(())
}
