//! resource-service: the OhAuth resource server binary

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use resource_service::{router, AppState, ResourceVerifier};
use store_rpc::{shutdown_signal, ClientConfig, StoreClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "resource-service")]
#[command(about = "OhAuth resource server")]
struct Cli {
    /// Port to listen on
    #[arg(long, default_value_t = 3002, env = "RESOURCE_PORT")]
    port: u16,

    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0", env = "RESOURCE_BIND")]
    bind: String,

    /// Store server URL, e.g. ws://127.0.0.1:3306
    #[arg(long, env = "STORE_URL")]
    store_url: String,

    /// Seconds a store stream may sit idle before it is health-checked
    #[arg(long, default_value_t = 10, env = "STORE_READ_IDLE_TIMEOUT")]
    store_read_idle_timeout: u64,

    /// Seconds a health-check ping may wait for its pong
    #[arg(long, default_value_t = 15, env = "STORE_PING_TIMEOUT")]
    store_ping_timeout: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resource_service=info,store_rpc=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let store = StoreClient::new(ClientConfig {
        read_idle_timeout: Duration::from_secs(cli.store_read_idle_timeout),
        ping_timeout: Duration::from_secs(cli.store_ping_timeout),
        ..ClientConfig::new(cli.store_url.clone())
    })?;
    store.wait_ready().await?;
    tracing::info!("Using store at {}", cli.store_url);

    let app = router(Arc::new(AppState {
        verifier: ResourceVerifier::new(Arc::new(store)),
    }));

    let addr: SocketAddr = format!("{}:{}", cli.bind, cli.port).parse()?;
    tracing::info!("Starting resource-service on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Resource service shut down");
    Ok(())
}
