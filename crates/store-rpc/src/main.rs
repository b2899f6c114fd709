//! store-server: the OhAuth token store behind persistent RPC streams.

use std::sync::Arc;

use clap::Parser;
use store_rpc::{shutdown_signal, StoreServer};
use token_store::InMemoryStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "store-server")]
#[command(about = "In-memory token store for the OhAuth services")]
struct Cli {
    /// Port to listen on
    #[arg(long, default_value_t = 3306, env = "STORE_PORT")]
    port: u16,

    /// Address to bind to
    #[arg(long, default_value = "127.0.0.1", env = "STORE_BIND")]
    bind: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "store_server=info,store_rpc=info,token_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let store = InMemoryStore::with_fixtures()?;
    let listener = StoreServer::bind(&format!("{}:{}", cli.bind, cli.port)).await?;

    StoreServer::new(Arc::new(store))
        .serve(listener, shutdown_signal())
        .await;

    tracing::info!("Store server shut down");
    Ok(())
}
