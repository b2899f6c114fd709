//! ohauth: interactive OhAuth relying-party client

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use session_cli::{
    Command, HttpResourceEndpoint, HttpTokenEndpoint, RedirectReceiver, Session, SessionConfig,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "ohauth")]
#[command(about = "Interactive OhAuth client")]
struct Cli {
    /// Authorization server base URL
    #[arg(long, default_value = "http://localhost:3001", env = "AUTH_SERVER_URL")]
    auth_url: String,

    /// Resource server base URL
    #[arg(long, default_value = "http://localhost:3002", env = "RESOURCE_SERVER_URL")]
    resource_url: String,

    /// Sign-in UI base URL
    #[arg(long, default_value = "http://localhost:3000", env = "UI_SERVER_URL")]
    ui_url: String,

    /// Local port the sign-in UI redirects to
    #[arg(long, default_value_t = 7777, env = "REDIRECT_PORT")]
    redirect_port: u16,

    /// Client secret shared by every site
    #[arg(long, default_value = "secret", env = "CLIENT_SECRET")]
    client_secret: String,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 10)]
    request_timeout: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout belongs to the prompt
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "session_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(cli.request_timeout))
        .build()?;
    let receiver = RedirectReceiver::new(SocketAddr::from(([127, 0, 0, 1], cli.redirect_port)));
    let session = Session::new(
        SessionConfig {
            client_secret: cli.client_secret,
            ui_url: cli.ui_url,
            ..SessionConfig::default()
        },
        Arc::new(receiver),
        Arc::new(HttpTokenEndpoint::new(http.clone(), cli.auth_url)),
        Arc::new(HttpResourceEndpoint::new(http, cli.resource_url)),
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nPlease enter the command... \n> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                println!("Error!!: {}", e);
                continue;
            }
        };

        // Ctrl-C while a command runs cancels that command only
        let cancel = CancellationToken::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };
        let result = session.execute(command, &cancel).await;
        watcher.abort();

        match result {
            Ok(output) => println!("{}", output),
            Err(e) => println!("Error!!: {}", e),
        }
    }

    tracing::info!("Bye");
    Ok(())
}
