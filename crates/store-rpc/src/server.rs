//! Accept loop for the store RPC server.

use std::future::Future;
use std::io;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinSet;
use token_store::TokenStore;
use tracing::{debug, info, warn};

use crate::connection::serve_connection;

/// Serves a [`TokenStore`] to remote [`crate::StoreClient`]s.
pub struct StoreServer {
    store: Arc<dyn TokenStore>,
}

impl StoreServer {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Bind to an address and return the TCP listener.
    pub async fn bind(listen_addr: &str) -> io::Result<TcpListener> {
        let listener = TcpListener::bind(listen_addr).await?;
        info!("Store server listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    /// Accept connections until `shutdown` resolves, then drop every open
    /// stream.
    pub async fn serve(self, listener: TcpListener, shutdown: impl Future<Output = ()>) {
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down store server ({} open streams)", connections.len());
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        debug!("Accepted connection from {}", addr);
                        connections.spawn(serve_connection(self.store.clone(), stream, addr));
                    }
                    Err(e) => warn!("Failed to accept connection: {}", e),
                },
                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = finished {
                        if e.is_panic() {
                            warn!("Connection task panicked: {}", e);
                        }
                    }
                }
            }
        }

        connections.shutdown().await;
    }
}
