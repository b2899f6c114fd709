//! Local redirect listener for the authorization code.
//!
//! The sign-in UI redirects the browser to `http://localhost:<port>/?code=…`.
//! Each login binds a fresh listener, accepts exactly one code and shuts the
//! listener down again when the wait ends.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::endpoint::CodeSource;
use crate::error::{Result, SessionError};

type CodeSlot = Arc<Mutex<Option<oneshot::Sender<Result<String>>>>>;

#[derive(Debug, Deserialize)]
struct CodeQuery {
    #[serde(default)]
    code: String,
}

async fn deliver_code(State(slot): State<CodeSlot>, Query(query): Query<CodeQuery>) -> (StatusCode, &'static str) {
    let sender = slot.lock().ok().and_then(|mut slot| slot.take());
    let Some(sender) = sender else {
        debug!("Ignoring repeated redirect");
        return (StatusCode::CONFLICT, "authorization code was already received");
    };

    if query.code.is_empty() {
        let _ = sender.send(Err(SessionError::Callback("code is empty".to_string())));
        return (StatusCode::BAD_REQUEST, "code is empty");
    }

    let _ = sender.send(Ok(query.code));
    (StatusCode::OK, "Login succeeded. You can close this window.")
}

async fn status() -> StatusCode {
    StatusCode::OK
}

/// Binds a listener per login on a fixed address
#[derive(Debug, Clone)]
pub struct RedirectReceiver {
    addr: SocketAddr,
}

impl RedirectReceiver {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// Start listening. The listener lives as long as the returned value.
    pub async fn listen(&self) -> Result<PendingCode> {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|e| SessionError::Callback(format!("cannot listen on {}: {}", self.addr, e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| SessionError::Callback(e.to_string()))?;

        let (tx, rx) = oneshot::channel();
        let slot: CodeSlot = Arc::new(Mutex::new(Some(tx)));
        let app = Router::new()
            .route("/", get(deliver_code))
            .route("/status", get(status))
            .with_state(slot);

        let shutdown = CancellationToken::new();
        let stop = shutdown.clone();
        tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { stop.cancelled().await })
                .await;
            if let Err(e) = result {
                warn!("Redirect listener failed: {}", e);
            }
        });
        info!("Waiting for the authorization code on {}", local_addr);

        Ok(PendingCode {
            local_addr,
            rx,
            _shutdown: shutdown.drop_guard(),
        })
    }
}

#[async_trait]
impl CodeSource for RedirectReceiver {
    async fn receive_code(&self, cancel: &CancellationToken) -> Result<String> {
        self.listen().await?.wait(cancel).await
    }
}

/// A running listener waiting for its one code
pub struct PendingCode {
    local_addr: SocketAddr,
    rx: oneshot::Receiver<Result<String>>,
    _shutdown: DropGuard,
}

impl PendingCode {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn wait(self, cancel: &CancellationToken) -> Result<String> {
        let PendingCode { rx, _shutdown, .. } = self;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SessionError::Canceled),
            received = rx => received.unwrap_or_else(|_| {
                Err(SessionError::Callback("redirect listener stopped".to_string()))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn pending() -> (PendingCode, String) {
        let receiver = RedirectReceiver::new(SocketAddr::from(([127, 0, 0, 1], 0)));
        let pending = receiver.listen().await.unwrap();
        let base = format!("http://{}", pending.local_addr());
        (pending, base)
    }

    #[tokio::test]
    async fn test_delivers_code() {
        let (pending, base) = pending().await;
        let client = reqwest::Client::new();

        let response = client.get(format!("{base}/?code=abc123")).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let response = client.get(format!("{base}/?code=again")).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::CONFLICT);

        let code = pending.wait(&CancellationToken::new()).await.unwrap();
        assert_eq!(code, "abc123");
    }

    #[tokio::test]
    async fn test_empty_code_is_rejected() {
        let (pending, base) = pending().await;

        let response = reqwest::get(format!("{base}/?code=")).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

        let result = pending.wait(&CancellationToken::new()).await;
        assert!(matches!(result, Err(SessionError::Callback(_))));
    }

    #[tokio::test]
    async fn test_status_and_methods() {
        let (_pending, base) = pending().await;
        let client = reqwest::Client::new();

        let response = client.get(format!("{base}/status")).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let response = client.post(format!("{base}/?code=abc")).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_wait_can_be_canceled() {
        let (pending, _base) = pending().await;
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = pending.wait(&cancel).await;
        assert!(matches!(result, Err(SessionError::Canceled)));
    }

    #[tokio::test]
    async fn test_listener_closes_after_wait() {
        let (pending, base) = pending().await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let _ = pending.wait(&cancel).await;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        // Graceful shutdown finishes shortly after the guard drops
        let mut closed = false;
        for _ in 0..50 {
            if client.get(format!("{base}/status")).send().await.is_err() {
                closed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(closed);
    }
}
