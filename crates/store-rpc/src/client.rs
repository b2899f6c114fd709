//! Client side of the store streams.
//!
//! [`StoreClient`] keeps one WebSocket per operation kind, opened on first
//! use and reused afterwards. Each stream sits behind its own async mutex, so
//! calls of one kind queue up while calls of different kinds run in
//! parallel. A background task pings streams that have been idle for the
//! read-idle window and drops the ones that do not answer.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use futures::{FutureExt, SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use token_store::{
    AccessToken, AuthorizationCode, RefreshToken, Result, ServiceClient, StoreError, TokenStore, User,
};
use tracing::{debug, info, warn};
use url::Url;

use crate::backoff::{calculate_backoff, ReconnectConfig};
use crate::protocol::{Operation, Request, Response, PING_PATH};

type ClientStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection settings for a [`StoreClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the store server, e.g. `ws://127.0.0.1:3306`
    pub url: String,
    /// A stream idle this long gets a health-check ping
    pub read_idle_timeout: Duration,
    /// How long a health-check ping may wait for its pong
    pub ping_timeout: Duration,
    /// How long a request may wait for its response
    pub request_timeout: Duration,
    pub reconnect: ReconnectConfig,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            read_idle_timeout: Duration::from_secs(10),
            ping_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(5),
            reconnect: ReconnectConfig::default(),
        }
    }
}

struct ChannelState {
    ws: Option<ClientStream>,
    last_used: Instant,
}

/// One operation kind's stream.
struct Channel {
    operation: Operation,
    url: String,
    state: Mutex<ChannelState>,
}

/// Why a request/response exchange failed.
#[derive(Debug, Error)]
enum ExchangeError {
    /// The request never left; safe to resend
    #[error("send failed: {0}")]
    Send(WsError),
    /// The request was sent but no usable response came back
    #[error("{0}")]
    Recv(String),
    #[error("timed out waiting for response")]
    Timeout,
    #[error("malformed response: {0}")]
    Decode(serde_json::Error),
}

impl ExchangeError {
    fn into_store_error(self, what: &str) -> StoreError {
        match self {
            ExchangeError::Decode(_) => StoreError::Internal(format!("{what}: {self}")),
            _ => StoreError::Unavailable(format!("{what}: {self}")),
        }
    }
}

/// A [`TokenStore`] living in another process.
pub struct StoreClient {
    ping_url: String,
    config: Arc<ClientConfig>,
    channels: Arc<Vec<Channel>>,
    keepalive: JoinHandle<()>,
}

impl StoreClient {
    /// Validate `config` and set up the client.
    ///
    /// Fails on an unusable URL or when called outside a tokio runtime.
    /// The server is not contacted; see [`StoreClient::wait_ready`].
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base = Url::parse(&config.url)
            .map_err(|e| StoreError::Internal(format!("invalid store url {:?}: {}", config.url, e)))?;
        if base.scheme() != "ws" {
            return Err(StoreError::Internal(format!(
                "store url must use ws://, got {}://",
                base.scheme()
            )));
        }
        if config.read_idle_timeout.is_zero() {
            return Err(StoreError::Internal("read idle timeout must be non-zero".to_string()));
        }
        let runtime = Handle::try_current()
            .map_err(|e| StoreError::Internal(format!("store client needs a tokio runtime: {e}")))?;

        let join = |path: &str| {
            base.join(path)
                .map(String::from)
                .map_err(|e| StoreError::Internal(format!("invalid store url {:?}: {}", config.url, e)))
        };

        let ping_url = join(PING_PATH)?;
        let channels = Operation::ALL
            .into_iter()
            .map(|operation| {
                Ok(Channel {
                    operation,
                    url: join(&operation.path())?,
                    state: Mutex::new(ChannelState {
                        ws: None,
                        last_used: Instant::now(),
                    }),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let channels = Arc::new(channels);
        let config = Arc::new(config);
        let keepalive = runtime.spawn(keepalive(Arc::downgrade(&channels), config.clone()));

        Ok(Self {
            ping_url,
            config,
            channels,
            keepalive,
        })
    }

    /// One-shot connectivity probe over its own connection.
    pub async fn ping(&self) -> Result<()> {
        let mut ws = tokio::time::timeout(self.config.request_timeout, connect_async(self.ping_url.as_str()))
            .await
            .map_err(|_| StoreError::Unavailable("ping: connect timed out".to_string()))?
            .map_err(|e| StoreError::Unavailable(format!("ping: {e}")))?
            .0;

        let payload = Request::Ping
            .to_json()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let response = exchange(&mut ws, &payload, self.config.request_timeout)
            .await
            .map_err(|e| e.into_store_error("ping"))?;
        let _ = ws.close(None).await;

        match response.into_result()? {
            Response::Pong => Ok(()),
            other => Err(StoreError::Internal(format!(
                "unexpected {} response to ping",
                other.kind()
            ))),
        }
    }

    /// Ping until the server answers, backing off between attempts.
    pub async fn wait_ready(&self) -> Result<()> {
        let mut attempts = 0;
        loop {
            match self.ping().await {
                Ok(()) => {
                    info!("Store at {} is ready", self.config.url);
                    return Ok(());
                }
                Err(e) => {
                    attempts += 1;
                    if self.config.reconnect.exhausted(attempts) {
                        return Err(e);
                    }
                    let delay = calculate_backoff(attempts, &self.config.reconnect);
                    debug!("Store not ready ({}), retrying in {:?}", e, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Send `request` on its operation's stream and wait for the answer.
    async fn call(&self, request: Request) -> Result<Response> {
        let operation = request
            .operation()
            .ok_or_else(|| StoreError::Internal("ping has no stream".to_string()))?;
        let payload = request
            .to_json()
            .map_err(|e| StoreError::Internal(format!("{operation}: {e}")))?;
        let channel = &self.channels[operation.index()];

        let mut state = channel.state.lock().await;
        let mut resent = false;
        loop {
            let pooled = state.ws.take().and_then(|mut ws| {
                if still_open(&mut ws) {
                    Some(ws)
                } else {
                    debug!("Reopening stale {} stream", operation);
                    None
                }
            });
            let mut ws = match pooled {
                Some(ws) => ws,
                None => self.connect(channel).await?,
            };

            match exchange(&mut ws, &payload, self.config.request_timeout).await {
                Ok(response) => {
                    state.ws = Some(ws);
                    state.last_used = Instant::now();
                    return response.into_result();
                }
                Err(ExchangeError::Send(e)) if !resent => {
                    warn!("Send on {} stream failed ({}), resending on a new stream", operation, e);
                    resent = true;
                }
                Err(e) => {
                    warn!("Dropping {} stream: {}", operation, e);
                    return Err(e.into_store_error(operation.name()));
                }
            }
        }
    }

    /// Open `channel`'s stream, backing off between failed attempts.
    async fn connect(&self, channel: &Channel) -> Result<ClientStream> {
        let reconnect = &self.config.reconnect;
        let mut attempts = 0;
        loop {
            let attempt = tokio::time::timeout(self.config.request_timeout, connect_async(channel.url.as_str())).await;
            let error = match attempt {
                Ok(Ok((ws, _))) => {
                    debug!("Opened {} stream", channel.operation);
                    return Ok(ws);
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => "connect timed out".to_string(),
            };

            attempts += 1;
            if reconnect.exhausted(attempts) {
                return Err(StoreError::Unavailable(format!(
                    "{}: giving up after {} attempts: {}",
                    channel.operation, attempts, error
                )));
            }
            let delay = calculate_backoff(attempts, reconnect);
            debug!(
                "Connecting {} stream failed ({}), retry {} in {:?}",
                channel.operation, error, attempts, delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}

impl Drop for StoreClient {
    fn drop(&mut self) {
        self.keepalive.abort();
    }
}

fn unexpected(operation: Operation, response: &Response) -> StoreError {
    StoreError::Internal(format!("unexpected {} response to {}", response.kind(), operation))
}

#[async_trait]
impl TokenStore for StoreClient {
    async fn get_user(&self, id: &str) -> Result<User> {
        match self.call(Request::GetUser { id: id.to_string() }).await? {
            Response::User { user } => Ok(user),
            other => Err(unexpected(Operation::GetUser, &other)),
        }
    }

    async fn get_client(&self, id: &str) -> Result<ServiceClient> {
        match self.call(Request::GetClient { id: id.to_string() }).await? {
            Response::Client { client } => Ok(client),
            other => Err(unexpected(Operation::GetClient, &other)),
        }
    }

    async fn get_authorization_code(&self, code: &str) -> Result<AuthorizationCode> {
        let request = Request::GetAuthorizationCode {
            code: code.to_string(),
        };
        match self.call(request).await? {
            Response::AuthorizationCode { row } => Ok(row),
            other => Err(unexpected(Operation::GetAuthorizationCode, &other)),
        }
    }

    async fn create_authorization_code(&self, row: AuthorizationCode) -> Result<()> {
        match self.call(Request::CreateAuthorizationCode { row }).await? {
            Response::Created => Ok(()),
            other => Err(unexpected(Operation::CreateAuthorizationCode, &other)),
        }
    }

    async fn get_access_token(&self, token: &str) -> Result<AccessToken> {
        let request = Request::GetAccessToken {
            token: token.to_string(),
        };
        match self.call(request).await? {
            Response::AccessToken { row } => Ok(row),
            other => Err(unexpected(Operation::GetAccessToken, &other)),
        }
    }

    async fn create_access_token(&self, row: AccessToken) -> Result<()> {
        match self.call(Request::CreateAccessToken { row }).await? {
            Response::Created => Ok(()),
            other => Err(unexpected(Operation::CreateAccessToken, &other)),
        }
    }

    async fn get_refresh_token(&self, token: &str) -> Result<RefreshToken> {
        let request = Request::GetRefreshToken {
            token: token.to_string(),
        };
        match self.call(request).await? {
            Response::RefreshToken { row } => Ok(row),
            other => Err(unexpected(Operation::GetRefreshToken, &other)),
        }
    }

    async fn create_refresh_token(&self, row: RefreshToken) -> Result<()> {
        match self.call(Request::CreateRefreshToken { row }).await? {
            Response::Created => Ok(()),
            other => Err(unexpected(Operation::CreateRefreshToken, &other)),
        }
    }
}

/// Whether a pooled stream still looks usable, without waiting.
///
/// Anything other than a control frame showing up between requests means
/// the peer closed the stream or broke protocol.
fn still_open(ws: &mut ClientStream) -> bool {
    match ws.next().now_or_never() {
        None => true,
        Some(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => true,
        Some(_) => false,
    }
}

/// Write one request frame and read back one response frame.
async fn exchange(ws: &mut ClientStream, payload: &[u8], timeout: Duration) -> std::result::Result<Response, ExchangeError> {
    ws.send(Message::Binary(payload.to_vec()))
        .await
        .map_err(ExchangeError::Send)?;

    let read = async {
        let data = loop {
            match ws.next().await {
                Some(Ok(Message::Binary(data))) => break data,
                Some(Ok(Message::Text(text))) => break text.into_bytes(),
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Ok(Message::Close(_))) | None => {
                    return Err(ExchangeError::Recv("stream closed by server".to_string()));
                }
                Some(Err(e)) => return Err(ExchangeError::Recv(e.to_string())),
            }
        };
        Response::from_json(&data).map_err(ExchangeError::Decode)
    };

    tokio::time::timeout(timeout, read)
        .await
        .map_err(|_| ExchangeError::Timeout)?
}

/// Ping `ws` and wait for the pong.
async fn health_check(ws: &mut ClientStream, ping_timeout: Duration) -> bool {
    if ws.send(Message::Ping(Vec::new())).await.is_err() {
        return false;
    }
    let pong = async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Pong(_))) => return true,
                Some(Ok(Message::Ping(_) | Message::Frame(_))) => continue,
                _ => return false,
            }
        }
    };
    tokio::time::timeout(ping_timeout, pong).await.unwrap_or(false)
}

/// Health-check idle streams until the client goes away.
async fn keepalive(channels: Weak<Vec<Channel>>, config: Arc<ClientConfig>) {
    let mut ticker = tokio::time::interval(config.read_idle_timeout);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(channels) = channels.upgrade() else {
            break;
        };

        for channel in channels.iter() {
            // A locked channel is in use, so not idle.
            let Ok(mut state) = channel.state.try_lock() else {
                continue;
            };
            if state.last_used.elapsed() < config.read_idle_timeout {
                continue;
            }
            let Some(mut ws) = state.ws.take() else {
                continue;
            };

            if health_check(&mut ws, config.ping_timeout).await {
                state.ws = Some(ws);
                state.last_used = Instant::now();
            } else {
                debug!("Dropping {} stream after failed health check", channel.operation);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_rejects_bad_urls() {
        assert!(StoreClient::new(ClientConfig::new("not a url")).is_err());
        assert!(StoreClient::new(ClientConfig::new("http://127.0.0.1:3306")).is_err());
        assert!(StoreClient::new(ClientConfig::new("ws://127.0.0.1:3306")).is_ok());
    }

    #[tokio::test]
    async fn test_new_rejects_zero_idle_timeout() {
        let config = ClientConfig {
            read_idle_timeout: Duration::ZERO,
            ..ClientConfig::new("ws://127.0.0.1:3306")
        };
        assert!(StoreClient::new(config).is_err());
    }

    #[test]
    fn test_new_requires_runtime() {
        let err = StoreClient::new(ClientConfig::new("ws://127.0.0.1:3306")).err();
        assert!(matches!(err, Some(StoreError::Internal(_))));
    }

    #[test]
    fn test_exchange_errors_map_to_store_errors() {
        let err = ExchangeError::Timeout.into_store_error("get-user");
        assert_eq!(
            err,
            StoreError::Unavailable("get-user: timed out waiting for response".to_string())
        );

        let err = ExchangeError::Recv("stream closed by server".to_string()).into_store_error("get-user");
        assert_eq!(err, StoreError::Unavailable("get-user: stream closed by server".to_string()));

        let decode = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ExchangeError::Decode(decode).into_store_error("get-user");
        assert!(matches!(err, StoreError::Internal(message) if message.starts_with("get-user: malformed response")));
    }

    #[tokio::test]
    async fn test_stream_urls() {
        let client = StoreClient::new(ClientConfig::new("ws://127.0.0.1:3306")).unwrap();
        assert_eq!(client.ping_url, "ws://127.0.0.1:3306/rpc/ping");
        assert_eq!(
            client.channels[Operation::CreateRefreshToken.index()].url,
            "ws://127.0.0.1:3306/rpc/create-refresh-token"
        );
    }
}
