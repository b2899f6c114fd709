//! Server side of a single store stream.
//!
//! The upgrade request path picks the endpoint. An operation stream then
//! answers requests one at a time until the client goes away; a ping
//! connection answers a single ping.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request as Upgrade, Response as UpgradeResponse};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use token_store::{StoreError, TokenStore};
use tracing::{debug, error, warn};

use crate::protocol::{Operation, Request, Response, MAX_MESSAGE_SIZE, PING_PATH};

/// What a connection was opened for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Endpoint {
    Ping,
    Stream(Operation),
}

impl Endpoint {
    pub(crate) fn from_path(path: &str) -> Option<Self> {
        if path == PING_PATH {
            return Some(Endpoint::Ping);
        }
        Operation::from_path(path).map(Endpoint::Stream)
    }
}

type ServerStream = WebSocketStream<TcpStream>;

/// Upgrade `stream` and serve it until the peer disconnects.
pub(crate) async fn serve_connection(store: Arc<dyn TokenStore>, stream: TcpStream, addr: SocketAddr) {
    let mut endpoint = None;
    let callback = |req: &Upgrade, resp: UpgradeResponse| -> Result<UpgradeResponse, ErrorResponse> {
        match Endpoint::from_path(req.uri().path()) {
            Some(found) => {
                endpoint = Some(found);
                Ok(resp)
            }
            None => {
                let mut rejection = ErrorResponse::new(Some(format!("no such stream: {}", req.uri().path())));
                *rejection.status_mut() = StatusCode::NOT_FOUND;
                Err(rejection)
            }
        }
    };

    let ws = match accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!("Upgrade from {} failed: {}", addr, e);
            return;
        }
    };

    match endpoint {
        Some(Endpoint::Ping) => answer_ping(ws, addr).await,
        Some(Endpoint::Stream(operation)) => {
            debug!("Opened {} stream for {}", operation, addr);
            serve_stream(store, operation, ws, addr).await;
            debug!("Closed {} stream for {}", operation, addr);
        }
        None => {}
    }
}

async fn answer_ping(mut ws: ServerStream, addr: SocketAddr) {
    let Some(frame) = next_frame(&mut ws, addr).await else {
        return;
    };
    let response = match frame.map(|data| Request::from_json(&data)) {
        Ok(Ok(Request::Ping)) => Response::Pong,
        Ok(Ok(other)) => Response::from_store_error(&StoreError::Internal(format!(
            "{:?} sent to ping endpoint",
            other.operation()
        ))),
        Ok(Err(e)) => Response::from_store_error(&StoreError::Internal(format!("malformed request: {e}"))),
        Err(e) => Response::from_store_error(&e),
    };
    if send_response(&mut ws, &response).await.is_ok() {
        let _ = ws.close(None).await;
    }
}

async fn serve_stream(store: Arc<dyn TokenStore>, operation: Operation, mut ws: ServerStream, addr: SocketAddr) {
    while let Some(frame) = next_frame(&mut ws, addr).await {
        let data = match frame {
            Ok(data) => data,
            Err(e) => {
                if let Err(e) = send_response(&mut ws, &Response::from_store_error(&e)).await {
                    debug!("Failed to answer {} on {}: {}", operation, addr, e);
                    break;
                }
                continue;
            }
        };
        let response = match Request::from_json(&data) {
            Ok(request) => match request.operation() {
                Some(op) if op == operation => dispatch(store.as_ref(), request).await,
                Some(op) => Response::from_store_error(&StoreError::Internal(format!(
                    "{op} request sent on {operation} stream"
                ))),
                None => Response::Pong,
            },
            Err(e) => {
                warn!("Malformed request on {} stream from {}: {}", operation, addr, e);
                Response::from_store_error(&StoreError::Internal(format!("malformed request: {e}")))
            }
        };

        if let Err(e) = send_response(&mut ws, &response).await {
            debug!("Failed to answer {} on {}: {}", operation, addr, e);
            break;
        }
    }
}

/// Run one request against the store.
async fn dispatch(store: &dyn TokenStore, request: Request) -> Response {
    let result = match request {
        Request::GetUser { id } => store.get_user(&id).await.map(|user| Response::User { user }),
        Request::GetClient { id } => store.get_client(&id).await.map(|client| Response::Client { client }),
        Request::GetAuthorizationCode { code } => store
            .get_authorization_code(&code)
            .await
            .map(|row| Response::AuthorizationCode { row }),
        Request::CreateAuthorizationCode { row } => {
            store.create_authorization_code(row).await.map(|()| Response::Created)
        }
        Request::GetAccessToken { token } => store
            .get_access_token(&token)
            .await
            .map(|row| Response::AccessToken { row }),
        Request::CreateAccessToken { row } => store.create_access_token(row).await.map(|()| Response::Created),
        Request::GetRefreshToken { token } => store
            .get_refresh_token(&token)
            .await
            .map(|row| Response::RefreshToken { row }),
        Request::CreateRefreshToken { row } => store.create_refresh_token(row).await.map(|()| Response::Created),
        Request::Ping => Ok(Response::Pong),
    };

    result.unwrap_or_else(|e| Response::from_store_error(&e))
}

/// Next data frame, or `None` once the stream is finished.
///
/// An oversized frame still counts as a request and yields an error to
/// answer with.
async fn next_frame(ws: &mut ServerStream, addr: SocketAddr) -> Option<Result<Vec<u8>, StoreError>> {
    loop {
        let data = match ws.next().await? {
            Ok(Message::Binary(data)) => data,
            Ok(Message::Text(text)) => text.into_bytes(),
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
            Ok(Message::Close(_)) => {
                debug!("Received close frame from {}", addr);
                return None;
            }
            Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return None,
            Err(e) => {
                error!("WebSocket error from {}: {}", addr, e);
                return None;
            }
        };

        if data.len() > MAX_MESSAGE_SIZE {
            warn!(
                "Message from {} exceeds max size ({} > {}), rejecting",
                addr,
                data.len(),
                MAX_MESSAGE_SIZE
            );
            return Some(Err(StoreError::Internal(format!(
                "message exceeds max size ({} > {})",
                data.len(),
                MAX_MESSAGE_SIZE
            ))));
        }
        return Some(Ok(data));
    }
}

async fn send_response(ws: &mut ServerStream, response: &Response) -> Result<(), WsError> {
    let data = match response.to_json() {
        Ok(data) => data,
        Err(e) => {
            error!("Failed to encode {} response: {}", response.kind(), e);
            Response::from_store_error(&StoreError::Internal(e.to_string()))
                .to_json()
                .unwrap_or_default()
        }
    };
    ws.send(Message::Binary(data)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_from_path() {
        assert_eq!(Endpoint::from_path("/rpc/ping"), Some(Endpoint::Ping));
        assert_eq!(
            Endpoint::from_path("/rpc/get-client"),
            Some(Endpoint::Stream(Operation::GetClient))
        );
        assert_eq!(Endpoint::from_path("/"), None);
        assert_eq!(Endpoint::from_path("/rpc/"), None);
    }

    #[tokio::test]
    async fn test_dispatch_answers_from_store() {
        let store = token_store::InMemoryStore::with_fixtures().unwrap();

        let response = dispatch(&store, Request::GetUser { id: "1".into() }).await;
        match response {
            Response::User { user } => assert_eq!(user.name, "Hanako"),
            other => panic!("unexpected response: {other:?}"),
        }

        let response = dispatch(&store, Request::GetClient { id: "999".into() }).await;
        assert!(matches!(
            response.into_result(),
            Err(StoreError::NotFound(_))
        ));
    }
}
