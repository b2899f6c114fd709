//! Wire protocol for store streams.
//!
//! Each frame is a binary WebSocket message holding one UTF-8 JSON envelope,
//! tagged by its `type` field:
//!
//! - request: `{"type":"get_user","id":"1"}`
//! - response: `{"type":"user","user":{...}}`
//! - failure: `{"type":"error","code":"not_found","message":"user 99"}`
//!
//! Streams live at `/rpc/<operation>` (for example `/rpc/get-user`). The
//! unary connectivity probe lives at [`PING_PATH`].

use std::fmt;

use serde::{Deserialize, Serialize};
use token_store::{AccessToken, AuthorizationCode, RefreshToken, ServiceClient, StoreError, User};

/// Maximum frame size (1MB); rows are tiny, anything larger is garbage.
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

const RPC_PREFIX: &str = "/rpc/";

/// Path of the unary ping endpoint
pub const PING_PATH: &str = "/rpc/ping";

/// The eight store operation kinds, one stream each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetUser,
    GetClient,
    GetAuthorizationCode,
    CreateAuthorizationCode,
    GetAccessToken,
    CreateAccessToken,
    GetRefreshToken,
    CreateRefreshToken,
}

impl Operation {
    /// All operations, in stream-index order
    pub const ALL: [Operation; 8] = [
        Operation::GetUser,
        Operation::GetClient,
        Operation::GetAuthorizationCode,
        Operation::CreateAuthorizationCode,
        Operation::GetAccessToken,
        Operation::CreateAccessToken,
        Operation::GetRefreshToken,
        Operation::CreateRefreshToken,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::GetUser => "get-user",
            Operation::GetClient => "get-client",
            Operation::GetAuthorizationCode => "get-authorization-code",
            Operation::CreateAuthorizationCode => "create-authorization-code",
            Operation::GetAccessToken => "get-access-token",
            Operation::CreateAccessToken => "create-access-token",
            Operation::GetRefreshToken => "get-refresh-token",
            Operation::CreateRefreshToken => "create-refresh-token",
        }
    }

    /// URL path of this operation's stream
    pub fn path(self) -> String {
        format!("{}{}", RPC_PREFIX, self.name())
    }

    pub fn from_path(path: &str) -> Option<Self> {
        let name = path.strip_prefix(RPC_PREFIX)?;
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    /// Position in [`Operation::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A request frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    GetUser { id: String },
    GetClient { id: String },
    GetAuthorizationCode { code: String },
    CreateAuthorizationCode { row: AuthorizationCode },
    GetAccessToken { token: String },
    CreateAccessToken { row: AccessToken },
    GetRefreshToken { token: String },
    CreateRefreshToken { row: RefreshToken },
    Ping,
}

impl Request {
    /// The stream this request belongs on. `None` for [`Request::Ping`].
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Request::GetUser { .. } => Some(Operation::GetUser),
            Request::GetClient { .. } => Some(Operation::GetClient),
            Request::GetAuthorizationCode { .. } => Some(Operation::GetAuthorizationCode),
            Request::CreateAuthorizationCode { .. } => Some(Operation::CreateAuthorizationCode),
            Request::GetAccessToken { .. } => Some(Operation::GetAccessToken),
            Request::CreateAccessToken { .. } => Some(Operation::CreateAccessToken),
            Request::GetRefreshToken { .. } => Some(Operation::GetRefreshToken),
            Request::CreateRefreshToken { .. } => Some(Operation::CreateRefreshToken),
            Request::Ping => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_json(data: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(data)
    }
}

/// Wire error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    AlreadyExists,
    Internal,
}

impl ErrorCode {
    pub fn from_store_error(err: &StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ErrorCode::NotFound,
            StoreError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            StoreError::Unavailable(_) | StoreError::Internal(_) => ErrorCode::Internal,
        }
    }

    pub fn into_store_error(self, message: String) -> StoreError {
        match self {
            ErrorCode::NotFound => StoreError::NotFound(message),
            ErrorCode::AlreadyExists => StoreError::AlreadyExists(message),
            ErrorCode::Internal => StoreError::Internal(message),
        }
    }
}

/// A response frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    User { user: User },
    Client { client: ServiceClient },
    AuthorizationCode { row: AuthorizationCode },
    AccessToken { row: AccessToken },
    RefreshToken { row: RefreshToken },
    Created,
    Pong,
    Error { code: ErrorCode, message: String },
}

impl Response {
    pub fn from_store_error(err: &StoreError) -> Self {
        let message = match err {
            StoreError::NotFound(m)
            | StoreError::AlreadyExists(m)
            | StoreError::Unavailable(m)
            | StoreError::Internal(m) => m.clone(),
        };
        Response::Error {
            code: ErrorCode::from_store_error(err),
            message,
        }
    }

    /// Turn an error frame back into the store error it came from
    pub fn into_result(self) -> Result<Self, StoreError> {
        match self {
            Response::Error { code, message } => Err(code.into_store_error(message)),
            other => Ok(other),
        }
    }

    /// Short name for log lines
    pub fn kind(&self) -> &'static str {
        match self {
            Response::User { .. } => "user",
            Response::Client { .. } => "client",
            Response::AuthorizationCode { .. } => "authorization_code",
            Response::AccessToken { .. } => "access_token",
            Response::RefreshToken { .. } => "refresh_token",
            Response::Created => "created",
            Response::Pong => "pong",
            Response::Error { .. } => "error",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_json(data: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(data)
    }
}
