//! store-rpc: the token store over persistent WebSocket streams.
//!
//! Every store operation kind gets its own long-lived stream. A stream
//! carries one request, then one response, then the next request; there is
//! no pipelining and no request id. Different operation kinds run on
//! different streams and do not wait for each other.
//!
//! The server side wraps any [`token_store::TokenStore`]; the client side is
//! itself a `TokenStore`, so services use local and remote stores the same
//! way.

pub mod backoff;
pub mod client;
mod connection;
pub mod protocol;
pub mod server;
pub mod shutdown;

pub use backoff::{calculate_backoff, ReconnectConfig};
pub use client::{ClientConfig, StoreClient};
pub use protocol::{ErrorCode, Operation, Request, Response, MAX_MESSAGE_SIZE, PING_PATH};
pub use server::StoreServer;
pub use shutdown::shutdown_signal;
