//! OhAuth relying-party session
//!
//! An interactive client that acts as one of several relying parties
//! ("sites"). It logs the user in through the authorization code flow,
//! keeps the resulting tokens per site and reads the user's profile from
//! the resource server, refreshing an expired access token once.

pub mod command;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod receiver;
pub mod session;

pub use command::{Command, Output, Site};
pub use endpoint::{ClientCredentials, CodeSource, Profile, ResourceEndpoint, TokenEndpoint, TokenGrant};
pub use error::{Result, SessionError};
pub use http::{HttpResourceEndpoint, HttpTokenEndpoint};
pub use receiver::{PendingCode, RedirectReceiver};
pub use session::{default_sites, Session, SessionConfig, LOGIN_TIMEOUT};
