use thiserror::Error;

pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors from the interactive session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("please switch to a site first")]
    NoSite,

    #[error("already logged in to site {0}")]
    AlreadyLogin(String),

    #[error("you have not logged in to site {0}")]
    TokenNotFound(String),

    #[error("unknown site id {0:?}")]
    UnknownSite(String),

    #[error("unknown command {0:?}, try `help`")]
    UnknownCommand(String),

    #[error("{0} needs an argument")]
    MissingArgument(&'static str),

    #[error("canceled")]
    Canceled,

    #[error("timed out waiting for the authorization code")]
    Timeout,

    #[error("cannot receive authorization code: {0}")]
    Callback(String),

    #[error("access token is expired")]
    AccessTokenExpired,

    #[error("status code is {status}: {message}")]
    Http { status: u16, message: String },

    #[error("request failed: {0}")]
    Request(String),
}
