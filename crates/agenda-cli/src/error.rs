//! Client error types.

use agenda_auth::AuthError;
use agenda_calendar::CalendarError;
use thiserror::Error;

use crate::config::ConfigError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad command-line input.
    #[error("{0}")]
    InvalidInput(String),

    #[error("not signed in, run `agenda login` first")]
    NotSignedIn,

    /// Google refused the sign-in. Reported directly since no session
    /// exists yet to notify.
    #[error("sign-in failed: {0}")]
    Login(#[source] AuthError),
}

impl ClientError {
    /// Returns true for failures the expiry notice has already reported.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::Auth(e) => e.is_auth_failure(),
            Self::Calendar(e) => e.is_auth_failure(),
            _ => false,
        }
    }
}
