//! Calendar error types.

use agenda_auth::AuthError;
use agenda_core::DraftError;
use chrono::NaiveDate;
use thiserror::Error;

/// Errors returned by [`CalendarService`](crate::CalendarService).
#[derive(Debug, Error)]
pub enum CalendarError {
    /// The session could not authenticate or deliver the request.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The API answered with a non-success status other than the `401` the
    /// session already handled.
    #[error("calendar API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// A success response that could not be decoded.
    #[error("invalid response from calendar API: {0}")]
    InvalidResponse(String),

    /// The event draft was rejected before sending.
    #[error(transparent)]
    InvalidEvent(#[from] DraftError),

    /// The date has no representable local day.
    #[error("date {0} is out of range")]
    DateOutOfRange(NaiveDate),

    /// The configured base URL cannot be used.
    #[error("invalid calendar configuration: {0}")]
    Configuration(String),
}

impl CalendarError {
    /// Returns true if the user has to sign in again.
    ///
    /// The session has notified its expiry listener by then, so front ends
    /// should not report these errors a second time.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Auth(e) if e.is_auth_failure())
    }

    /// Returns the HTTP status of an API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result alias for calendar operations.
pub type CalendarResult<T> = Result<T, CalendarError>;
