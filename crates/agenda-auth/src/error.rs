//! Error types for session and request operations.
//!
//! Callers distinguish authentication failures (the user has to sign in
//! again, and has already been notified through the expiry callback) from
//! everything else with [`AuthError::is_auth_failure`].

use std::fmt;
use thiserror::Error;

/// The category of an [`AuthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorKind {
    /// No bearer token is stored; the user is signed out.
    MissingCredential,
    /// The service still rejects the credentials after a refresh, or the
    /// refresh itself failed.
    AuthenticationFailed,
    /// No HTTP response was received (connection refused, DNS, timeout).
    Transport,
    /// The identity provider failed or returned something unusable.
    IdentityProvider,
    /// The key-value store failed to read or write.
    Storage,
    /// A response body could not be decoded.
    InvalidResponse,
    /// Missing or invalid configuration.
    Configuration,
}

impl AuthErrorKind {
    /// Returns true for the kinds that mean "sign in again".
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::MissingCredential | Self::AuthenticationFailed)
    }

    /// Returns the stable machine-readable name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::AuthenticationFailed => "authentication_failed",
            Self::Transport => "transport_error",
            Self::IdentityProvider => "identity_provider_error",
            Self::Storage => "storage_error",
            Self::InvalidResponse => "invalid_response",
            Self::Configuration => "configuration_error",
        }
    }
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error raised by the session core or one of its collaborators.
#[derive(Debug, Error)]
pub struct AuthError {
    kind: AuthErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AuthError {
    /// Creates a new error with the given kind and message.
    pub fn new(kind: AuthErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a missing-credential error.
    pub fn missing_credential(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::MissingCredential, message)
    }

    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::AuthenticationFailed, message)
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::Transport, message)
    }

    /// Creates an identity-provider error.
    pub fn identity(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::IdentityProvider, message)
    }

    /// Creates a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::Storage, message)
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::InvalidResponse, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::Configuration, message)
    }

    /// Sets the underlying cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> AuthErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns true if the user has to sign in again.
    pub fn is_auth_failure(&self) -> bool {
        self.kind.is_auth_failure()
    }

    /// Returns true if no response was received at all.
    pub fn is_transport(&self) -> bool {
        self.kind == AuthErrorKind::Transport
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// A specialized Result type for session operations.
pub type AuthResult<T> = Result<T, AuthError>;
