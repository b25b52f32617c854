//! Identity-provider contract.

use serde::Deserialize;

use crate::BoxFuture;
use crate::error::AuthResult;

/// Tokens issued by the identity provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IssuedTokens {
    /// Bearer token for API calls. May be empty if the provider misbehaves.
    #[serde(default)]
    pub access_token: String,
    /// Lifetime of the access token in seconds.
    pub expires_in: Option<i64>,
    pub id_token: Option<String>,
    /// Space-separated granted scopes.
    pub scope: Option<String>,
}

impl IssuedTokens {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            ..Default::default()
        }
    }

    /// Returns the access token if it is non-blank.
    pub fn usable_access_token(&self) -> Option<&str> {
        let token = self.access_token.trim();
        (!token.is_empty()).then_some(token)
    }
}

/// The sign-in backend the session refreshes credentials through.
///
/// Every error is treated by the session as a failure of the operation; none
/// of them is retried.
pub trait IdentityProvider: Send + Sync {
    /// Returns whether the user still has a sign-in the provider can refresh.
    fn is_signed_in(&self) -> BoxFuture<'_, AuthResult<bool>>;

    /// Obtains fresh tokens without user interaction.
    fn get_tokens(&self) -> BoxFuture<'_, AuthResult<IssuedTokens>>;

    /// Ends the provider-side sign-in.
    fn sign_out(&self) -> BoxFuture<'_, AuthResult<()>>;
}
