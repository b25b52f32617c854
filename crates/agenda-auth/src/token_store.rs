//! Persistence of the two session values: the bearer token and the user profile.

use std::sync::Arc;

use agenda_core::UserProfile;
use tracing::{debug, warn};

use crate::error::{AuthError, AuthResult};
use crate::store::KeyValueStore;

/// The keys the session persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKey {
    /// The current bearer token.
    Token,
    /// The signed-in user's profile, as a JSON blob.
    UserInfo,
}

impl SessionKey {
    /// Every session key, in the order they are cleared on logout.
    pub const ALL: [SessionKey; 2] = [SessionKey::Token, SessionKey::UserInfo];

    /// Returns the storage key name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::UserInfo => "userInfo",
        }
    }
}

/// Typed access to the session values in a [`KeyValueStore`].
///
/// Reads and removals never fail: backend errors are logged and treated as
/// "absent" / "done". Writes report errors so the caller can decide.
#[derive(Clone)]
pub struct TokenStore {
    backend: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}

impl TokenStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Reads a value, returning `None` if it is absent or the backend fails.
    pub async fn get(&self, key: SessionKey) -> Option<String> {
        match self.backend.get(key.as_str()).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key = key.as_str(), error = %e, "failed to read session value");
                None
            }
        }
    }

    /// Overwrites a value.
    pub async fn set(&self, key: SessionKey, value: &str) -> AuthResult<()> {
        self.backend.set(key.as_str(), value).await?;
        debug!(key = key.as_str(), "stored session value");
        Ok(())
    }

    /// Removes the given keys, best-effort.
    ///
    /// When the batch removal fails each key is retried on its own so one bad
    /// key cannot keep the others around.
    pub async fn remove(&self, keys: &[SessionKey]) {
        let names: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
        let Err(e) = self.backend.multi_remove(&names).await else {
            return;
        };
        warn!(error = %e, "batch removal of session values failed, removing one by one");

        for name in names {
            if let Err(e) = self.backend.multi_remove(&[name]).await {
                warn!(key = name, error = %e, "failed to remove session value");
            }
        }
    }

    /// Returns the stored bearer token. An empty token counts as absent.
    pub async fn token(&self) -> Option<String> {
        self.get(SessionKey::Token)
            .await
            .filter(|token| !token.trim().is_empty())
    }

    pub async fn set_token(&self, token: &str) -> AuthResult<()> {
        self.set(SessionKey::Token, token).await
    }

    /// Returns the stored profile. A malformed blob counts as absent.
    pub async fn user_profile(&self) -> Option<UserProfile> {
        let raw = self.get(SessionKey::UserInfo).await?;
        serde_json::from_str(&raw)
            .map_err(|e| warn!(error = %e, "stored user profile is malformed"))
            .ok()
    }

    pub async fn set_user_profile(&self, profile: &UserProfile) -> AuthResult<()> {
        let raw = serde_json::to_string(profile)
            .map_err(|e| AuthError::storage(format!("failed to serialize profile: {}", e)))?;
        self.set(SessionKey::UserInfo, &raw).await
    }

    /// Removes both session values.
    pub async fn clear(&self) {
        self.remove(&SessionKey::ALL).await;
    }
}
