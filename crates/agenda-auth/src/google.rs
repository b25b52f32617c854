//! Google implementation of [`IdentityProvider`].
//!
//! The interactive consent flow is out of scope: the user supplies a refresh
//! token obtained elsewhere, which is kept in a credential file of its own.
//! From then on access tokens are minted silently with the `refresh_token`
//! grant.
//!
//! ```ignore
//! let identity = GoogleIdentity::new(credentials, credentials_path, transport);
//! identity.sign_in_with_refresh_token("1//0g...")?;
//! let tokens = identity.get_tokens().await?;
//! let profile = identity.fetch_profile(&tokens.access_token).await?;
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use agenda_core::UserProfile;
use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::BoxFuture;
use crate::error::{AuthError, AuthResult};
use crate::identity::{IdentityProvider, IssuedTokens};
use crate::transport::{HttpRequest, HttpTransport, RequestOptions};

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

/// OAuth 2.0 client credentials from the Google Cloud Console.
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Google's downloadable credentials JSON: either nested under
/// `installed`/`web`, or flat.
#[derive(Debug, Deserialize)]
struct CredentialsJson {
    installed: Option<NestedCredentials>,
    web: Option<NestedCredentials>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NestedCredentials {
    client_id: String,
    client_secret: String,
}

impl OAuthCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Loads credentials from a Google Cloud Console JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> AuthResult<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            AuthError::configuration(format!("failed to read credentials file: {}", e))
        })?;
        Self::from_json(&content)
    }

    /// Parses credentials in either the nested or the flat format.
    pub fn from_json(json: &str) -> AuthResult<Self> {
        let file: CredentialsJson = serde_json::from_str(json).map_err(|e| {
            AuthError::configuration(format!("failed to parse credentials JSON: {}", e))
        })?;

        if let Some(creds) = file.installed.or(file.web) {
            return Ok(Self::new(creds.client_id, creds.client_secret));
        }
        if let (Some(client_id), Some(client_secret)) = (file.client_id, file.client_secret) {
            return Ok(Self::new(client_id, client_secret));
        }

        Err(AuthError::configuration(
            "credentials must contain an 'installed'/'web' section or 'client_id'/'client_secret'",
        ))
    }

    /// Checks that the credentials look like Google OAuth client credentials.
    pub fn validate(&self) -> AuthResult<()> {
        if self.client_id.is_empty() {
            return Err(AuthError::configuration("client_id is required"));
        }
        if !self.client_id.ends_with(".apps.googleusercontent.com") {
            return Err(AuthError::configuration(
                "client_id should end with .apps.googleusercontent.com",
            ));
        }
        if self.client_secret.is_empty() {
            return Err(AuthError::configuration("client_secret is required"));
        }
        Ok(())
    }
}

/// Token endpoint URLs; overridable for testing against a fake server.
#[derive(Debug, Clone)]
pub struct GoogleEndpoints {
    pub token_url: String,
    pub revoke_url: String,
    pub userinfo_url: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            token_url: GOOGLE_TOKEN_URL.to_string(),
            revoke_url: GOOGLE_REVOKE_URL.to_string(),
            userinfo_url: GOOGLE_USERINFO_URL.to_string(),
        }
    }
}

/// What is kept on disk for a signed-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredCredential {
    refresh_token: String,
    signed_in_at: DateTime<Utc>,
    #[serde(default)]
    last_refresh: Option<DateTime<Utc>>,
}

/// The refresh-token file, cached in memory.
#[derive(Debug)]
struct CredentialFile {
    path: PathBuf,
    cached: RwLock<Option<StoredCredential>>,
}

impl CredentialFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            cached: RwLock::new(None),
        }
    }

    fn load(&self) -> AuthResult<bool> {
        if !self.path.exists() {
            debug!("no Google credential file at {:?}", self.path);
            return Ok(false);
        }
        let content = fs::read_to_string(&self.path).map_err(|e| {
            AuthError::storage(format!("failed to read credential file: {}", e))
        })?;
        let credential: StoredCredential = serde_json::from_str(&content).map_err(|e| {
            AuthError::storage(format!("failed to parse credential file: {}", e))
        })?;
        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = Some(credential);
        Ok(true)
    }

    fn get(&self) -> Option<StoredCredential> {
        self.cached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, credential: StoredCredential) -> AuthResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                AuthError::storage(format!("failed to create credential directory: {}", e))
            })?;
        }

        let content = serde_json::to_string_pretty(&credential)
            .map_err(|e| AuthError::storage(format!("failed to serialize credential: {}", e)))?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, content).map_err(|e| {
            AuthError::storage(format!("failed to write credential file: {}", e))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600)) {
                warn!("failed to restrict permissions on {:?}: {}", temp_path, e);
            }
        }

        fs::rename(&temp_path, &self.path).map_err(|e| {
            AuthError::storage(format!("failed to rename credential file: {}", e))
        })?;

        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = Some(credential);
        Ok(())
    }

    fn clear(&self) -> AuthResult<()> {
        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = None;
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                AuthError::storage(format!("failed to remove credential file: {}", e))
            })?;
            info!("removed Google credential file {:?}", self.path);
        }
        Ok(())
    }
}

/// Google sign-in backed by a stored refresh token.
pub struct GoogleIdentity {
    credentials: OAuthCredentials,
    file: CredentialFile,
    transport: Arc<dyn HttpTransport>,
    endpoints: GoogleEndpoints,
}

impl std::fmt::Debug for GoogleIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleIdentity")
            .field("client_id", &self.credentials.client_id)
            .field("credentials_path", &self.file.path)
            .finish_non_exhaustive()
    }
}

impl GoogleIdentity {
    /// Creates the provider and loads any stored refresh token. An unreadable
    /// credential file is logged and treated as signed out.
    pub fn new(
        credentials: OAuthCredentials,
        credentials_path: impl Into<PathBuf>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let file = CredentialFile::new(credentials_path.into());
        if let Err(e) = file.load() {
            warn!(error = %e, "ignoring unreadable Google credential file");
        }
        Self {
            credentials,
            file,
            transport,
            endpoints: GoogleEndpoints::default(),
        }
    }

    /// Builder method to override the endpoint URLs.
    pub fn with_endpoints(mut self, endpoints: GoogleEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn credentials_path(&self) -> &Path {
        &self.file.path
    }

    /// Stores a refresh token obtained from the consent flow.
    pub fn sign_in_with_refresh_token(&self, refresh_token: &str) -> AuthResult<()> {
        let refresh_token = refresh_token.trim();
        if refresh_token.is_empty() {
            return Err(AuthError::configuration("refresh token is empty"));
        }
        self.file.set(StoredCredential {
            refresh_token: refresh_token.to_string(),
            signed_in_at: Utc::now(),
            last_refresh: None,
        })?;
        info!("stored Google refresh token");
        Ok(())
    }

    /// Fetches the profile of the user owning `access_token`.
    pub async fn fetch_profile(&self, access_token: &str) -> AuthResult<UserProfile> {
        let bearer = HeaderValue::from_str(&format!("Bearer {}", access_token))
            .map_err(|_| AuthError::authentication("access token is not a valid header value"))?;
        let options = RequestOptions::get().with_header(AUTHORIZATION, bearer);
        let request = HttpRequest::from_options(&self.endpoints.userinfo_url, &options);

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(AuthError::identity(format!(
                "userinfo request failed ({}): {}",
                response.status, response.body
            )));
        }
        response.json()
    }

    async fn refresh(&self, stored: StoredCredential) -> AuthResult<IssuedTokens> {
        let options = RequestOptions::post().with_form([
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", stored.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ]);
        let request = HttpRequest::from_options(&self.endpoints.token_url, &options);

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(AuthError::authentication(format!(
                "token refresh failed ({}): {}",
                response.status, response.body
            )));
        }
        let tokens: IssuedTokens = response.json()?;

        let updated = StoredCredential {
            last_refresh: Some(Utc::now()),
            ..stored
        };
        if let Err(e) = self.file.set(updated) {
            warn!(error = %e, "failed to record refresh time");
        }

        info!("obtained fresh Google access token");
        Ok(tokens)
    }

    async fn revoke(&self, refresh_token: &str) -> AuthResult<()> {
        let options = RequestOptions::post().with_form([("token", refresh_token)]);
        let request = HttpRequest::from_options(&self.endpoints.revoke_url, &options);
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(AuthError::identity(format!(
                "token revocation failed ({}): {}",
                response.status, response.body
            )));
        }
        Ok(())
    }
}

impl IdentityProvider for GoogleIdentity {
    fn is_signed_in(&self) -> BoxFuture<'_, AuthResult<bool>> {
        let signed_in = self.file.get().is_some();
        Box::pin(async move { Ok(signed_in) })
    }

    fn get_tokens(&self) -> BoxFuture<'_, AuthResult<IssuedTokens>> {
        Box::pin(async move {
            let stored = self
                .file
                .get()
                .ok_or_else(|| AuthError::authentication("not signed in to Google"))?;
            self.refresh(stored).await
        })
    }

    /// Revokes the refresh token, then forgets it locally even if the
    /// revocation failed.
    fn sign_out(&self) -> BoxFuture<'_, AuthResult<()>> {
        Box::pin(async move {
            let Some(stored) = self.file.get() else {
                return Ok(());
            };
            let revoked = self.revoke(&stored.refresh_token).await;
            self.file.clear()?;
            revoked
        })
    }
}
