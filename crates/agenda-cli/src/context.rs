//! Wiring of the session and the calendar service.

use std::sync::Arc;

use agenda_auth::{
    AuthError, AuthResult, AuthSession, BoxFuture, FileStore, GoogleIdentity, HttpRequest,
    HttpResponse, HttpTransport, IdentityProvider, IssuedTokens, OAuthCredentials,
    ReqwestTransport, TokenStore,
};
use agenda_calendar::CalendarService;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::ClientResult;

/// Everything a command needs, built once per run.
#[derive(Debug)]
pub struct AppContext {
    pub session: Arc<AuthSession>,
    pub identity: Arc<GoogleIdentity>,
    pub calendar: CalendarService,
    /// Configured timezone; `None` means the system timezone.
    pub timezone: Option<chrono_tz::Tz>,
    /// Configured timezone name, attached to new events.
    pub timezone_name: Option<String>,
}

impl AppContext {
    pub fn build(config: &ClientConfig) -> ClientResult<Self> {
        let credentials = config.google.resolve_credentials()?;
        let timezone = config.timezone()?;
        let transport = Arc::new(ReqwestTransport::new(config.http_timeout())?);

        let identity = Arc::new(GoogleIdentity::new(
            credentials,
            config.google_credentials_path(),
            transport.clone(),
        ));

        let session = Arc::new(
            AuthSession::new(session_store(config), identity.clone(), transport)
                .with_refresh_policy(config.session.refresh_policy),
        );
        let calendar = CalendarService::new(session.clone(), config.calendar_config());

        Ok(Self {
            session,
            identity,
            calendar,
            timezone,
            timezone_name: config.calendar.timezone.clone(),
        })
    }
}

/// Builds a session that can always sign out, whatever state the
/// configuration is in.
///
/// Revoking the refresh token needs no OAuth client, so unresolvable
/// credentials only cost the ability to refresh, which logout never does.
pub fn logout_session(config: &ClientConfig) -> AuthSession {
    let credentials = config.google.resolve_credentials().unwrap_or_else(|e| {
        warn!(error = %e, "OAuth client unavailable, signing out without it");
        OAuthCredentials::new("", "")
    });

    let identity: Arc<dyn IdentityProvider> = match ReqwestTransport::new(config.http_timeout()) {
        Ok(transport) => Arc::new(GoogleIdentity::new(
            credentials,
            config.google_credentials_path(),
            Arc::new(transport),
        )),
        Err(e) => Arc::new(Unreachable(e.to_string())),
    };
    let transport = Arc::new(Unreachable("logout sends no API requests".to_string()));

    AuthSession::new(session_store(config), identity, transport)
}

fn session_store(config: &ClientConfig) -> TokenStore {
    let store_path = config.session_store_path();
    debug!(store = %store_path.display(), "opening session store");
    TokenStore::new(Arc::new(FileStore::new(store_path)))
}

/// Stand-in for a backend that could not be built. Every call fails with the
/// reason.
struct Unreachable(String);

impl IdentityProvider for Unreachable {
    fn is_signed_in(&self) -> BoxFuture<'_, AuthResult<bool>> {
        Box::pin(async { Ok(false) })
    }

    fn get_tokens(&self) -> BoxFuture<'_, AuthResult<IssuedTokens>> {
        let err = AuthError::identity(self.0.clone());
        Box::pin(async move { Err(err) })
    }

    fn sign_out(&self) -> BoxFuture<'_, AuthResult<()>> {
        let err = AuthError::identity(self.0.clone());
        Box::pin(async move { Err(err) })
    }
}

impl HttpTransport for Unreachable {
    fn send(&self, _request: HttpRequest) -> BoxFuture<'_, AuthResult<HttpResponse>> {
        let err = AuthError::transport(self.0.clone());
        Box::pin(async move { Err(err) })
    }
}
