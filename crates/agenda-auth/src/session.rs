//! The authenticated session.
//!
//! [`AuthSession`] owns the bearer-token lifecycle: it attaches the stored
//! token to outbound requests, refreshes it through the identity provider when
//! the server answers `401`, retries once, and tells the registered listener
//! when the user has to sign in again.

use std::sync::Arc;

use agenda_core::UserProfile;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{AuthError, AuthResult};
use crate::identity::IdentityProvider;
use crate::notify::{ExpiredCallback, ExpirySlot, ExpirySubscription};
use crate::token_store::TokenStore;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, RequestOptions};

/// How many times a request is re-sent after a `401` and a token refresh.
pub const MAX_AUTH_RETRIES: usize = 1;

/// What happens when several requests hit `401` at the same time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// Every rejected request refreshes on its own. Redundant refreshes are
    /// harmless since any issued token is valid for the account.
    #[default]
    Independent,
    /// Refreshes run one at a time; a request whose rejected token was already
    /// replaced by a sibling reuses the new token.
    Coalesced,
}

/// Outcome of [`AuthSession::logout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogoutReport {
    /// Whether the identity provider acknowledged the sign-out. Local session
    /// data is cleared either way.
    pub remote_signed_out: bool,
}

/// Authenticated access to the remote API on behalf of the signed-in user.
///
/// Construct one per process and share it behind an [`Arc`].
pub struct AuthSession {
    store: TokenStore,
    identity: Arc<dyn IdentityProvider>,
    transport: Arc<dyn HttpTransport>,
    expiry: Arc<ExpirySlot>,
    refresh_policy: RefreshPolicy,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("refresh_policy", &self.refresh_policy)
            .field("listener_registered", &self.expiry.is_registered())
            .finish_non_exhaustive()
    }
}

impl AuthSession {
    pub fn new(
        store: TokenStore,
        identity: Arc<dyn IdentityProvider>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            store,
            identity,
            transport,
            expiry: Arc::new(ExpirySlot::default()),
            refresh_policy: RefreshPolicy::default(),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Builder method to choose the refresh policy.
    pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.refresh_policy = policy;
        self
    }

    pub fn refresh_policy(&self) -> RefreshPolicy {
        self.refresh_policy
    }

    pub fn token_store(&self) -> &TokenStore {
        &self.store
    }

    /// Replaces the expiry listener. `None` clears it.
    pub fn set_expired_callback(&self, callback: Option<ExpiredCallback>) {
        self.expiry.replace(callback);
    }

    /// Registers `callback` as the expiry listener until the returned guard is
    /// dropped.
    pub fn subscribe_expired<F>(&self, callback: F) -> ExpirySubscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let callback: ExpiredCallback = Arc::new(callback);
        // replace() only returns None when clearing.
        let id = self.expiry.replace(Some(callback)).unwrap_or_default();
        ExpirySubscription::new(&self.expiry, id)
    }

    /// Returns true if a bearer token is stored.
    pub async fn is_authenticated(&self) -> bool {
        self.store.token().await.is_some()
    }

    /// Returns the stored profile of the signed-in user.
    pub async fn user_profile(&self) -> Option<UserProfile> {
        self.store.user_profile().await
    }

    /// Persists a freshly obtained token and, optionally, the user's profile.
    pub async fn sign_in(&self, token: &str, profile: Option<&UserProfile>) -> AuthResult<()> {
        if token.trim().is_empty() {
            return Err(AuthError::authentication("cannot sign in with an empty token"));
        }
        self.store.set_token(token).await?;
        if let Some(profile) = profile {
            self.store.set_user_profile(profile).await?;
        }
        info!("signed in");
        Ok(())
    }

    /// Signs out of the identity provider and forgets the local session.
    ///
    /// Never fails: a remote sign-out error is logged and reported, and the
    /// local session is cleared regardless.
    pub async fn logout(&self) -> LogoutReport {
        let remote_signed_out = match self.identity.sign_out().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "identity provider sign-out failed, clearing local session anyway");
                false
            }
        };
        self.store.clear().await;
        info!(remote_signed_out, "logged out");
        LogoutReport { remote_signed_out }
    }

    /// Obtains and stores a new bearer token.
    ///
    /// Returns `None` when the user has to sign in again; the expiry listener
    /// has been notified by then.
    pub async fn refresh_token(&self) -> Option<String> {
        match self.refresh_policy {
            RefreshPolicy::Independent => self.refresh_unlocked().await,
            RefreshPolicy::Coalesced => {
                let _guard = self.refresh_lock.lock().await;
                self.refresh_unlocked().await
            }
        }
    }

    /// Sends a request with the stored bearer token, refreshing it and
    /// retrying once if the server answers `401`.
    ///
    /// Statuses other than `401` are returned as-is. Errors are:
    /// - `MissingCredential` when no token is stored (no request is sent),
    /// - `AuthenticationFailed` when the refresh fails or the retry is also
    ///   rejected,
    /// - `Transport` when no response was received.
    ///
    /// The expiry listener is notified once for both authentication kinds,
    /// never for transport errors.
    pub async fn make_authenticated_request(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> AuthResult<HttpResponse> {
        let Some(mut token) = self.store.token().await else {
            self.expire("no stored token");
            return Err(AuthError::missing_credential("no authentication token found"));
        };

        let mut retries = 0;
        loop {
            let request = match authorized_request(url, &options, &token) {
                Ok(request) => request,
                Err(e) => {
                    self.expire("stored token is unusable");
                    return Err(e);
                }
            };
            debug!(method = %request.method, url, attempt = retries + 1, "sending authenticated request");

            let response = self.transport.send(request).await?;
            if response.status != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            if retries >= MAX_AUTH_RETRIES {
                self.expire("request still unauthorized after refreshing the token");
                return Err(AuthError::authentication(
                    "authentication failed: request still unauthorized after token refresh",
                ));
            }
            retries += 1;

            info!(url, "request unauthorized, refreshing token");
            match self.refresh_after_rejection(&token).await {
                Some(fresh) => token = fresh,
                // The listener was notified by the refresh.
                None => {
                    return Err(AuthError::authentication(
                        "authentication failed: could not refresh token",
                    ));
                }
            }
        }
    }

    async fn refresh_after_rejection(&self, rejected: &str) -> Option<String> {
        match self.refresh_policy {
            RefreshPolicy::Independent => self.refresh_unlocked().await,
            RefreshPolicy::Coalesced => {
                let _guard = self.refresh_lock.lock().await;
                if let Some(current) = self.store.token().await
                    && current != rejected
                {
                    debug!("token already refreshed by a concurrent request");
                    return Some(current);
                }
                self.refresh_unlocked().await
            }
        }
    }

    async fn refresh_unlocked(&self) -> Option<String> {
        match self.identity.is_signed_in().await {
            Ok(true) => {}
            Ok(false) => {
                self.expire("user is no longer signed in");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "failed to query sign-in status");
                self.expire("sign-in status unavailable");
                return None;
            }
        }

        let tokens = match self.identity.get_tokens().await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, "identity provider failed to issue tokens");
                self.expire("token refresh failed");
                return None;
            }
        };

        let Some(token) = tokens.usable_access_token() else {
            self.expire("identity provider returned no access token");
            return None;
        };

        if let Err(e) = self.store.set_token(token).await {
            warn!(error = %e, "failed to persist refreshed token");
            self.expire("refreshed token could not be stored");
            return None;
        }

        info!("token refreshed");
        Some(token.to_string())
    }

    fn expire(&self, reason: &str) {
        warn!(reason, "session expired");
        self.expiry.notify();
    }
}

/// Builds the request with the bearer token and a JSON content type unless
/// the caller chose another one.
fn authorized_request(url: &str, options: &RequestOptions, token: &str) -> AuthResult<HttpRequest> {
    let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|_| AuthError::authentication("stored token is not a valid header value"))?;
    bearer.set_sensitive(true);

    let mut request = HttpRequest::from_options(url, options);
    request.headers.insert(AUTHORIZATION, bearer);
    if !request.headers.contains_key(CONTENT_TYPE) {
        request
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoxFuture;
    use crate::error::AuthErrorKind;
    use crate::identity::IssuedTokens;
    use crate::store::{KeyValueStore, MemoryStore};
    use reqwest::header::ACCEPT;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeIdentity {
        signed_in: AuthResult<bool>,
        tokens: Mutex<VecDeque<AuthResult<IssuedTokens>>>,
        sign_out: Mutex<Option<AuthResult<()>>>,
        get_tokens_calls: AtomicUsize,
        sign_out_calls: AtomicUsize,
    }

    impl FakeIdentity {
        fn signed_in(tokens: Vec<AuthResult<IssuedTokens>>) -> Arc<Self> {
            Arc::new(Self {
                signed_in: Ok(true),
                tokens: Mutex::new(tokens.into()),
                sign_out: Mutex::new(Some(Ok(()))),
                get_tokens_calls: AtomicUsize::new(0),
                sign_out_calls: AtomicUsize::new(0),
            })
        }

        fn signed_out() -> Arc<Self> {
            Arc::new(Self {
                signed_in: Ok(false),
                tokens: Mutex::default(),
                sign_out: Mutex::new(Some(Ok(()))),
                get_tokens_calls: AtomicUsize::new(0),
                sign_out_calls: AtomicUsize::new(0),
            })
        }

        fn failing_sign_out() -> Arc<Self> {
            Arc::new(Self {
                signed_in: Ok(true),
                tokens: Mutex::default(),
                sign_out: Mutex::new(Some(Err(AuthError::identity("network unreachable")))),
                get_tokens_calls: AtomicUsize::new(0),
                sign_out_calls: AtomicUsize::new(0),
            })
        }

        fn get_tokens_calls(&self) -> usize {
            self.get_tokens_calls.load(Ordering::SeqCst)
        }
    }

    impl IdentityProvider for FakeIdentity {
        fn is_signed_in(&self) -> BoxFuture<'_, AuthResult<bool>> {
            let result = match &self.signed_in {
                Ok(value) => Ok(*value),
                Err(e) => Err(AuthError::identity(e.message().to_string())),
            };
            Box::pin(async move { result })
        }

        fn get_tokens(&self) -> BoxFuture<'_, AuthResult<IssuedTokens>> {
            self.get_tokens_calls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .tokens
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AuthError::identity("no scripted tokens")));
            Box::pin(async move { next })
        }

        fn sign_out(&self) -> BoxFuture<'_, AuthResult<()>> {
            self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
            let result = self.sign_out.lock().unwrap().take().unwrap_or(Ok(()));
            Box::pin(async move { result })
        }
    }

    #[derive(Default)]
    struct ScriptedTransport {
        responses: Mutex<VecDeque<AuthResult<HttpResponse>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn with(responses: Vec<AuthResult<HttpResponse>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::default(),
            })
        }

        fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl HttpTransport for ScriptedTransport {
        fn send(&self, request: HttpRequest) -> BoxFuture<'_, AuthResult<HttpResponse>> {
            self.requests.lock().unwrap().push(request);
            let next = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AuthError::transport("no scripted response")));
            Box::pin(async move { next })
        }
    }

    /// Replaces the stored token during the first send, the way a concurrent
    /// request's refresh would, and rejects that first request.
    struct SiblingRefreshTransport {
        store: TokenStore,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl HttpTransport for SiblingRefreshTransport {
        fn send(&self, request: HttpRequest) -> BoxFuture<'_, AuthResult<HttpResponse>> {
            Box::pin(async move {
                let first = {
                    let mut requests = self.requests.lock().unwrap();
                    requests.push(request);
                    requests.len() == 1
                };
                if first {
                    self.store.set_token("T2").await?;
                    Ok(HttpResponse::new(StatusCode::UNAUTHORIZED, ""))
                } else {
                    Ok(HttpResponse::new(StatusCode::OK, "{}"))
                }
            })
        }
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn store_with_token(token: &str) -> (Arc<MemoryStore>, TokenStore) {
        let backend = Arc::new(MemoryStore::with_entries([("token", token)]));
        (backend.clone(), TokenStore::new(backend))
    }

    fn ok(status: StatusCode) -> AuthResult<HttpResponse> {
        Ok(HttpResponse::new(status, "{}"))
    }

    const URL: &str = "https://api.example.com/calendars/primary/events";

    #[tokio::test]
    async fn missing_token_short_circuits() {
        let store = TokenStore::new(Arc::new(MemoryStore::new()));
        let transport = ScriptedTransport::with(vec![ok(StatusCode::OK)]);
        let session = AuthSession::new(store, FakeIdentity::signed_in(vec![]), transport.clone());
        let (count, callback) = counter();
        let _subscription = session.subscribe_expired(callback);

        let err = session
            .make_authenticated_request(URL, RequestOptions::get())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), AuthErrorKind::MissingCredential);
        assert!(err.is_auth_failure());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn retries_once_with_refreshed_token() {
        let (backend, store) = store_with_token("T1");
        let identity = FakeIdentity::signed_in(vec![Ok(IssuedTokens::new("T2"))]);
        let transport =
            ScriptedTransport::with(vec![ok(StatusCode::UNAUTHORIZED), ok(StatusCode::OK)]);
        let session = AuthSession::new(store, identity.clone(), transport.clone());
        let (count, callback) = counter();
        let _subscription = session.subscribe_expired(callback);

        let response = session
            .make_authenticated_request(URL, RequestOptions::get())
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].header("authorization"), Some("Bearer T1"));
        assert_eq!(requests[1].header("authorization"), Some("Bearer T2"));
        assert_eq!(identity.get_tokens_calls(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(backend.get("token").await.unwrap().as_deref(), Some("T2"));
    }

    #[tokio::test]
    async fn second_unauthorized_is_terminal() {
        let (_, store) = store_with_token("T1");
        let identity = FakeIdentity::signed_in(vec![
            Ok(IssuedTokens::new("T2")),
            Ok(IssuedTokens::new("T3")),
        ]);
        let transport = ScriptedTransport::with(vec![
            ok(StatusCode::UNAUTHORIZED),
            ok(StatusCode::UNAUTHORIZED),
            ok(StatusCode::OK),
        ]);
        let session = AuthSession::new(store, identity.clone(), transport.clone());
        let (count, callback) = counter();
        let _subscription = session.subscribe_expired(callback);

        let err = session
            .make_authenticated_request(URL, RequestOptions::get())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), AuthErrorKind::AuthenticationFailed);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(transport.requests().len(), 2);
        assert_eq!(identity.get_tokens_calls(), 1);
    }

    #[tokio::test]
    async fn signed_out_refresh_fails_without_retry() {
        let (_, store) = store_with_token("T1");
        let transport =
            ScriptedTransport::with(vec![ok(StatusCode::UNAUTHORIZED), ok(StatusCode::OK)]);
        let session = AuthSession::new(store, FakeIdentity::signed_out(), transport.clone());
        let (count, callback) = counter();
        let _subscription = session.subscribe_expired(callback);

        let err = session
            .make_authenticated_request(URL, RequestOptions::get())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), AuthErrorKind::AuthenticationFailed);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn refresh_token_when_signed_out() {
        let (_, store) = store_with_token("T1");
        let identity = FakeIdentity::signed_out();
        let session = AuthSession::new(store, identity.clone(), ScriptedTransport::with(vec![]));
        let (count, callback) = counter();
        let _subscription = session.subscribe_expired(callback);

        assert_eq!(session.refresh_token().await, None);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(identity.get_tokens_calls(), 0);
    }

    #[tokio::test]
    async fn refresh_token_rejects_empty_access_token() {
        let (backend, store) = store_with_token("T1");
        let identity = FakeIdentity::signed_in(vec![Ok(IssuedTokens::new(""))]);
        let session = AuthSession::new(store, identity, ScriptedTransport::with(vec![]));
        let (count, callback) = counter();
        let _subscription = session.subscribe_expired(callback);

        assert_eq!(session.refresh_token().await, None);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(backend.get("token").await.unwrap().as_deref(), Some("T1"));
    }

    #[tokio::test]
    async fn identity_error_notifies_once() {
        let (_, store) = store_with_token("T1");
        let identity =
            FakeIdentity::signed_in(vec![Err(AuthError::identity("token endpoint down"))]);
        let transport = ScriptedTransport::with(vec![ok(StatusCode::UNAUTHORIZED)]);
        let session = AuthSession::new(store, identity, transport.clone());
        let (count, callback) = counter();
        let _subscription = session.subscribe_expired(callback);

        let err = session
            .make_authenticated_request(URL, RequestOptions::get())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), AuthErrorKind::AuthenticationFailed);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn logout_clears_local_session_when_remote_fails() {
        let (backend, store) = store_with_token("T1");
        backend.set("userInfo", r#"{"name":"Ada"}"#).await.unwrap();
        let identity = FakeIdentity::failing_sign_out();
        let session = AuthSession::new(store, identity.clone(), ScriptedTransport::with(vec![]));

        let report = session.logout().await;

        assert!(!report.remote_signed_out);
        assert_eq!(identity.sign_out_calls.load(Ordering::SeqCst), 1);
        assert!(!backend.contains("token"));
        assert!(!backend.contains("userInfo"));
        assert!(!session.is_authenticated().await);
    }

    #[tokio::test]
    async fn logout_reports_remote_success() {
        let (_, store) = store_with_token("T1");
        let session = AuthSession::new(
            store,
            FakeIdentity::signed_in(vec![]),
            ScriptedTransport::with(vec![]),
        );
        assert!(session.logout().await.remote_signed_out);
    }

    #[tokio::test]
    async fn last_registered_listener_wins() {
        let session = AuthSession::new(
            TokenStore::new(Arc::new(MemoryStore::new())),
            FakeIdentity::signed_in(vec![]),
            ScriptedTransport::with(vec![]),
        );
        let (a_count, a) = counter();
        let (b_count, b) = counter();
        session.set_expired_callback(Some(Arc::new(a)));
        session.set_expired_callback(Some(Arc::new(b)));

        let _ = session
            .make_authenticated_request(URL, RequestOptions::get())
            .await;

        assert_eq!(a_count.load(Ordering::SeqCst), 0);
        assert_eq!(b_count.load(Ordering::SeqCst), 1);

        session.set_expired_callback(None);
        let _ = session
            .make_authenticated_request(URL, RequestOptions::get())
            .await;
        assert_eq!(b_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropped_subscription_stops_notifications() {
        let session = AuthSession::new(
            TokenStore::new(Arc::new(MemoryStore::new())),
            FakeIdentity::signed_in(vec![]),
            ScriptedTransport::with(vec![]),
        );
        let (count, callback) = counter();
        let subscription = session.subscribe_expired(callback);
        assert!(subscription.is_active());
        drop(subscription);

        let _ = session
            .make_authenticated_request(URL, RequestOptions::get())
            .await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn transport_errors_bypass_auth_handling() {
        let (_, store) = store_with_token("T1");
        let identity = FakeIdentity::signed_in(vec![Ok(IssuedTokens::new("T2"))]);
        let transport =
            ScriptedTransport::with(vec![Err(AuthError::transport("network unreachable"))]);
        let session = AuthSession::new(store, identity.clone(), transport);
        let (count, callback) = counter();
        let _subscription = session.subscribe_expired(callback);

        let err = session
            .make_authenticated_request(URL, RequestOptions::get())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), AuthErrorKind::Transport);
        assert!(!err.is_auth_failure());
        assert_eq!(err.message(), "network unreachable");
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(identity.get_tokens_calls(), 0);
    }

    #[tokio::test]
    async fn other_statuses_are_returned_unmodified() {
        let (_, store) = store_with_token("T1");
        let transport = ScriptedTransport::with(vec![Ok(HttpResponse::new(
            StatusCode::FORBIDDEN,
            r#"{"error":{"message":"forbidden"}}"#,
        ))]);
        let session = AuthSession::new(store, FakeIdentity::signed_in(vec![]), transport);

        let response = session
            .make_authenticated_request(URL, RequestOptions::delete())
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::FORBIDDEN);
        assert!(response.body.contains("forbidden"));
    }

    #[tokio::test]
    async fn caller_headers_are_preserved() {
        let (_, store) = store_with_token("T1");
        let transport = ScriptedTransport::with(vec![ok(StatusCode::OK), ok(StatusCode::OK)]);
        let session = AuthSession::new(store, FakeIdentity::signed_in(vec![]), transport.clone());

        let options = RequestOptions::post()
            .with_header(ACCEPT, HeaderValue::from_static("text/plain"))
            .with_body("{}");
        session.make_authenticated_request(URL, options).await.unwrap();

        let options = RequestOptions::put()
            .with_header(CONTENT_TYPE, HeaderValue::from_static("text/calendar"));
        session.make_authenticated_request(URL, options).await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].method, reqwest::Method::POST);
        assert_eq!(requests[0].body.as_deref(), Some("{}"));
        assert_eq!(requests[0].header("accept"), Some("text/plain"));
        assert_eq!(requests[0].header("content-type"), Some("application/json"));
        assert_eq!(requests[1].header("content-type"), Some("text/calendar"));
        assert!(requests[1].headers[AUTHORIZATION].is_sensitive());
    }

    #[tokio::test]
    async fn coalesced_policy_reuses_sibling_refresh() {
        let (_, store) = store_with_token("T1");
        let identity = FakeIdentity::signed_in(vec![Ok(IssuedTokens::new("T3"))]);
        let transport = Arc::new(SiblingRefreshTransport {
            store: store.clone(),
            requests: Mutex::default(),
        });
        let session = AuthSession::new(store, identity.clone(), transport.clone())
            .with_refresh_policy(RefreshPolicy::Coalesced);

        let response = session
            .make_authenticated_request(URL, RequestOptions::get())
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(identity.get_tokens_calls(), 0);
        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[1].header("authorization"), Some("Bearer T2"));
    }

    #[tokio::test]
    async fn independent_policy_refreshes_anyway() {
        let (_, store) = store_with_token("T1");
        let identity = FakeIdentity::signed_in(vec![Ok(IssuedTokens::new("T3"))]);
        let transport = Arc::new(SiblingRefreshTransport {
            store: store.clone(),
            requests: Mutex::default(),
        });
        let session = AuthSession::new(store, identity.clone(), transport.clone());

        session
            .make_authenticated_request(URL, RequestOptions::get())
            .await
            .unwrap();

        assert_eq!(identity.get_tokens_calls(), 1);
        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[1].header("authorization"), Some("Bearer T3"));
    }

    #[tokio::test]
    async fn sign_in_persists_token_and_profile() {
        let session = AuthSession::new(
            TokenStore::new(Arc::new(MemoryStore::new())),
            FakeIdentity::signed_in(vec![]),
            ScriptedTransport::with(vec![]),
        );
        assert!(!session.is_authenticated().await);
        assert!(session.sign_in("  ", None).await.is_err());

        let profile = UserProfile::new("Ada", "ada@example.com");
        session.sign_in("T1", Some(&profile)).await.unwrap();
        assert!(session.is_authenticated().await);
        assert_eq!(session.user_profile().await, Some(profile));
    }

    #[test]
    fn refresh_policy_serde() {
        let policy: RefreshPolicy = serde_json::from_str(r#""coalesced""#).unwrap();
        assert_eq!(policy, RefreshPolicy::Coalesced);
        assert_eq!(RefreshPolicy::default(), RefreshPolicy::Independent);
    }
}
