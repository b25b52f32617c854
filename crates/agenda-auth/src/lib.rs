//! Session core for the agenda calendar client.
//!
//! - [`TokenStore`] persists the bearer token and the user profile through an
//!   opaque [`KeyValueStore`]
//! - [`IdentityProvider`] is the contract of the sign-in backend, implemented
//!   for Google by [`GoogleIdentity`]
//! - [`AuthSession`] owns the token lifecycle and turns any outbound call into
//!   one that recovers from token expiry exactly once
//!
//! # Request flow
//!
//! ```text
//!   make_authenticated_request
//!            │
//!            ▼
//!     token stored? ──no──► notify expiry, MissingCredential
//!            │ yes
//!            ▼
//!      send (Bearer T) ──transport error──► propagated as-is
//!            │
//!      401? ─┴─no──► response returned unchanged
//!            │ yes
//!            ▼
//!      refresh_token ──none──► AuthenticationFailed (already notified)
//!            │ T'
//!            ▼
//!      send (Bearer T') ──401──► notify expiry, AuthenticationFailed
//!            │
//!            ▼
//!        response
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use agenda_auth::{AuthSession, FileStore, RequestOptions, TokenStore};
//!
//! let store = TokenStore::new(Arc::new(FileStore::new(path)));
//! let session = Arc::new(AuthSession::new(store, identity, transport));
//! let _subscription = session.subscribe_expired(|| eprintln!("session expired"));
//!
//! let response = session
//!     .make_authenticated_request(url, RequestOptions::get())
//!     .await?;
//! ```

use std::future::Future;
use std::pin::Pin;

pub mod error;
pub mod google;
pub mod identity;
pub mod notify;
pub mod session;
pub mod store;
pub mod token_store;
pub mod transport;

pub use error::{AuthError, AuthErrorKind, AuthResult};
pub use google::{GoogleEndpoints, GoogleIdentity, OAuthCredentials};
pub use identity::{IdentityProvider, IssuedTokens};
pub use notify::{ExpiredCallback, ExpirySubscription};
pub use reqwest::{Method, StatusCode};
pub use session::{AuthSession, LogoutReport, RefreshPolicy, MAX_AUTH_RETRIES};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use token_store::{SessionKey, TokenStore};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, RequestOptions};

/// A boxed future for async trait methods.
///
/// The collaborator traits are used as trait objects, so their async methods
/// return boxed futures instead of using `async fn`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
