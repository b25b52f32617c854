//! HTTP transport abstraction.
//!
//! The session never talks to `reqwest` directly; it sends [`HttpRequest`]s
//! through an [`HttpTransport`]. [`ReqwestTransport`] is the production
//! implementation.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::BoxFuture;
use crate::error::{AuthError, AuthResult};

/// Caller-supplied parts of a request: everything except the URL and the
/// `Authorization` header.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// HTTP method; `GET` by default.
    pub method: Method,
    /// Extra headers. They are preserved when credentials are attached.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Option<String>,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    pub fn put() -> Self {
        Self::new(Method::PUT)
    }

    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    /// Builder method to add a header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Builder method to set a raw body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Builder method to set a JSON body.
    pub fn with_json<T: Serialize + ?Sized>(mut self, value: &T) -> AuthResult<Self> {
        let body = serde_json::to_string(value)
            .map_err(|e| AuthError::invalid_response(format!("failed to encode body: {}", e)))?;
        self.body = Some(body);
        Ok(self)
    }

    /// Builder method to set a form-encoded body and its content type.
    pub fn with_form<'a>(mut self, params: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();
        self.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        self.body = Some(body);
        self
    }
}

/// A fully built request, ready to send.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

impl HttpRequest {
    /// Builds a request from options without adding any credentials.
    pub fn from_options(url: impl Into<String>, options: &RequestOptions) -> Self {
        Self {
            method: options.method.clone(),
            url: url.into(),
            headers: options.headers.clone(),
            body: options.body.clone(),
        }
    }

    /// Returns a header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// A received response. The body is read eagerly.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> AuthResult<T> {
        serde_json::from_str(&self.body).map_err(|e| {
            AuthError::invalid_response(format!("failed to parse response: {}", e)).with_source(e)
        })
    }
}

/// Sends HTTP requests.
///
/// Implementations return `Err` only when no response was received; every
/// HTTP status, including 401 and 5xx, is an `Ok` response.
pub trait HttpTransport: Send + Sync {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, AuthResult<HttpResponse>>;
}

/// [`HttpTransport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> AuthResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AuthError::configuration(format!("failed to create HTTP client: {}", e))
                    .with_source(e)
            })?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, AuthResult<HttpResponse>> {
        Box::pin(async move {
            let mut builder = self
                .client
                .request(request.method, &request.url)
                .headers(request.headers);
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().await.map_err(|e| {
                let message = if e.is_timeout() {
                    "request timeout".to_string()
                } else if e.is_connect() {
                    format!("connection failed: {}", e)
                } else {
                    format!("request failed: {}", e)
                };
                AuthError::transport(message).with_source(e)
            })?;

            let status = response.status();
            let headers = response.headers().clone();
            let body = response.text().await.map_err(|e| {
                AuthError::transport(format!("failed to read response: {}", e)).with_source(e)
            })?;

            debug!(%status, bytes = body.len(), "received response");
            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        })
    }
}
