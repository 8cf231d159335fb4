//! HTTP transport abstraction and the reqwest-backed implementation.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use pulselink_auth::TokenStore;
use pulselink_core::config::LinkConfig;
use pulselink_core::error::{LinkError, LinkResult};
use pulselink_core::request::{ApiResponse, Method, RequestDescriptor};

/// One-shot request transport.
///
/// A single attempt with no retry or queuing; the resilience layers sit on
/// top. Non-2xx responses come back as `Err(LinkError::Status { .. })` so the
/// executor can classify them.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Execute one attempt of the given request.
    async fn execute(&self, request: &RequestDescriptor) -> LinkResult<ApiResponse>;
}

/// Production transport backed by a shared `reqwest` client.
///
/// Injects the current bearer token (read at send time from the
/// [`TokenStore`], which refreshes proactively) and the configured
/// `X-Device-ID` header.
pub struct ReqwestTransport {
    http: reqwest::Client,
    config: LinkConfig,
    tokens: Option<Arc<TokenStore>>,
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("base_url", &self.config.base_url)
            .field("has_tokens", &self.tokens.is_some())
            .finish_non_exhaustive()
    }
}

impl ReqwestTransport {
    /// Create a transport without authentication.
    pub fn new(config: LinkConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            tokens: None,
        }
    }

    /// Create a transport that reads bearer tokens from the given store.
    pub fn with_token_store(config: LinkConfig, tokens: Arc<TokenStore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            tokens: Some(tokens),
        }
    }

    fn method_for(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: &RequestDescriptor) -> LinkResult<ApiResponse> {
        let url = self.config.url_for(request.path());
        let timeout = request.timeout().unwrap_or(self.config.request_timeout);

        let mut builder = self
            .http
            .request(Self::method_for(request.method()), &url)
            .timeout(timeout);

        for (name, value) in request.headers() {
            builder = builder.header(name, value);
        }
        if let Some(device_id) = &self.config.device_id {
            builder = builder.header("X-Device-ID", device_id);
        }
        // Token read happens at send time, never from a captured copy; the
        // store refreshes first when the token is about to expire.
        if let Some(tokens) = &self.tokens
            && let Some(bearer) = tokens.bearer().await
        {
            builder = builder.bearer_auth(bearer);
        }
        if let Some(body) = request.body() {
            builder = builder.body(body.clone());
        }

        trace!("{} {url}", request.method().as_str());

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                LinkError::Timeout
            } else {
                LinkError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(n, v)| {
                (
                    n.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| LinkError::Network(format!("body read failed: {e}")))?;

        if (200..300).contains(&status) {
            Ok(ApiResponse::new(status, headers, body))
        } else {
            Err(LinkError::from_status(status, &body))
        }
    }
}
