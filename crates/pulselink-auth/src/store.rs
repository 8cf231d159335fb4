//! Shared token store with single-flight proactive refresh.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use pulselink_core::error::{LinkError, LinkResult};

use crate::token::TokenPair;

/// Configuration for the refresh coordinator.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Refresh endpoint path, relative to the backend base URL.
    pub refresh_path: String,
    /// Refresh when the access token expires within this window.
    pub refresh_skew: Duration,
    /// Timeout for the refresh call itself.
    pub refresh_timeout: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            refresh_path: "/auth/refresh".to_string(),
            refresh_skew: Duration::from_secs(60),
            refresh_timeout: Duration::from_secs(10),
        }
    }
}

impl TokenConfig {
    /// Create a configuration with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the refresh endpoint path.
    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    /// Set the expiry skew window.
    pub fn with_refresh_skew(mut self, skew: Duration) -> Self {
        self.refresh_skew = skew;
        self
    }

    /// Set the refresh call timeout.
    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }
}

/// Wire shape of a successful refresh response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    refresh_token: Option<String>,
}

/// Process-wide token state shared by every request path.
///
/// The pair is swapped atomically on refresh, so in-flight and future
/// requests always read the current value at send time rather than a stale
/// captured copy. At most one refresh is in flight at a time: concurrent
/// callers wait on the gate and re-check expiry once it is their turn, so
/// they share the winner's outcome instead of issuing their own call.
pub struct TokenStore {
    pair: ArcSwapOption<TokenPair>,
    refresh_gate: Mutex<()>,
    http: reqwest::Client,
    refresh_url: String,
    config: TokenConfig,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("refresh_url", &self.refresh_url)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TokenStore {
    /// Create a store for the given backend base URL.
    pub fn new(base_url: impl AsRef<str>, config: TokenConfig) -> Self {
        let base = base_url.as_ref().trim_end_matches('/');
        let path = &config.refresh_path;
        let refresh_url = if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        };
        Self {
            pair: ArcSwapOption::empty(),
            refresh_gate: Mutex::new(()),
            http: reqwest::Client::new(),
            refresh_url,
            config,
        }
    }

    /// Install a token pair (login).
    pub fn set(&self, pair: TokenPair) {
        self.pair.store(Some(Arc::new(pair)));
    }

    /// Drop the stored pair (logout).
    pub fn clear(&self) {
        self.pair.store(None);
    }

    /// Snapshot of the current pair.
    pub fn current(&self) -> Option<Arc<TokenPair>> {
        self.pair.load_full()
    }

    /// Access token to present on the next request, refreshed first if it is
    /// about to expire.
    ///
    /// Fails open: when the refresh cannot run (no refresh token) or does not
    /// succeed, the stale access token is returned unchanged and the
    /// backend's eventual 401 is the caller-visible symptom. Returns `None`
    /// only when no pair is stored at all.
    pub async fn bearer(&self) -> Option<String> {
        let pair = self.pair.load_full()?;
        if pair.expires_within(self.config.refresh_skew) {
            self.refresh_if_stale().await;
        }
        self.pair.load_full().map(|p| p.access_token.clone())
    }

    /// Force one refresh attempt regardless of expiry. Returns `true` when a
    /// new pair was installed. Used by the 401 replay path.
    pub async fn force_refresh(&self) -> bool {
        let _guard = self.refresh_gate.lock().await;
        match self.refresh_once().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Forced token refresh failed: {e}");
                false
            }
        }
    }

    /// Single-flight refresh: serialize on the gate, then re-check expiry in
    /// case another caller already refreshed while we waited.
    async fn refresh_if_stale(&self) {
        let _guard = self.refresh_gate.lock().await;

        let Some(pair) = self.pair.load_full() else {
            return;
        };
        if !pair.expires_within(self.config.refresh_skew) {
            debug!("Token already refreshed by a concurrent request");
            return;
        }

        // Best-effort by design: one attempt, no backoff. The next request
        // cycle will try again.
        if let Err(e) = self.refresh_once().await {
            warn!("Token refresh failed, continuing with stale token: {e}");
        }
    }

    async fn refresh_once(&self) -> LinkResult<()> {
        let pair = self
            .pair
            .load_full()
            .ok_or_else(|| LinkError::Auth("no token pair stored".to_string()))?;
        let refresh_token = pair
            .refresh_token
            .as_ref()
            .ok_or_else(|| LinkError::Auth("no refresh token available".to_string()))?;

        let response = self
            .http
            .post(&self.refresh_url)
            .bearer_auth(refresh_token)
            .timeout(self.config.refresh_timeout)
            .send()
            .await
            .map_err(|e| LinkError::Auth(format!("refresh request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LinkError::Auth(format!(
                "refresh rejected with status {status}"
            )));
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| LinkError::Auth(format!("refresh response malformed: {e}")))?;

        // New refresh tokens are rotated in when the backend sends one;
        // otherwise the existing one stays valid.
        let refresh_token = body
            .refresh_token
            .or_else(|| pair.refresh_token.clone());
        self.pair.store(Some(Arc::new(TokenPair {
            access_token: body.access_token,
            refresh_token,
        })));

        debug!("Access token refreshed");
        Ok(())
    }
}
