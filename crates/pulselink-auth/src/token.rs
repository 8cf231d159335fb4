//! Token pair and JWT expiry decoding.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

/// A bearer credential pair as issued by the backend.
///
/// Both tokens are opaque to this layer apart from the access token's
/// embedded `exp` claim. The pair is replaced wholesale on refresh; fields
/// are never mutated individually.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    /// Short-lived access token presented on every request.
    pub access_token: String,
    /// Longer-lived token used to mint a new access token. Absent in flows
    /// that only hand the client an access token.
    pub refresh_token: Option<String>,
}

impl TokenPair {
    /// Create a pair with both tokens.
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: Some(refresh_token.into()),
        }
    }

    /// Create a pair with only an access token.
    pub fn access_only(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
        }
    }

    /// Expiry of the access token, if its `exp` claim is readable.
    pub fn expires_at(&self) -> Option<SystemTime> {
        decode_expiry(&self.access_token)
    }

    /// Whether the access token expires within `skew` (or is unreadable, in
    /// which case it is treated as expiring now).
    pub fn expires_within(&self, skew: Duration) -> bool {
        match self.expires_at() {
            Some(expiry) => match expiry.duration_since(SystemTime::now()) {
                Ok(remaining) => remaining < skew,
                // Already past expiry.
                Err(_) => true,
            },
            // Malformed token: assume the worst and let the store try a
            // refresh. See the fail-open note on `TokenStore::bearer`.
            None => true,
        }
    }
}

// Tokens are credentials; keep them out of logs.
impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: i64,
}

/// Decode the `exp` claim from a JWT without verifying its signature.
///
/// Returns `None` for anything that does not parse as
/// `header.payload.signature` with a base64url JSON payload carrying a
/// numeric `exp`.
pub fn decode_expiry(token: &str) -> Option<SystemTime> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claim: ExpiryClaim = serde_json::from_slice(&bytes).ok()?;
    let exp = u64::try_from(claim.exp).ok()?;
    Some(UNIX_EPOCH + Duration::from_secs(exp))
}
