//! Error taxonomy for the resilient request pipeline.

use thiserror::Error;

/// Convenient result alias used throughout the workspace.
pub type LinkResult<T> = Result<T, LinkError>;

/// Errors surfaced by the resilient API access layer.
///
/// Retry classification lives here (`is_retryable`) so the backoff executor,
/// the offline queue, and the duplex manager all agree on which failures are
/// transient.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The request never produced an HTTP response (DNS failure, connection
    /// refused, link dropped mid-flight).
    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code of the response.
        status: u16,
        /// Response body, truncated to something loggable.
        body: String,
    },

    /// The per-attempt timeout elapsed before a response arrived.
    #[error("Operation timed out")]
    Timeout,

    /// A queued request was dropped before it could be settled. Only seen at
    /// process shutdown, when the offline queue is torn down with entries
    /// still waiting for connectivity.
    #[error("Request dropped before completion")]
    QueueClosed,

    /// Token refresh plumbing failed. Absorbed by the refresh coordinator
    /// and never surfaced to request callers.
    #[error("Auth error: {0}")]
    Auth(String),
}

impl LinkError {
    /// Build a `Status` error from a response, truncating the body.
    pub fn from_status(status: u16, body: &[u8]) -> Self {
        const MAX_BODY: usize = 512;
        let body = String::from_utf8_lossy(&body[..body.len().min(MAX_BODY)]).into_owned();
        Self::Status { status, body }
    }

    /// HTTP status code carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the backoff executor should retry after this failure.
    ///
    /// Network-level failures and timeouts are always retryable (the link may
    /// simply have dropped). Server errors, 408 and 429 are retryable; every
    /// other client error is terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout => true,
            Self::Status { status, .. } => retryable_status(*status),
            Self::QueueClosed | Self::Auth(_) => false,
        }
    }
}

/// Whether an HTTP status code indicates a transient condition.
pub fn retryable_status(status: u16) -> bool {
    status >= 500 || status == 408 || status == 429
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_and_timeout_errors_are_retryable() {
        assert!(LinkError::Network("connection reset".into()).is_retryable());
        assert!(LinkError::Timeout.is_retryable());
    }

    #[test]
    fn server_errors_and_throttling_are_retryable() {
        for status in [500, 502, 503, 504, 408, 429] {
            assert!(
                LinkError::from_status(status, b"").is_retryable(),
                "status {status} should be retryable"
            );
        }
    }

    #[test]
    fn client_errors_are_terminal() {
        for status in [400, 401, 403, 404, 409, 422] {
            assert!(
                !LinkError::from_status(status, b"").is_retryable(),
                "status {status} should be terminal"
            );
        }
    }

    #[test]
    fn status_body_is_truncated() {
        let long = vec![b'x'; 4096];
        let err = LinkError::from_status(500, &long);
        match err {
            LinkError::Status { body, .. } => assert_eq!(body.len(), 512),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
