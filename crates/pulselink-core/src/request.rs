//! Request and response types carried through the pipeline.
//!
//! A [`RequestDescriptor`] is fully specified at construction and immutable
//! afterwards; it moves by value from the facade into the offline queue or
//! the backoff executor, so ownership transfers instead of being shared.

use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{LinkError, LinkResult};

/// HTTP method for an outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl Method {
    /// Wire representation of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// An opaque, fully-specified outbound request.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    path: String,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
    timeout: Option<Duration>,
}

impl RequestDescriptor {
    /// Create a descriptor with the given method and backend-relative path.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    /// Shorthand for a GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// Shorthand for a POST request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    /// Shorthand for a PUT request.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    /// Shorthand for a DELETE request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Attach a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach a raw body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Attach a JSON body and the matching content type.
    pub fn with_json<T: Serialize>(self, value: &T) -> LinkResult<Self> {
        let body = serde_json::to_vec(value)
            .map_err(|e| LinkError::Network(format!("JSON encode failed: {e}")))?;
        Ok(self
            .with_header("Content-Type", "application/json")
            .with_body(body))
    }

    /// Override the per-attempt timeout for this request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// HTTP method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Backend-relative path, e.g. `/patients/42`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Headers attached to this request.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Request body, if any.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Per-attempt timeout override, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// A completed HTTP response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl ApiResponse {
    /// Assemble a response from its parts.
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Response headers.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Raw response body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> LinkResult<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| LinkError::Network(format!("JSON decode failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn descriptor_builder_collects_parts() {
        let req = RequestDescriptor::post("/reports")
            .with_header("X-Device-ID", "unit-7")
            .with_body(&b"payload"[..])
            .with_timeout(Duration::from_secs(10));

        assert_eq!(req.method(), Method::Post);
        assert_eq!(req.path(), "/reports");
        assert_eq!(req.headers().len(), 1);
        assert_eq!(req.body().unwrap().as_ref(), b"payload");
        assert_eq!(req.timeout(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn json_body_sets_content_type() {
        let req = RequestDescriptor::post("/cases")
            .with_json(&serde_json::json!({"id": 1}))
            .unwrap();

        assert!(
            req.headers()
                .iter()
                .any(|(n, v)| n == "Content-Type" && v == "application/json")
        );
        assert!(req.body().is_some());
    }

    #[test]
    fn response_json_round_trip() {
        let resp = ApiResponse::new(200, Vec::new(), Bytes::from_static(b"{\"ok\":true}"));
        assert!(resp.is_success());
        let value: serde_json::Value = resp.json().unwrap();
        assert_eq!(value["ok"], serde_json::json!(true));
    }
}
