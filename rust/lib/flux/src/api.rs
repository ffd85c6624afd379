//! The API-client seam: everything the core needs from the backend.
//!
//! Implemented over HTTP by the `argo-client` crate. [`OfflineBackend`] is a
//! stand-in that fails every call with a network error.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

// ── Error ──

/// Failure classes of an API call, derived from the status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transport failure, status 0.
    Network,
    /// Request timed out, status 408.
    Timeout,
    /// Server rejected the request, 4xx.
    Client,
    /// Server failed, 5xx.
    Server,
}

/// Classified API error.
///
/// `status` is 0 for network failures, 408 for timeouts, otherwise the HTTP
/// status the server returned. `detail` carries the server's structured error
/// body when it sent one.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} (status {status})")]
pub struct ApiError {
    pub status: u16,
    pub message: String,
    pub detail: Option<Value>,
}

impl ApiError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: 0,
            message: message.into(),
            detail: None,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            status: 408,
            message: message.into(),
            detail: None,
        }
    }

    pub fn from_status(status: u16, message: impl Into<String>, detail: Option<Value>) -> Self {
        Self {
            status,
            message: message.into(),
            detail,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self.status {
            0 => ErrorKind::Network,
            408 => ErrorKind::Timeout,
            500..=599 => ErrorKind::Server,
            _ => ErrorKind::Client,
        }
    }

    /// Network failures, timeouts and server errors may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Client)
    }

    /// Short text suitable for a user-facing notification.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Network => "Cannot reach the server. Check your connection.".to_string(),
            ErrorKind::Timeout => "The server took too long to respond.".to_string(),
            ErrorKind::Client => format!("Request rejected: {}", self.message),
            ErrorKind::Server => format!("Server error: {}", self.message),
        }
    }
}

// ── Request options ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Per-call options for [`Backend::request`].
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<Value>,
    /// Query-string pairs. Encoded by the backend, never by the caller.
    pub query: Vec<(String, String)>,
    /// Overrides the client's default timeout.
    pub timeout: Option<Duration>,
    /// Overrides the client's default attempt count.
    pub attempts: Option<u32>,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self {
            method: Method::Get,
            body: None,
            query: Vec::new(),
            timeout: None,
            attempts: None,
        }
    }

    pub fn post(body: Value) -> Self {
        Self {
            method: Method::Post,
            body: Some(body),
            query: Vec::new(),
            timeout: None,
            attempts: None,
        }
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }
}

// ── Backend ──

/// The ARGO backend as seen by the core.
///
/// Only `request` is required; the named endpoints are built on it.
#[async_trait::async_trait]
pub trait Backend: Send + Sync + 'static {
    async fn request(&self, endpoint: &str, options: RequestOptions) -> Result<Value, ApiError>;

    /// Connectivity check.
    async fn health_check(&self) -> Result<Value, ApiError> {
        self.request("/health", RequestOptions::get()).await
    }

    /// Database / vector store / model status.
    async fn system_status(&self) -> Result<Value, ApiError> {
        self.request("/system-status", RequestOptions::get()).await
    }

    /// Natural-language query against the float data.
    async fn query(&self, text: &str, language: &str) -> Result<Value, ApiError> {
        self.request(
            "/query",
            RequestOptions::post(serde_json::json!({ "query": text, "language": language }))
                .timeout(Duration::from_secs(45)),
        )
        .await
    }

    /// Float profiles, optionally filtered by region.
    async fn profiles(&self, region: Option<&str>, limit: usize) -> Result<Value, ApiError> {
        let mut options = RequestOptions::get();
        if let Some(region) = region {
            options = options.param("region", region);
        }
        self.request("/profiles", options.param("limit", limit)).await
    }

    /// Known ocean regions and their bounds.
    async fn regions(&self) -> Result<Value, ApiError> {
        self.request("/regions", RequestOptions::get()).await
    }
}

/// Backend used when no server is configured. Every call is a network failure.
pub struct OfflineBackend;

#[async_trait::async_trait]
impl Backend for OfflineBackend {
    async fn request(&self, endpoint: &str, _options: RequestOptions) -> Result<Value, ApiError> {
        Err(ApiError::network(format!("offline: {} not reachable", endpoint)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_status() {
        assert_eq!(ApiError::network("x").kind(), ErrorKind::Network);
        assert_eq!(ApiError::timeout("x").kind(), ErrorKind::Timeout);
        assert_eq!(ApiError::from_status(404, "x", None).kind(), ErrorKind::Client);
        assert_eq!(ApiError::from_status(422, "x", None).kind(), ErrorKind::Client);
        assert_eq!(ApiError::from_status(500, "x", None).kind(), ErrorKind::Server);
        assert_eq!(ApiError::from_status(503, "x", None).kind(), ErrorKind::Server);
    }

    #[test]
    fn only_client_errors_are_final() {
        assert!(ApiError::network("x").is_retryable());
        assert!(ApiError::timeout("x").is_retryable());
        assert!(ApiError::from_status(502, "x", None).is_retryable());
        assert!(!ApiError::from_status(400, "x", None).is_retryable());
    }

    #[test]
    fn display_includes_status() {
        let err = ApiError::from_status(503, "vector store unavailable", None);
        assert_eq!(err.to_string(), "vector store unavailable (status 503)");
    }

    #[tokio::test]
    async fn offline_backend_fails_every_endpoint() {
        let backend = OfflineBackend;
        assert_eq!(backend.health_check().await.unwrap_err().status, 0);
        assert_eq!(backend.system_status().await.unwrap_err().kind(), ErrorKind::Network);
        assert!(backend.query("salinity near Chennai", "en").await.is_err());
    }

    struct Echo;

    #[async_trait::async_trait]
    impl Backend for Echo {
        async fn request(&self, endpoint: &str, options: RequestOptions) -> Result<Value, ApiError> {
            Ok(serde_json::json!({
                "endpoint": endpoint,
                "post": options.method == Method::Post,
                "body": options.body,
                "query": options.query,
            }))
        }
    }

    #[tokio::test]
    async fn default_endpoints_route_through_request() {
        let echo = Echo;
        let v = echo.query("temperature in the Arabian Sea", "hi").await.unwrap();
        assert_eq!(v["endpoint"], "/query");
        assert_eq!(v["post"], true);
        assert_eq!(v["body"]["language"], "hi");

        let v = echo.profiles(Some("bay_of_bengal"), 20).await.unwrap();
        assert_eq!(v["endpoint"], "/profiles");
        assert_eq!(v["query"], serde_json::json!([["region", "bay_of_bengal"], ["limit", "20"]]));

        let v = echo.profiles(None, 5).await.unwrap();
        assert_eq!(v["query"], serde_json::json!([["limit", "5"]]));
    }
}
