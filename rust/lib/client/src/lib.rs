//! ARGO backend HTTP client.
//!
//! Implements [`argo_flux::Backend`] over reqwest. Every failure is
//! classified into an [`ApiError`]: status 0 for transport errors, 408 for
//! timeouts, otherwise the HTTP status with the server's `detail` body.
//! Network errors, timeouts and 5xx responses are retried with exponential
//! backoff; 4xx responses are returned at once.
//!
//! # Usage
//!
//! ```ignore
//! use argo_client::HttpBackend;
//!
//! let backend = HttpBackend::from_config(&config.api);
//! let status = backend.system_status().await?;
//! ```

use std::time::Duration;

use argo_flux::api::Method;
use argo_flux::config::ApiSection;
use argo_flux::{ApiError, Backend, RequestOptions};
use serde_json::Value;
use tracing::{debug, warn};

// ── HttpBackend ─────────────────────────────────────────────────────

pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    query_timeout: Duration,
    attempts: u32,
    backoff: Duration,
}

impl HttpBackend {
    /// Client for `base_url` with the default timeouts and retry policy.
    pub fn new(base_url: impl Into<String>) -> Self {
        let defaults = ApiSection::default();
        Self {
            base_url: base_url.into(),
            ..Self::from_config(&defaults)
        }
        .normalized()
    }

    pub fn from_config(api: &ApiSection) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: api.base_url.clone(),
            timeout: api.timeout(),
            query_timeout: api.query_timeout(),
            attempts: api.attempts.max(1),
            backoff: api.backoff(),
        }
        .normalized()
    }

    /// Total attempts per request and the first retry delay.
    pub fn with_retry(mut self, attempts: u32, backoff: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.backoff = backoff;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn normalized(mut self) -> Self {
        self.base_url = self.base_url.trim_end_matches('/').to_string();
        self
    }

    fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }

    /// Delay before retry number `retry` (1-based): backoff, 2×, 4×, …
    fn delay(&self, retry: u32) -> Duration {
        self.backoff * 2u32.saturating_pow(retry.saturating_sub(1))
    }

    async fn send_once(
        &self,
        url: &str,
        options: &RequestOptions,
        timeout: Duration,
    ) -> Result<Value, ApiError> {
        let builder = match options.method {
            Method::Get => self.http.get(url),
            Method::Post => self.http.post(url),
        };
        let builder = match &options.body {
            Some(body) => builder.json(body),
            None => builder,
        };
        let builder = if options.query.is_empty() {
            builder
        } else {
            builder.query(&options.query)
        };

        let resp = builder
            .timeout(timeout)
            .send()
            .await
            .map_err(classify)?;
        let status = resp.status();
        let text = resp.text().await.map_err(classify)?;

        if !status.is_success() {
            return Err(server_error(status, &text));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| {
            ApiError::from_status(status.as_u16(), format!("invalid JSON in response: {}", e), None)
        })
    }
}

#[async_trait::async_trait]
impl Backend for HttpBackend {
    async fn request(&self, endpoint: &str, options: RequestOptions) -> Result<Value, ApiError> {
        let url = self.url(endpoint);
        let timeout = options.timeout.unwrap_or(self.timeout);
        let attempts = options.attempts.unwrap_or(self.attempts).max(1);

        let mut attempt = 1;
        loop {
            debug!(url, attempt, method = ?options.method, "request");
            match self.send_once(&url, &options, timeout).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    let delay = self.delay(attempt);
                    warn!(url, attempt, error = %e, delay_ms = delay.as_millis() as u64, "retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    debug!(url, attempt, error = %e, "request failed");
                    return Err(e);
                }
            }
        }
    }

    async fn query(&self, text: &str, language: &str) -> Result<Value, ApiError> {
        self.request(
            "/query",
            RequestOptions::post(serde_json::json!({ "query": text, "language": language }))
                .timeout(self.query_timeout),
        )
        .await
    }
}

/// Map a transport-level reqwest failure.
fn classify(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::timeout(format!("request timed out: {}", e))
    } else {
        ApiError::network(format!("network error: {}", e))
    }
}

/// Map a non-2xx response. The server's `detail` field, if any, becomes the
/// message; the whole JSON body is kept as detail.
fn server_error(status: reqwest::StatusCode, body: &str) -> ApiError {
    let detail: Option<Value> = serde_json::from_str(body).ok();
    let message = detail
        .as_ref()
        .and_then(|d| d.get("detail"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
    ApiError::from_status(status.as_u16(), message, detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use argo_flux::ErrorKind;
    use axum::extract::{RawQuery, State};
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;

    type Hits = Arc<AtomicUsize>;

    async fn health(State(hits): State<Hits>) -> Json<Value> {
        hits.fetch_add(1, Ordering::SeqCst);
        Json(json!({"status": "healthy"}))
    }

    /// Fails twice with 503, then succeeds.
    async fn flaky(State(hits): State<Hits>) -> (StatusCode, Json<Value>) {
        let n = hits.fetch_add(1, Ordering::SeqCst);
        if n < 2 {
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"detail": "warming up"})))
        } else {
            (StatusCode::OK, Json(json!({"database": "connected"})))
        }
    }

    async fn broken(State(hits): State<Hits>) -> (StatusCode, Json<Value>) {
        hits.fetch_add(1, Ordering::SeqCst);
        (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"detail": "vector store down"})))
    }

    async fn rejected(State(hits): State<Hits>) -> (StatusCode, Json<Value>) {
        hits.fetch_add(1, Ordering::SeqCst);
        (StatusCode::BAD_REQUEST, Json(json!({"detail": "unknown region"})))
    }

    async fn slow() -> Json<Value> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Json(json!({}))
    }

    async fn echo(Json(body): Json<Value>) -> Json<Value> {
        Json(json!({"received": body}))
    }

    async fn raw_query(RawQuery(query): RawQuery) -> Json<Value> {
        Json(json!({"query": query}))
    }

    struct TestServer {
        base_url: String,
        hits: Hits,
    }

    async fn start_test_server() -> TestServer {
        let hits: Hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/health", get(health))
            .route("/system-status", get(flaky))
            .route("/broken", get(broken))
            .route("/rejected", get(rejected))
            .route("/slow", get(slow))
            .route("/query", post(echo))
            .route("/profiles", get(raw_query))
            .with_state(hits.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestServer {
            base_url: format!("http://{}", addr),
            hits,
        }
    }

    fn client(server: &TestServer) -> HttpBackend {
        HttpBackend::new(&server.base_url).with_retry(3, Duration::from_millis(1))
    }

    // =====================================================================
    // Success
    // =====================================================================

    #[tokio::test]
    async fn health_check_returns_json() {
        let server = start_test_server().await;
        let body = client(&server).health_check().await.unwrap();
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn query_posts_text_and_language() {
        let server = start_test_server().await;
        let body = client(&server)
            .query("salinity in the Bay of Bengal", "hi")
            .await
            .unwrap();
        assert_eq!(body["received"]["query"], "salinity in the Bay of Bengal");
        assert_eq!(body["received"]["language"], "hi");
    }

    #[tokio::test]
    async fn profiles_builds_query_string() {
        let server = start_test_server().await;
        let body = client(&server)
            .profiles(Some("arabian_sea"), 20)
            .await
            .unwrap();
        assert_eq!(body["query"], "region=arabian_sea&limit=20");
    }

    #[tokio::test]
    async fn profiles_encodes_region() {
        let server = start_test_server().await;
        let body = client(&server)
            .profiles(Some("bay of bengal&limit=1"), 20)
            .await
            .unwrap();
        assert_eq!(body["query"], "region=bay+of+bengal%26limit%3D1&limit=20");
    }

    // =====================================================================
    // Retry
    // =====================================================================

    #[tokio::test]
    async fn server_errors_are_retried() {
        let server = start_test_server().await;
        let body = client(&server).system_status().await.unwrap();
        assert_eq!(body["database"], "connected");
        assert_eq!(server.hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_stop_after_attempts() {
        let server = start_test_server().await;
        let err = client(&server)
            .request("/broken", RequestOptions::get())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Server);
        assert_eq!(err.status, 500);
        assert_eq!(err.message, "vector store down");
        assert_eq!(server.hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = start_test_server().await;
        let err = client(&server)
            .request("/rejected", RequestOptions::get())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Client);
        assert_eq!(err.message, "unknown region");
        assert_eq!(err.detail, Some(json!({"detail": "unknown region"})));
        assert_eq!(server.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn per_request_attempts_override() {
        let server = start_test_server().await;
        let err = client(&server)
            .request("/broken", RequestOptions::get().attempts(1))
            .await
            .unwrap_err();
        assert_eq!(err.status, 500);
        assert_eq!(server.hits.load(Ordering::SeqCst), 1);
    }

    // =====================================================================
    // Transport failures
    // =====================================================================

    #[tokio::test]
    async fn timeout_is_status_408() {
        let server = start_test_server().await;
        let err = client(&server)
            .with_timeout(Duration::from_millis(50))
            .request("/slow", RequestOptions::get().attempts(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.status, 408);
    }

    #[tokio::test]
    async fn refused_connection_is_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = HttpBackend::new(format!("http://{}", addr))
            .with_retry(2, Duration::from_millis(1))
            .health_check()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(err.status, 0);
    }

    // =====================================================================
    // Helpers
    // =====================================================================

    #[test]
    fn backoff_doubles() {
        let backend = HttpBackend::new("http://localhost:8002/");
        assert_eq!(backend.base_url(), "http://localhost:8002");
        assert_eq!(backend.delay(1), Duration::from_millis(500));
        assert_eq!(backend.delay(2), Duration::from_millis(1000));
        assert_eq!(backend.delay(3), Duration::from_millis(2000));
    }

    #[test]
    fn url_joins_with_single_slash() {
        let backend = HttpBackend::new("http://h");
        assert_eq!(backend.url("/health"), "http://h/health");
        assert_eq!(backend.url("regions"), "http://h/regions");
    }

    #[test]
    fn error_without_json_uses_reason() {
        let err = server_error(reqwest::StatusCode::BAD_GATEWAY, "<html>");
        assert_eq!(err.message, "Bad Gateway");
        assert!(err.detail.is_none());
        assert!(err.is_retryable());
    }
}
