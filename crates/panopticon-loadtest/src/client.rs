//! API client abstraction used by virtual sessions
//!
//! Sessions only need four verbs and a status code. The reqwest-backed
//! [`HttpApiClient`] shares one connection pool across every session while
//! holding its own default headers.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tracing::warn;

use crate::error::TransportError;

/// Response as seen by the session engine
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed JSON body, if the response carried one
    pub body: Option<Value>,
}

impl ApiResponse {
    pub fn new(status: u16) -> Self {
        Self { status, body: None }
    }

    pub fn with_body(status: u16, body: Value) -> Self {
        Self {
            status,
            body: Some(body),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Top-level `id` field of the body
    pub fn id_field(&self) -> Option<&Value> {
        self.body.as_ref().and_then(|body| body.get("id"))
    }
}

/// HTTP capability consumed by the session engine
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Headers applied to every subsequent call. Called once per session.
    fn set_default_headers(&mut self, headers: &BTreeMap<String, String>);

    async fn get(&self, path: &str) -> Result<ApiResponse, TransportError>;

    async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse, TransportError>;

    async fn put(&self, path: &str, body: &Value) -> Result<ApiResponse, TransportError>;

    async fn delete(&self, path: &str) -> Result<ApiResponse, TransportError>;
}

/// reqwest-backed client for one session
#[derive(Debug, Clone)]
pub struct HttpApiClient {
    http: reqwest::Client,
    base_url: String,
    headers: HeaderMap,
}

impl HttpApiClient {
    /// Wrap a shared reqwest client. `base_url` must not end in a slash.
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            headers: HeaderMap::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<ApiResponse, TransportError> {
        let response = request.headers(self.headers.clone()).send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;

        // Non-JSON bodies are fine; the engine only needs the status then
        let body = if bytes.is_empty() {
            None
        } else {
            serde_json::from_slice(&bytes).ok()
        };

        Ok(ApiResponse { status, body })
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    fn set_default_headers(&mut self, headers: &BTreeMap<String, String>) {
        let mut map = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    map.insert(name, value);
                }
                _ => warn!("Skipping invalid default header {:?}", name),
            }
        }
        self.headers = map;
    }

    async fn get(&self, path: &str) -> Result<ApiResponse, TransportError> {
        self.send(self.http.get(self.url(path))).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse, TransportError> {
        self.send(self.http.post(self.url(path)).json(body)).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<ApiResponse, TransportError> {
        self.send(self.http.put(self.url(path)).json(body)).await
    }

    async fn delete(&self, path: &str) -> Result<ApiResponse, TransportError> {
        self.send(self.http.delete(self.url(path))).await
    }
}

/// Build the pooled reqwest client shared by every session
pub fn build_http_client(
    timeout: std::time::Duration,
    max_idle_per_host: usize,
) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(max_idle_per_host)
        .build()
}
