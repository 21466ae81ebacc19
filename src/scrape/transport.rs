//! Wire seam for the upstream scrape service.
//!
//! The client speaks to the upstream through this trait so tests can
//! script exact status/header/body sequences without a network.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

/// One request to the upstream, already reduced to what the service
/// needs: a path under the configured base URL plus query/body.
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl WireRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn with_query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }
}

/// Raw upstream response. Headers are lowercased.
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl WireResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(|s| s.as_str())
    }
}

#[async_trait]
pub trait ScrapeTransport: Send + Sync {
    /// Execute one request. Errors here are connection-level only;
    /// non-2xx statuses come back as a normal `WireResponse`.
    async fn execute(&self, request: WireRequest) -> Result<WireResponse, String>;
}

/// reqwest-backed transport with API-key header auth.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    api_key_header: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, api_key_header: &str, api_key: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key_header: api_key_header.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl ScrapeTransport for HttpTransport {
    async fn execute(&self, request: WireRequest) -> Result<WireResponse, String> {
        let url = format!("{}{}", self.base_url, request.path);
        debug!(method = ?request.method, %url, "upstream request");

        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        builder = builder.header(&self.api_key_header, &self.api_key);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| e.to_string())?;
        let status = response.status().as_u16();

        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.as_str().to_lowercase(), v.to_string());
            }
        }

        let body = response.text().await.map_err(|e| e.to_string())?;
        Ok(WireResponse { status, headers, body })
    }
}
