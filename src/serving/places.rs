//! Reference provider: place-details lookup used only to build the
//! matcher's reference object.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceDetails {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub photo_ref: Option<String>,
}

#[async_trait]
pub trait ReferenceProvider: Send + Sync {
    /// Look up place details for a free-text query. `Ok(None)` when the
    /// provider has nothing; the pipeline then runs with a name-only
    /// reference.
    async fn place_details(&self, query: &str) -> anyhow::Result<Option<PlaceDetails>>;
}

/// HTTP-backed provider.
pub struct HttpReferenceProvider {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl HttpReferenceProvider {
    pub fn new(endpoint: &str, api_key: &str) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl ReferenceProvider for HttpReferenceProvider {
    async fn place_details(&self, query: &str) -> anyhow::Result<Option<PlaceDetails>> {
        let url = format!("{}/place-details", self.endpoint);
        debug!(%query, "place details lookup");
        let resp = self
            .client
            .get(&url)
            .query(&[("query", query)])
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        if resp.status().as_u16() == 404 {
            return Ok(None);
        }
        if !resp.status().is_success() {
            anyhow::bail!("place details lookup failed: HTTP {}", resp.status());
        }
        Ok(Some(resp.json::<PlaceDetails>().await?))
    }
}
