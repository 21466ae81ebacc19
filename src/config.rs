//! Service configuration: a TOML file with serde defaults for every
//! field, plus environment overrides for deploy-time secrets.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classify::LlmConfig;
use crate::scrape::ScrapeClientConfig;
use crate::tiers::TierConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub upstream: UpstreamSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub artifacts: ArtifactSettings,
    #[serde(default)]
    pub tiers: TierConfig,
    #[serde(default)]
    pub classifier: LlmConfig,
    #[serde(default)]
    pub reference: Option<ReferenceSettings>,
    #[serde(default)]
    pub serving: ServingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            upstream: UpstreamSettings::default(),
            cache: CacheSettings::default(),
            artifacts: ArtifactSettings::default(),
            tiers: TierConfig::default(),
            classifier: LlmConfig::default(),
            reference: None,
            serving: ServingSettings::default(),
        }
    }
}

/// Upstream scrape service connection. Endpoint paths are overridable
/// because available path families vary by account tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub address_paths: Option<Vec<String>>,
    #[serde(default)]
    pub geo_paths: Option<Vec<String>>,
    #[serde(default)]
    pub nearby_paths: Option<Vec<String>>,
    #[serde(default)]
    pub poll_path: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_api_key_header() -> String {
    "x-api-key".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            api_key_header: default_api_key_header(),
            timeout_secs: default_timeout_secs(),
            address_paths: None,
            geo_paths: None,
            nearby_paths: None,
            poll_path: None,
        }
    }
}

impl UpstreamSettings {
    /// Build the scrape client path config, applying any overrides on top
    /// of the built-in candidate lists.
    pub fn scrape_paths(&self) -> ScrapeClientConfig {
        let mut config = ScrapeClientConfig::default();
        if let Some(paths) = &self.address_paths {
            config.address_paths = paths.clone();
        }
        if let Some(paths) = &self.geo_paths {
            config.geo_paths = paths.clone();
        }
        if let Some(paths) = &self.nearby_paths {
            config.nearby_paths = paths.clone();
        }
        if let Some(path) = &self.poll_path {
            config.poll_path = path.clone();
        }
        config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_cache_dir")]
    pub dir: String,
    #[serde(default = "default_classifier_file")]
    pub classifier_file: String,
}

fn default_cache_dir() -> String {
    "data/raw-menus".to_string()
}
fn default_classifier_file() -> String {
    "data/classifier-cache.json".to_string()
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            classifier_file: default_classifier_file(),
        }
    }
}

/// Where the adjudicated (tier2/tier3) artifacts and monitor reports live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactSettings {
    #[serde(default = "default_artifacts_dir")]
    pub dir: String,
}

fn default_artifacts_dir() -> String {
    "data/derived".to_string()
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        Self { dir: default_artifacts_dir() }
    }
}

/// Place-details provider used to build the matcher reference. Absent
/// means name-only references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceSettings {
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServingSettings {
    #[serde(default = "default_region_flag")]
    pub region_flag: String,
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default = "default_max_rows")]
    pub max_rows: u32,
}

fn default_region_flag() -> String {
    "us".to_string()
}
fn default_locale() -> String {
    "en-US".to_string()
}
fn default_max_rows() -> u32 {
    10
}

impl Default for ServingSettings {
    fn default() -> Self {
        Self {
            region_flag: default_region_flag(),
            locale: default_locale(),
            max_rows: default_max_rows(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file. A missing explicit path is an
    /// error; with no path, `menuforge.toml` is used when present, else
    /// defaults. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut settings = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p)
                    .with_context(|| format!("reading config file {}", p.display()))?;
                toml::from_str(&text)
                    .with_context(|| format!("parsing config file {}", p.display()))?
            }
            None => {
                let fallback = Path::new("menuforge.toml");
                if fallback.exists() {
                    let text = std::fs::read_to_string(fallback).context("reading menuforge.toml")?;
                    toml::from_str(&text).context("parsing menuforge.toml")?
                } else {
                    debug!("no config file, using defaults");
                    Settings::default()
                }
            }
        };
        settings.apply_env_overrides();
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("MENUFORGE_UPSTREAM_URL") {
            self.upstream.base_url = url;
        }
        if let Ok(key) = std::env::var("MENUFORGE_UPSTREAM_API_KEY") {
            self.upstream.api_key = key;
        }
        if let Ok(endpoint) = std::env::var("MENUFORGE_LLM_ENDPOINT") {
            self.classifier.endpoint = endpoint;
        }
        if let Ok(key) = std::env::var("MENUFORGE_REFERENCE_API_KEY") {
            if let Some(reference) = &mut self.reference {
                reference.api_key = key;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_full_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings.upstream.api_key_header, "x-api-key");
        assert_eq!(settings.serving.region_flag, "us");
        assert_eq!(settings.tiers.tier1_ttl_days, 15);
        assert!(settings.reference.is_none());
        assert!(settings.classifier.enabled);
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let settings: Settings = toml::from_str(
            r#"
            [upstream]
            base_url = "https://scraper.internal"
            address_paths = ["/v3/jobs/menu"]

            [serving]
            region_flag = "ca"

            [reference]
            endpoint = "https://places.internal"
            "#,
        )
        .unwrap();
        assert_eq!(settings.upstream.base_url, "https://scraper.internal");
        assert_eq!(settings.upstream.scrape_paths().address_paths, vec!["/v3/jobs/menu"]);
        assert_eq!(settings.serving.region_flag, "ca");
        assert_eq!(settings.serving.locale, "en-US");
        assert_eq!(settings.reference.unwrap().endpoint, "https://places.internal");
    }

    #[test]
    fn path_overrides_replace_candidate_lists() {
        let upstream = UpstreamSettings {
            poll_path: Some("/v3/jobs/{id}".into()),
            ..UpstreamSettings::default()
        };
        let config = upstream.scrape_paths();
        assert_eq!(config.poll_path, "/v3/jobs/{id}");
        // Untouched families keep their built-in candidates.
        assert_eq!(config.address_paths.len(), 2);
    }
}
