//! Batched LLM category classification backend.
//!
//! Talks to an Ollama-compatible endpoint. Treated as a slow pure batch
//! function by the pipeline; its typed error never escapes the pipeline
//! boundary (failures degrade to `Other`, not-noise).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Prompt for batch classification. `{items}` is replaced with a
/// numbered name/description list; the model answers one JSON object per
/// line.
pub const CLASSIFY_PROMPT: &str = r#"You are categorizing restaurant menu items. The fixed category set is:
Appetizers, Salads, Soups, Breakfast & Brunch, Kids, Desserts, Sides, Sandwiches & Burgers, Pasta & Pizza, Mains, Other.

For each numbered item below, pick exactly one category from the set. Also flag items that are not food a diner would order (utensils, fees, merchandise, drinks) with "noise": true.

Items:
{items}

Respond with ONLY a JSON array, one object per item in order, each shaped {"category": "...", "noise": false}. No prose, no markdown."#;

/// One item sent to the backend.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifyRequest {
    pub name: String,
    pub description: String,
}

/// One verdict returned by the backend, positionally aligned with the
/// request batch.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifyVerdict {
    pub category: String,
    #[serde(default)]
    pub noise: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("classification backend is disabled")]
    Disabled,
}

/// Seam for the classification function, so tests (and deployments with
/// no model) can swap the backend.
#[async_trait]
pub trait CategoryBackend: Send + Sync {
    /// Classify one batch. Must return exactly one verdict per request,
    /// in order.
    async fn classify_batch(&self, items: &[ClassifyRequest]) -> Result<Vec<ClassifyVerdict>, LlmError>;
}

/// Configuration for the Ollama-backed classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_enabled() -> bool {
    true
}
fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}
fn default_model() -> String {
    "llama3.2:3b-instruct-q5_K_M".to_string()
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_temperature() -> f32 {
    0.1
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            endpoint: default_endpoint(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

/// Ollama-backed classifier.
pub struct LlmClassifier {
    config: LlmConfig,
    client: Client,
}

impl LlmClassifier {
    pub fn new(config: LlmConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");
        Self { config, client }
    }

    fn render_items(items: &[ClassifyRequest]) -> String {
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                if item.description.is_empty() {
                    format!("{}. {}", i + 1, item.name)
                } else {
                    format!("{}. {} — {}", i + 1, item.name, item.description)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Parse the model response leniently: strip code fences, find the
    /// outermost JSON array.
    fn parse_verdicts(response: &str, expected: usize) -> Result<Vec<ClassifyVerdict>, LlmError> {
        let cleaned = response
            .trim()
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();
        let start = cleaned.find('[');
        let end = cleaned.rfind(']');
        let body = match (start, end) {
            (Some(s), Some(e)) if e > s => &cleaned[s..=e],
            _ => return Err(LlmError::Parse("no JSON array in response".to_string())),
        };
        let verdicts: Vec<ClassifyVerdict> =
            serde_json::from_str(body).map_err(|e| LlmError::Parse(e.to_string()))?;
        if verdicts.len() != expected {
            return Err(LlmError::Parse(format!(
                "expected {expected} verdicts, got {}",
                verdicts.len()
            )));
        }
        Ok(verdicts)
    }
}

#[async_trait]
impl CategoryBackend for LlmClassifier {
    async fn classify_batch(&self, items: &[ClassifyRequest]) -> Result<Vec<ClassifyVerdict>, LlmError> {
        if !self.config.enabled {
            return Err(LlmError::Disabled);
        }
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = CLASSIFY_PROMPT.replace("{items}", &Self::render_items(items));
        let request = OllamaRequest {
            model: self.config.model.clone(),
            prompt,
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };

        debug!(batch = items.len(), model = %self.config.model, "classifying item batch");
        let url = format!("{}/api/generate", self.config.endpoint);
        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(%status, "classification backend returned an error");
            return Err(LlmError::Api(format!("HTTP {status}: {body}")));
        }

        let ollama: OllamaResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;
        Self::parse_verdicts(&ollama.response, items.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_array() {
        let verdicts = LlmClassifier::parse_verdicts(
            r#"[{"category": "Soups", "noise": false}, {"category": "Other", "noise": true}]"#,
            2,
        )
        .unwrap();
        assert_eq!(verdicts[0].category, "Soups");
        assert!(verdicts[1].noise);
    }

    #[test]
    fn parses_fenced_response_with_prose() {
        let response = "Here you go:\n```json\n[{\"category\": \"Mains\"}]\n```";
        let verdicts = LlmClassifier::parse_verdicts(response, 1).unwrap();
        assert_eq!(verdicts[0].category, "Mains");
        assert!(!verdicts[0].noise); // default
    }

    #[test]
    fn wrong_count_is_a_parse_error() {
        let err = LlmClassifier::parse_verdicts(r#"[{"category": "Mains"}]"#, 2).unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
    }

    #[test]
    fn no_array_is_a_parse_error() {
        let err = LlmClassifier::parse_verdicts("I can't help with that", 1).unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
    }

    #[test]
    fn item_rendering_is_numbered() {
        let items = vec![
            ClassifyRequest { name: "Pad Thai".into(), description: "rice noodles".into() },
            ClassifyRequest { name: "The Special".into(), description: String::new() },
        ];
        let rendered = LlmClassifier::render_items(&items);
        assert!(rendered.starts_with("1. Pad Thai — rice noodles"));
        assert!(rendered.contains("\n2. The Special"));
    }
}
