//! Google Gemini expansion provider
//!
//! One `generateContent` call per question, API key passed as the `?key=`
//! query parameter. Failures are logged and absorbed; there is no retry.

use super::{build_expansion_prompt, parse_numbered_list, ExpansionError, ExpansionProvider};
use crate::config::ExpansionConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// The default Google Gemini API base URL.
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Network-backed expansion via the Gemini API
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiProvider {
    /// Create a provider, reading the API key from `config.api_key_env`
    pub fn from_config(config: &ExpansionConfig) -> Result<Self, ExpansionError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ExpansionError::MissingCredential(config.api_key_env.clone()))?;

        Self::new_with_key(config, api_key)
    }

    /// Create a provider with an explicitly provided API key
    pub fn new_with_key(config: &ExpansionConfig, api_key: String) -> Result<Self, ExpansionError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
            .build()
            .map_err(|e| ExpansionError::Request(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        })
    }

    fn endpoint_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    fn build_request_body(prompt: &str) -> Value {
        json!({
            "contents": [
                { "role": "user", "parts": [{ "text": prompt }] }
            ]
        })
    }

    /// Concatenated text parts of the first candidate
    fn extract_text(body: &Value) -> Result<String, ExpansionError> {
        let candidates = body["candidates"]
            .as_array()
            .ok_or_else(|| ExpansionError::Response("Missing 'candidates' array".to_string()))?;

        let candidate = candidates
            .first()
            .ok_or_else(|| ExpansionError::Response("Empty 'candidates' array".to_string()))?;

        let parts = candidate["content"]["parts"]
            .as_array()
            .ok_or_else(|| ExpansionError::Response("Missing 'parts' array".to_string()))?;

        let text: String = parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("");

        Ok(text)
    }

    async fn generate(&self, prompt: &str) -> Result<String, ExpansionError> {
        debug!(model = self.model.as_str(), "Sending Gemini expansion request");

        let response = self
            .client
            .post(self.endpoint_url())
            .header("content-type", "application/json")
            .json(&Self::build_request_body(prompt))
            .send()
            .await
            .map_err(|e| ExpansionError::Request(e.without_url().to_string()))?;

        let status = response.status();
        let body_text = response
            .text()
            .await
            .map_err(|e| ExpansionError::Request(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(ExpansionError::Http {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let body: Value = serde_json::from_str(&body_text)
            .map_err(|e| ExpansionError::Response(format!("Invalid JSON in response: {}", e)))?;

        Self::extract_text(&body)
    }
}

#[async_trait]
impl ExpansionProvider for GeminiProvider {
    async fn expand(&self, question: &str, n: usize) -> Vec<String> {
        let prompt = build_expansion_prompt(question, n);

        match self.generate(&prompt).await {
            Ok(text) => {
                let questions = parse_numbered_list(&text, n);
                if questions.is_empty() {
                    warn!("Gemini expansion returned no numbered questions");
                    vec![question.to_string()]
                } else {
                    questions
                }
            }
            Err(e) => {
                warn!("Gemini expansion failed, using original question: {}", e);
                vec![question.to_string()]
            }
        }
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
