use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::VISION_FEATURES_PROMPT;
use crate::utils::http::truncate_for_log;
use crate::utils::timing::log_upstream_timing;

const MAX_TOKENS: u32 = 80;
const MAX_FEATURES: usize = 6;
const NO_PERSON_MARKER: &str = "no person detected";

static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Reduces a vision answer to at most six comma-separated features.
pub fn condense_features(description: &str) -> Option<String> {
    if description.to_lowercase().contains(NO_PERSON_MARKER) {
        return None;
    }
    let cleaned = description.replace('*', "");
    let cleaned = WHITESPACE_RE.replace_all(&cleaned, " ");
    let features: Vec<&str> = cleaned
        .trim()
        .split(',')
        .map(str::trim)
        .filter(|feature| !feature.is_empty())
        .take(MAX_FEATURES)
        .collect();
    if features.is_empty() {
        None
    } else {
        Some(features.join(", "))
    }
}

/// Describes the person in an uploaded headshot through an OpenAI-compatible
/// chat completion endpoint.
#[derive(Debug, Clone)]
pub struct VisionClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl VisionClient {
    /// `None` when no API key is configured.
    pub fn from_settings(http: Client, api_key: &str, base_url: &str, model: &str) -> Option<Self> {
        if api_key.trim().is_empty() {
            return None;
        }
        Some(Self {
            http,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    fn build_payload(&self, image_data_uri: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": VISION_FEATURES_PROMPT },
                    { "type": "image_url", "image_url": { "url": image_data_uri } }
                ]
            }],
            "max_tokens": MAX_TOKENS
        })
    }

    /// Any failure is logged and reported as `None`.
    pub async fn describe_person(&self, image_data_uri: &str) -> Option<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&self.build_payload(image_data_uri));

        let response = match log_upstream_timing("openai", "vision", || request.send()).await {
            Ok(response) => response,
            Err(err) => {
                warn!("Vision request failed: {err}");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                "Vision request failed with status {}: {}",
                status,
                truncate_for_log(&body, 800)
            );
            return None;
        }

        let data: Value = match response.json().await {
            Ok(data) => data,
            Err(err) => {
                warn!("Invalid vision response: {err}");
                return None;
            }
        };

        let content = data
            .pointer("/choices/0/message/content")
            .and_then(|value| value.as_str())?;
        let features = condense_features(content);
        info!(
            "Image analysis completed (result: {})",
            if features.is_some() { "person" } else { "no person" }
        );
        features
    }
}
