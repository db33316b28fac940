use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::utils::http::truncate_for_log;
use crate::utils::timing::log_upstream_timing;

const ERROR_BODY_LIMIT: usize = 800;

#[derive(Debug, Error)]
#[error("Langflow error: {0}")]
pub struct LangflowError(pub String);

#[derive(Debug, Deserialize)]
struct RunResponse {
    #[serde(default)]
    outputs: Vec<RunOutput>,
}

#[derive(Debug, Deserialize)]
struct RunOutput {
    #[serde(default)]
    outputs: Vec<ComponentOutput>,
}

#[derive(Debug, Deserialize)]
struct ComponentOutput {
    #[serde(default)]
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    message: Option<serde_json::Value>,
}

fn extract_message(payload: RunResponse) -> Option<String> {
    payload
        .outputs
        .into_iter()
        .next()?
        .outputs
        .into_iter()
        .next()?
        .messages
        .into_iter()
        .next()?
        .message?
        .as_str()
        .map(str::to_string)
}

/// Runs the prompt-generation flow that describes a GitHub user.
#[derive(Debug, Clone)]
pub struct LangflowClient {
    http: Client,
    base_url: String,
    flow_id: String,
    api_key: String,
}

impl LangflowClient {
    pub fn new(http: Client, base_url: &str, flow_id: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            flow_id: flow_id.to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.base_url.trim().is_empty() && !self.flow_id.trim().is_empty()
    }

    fn run_url(&self) -> String {
        format!("{}/api/v1/run/{}", self.base_url, self.flow_id)
    }

    /// Returns the raw pipe-delimited message produced by the flow.
    pub async fn run(&self, username: &str) -> Result<String, LangflowError> {
        if !self.is_configured() {
            error!("Missing Langflow configuration");
            return Err(LangflowError(
                "Server configuration error for Langflow".to_string(),
            ));
        }

        let payload = json!({
            "input_value": username,
            "output_type": "chat",
            "input_type": "chat",
            "session_id": username
        });

        info!("Calling Langflow flow {} for {}", self.flow_id, username);
        let mut request = self.http.post(self.run_url()).json(&payload);
        if !self.api_key.trim().is_empty() {
            request = request.header("x-api-key", self.api_key.clone());
        }

        let response = log_upstream_timing("langflow", "run", || request.send())
            .await
            .map_err(|err| LangflowError(format!("Langflow request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(
                "Langflow API error: status={} body={}",
                status,
                truncate_for_log(&body, ERROR_BODY_LIMIT)
            );
            return Err(LangflowError(format!("Langflow call failed: {status}")));
        }

        let data: RunResponse = response
            .json()
            .await
            .map_err(|err| LangflowError(format!("Invalid Langflow response: {err}")))?;

        let message = extract_message(data)
            .filter(|message| !message.trim().is_empty())
            .ok_or_else(|| LangflowError("Could not parse Langflow response".to_string()))?;
        debug!("Langflow message for {}: {}", username, message);
        Ok(message)
    }
}
