use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use crate::utils::http::truncate_for_log;
use crate::utils::timing::log_upstream_timing;

const GENERATION_TYPE: &str = "txt2img";
const ERROR_BODY_LIMIT: usize = 800;

#[derive(Debug, Error)]
#[error("EverArt error: {0}")]
pub struct EverArtError(pub String);

#[derive(Debug, Clone, Deserialize)]
struct Generation {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    #[serde(default)]
    generations: Vec<Generation>,
}

#[derive(Debug, Deserialize)]
struct FetchResponse {
    generation: Generation,
}

#[derive(Debug, Clone, Copy)]
pub struct ImageOptions {
    pub width: u32,
    pub height: u32,
    pub image_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationOutcome {
    pub image_url: String,
    pub success: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum PollState {
    Pending,
    Done(String),
    Failed(String),
}

fn poll_state(generation: &Generation) -> PollState {
    let status = generation
        .status
        .as_deref()
        .unwrap_or("")
        .to_ascii_uppercase();
    match status.as_str() {
        "SUCCEEDED" => match generation.image_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => PollState::Done(url.to_string()),
            _ => PollState::Failed("generation succeeded without an image".to_string()),
        },
        "FAILED" | "CANCELED" | "CANCELLED" => PollState::Failed(status),
        _ => PollState::Pending,
    }
}

#[derive(Debug, Clone)]
pub struct EverArtClient {
    http: Client,
    api_key: String,
    base_url: String,
    model_id: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl EverArtClient {
    pub fn new(
        http: Client,
        api_key: &str,
        base_url: &str,
        model_id: &str,
        poll_interval: Duration,
        max_polls: u32,
    ) -> Self {
        Self {
            http,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model_id: model_id.to_string(),
            poll_interval,
            max_polls: max_polls.max(1),
        }
    }

    pub fn default_model(&self) -> &str {
        &self.model_id
    }

    async fn create(
        &self,
        model_id: &str,
        prompt: &str,
        options: ImageOptions,
    ) -> Result<Vec<Generation>, EverArtError> {
        let url = format!("{}/models/{}/generations", self.base_url, model_id);
        let payload = json!({
            "prompt": prompt,
            "type": GENERATION_TYPE,
            "image_count": options.image_count.max(1),
            "height": options.height,
            "width": options.width
        });

        let request = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&payload);
        let response = log_upstream_timing("everart", "create", || request.send())
            .await
            .map_err(|err| EverArtError(format!("EverArt request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EverArtError(format!(
                "EverArt API error: {} {}",
                status,
                truncate_for_log(&body, ERROR_BODY_LIMIT)
            )));
        }

        let data: CreateResponse = response
            .json()
            .await
            .map_err(|err| EverArtError(format!("Invalid EverArt response: {err}")))?;
        Ok(data.generations)
    }

    async fn fetch(&self, generation_id: &str) -> Result<Generation, EverArtError> {
        let url = format!("{}/generations/{}", self.base_url, generation_id);
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|err| EverArtError(format!("EverArt poll failed: {err}")))?;
        if !response.status().is_success() {
            return Err(EverArtError(format!(
                "EverArt poll failed with status {}",
                response.status()
            )));
        }
        let data: FetchResponse = response
            .json()
            .await
            .map_err(|err| EverArtError(format!("Invalid EverArt poll response: {err}")))?;
        Ok(data.generation)
    }

    async fn wait_for_image(&self, generation: Generation) -> Result<String, EverArtError> {
        let mut current = generation;
        for attempt in 0..self.max_polls {
            match poll_state(&current) {
                PollState::Done(url) => return Ok(url),
                PollState::Failed(reason) => {
                    return Err(EverArtError(format!(
                        "Generation {} failed: {reason}",
                        current.id
                    )))
                }
                PollState::Pending => {}
            }
            if attempt + 1 == self.max_polls {
                break;
            }
            tokio::time::sleep(self.poll_interval).await;
            current = self.fetch(&current.id).await?;
        }
        Err(EverArtError(format!(
            "Generation {} did not finish after {} polls",
            current.id, self.max_polls
        )))
    }

    /// Creates a txt2img generation and polls it until an image URL is ready.
    pub async fn generate(
        &self,
        model_id: &str,
        prompt: &str,
        options: ImageOptions,
    ) -> Result<String, EverArtError> {
        if self.api_key.trim().is_empty() {
            return Err(EverArtError("EVERART_API_KEY is not configured.".to_string()));
        }
        let generation = self
            .create(model_id, prompt, options)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EverArtError("EverArt returned no generations".to_string()))?;
        info!("EverArt generation {} created", generation.id);
        log_upstream_timing("everart", "poll", || self.wait_for_image(generation)).await
    }

    /// Never fails: any error is logged and replaced by `fallback_url`.
    pub async fn generate_with_fallback(
        &self,
        prompt: &str,
        options: ImageOptions,
        fallback_url: &str,
    ) -> GenerationOutcome {
        match self.generate(&self.model_id, prompt, options).await {
            Ok(image_url) => GenerationOutcome {
                image_url,
                success: true,
            },
            Err(err) => {
                warn!("Image generation failed, using fallback image: {err}");
                GenerationOutcome {
                    image_url: fallback_url.to_string(),
                    success: false,
                }
            }
        }
    }
}
