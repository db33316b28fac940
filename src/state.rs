use reqwest::Client;

use crate::config::Config;
use crate::db::database::Database;
use crate::llm::{EverArtClient, ImageOptions, LangflowClient, VisionClient};

/// Request-independent knobs the handlers need.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub image_options: ImageOptions,
    pub fallback_image_url: String,
    pub allowed_image_prefix: String,
    pub max_upload_dimension: u32,
}

impl GenerationSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            image_options: ImageOptions {
                width: config.image_width,
                height: config.image_height,
                image_count: 1,
            },
            fallback_image_url: config.fallback_image_url.clone(),
            allowed_image_prefix: config.allowed_image_prefix.clone(),
            max_upload_dimension: config.max_upload_dimension,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub http: Client,
    pub langflow: LangflowClient,
    pub vision: Option<VisionClient>,
    pub everart: EverArtClient,
    pub settings: GenerationSettings,
}

impl AppState {
    pub fn from_config(db: Database, http: Client, config: &Config) -> Self {
        let langflow = LangflowClient::new(
            http.clone(),
            &config.langflow_base_url,
            &config.langflow_flow_id,
            &config.langflow_api_key,
        );
        let vision = VisionClient::from_settings(
            http.clone(),
            &config.openai_api_key,
            &config.openai_base_url,
            &config.openai_vision_model,
        );
        let everart = EverArtClient::new(
            http.clone(),
            &config.everart_api_key,
            &config.everart_base_url,
            &config.everart_model_id,
            config.everart_poll_interval(),
            config.everart_poll_max_attempts,
        );
        AppState {
            db,
            http,
            langflow,
            vision,
            everart,
            settings: GenerationSettings::from_config(config),
        }
    }
}
