use std::env;
use std::time::Duration;

use anyhow::Result;
use once_cell::sync::Lazy;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub bind_addr: String,
    pub database_url: String,
    pub database_max_connections: u32,
    pub langflow_base_url: String,
    pub langflow_flow_id: String,
    pub langflow_api_key: String,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_vision_model: String,
    pub everart_api_key: String,
    pub everart_base_url: String,
    pub everart_model_id: String,
    pub everart_poll_interval_ms: u64,
    pub everart_poll_max_attempts: u32,
    pub image_width: u32,
    pub image_height: u32,
    pub fallback_image_url: String,
    pub allowed_image_prefix: String,
    pub max_upload_dimension: u32,
}

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(default)
}

fn normalize_database_url(value: String) -> String {
    if value.starts_with("sqlite+aiosqlite://") {
        return value.replacen("sqlite+aiosqlite://", "sqlite://", 1);
    }
    value
}

fn normalize_base_url(value: String) -> String {
    value.trim().trim_end_matches('/').to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        let config = Config {
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            bind_addr: env_string("BIND_ADDR", "0.0.0.0:3000"),
            database_url: normalize_database_url(env_string(
                "DATABASE_URL",
                "sqlite://codebeasts.db?mode=rwc",
            )),
            database_max_connections: env_u32("DATABASE_MAX_CONNECTIONS", 5).max(1),
            langflow_base_url: normalize_base_url(env_string("LANGFLOW_BASE_URL", "")),
            langflow_flow_id: env_string("LANGFLOW_FLOW_ID", "").trim().to_string(),
            langflow_api_key: env_string("LANGFLOW_API_KEY", ""),
            openai_api_key: env_string("OPENAI_API_KEY", ""),
            openai_base_url: normalize_base_url(env_string(
                "OPENAI_BASE_URL",
                "https://api.openai.com/v1",
            )),
            openai_vision_model: env_string("OPENAI_VISION_MODEL", "gpt-4-turbo"),
            everart_api_key: env_string("EVERART_API_KEY", ""),
            everart_base_url: normalize_base_url(env_string(
                "EVERART_BASE_URL",
                "https://api.everart.ai/v1",
            )),
            everart_model_id: env_string("EVERART_MODEL_ID", "5000"),
            everart_poll_interval_ms: env_u64("EVERART_POLL_INTERVAL_MS", 2000),
            everart_poll_max_attempts: env_u32("EVERART_POLL_MAX_ATTEMPTS", 60).max(1),
            image_width: env_u32("IMAGE_WIDTH", 512),
            image_height: env_u32("IMAGE_HEIGHT", 512),
            fallback_image_url: env_string(
                "FALLBACK_IMAGE_URL",
                "/images/codebeast-placeholder.png",
            ),
            allowed_image_prefix: env_string(
                "ALLOWED_IMAGE_PREFIX",
                "https://storage.googleapis.com/",
            ),
            max_upload_dimension: env_u32("MAX_UPLOAD_DIMENSION", 1024).max(1),
        };

        if config.langflow_base_url.is_empty() || config.langflow_flow_id.is_empty() {
            warn!("LANGFLOW_BASE_URL or LANGFLOW_FLOW_ID is not set; uncached users cannot be generated.");
        }
        if config.everart_api_key.trim().is_empty() {
            warn!("EVERART_API_KEY is not set; generations will return the fallback image.");
        }

        Ok(config)
    }

    pub fn everart_poll_interval(&self) -> Duration {
        Duration::from_millis(self.everart_poll_interval_ms)
    }
}

pub const PROMPT_PREFIX: &str = "Kawaii bizarre chimera hybrid creature, ultra low-resolution pixel 16-bit
pixel art style. Extremely pixelated NES/SNES aesthetic, chunky dithering patterns,
and high contrast. Strong directional lighting from the upper left, casting distinct
pixelated shadows on the right side. Rainbow gradient background. Subject facing the
camera, frontal view, medium shot, centered subject, shallow depth of field background.";

pub const ACTION_FIGURE_PROMPT_TEMPLATE: &str = "
At the very top of the packaging, a bold red header band displays the text: '[Name] the [Title]' in large, clear, white letters.
Full product shot of a highly detailed action figure of a person, fully encased in a
clear plastic blister pack with a colorful cardboard backing. The main action figure
is a realistic human based on [character description], with lifelike features and natural
proportions. The action figure is shown in full body, including legs, standing upright
inside the blister pack. The packaging is the main focus, with a clear plastic bubble covering
the entire figure and all accessories. Inside the blister pack are compartments for
each coding language and its animal ([key items]), as well as coding-related
accessories such as a keyboard, laptop, or code book. Each item is in its own
separate compartment. The packaging is centered on a white background, with a red
header band reading '[Name] the [Title]' in bold white text, and an 'Ages [X]+' label.
Professional retail packaging with detailed labeling and product information. Sharp
focus on packaging details. No cropping of the blister pack.
";

pub const ACTION_FIGURE_PROMPT_WITH_IMAGE_TEMPLATE: &str = "
At the very top of the packaging, a bold red header band displays the text:
'[Name] the [Title]' in large, clear, white letters.
Full product shot of a highly detailed action figure, fully encased in a clear plastic
blister pack with a colorful cardboard backing. The packaging, accessories, and
compartments are the main focus. The action figure is shown in full body, including
legs, standing upright inside the blister pack. Inside the blister pack are
compartments for each coding language and its animal ([key items]), as well as
coding-related accessories such as a keyboard, laptop, or code book. Each item is in
its own separate compartment. The figure's facial features are subtly inspired by:
[person_features]. The packaging is centered on a white background, with an 'Ages [X]+'
label. Professional retail packaging with detailed labeling and product information.
Sharp focus on packaging details. No cropping of the blister pack.
";

pub const VISION_FEATURES_PROMPT: &str = "Analyze the primary person in the image. Return a short, comma-separated list starting with the person's sex (male, female, or ambiguous), followed by the most visually dominant features. Always include skin tone and, if visually determinable, ethnicity or region of origin (e.g., South Asian, African, East Asian, Caucasian, etc.). Be accurate and do not confuse ethnicities (for example, do not describe a South Asian person as African American, and vice versa). Focus on sex, skin tone, ethnicity/region, hair color/style, eye color, and one or two unique features. Do not describe the background or overall scene. If no clear person is visible, state 'No person detected'. Example: 'female, medium brown skin, South Asian, black hair, brown eyes, glasses'.";
