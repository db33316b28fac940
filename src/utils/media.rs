use std::io::Cursor;
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use image::imageops::FilterType;
use image::ImageFormat;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::utils::http::truncate_for_log;

const FETCH_MAX_ATTEMPTS: usize = 3;
const FETCH_BASE_DELAY_MS: u64 = 400;
const FETCH_ERROR_BODY_LIMIT: usize = 800;
const DEFAULT_IMAGE_MIME: &str = "image/png";

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

pub fn to_data_uri(bytes: &[u8], mime_type: &str) -> String {
    format!(
        "data:{mime_type};base64,{}",
        general_purpose::STANDARD.encode(bytes)
    )
}

#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub resized: bool,
}

impl PreparedImage {
    pub fn data_uri(&self) -> String {
        to_data_uri(&self.bytes, &self.mime_type)
    }
}

/// Shrinks uploads larger than `max_dim` on either side so they fit the
/// vision model's input limit. Undecodable uploads pass through untouched.
pub fn prepare_upload(bytes: Vec<u8>, declared_mime: Option<&str>, max_dim: u32) -> PreparedImage {
    let mime_type = declared_mime
        .map(str::trim)
        .filter(|mime| mime.starts_with("image/"))
        .map(str::to_string)
        .or_else(|| detect_mime_type(&bytes))
        .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string());

    let decoded = match image::load_from_memory(&bytes) {
        Ok(decoded) => decoded,
        Err(err) => {
            error!("Error decoding uploaded image ({mime_type}): {err}");
            return PreparedImage {
                bytes,
                mime_type,
                resized: false,
            };
        }
    };

    debug!(
        "Uploaded image dimensions: {}x{}",
        decoded.width(),
        decoded.height()
    );
    if decoded.width() <= max_dim && decoded.height() <= max_dim {
        return PreparedImage {
            bytes,
            mime_type,
            resized: false,
        };
    }

    let resized = decoded.resize(max_dim, max_dim, FilterType::Lanczos3);
    let mut encoded = Cursor::new(Vec::new());
    if let Err(err) = resized.write_to(&mut encoded, ImageFormat::Png) {
        error!("Error re-encoding resized image: {err}");
        return PreparedImage {
            bytes,
            mime_type,
            resized: false,
        };
    }
    debug!(
        "Resized image dimensions: {}x{}",
        resized.width(),
        resized.height()
    );

    PreparedImage {
        bytes: encoded.into_inner(),
        mime_type: DEFAULT_IMAGE_MIME.to_string(),
        resized: true,
    }
}

#[derive(Debug, Clone)]
pub struct RemoteImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Error)]
pub enum FetchImageError {
    #[error("upstream responded with status {status}")]
    Status { status: StatusCode },
    #[error("request failed: {0}")]
    Transport(String),
}

fn should_retry_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

fn should_retry_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

fn retry_delay(attempt: usize) -> Duration {
    Duration::from_millis(FETCH_BASE_DELAY_MS << attempt)
}

/// Downloads a generated image, retrying transient failures.
pub async fn fetch_remote_image(client: &Client, url: &str) -> Result<RemoteImage, FetchImageError> {
    let mut last_error = FetchImageError::Transport("no attempt made".to_string());
    for attempt in 0..FETCH_MAX_ATTEMPTS {
        let response = match client.get(url).send().await {
            Ok(resp) => resp,
            Err(err) => {
                warn!(
                    "Failed to fetch image {url}: {err} (timeout={}, connect={}, attempt={}/{})",
                    err.is_timeout(),
                    err.is_connect(),
                    attempt + 1,
                    FETCH_MAX_ATTEMPTS
                );
                let retry = should_retry_error(&err);
                last_error = FetchImageError::Transport(err.to_string());
                if !retry || attempt + 1 == FETCH_MAX_ATTEMPTS {
                    return Err(last_error);
                }
                tokio::time::sleep(retry_delay(attempt)).await;
                continue;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                "Image fetch failed for {url} with status {}: {}",
                status,
                truncate_for_log(&body, FETCH_ERROR_BODY_LIMIT)
            );
            last_error = FetchImageError::Status { status };
            if !should_retry_status(status) || attempt + 1 == FETCH_MAX_ATTEMPTS {
                return Err(last_error);
            }
            tokio::time::sleep(retry_delay(attempt)).await;
            continue;
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        match response.bytes().await {
            Ok(bytes) => {
                let bytes = bytes.to_vec();
                let content_type = content_type
                    .or_else(|| detect_mime_type(&bytes))
                    .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string());
                return Ok(RemoteImage {
                    bytes,
                    content_type,
                });
            }
            Err(err) => {
                error!(
                    "Failed to read image bytes {url}: {err} (attempt={}/{})",
                    attempt + 1,
                    FETCH_MAX_ATTEMPTS
                );
                last_error = FetchImageError::Transport(err.to_string());
                if attempt + 1 == FETCH_MAX_ATTEMPTS {
                    return Err(last_error);
                }
                tokio::time::sleep(retry_delay(attempt)).await;
            }
        }
    }

    Err(last_error)
}
