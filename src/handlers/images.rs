use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::error;
use url::Url;

use crate::handlers::error::{ApiError, ApiResult};
use crate::prompt::username::is_valid_github_username;
use crate::state::AppState;
use crate::utils::media::{fetch_remote_image, FetchImageError, RemoteImage};

#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub url: Option<String>,
    pub username: Option<String>,
}

/// Only https URLs under the configured image host prefix are fetched.
pub fn is_allowed_image_url(candidate: &str, allowed_prefix: &str) -> bool {
    if allowed_prefix.is_empty() || !candidate.starts_with(allowed_prefix) {
        return false;
    }
    matches!(Url::parse(candidate), Ok(url) if url.scheme() == "https" && url.host_str().is_some())
}

fn text_response(status: StatusCode, message: &str) -> Response {
    (status, message.to_string()).into_response()
}

fn image_response(image: RemoteImage, extra: &[(header::HeaderName, String)]) -> Response {
    let mut response = (StatusCode::OK, image.bytes).into_response();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&image.content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    for (name, value) in extra {
        if let Ok(value) = HeaderValue::from_str(value) {
            headers.insert(name.clone(), value);
        }
    }
    response
}

pub async fn proxy_image_handler(
    State(state): State<AppState>,
    Query(query): Query<ProxyQuery>,
) -> ApiResult<Response> {
    let url = query
        .url
        .filter(|url| is_allowed_image_url(url, &state.settings.allowed_image_prefix))
        .ok_or_else(|| ApiError::Validation("Invalid or missing image URL".to_string()))?;

    let image = fetch_remote_image(&state.http, &url).await.map_err(|err| {
        error!("Proxy fetch for {url} failed: {err}");
        ApiError::BadGateway("Failed to fetch image".to_string())
    })?;
    Ok(image_response(
        image,
        &[(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*".to_string())],
    ))
}

pub async fn download_handler(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Response {
    let Some(url) = query
        .url
        .filter(|url| is_allowed_image_url(url, &state.settings.allowed_image_prefix))
    else {
        error!("Invalid or missing download image URL");
        return text_response(
            StatusCode::BAD_REQUEST,
            "Invalid or missing image URL parameter",
        );
    };
    let Some(username) = query
        .username
        .filter(|username| is_valid_github_username(username))
    else {
        return text_response(
            StatusCode::BAD_REQUEST,
            "Invalid or missing username parameter",
        );
    };

    match fetch_remote_image(&state.http, &url).await {
        Ok(image) => {
            let disposition = format!("attachment; filename=\"codebeast-{username}.png\"");
            image_response(image, &[(header::CONTENT_DISPOSITION, disposition)])
        }
        Err(FetchImageError::Status { status }) => {
            let status =
                StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
            text_response(status, &format!("Failed to fetch image: {status}"))
        }
        Err(err) => {
            error!("Download for {username} failed: {err}");
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "Error downloading image")
        }
    }
}
