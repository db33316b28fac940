use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info};

use crate::db::models::{ImageRecord, ImageUpsert};
use crate::handlers::error::{ApiError, ApiResult};
use crate::prompt::parse_username;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GalleryUpsertBody {
    pub username: Option<String>,
    pub image_url: Option<String>,
}

pub async fn list_handler(State(state): State<AppState>) -> ApiResult<Json<Vec<ImageRecord>>> {
    let records = state.db.list_images().await.map_err(|err| {
        error!("GET /api/gallery failed: {err}");
        ApiError::Internal("Failed to fetch gallery".to_string())
    })?;
    Ok(Json(records))
}

pub async fn upsert_handler(
    State(state): State<AppState>,
    Json(body): Json<GalleryUpsertBody>,
) -> ApiResult<Json<ImageRecord>> {
    let username = body.username.as_deref().map(str::trim).unwrap_or_default();
    let image_url = body.image_url.as_deref().map(str::trim).unwrap_or_default();
    if username.is_empty() || image_url.is_empty() {
        return Err(ApiError::Validation(
            "Missing required fields: username and image_url".to_string(),
        ));
    }

    info!("POST /api/gallery for {}", username);
    let record = state
        .db
        .upsert_image(ImageUpsert {
            username: username.to_string(),
            image_url: image_url.to_string(),
            created_at: Utc::now(),
        })
        .await
        .map_err(|err| {
            error!("POST /api/gallery failed: {err}");
            ApiError::Internal("Failed to create/update image record".to_string())
        })?;
    Ok(Json(record))
}

pub async fn image_by_username_handler(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<Json<ImageRecord>> {
    let username = parse_username(&username).ok_or_else(|| {
        ApiError::Validation("Valid GitHub username required in URL path".to_string())
    })?;

    let image = state
        .db
        .get_image_by_username(&username)
        .await
        .map_err(|err| {
            error!("GET /api/images/{username} failed: {err}");
            ApiError::Internal("Failed to fetch image".to_string())
        })?;

    match image {
        Some(record) => Ok(Json(record)),
        None => {
            info!("GET /api/images/{username} - no image found");
            Err(ApiError::NotFound("Image not found".to_string()))
        }
    }
}
