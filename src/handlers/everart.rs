use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::handlers::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EverArtGenerateBody {
    pub prompt: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EverArtGenerateResponse {
    pub url: String,
}

/// Direct text-to-image call with a caller-chosen model.
pub async fn everart_generate_handler(
    State(state): State<AppState>,
    Json(body): Json<EverArtGenerateBody>,
) -> ApiResult<Json<EverArtGenerateResponse>> {
    let prompt = body
        .prompt
        .filter(|prompt| !prompt.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("Prompt is required".to_string()))?;
    let model = body
        .model
        .filter(|model| !model.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("Model is required".to_string()))?;

    let url = state
        .everart
        .generate(&model, &prompt, state.settings.image_options)
        .await
        .map_err(|err| {
            error!("EverArt generate failed: {err}");
            ApiError::Internal(err.to_string())
        })?;
    Ok(Json(EverArtGenerateResponse { url }))
}
