use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use tracing::warn;

use crate::handlers::error::{ApiError, ApiResult};
use crate::state::AppState;

pub async fn health_handler(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    if let Err(err) = state.db.health_check().await {
        warn!("Database health check failed: {err}");
        return Err(ApiError::Internal("database unavailable".to_string()));
    }
    Ok(Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "vision": state.vision.is_some(),
        "langflow": state.langflow.is_configured(),
        "everart_model": state.everart.default_model()
    })))
}
