use axum::body::to_bytes;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::db::models::ImageUpsert;
use crate::handlers::error::ApiError;
use crate::llm::LangflowError;
use crate::prompt::{
    compose_prompt, parse_upstream_message, parse_username, Emotion, PromptDetails, PromptSource,
    UpstreamMessage,
};
use crate::state::AppState;
use crate::utils::media::prepare_upload;
use crate::utils::timing::start_request_timer;

pub const GENERATE_ROUTE: &str = "/api/generate/prompt";
const JSON_BODY_LIMIT: usize = 64 * 1024;
const IMAGE_FIELD: &str = "imageFile";

#[derive(Debug, Default, Deserialize)]
struct GenerateBody {
    username: Option<String>,
    emotion: Option<String>,
}

#[derive(Debug)]
struct Upload {
    bytes: Vec<u8>,
    mime_type: Option<String>,
}

#[derive(Debug, Default)]
struct GenerateRequest {
    username: Option<String>,
    emotion: Option<String>,
    upload: Option<Upload>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationStatus {
    prompt_source: &'static str,
    everart: &'static str,
    analysis: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    languages: String,
    prompt: String,
    image_analysis: Option<String>,
    github_url: String,
    repo_count: Option<u32>,
    animal_selection: Vec<Vec<String>>,
    image_url: String,
    username: String,
    #[serde(rename = "isImg2Img")]
    is_img2img: bool,
    status: GenerationStatus,
    source: &'static str,
}

async fn parse_generate_request(
    state: &AppState,
    request: Request,
) -> Result<GenerateRequest, ApiError> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, state)
            .await
            .map_err(|err| {
                error!("Error parsing multipart request: {err}");
                ApiError::Validation("Failed to parse request".to_string())
            })?;
        return read_multipart(multipart).await;
    }

    if content_type.starts_with("application/json") {
        let bytes = to_bytes(request.into_body(), JSON_BODY_LIMIT)
            .await
            .map_err(|_| ApiError::Validation("Failed to parse request".to_string()))?;
        let body: GenerateBody = serde_json::from_slice(&bytes).map_err(|err| {
            error!("Error parsing JSON request: {err}");
            ApiError::Validation("Failed to parse request".to_string())
        })?;
        return Ok(GenerateRequest {
            username: body.username,
            emotion: body.emotion,
            upload: None,
        });
    }

    warn!("Unsupported Content-Type: {content_type:?}");
    Err(ApiError::UnsupportedMediaType(
        "Unsupported Content-Type".to_string(),
    ))
}

async fn read_multipart(mut multipart: Multipart) -> Result<GenerateRequest, ApiError> {
    let parse_error = |err: axum::extract::multipart::MultipartError| {
        error!("Error reading multipart field: {err}");
        ApiError::Validation("Failed to parse request".to_string())
    };

    let mut parsed = GenerateRequest::default();
    while let Some(field) = multipart.next_field().await.map_err(parse_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "username" => parsed.username = Some(field.text().await.map_err(parse_error)?),
            "emotion" => parsed.emotion = Some(field.text().await.map_err(parse_error)?),
            IMAGE_FIELD => {
                let mime_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(parse_error)?;
                if bytes.is_empty() {
                    info!("No valid image file found in form data");
                } else {
                    info!("Image file received: {:?}, {} bytes", mime_type, bytes.len());
                    parsed.upload = Some(Upload {
                        bytes: bytes.to_vec(),
                        mime_type,
                    });
                }
            }
            _ => {}
        }
    }
    Ok(parsed)
}

/// Cached workflow output when usable, a fresh workflow run otherwise.
async fn load_prompt_details(
    state: &AppState,
    username: &str,
) -> Result<PromptDetails, LangflowError> {
    match state.db.get_user_details(username).await {
        Ok(Some(row)) => match parse_upstream_message(&row.content) {
            UpstreamMessage::Record(record) => {
                info!(
                    "Using cached user details for {} (cached at {})",
                    row.username,
                    row.updated_at.to_rfc3339()
                );
                return Ok(record.into_prompt_details(username, PromptSource::Cache));
            }
            UpstreamMessage::Unparseable { reason } => {
                warn!("Cached details for {username} are unusable: {reason}");
            }
        },
        Ok(None) => {}
        Err(err) => warn!("Failed to read cached details for {username}: {err}"),
    }

    let message = state.langflow.run(username).await?;
    match parse_upstream_message(&message) {
        UpstreamMessage::Record(record) => {
            if let Err(err) = state.db.queue_user_details(username, &message).await {
                warn!("Could not cache details for {username}: {err}");
            }
            Ok(record.into_prompt_details(username, PromptSource::Langflow))
        }
        UpstreamMessage::Unparseable { reason } => {
            error!("Unexpected message format from Langflow: {reason}");
            Err(LangflowError("Unexpected format from Langflow".to_string()))
        }
    }
}

fn generation_failure(username: &str, message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "username": username,
            "status": { "general": "error" }
        })),
    )
        .into_response()
}

pub async fn generate_handler(State(state): State<AppState>, request: Request) -> Response {
    let mut timer = start_request_timer(GENERATE_ROUTE, None);

    let parsed = match parse_generate_request(&state, request).await {
        Ok(parsed) => parsed,
        Err(err) => {
            timer.mark_status("rejected", Some(err.to_string()));
            return err.into_response();
        }
    };

    let Some(username) = parsed.username.as_deref().and_then(parse_username) else {
        error!("Invalid or missing username: {:?}", parsed.username);
        timer.mark_status("rejected", Some("username".to_string()));
        return ApiError::Validation("Valid GitHub username is required".to_string())
            .into_response();
    };
    timer.set_username(&username);

    let emotion = match parsed.emotion.as_deref().unwrap_or_default().parse::<Emotion>() {
        Ok(emotion) => emotion,
        Err(err) => {
            error!("Invalid or missing emotion: {:?}", parsed.emotion);
            timer.mark_status("rejected", Some("emotion".to_string()));
            return ApiError::Validation(err.to_string()).into_response();
        }
    };

    let image_provided = parsed.upload.is_some();
    let image_analysis = match (parsed.upload, &state.vision) {
        (Some(upload), Some(vision)) => {
            let prepared = prepare_upload(
                upload.bytes,
                upload.mime_type.as_deref(),
                state.settings.max_upload_dimension,
            );
            vision.describe_person(&prepared.data_uri()).await
        }
        (Some(_), None) => {
            warn!("Image uploaded but no vision model is configured; skipping analysis");
            None
        }
        (None, _) => None,
    };

    let details = match load_prompt_details(&state, &username).await {
        Ok(details) => details,
        Err(err) => {
            error!("Error processing generation request for {username}: {err}");
            timer.mark_status("error", Some(err.to_string()));
            return generation_failure(&username, &err.0);
        }
    };

    let final_prompt = compose_prompt(emotion, &username, &details, image_analysis.as_deref());
    let prompt_source = if image_analysis.is_some() {
        PromptSource::ImageAnalysis
    } else {
        details.source
    };
    info!("Final prompt for {username}: {final_prompt}");

    let outcome = state
        .everart
        .generate_with_fallback(
            &final_prompt,
            state.settings.image_options,
            &state.settings.fallback_image_url,
        )
        .await;

    if outcome.success {
        let upsert = ImageUpsert {
            username: username.clone(),
            image_url: outcome.image_url.clone(),
            created_at: Utc::now(),
        };
        if let Err(err) = state.db.upsert_image(upsert).await {
            error!("Failed to upsert image for {username}: {err}");
        }
    } else {
        timer.mark_status("fallback", None);
    }

    let analysis = match (&image_analysis, image_provided) {
        (Some(_), _) => "success",
        (None, true) => "failed_or_skipped",
        (None, false) => "not_applicable",
    };

    Json(GenerateResponse {
        languages: details.languages,
        prompt: details.base_prompt,
        image_analysis,
        github_url: details.github_url,
        repo_count: details.repo_count,
        animal_selection: details.selection.iter().map(|pair| pair.to_fields()).collect(),
        image_url: outcome.image_url,
        username,
        is_img2img: false,
        status: GenerationStatus {
            prompt_source: prompt_source.as_str(),
            everart: if outcome.success { "success" } else { "error" },
            analysis,
        },
        source: prompt_source.as_str(),
    })
    .into_response()
}
