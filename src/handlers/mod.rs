pub mod error;
pub mod everart;
pub mod gallery;
pub mod generate;
pub mod health;
pub mod images;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

const MAX_REQUEST_BYTES: usize = 10 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(generate::GENERATE_ROUTE, post(generate::generate_handler))
        .route(
            "/api/gallery",
            get(gallery::list_handler).post(gallery::upsert_handler),
        )
        .route(
            "/api/images/{username}",
            get(gallery::image_by_username_handler),
        )
        .route(
            "/api/everart/generate",
            post(everart::everart_generate_handler),
        )
        .route("/api/proxy-image", get(images::proxy_image_handler))
        .route("/api/download", get(images::download_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use chrono::Utc;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::router;
    use crate::db::database::memory_database;
    use crate::db::models::{ImageUpsert, UserDetailsInsert};
    use crate::llm::{EverArtClient, ImageOptions, LangflowClient};
    use crate::state::{AppState, GenerationSettings};

    const FALLBACK: &str = "/images/codebeast-placeholder.png";

    async fn test_state() -> AppState {
        let http = reqwest::Client::new();
        AppState {
            db: memory_database().await,
            http: http.clone(),
            langflow: LangflowClient::new(http.clone(), "", "", ""),
            vision: None,
            everart: EverArtClient::new(
                http,
                "",
                "http://127.0.0.1:9",
                "5000",
                Duration::from_millis(1),
                1,
            ),
            settings: GenerationSettings {
                image_options: ImageOptions {
                    width: 512,
                    height: 512,
                    image_count: 1,
                },
                fallback_image_url: FALLBACK.to_string(),
                allowed_image_prefix: "https://storage.googleapis.com/".to_string(),
                max_upload_dimension: 1024,
            },
        }
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn generate_rejects_unsupported_content_type() {
        let app = router(test_state().await);
        let request = Request::builder()
            .method("POST")
            .uri("/api/generate/prompt")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("beth"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn generate_rejects_invalid_username_and_emotion() {
        let state = test_state().await;

        let response = router(state.clone())
            .oneshot(json_request(
                "POST",
                "/api/generate/prompt",
                json!({ "username": "-bad-", "emotion": "Angry" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "Valid GitHub username is required"
        );

        let response = router(state)
            .oneshot(json_request(
                "POST",
                "/api/generate/prompt",
                json!({ "username": "beth", "emotion": "Sleepy" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("Action Figure"));
    }

    #[tokio::test]
    async fn generate_reports_upstream_failure() {
        let app = router(test_state().await);
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/generate/prompt",
                json!({ "username": "Beth", "emotion": "Angry" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["username"], "beth");
        assert_eq!(body["status"]["general"], "error");
    }

    #[tokio::test]
    async fn generate_uses_cached_details_and_falls_back_on_image_failure() {
        let state = test_state().await;
        state
            .db
            .save_user_details(UserDetailsInsert {
                username: "beth".to_string(),
                content: "languages: ['Rust','Go'] | prompt: a crab-gopher chimera | github_user_name_url: https://github.com/beth | num_repositories: 12 | animal_selection: [['crab', 'for Rust'], ['gopher', 'for Go']]".to_string(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();

        let response = router(state.clone())
            .oneshot(json_request(
                "POST",
                "/api/generate/prompt",
                json!({ "username": "beth", "emotion": "Action Figure" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["languages"], "Rust,Go");
        assert_eq!(body["prompt"], "a crab-gopher chimera");
        assert_eq!(body["githubUrl"], "https://github.com/beth");
        assert_eq!(body["repoCount"], 12);
        assert_eq!(
            body["animalSelection"],
            json!([["crab", "for Rust"], ["gopher", "for Go"]])
        );
        assert_eq!(body["imageUrl"], FALLBACK);
        assert_eq!(body["isImg2Img"], false);
        assert_eq!(body["status"]["promptSource"], "cache");
        assert_eq!(body["status"]["everart"], "error");
        assert_eq!(body["status"]["analysis"], "not_applicable");

        assert!(state.db.get_image_by_username("beth").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn multipart_upload_without_vision_is_skipped() {
        let state = test_state().await;
        state
            .db
            .save_user_details(UserDetailsInsert {
                username: "beth".to_string(),
                content: "langs | a fox | none | num_repositories: 1".to_string(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();

        let boundary = "beastboundary";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"username\"\r\n\r\nbeth\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"emotion\"\r\n\r\nZombie\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"imageFile\"; filename=\"me.png\"\r\nContent-Type: image/png\r\n\r\nnotreallyapng\r\n\
             --{b}--\r\n",
            b = boundary
        );
        let request = Request::builder()
            .method("POST")
            .uri("/api/generate/prompt")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();

        let response = router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"]["analysis"], "failed_or_skipped");
        assert_eq!(body["imageAnalysis"], Value::Null);
        assert_eq!(body["githubUrl"], "https://github.com/beth");
    }

    #[tokio::test]
    async fn gallery_upsert_and_lookup() {
        let state = test_state().await;

        let response = router(state.clone())
            .oneshot(json_request("POST", "/api/gallery", json!({ "username": "beth" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = router(state.clone())
            .oneshot(json_request(
                "POST",
                "/api/gallery",
                json!({ "username": "Beth", "image_url": "https://storage.googleapis.com/b.png" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router(state.clone())
            .oneshot(get_request("/api/gallery"))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body.as_array().map(Vec::len), Some(1));
        assert_eq!(body[0]["username"], "beth");

        let response = router(state.clone())
            .oneshot(get_request("/api/images/BETH"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await["image_url"],
            "https://storage.googleapis.com/b.png"
        );
    }

    #[tokio::test]
    async fn image_lookup_validates_and_reports_missing() {
        let state = test_state().await;
        state
            .db
            .upsert_image(ImageUpsert {
                username: "someone".to_string(),
                image_url: "https://storage.googleapis.com/s.png".to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let response = router(state.clone())
            .oneshot(get_request("/api/images/bad_name"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = router(state)
            .oneshot(get_request("/api/images/nobody"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "Image not found");
    }

    #[tokio::test]
    async fn proxy_and_download_reject_foreign_urls() {
        let state = test_state().await;

        let response = router(state.clone())
            .oneshot(get_request("/api/proxy-image?url=https://evil.example/x.png"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = router(state.clone())
            .oneshot(get_request(
                "/api/download?url=https://storage.googleapis.com/x.png&username=-bad",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = router(state)
            .oneshot(get_request("/api/download?username=beth"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn proxy_reports_unreachable_upstream_as_bad_gateway() {
        let mut state = test_state().await;
        state.settings.allowed_image_prefix = "https://127.0.0.1:9/".to_string();

        let response = router(state)
            .oneshot(get_request("/api/proxy-image?url=https://127.0.0.1:9/beast.png"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_json(response).await["error"], "Failed to fetch image");
    }

    #[tokio::test]
    async fn everart_generate_requires_prompt_and_model() {
        let state = test_state().await;
        let response = router(state.clone())
            .oneshot(json_request("POST", "/api/everart/generate", json!({ "model": "5000" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Prompt is required");

        let response = router(state.clone())
            .oneshot(json_request("POST", "/api/everart/generate", json!({ "prompt": "a fox" })))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["error"], "Model is required");

        let response = router(state)
            .oneshot(json_request(
                "POST",
                "/api/everart/generate",
                json!({ "prompt": "a fox", "model": "5000" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn health_reports_component_state() {
        let response = router(test_state().await)
            .oneshot(get_request("/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["langflow"], false);
    }
}
