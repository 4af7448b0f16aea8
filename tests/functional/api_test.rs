//! Functional tests for the HTTP API

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header::AUTHORIZATION, header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use image_gen_hub::api::routes::create_router;
use image_gen_hub::config::Settings;
use image_gen_hub::error::ErrorBody;
use image_gen_hub::history::{Conversation, MemoryStore, Principal};
use image_gen_hub::orchestrator::{AdmissionGate, NormalizedResponse, Orchestrator, RetryPolicy};
use image_gen_hub::upstream::traits::{
    GenerationRequest, GenerationResult, ImageData, UpstreamClient, UpstreamError,
};
use image_gen_hub::AppState;

/// Upstream stub returning a fixed outcome for every call.
struct StaticClient {
    outcome: fn() -> Result<GenerationResult, UpstreamError>,
}

#[async_trait]
impl UpstreamClient for StaticClient {
    fn name(&self) -> &str {
        "static"
    }

    async fn invoke(
        &self,
        _request: &GenerationRequest,
    ) -> Result<GenerationResult, UpstreamError> {
        (self.outcome)()
    }
}

fn ok_outcome() -> Result<GenerationResult, UpstreamError> {
    Ok(GenerationResult {
        images: vec![ImageData {
            data: vec![9, 9, 9],
            mime_type: "image/png".into(),
        }],
        texts: vec!["here you go".into()],
    })
}

fn invalid_outcome() -> Result<GenerationResult, UpstreamError> {
    Err(UpstreamError::InvalidArgument("prompt rejected".into()))
}

fn test_app(outcome: fn() -> Result<GenerationResult, UpstreamError>) -> (Router, Arc<MemoryStore>) {
    let mut settings = Settings::default();
    settings.auth.api_keys = vec!["test-key".to_string()];

    let store = Arc::new(MemoryStore::new());
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(StaticClient { outcome }),
        Arc::new(AdmissionGate::new(2, Duration::ZERO)),
        RetryPolicy {
            max_retries: 0,
            backoff_base: Duration::from_millis(1),
            jitter: false,
            force_single_candidate: false,
            attempt_timeout: Duration::from_secs(1),
        },
        store.clone(),
    ));

    let state = Arc::new(AppState {
        settings,
        orchestrator,
        store: store.clone(),
    });
    (create_router(state), store)
}

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = test_app(ok_outcome);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_generate_returns_images_and_texts() {
    let (app, _) = test_app(ok_outcome);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/generate")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"prompt":"a banana"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: NormalizedResponse = body_json(response).await;
    assert_eq!(body.images.len(), 1);
    assert_eq!(body.texts, vec!["here you go"]);
}

#[tokio::test]
async fn test_generate_failure_returns_stable_triple() {
    let (app, _) = test_app(invalid_outcome);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/generate")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"prompt":"a banana"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = body_json(response).await;
    assert_eq!(body.status_code, 400);
    assert_eq!(body.error_code, "INVALID_ARGUMENT");
    assert!(body.message.contains("prompt rejected"));
}

#[tokio::test]
async fn test_empty_prompt_rejected() {
    let (app, _) = test_app(ok_outcome);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/generate")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"prompt":"   "}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

fn multipart_body(boundary: &str, parts: &[(&str, Option<&str>, &str)]) -> String {
    let mut body = String::new();
    for (name, filename, value) in parts {
        body.push_str(&format!("--{}\r\n", boundary));
        match filename {
            Some(filename) => {
                body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    name, filename
                ));
                body.push_str("Content-Type: image/png\r\n\r\n");
            }
            None => {
                body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                    name
                ));
            }
        }
        body.push_str(value);
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{}--\r\n", boundary));
    body
}

#[tokio::test]
async fn test_edit_without_image_rejected() {
    let (app, _) = test_app(ok_outcome);
    let body = multipart_body("XBOUNDARY", &[("prompt", None, "restyle this")]);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/edit")
                .header(
                    CONTENT_TYPE,
                    "multipart/form-data; boundary=XBOUNDARY",
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = body_json(response).await;
    assert_eq!(body.error_code, "INVALID_ARGUMENT");
}

#[tokio::test]
async fn test_compose_with_two_images_succeeds() {
    let (app, _) = test_app(ok_outcome);
    let body = multipart_body(
        "XBOUNDARY",
        &[
            ("prompt", None, "merge these"),
            ("file", Some("a.png"), "PIXELSA"),
            ("file", Some("b.png"), "PIXELSB"),
        ],
    );
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/compose")
                .header(
                    CONTENT_TYPE,
                    "multipart/form-data; boundary=XBOUNDARY",
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: NormalizedResponse = body_json(response).await;
    assert_eq!(body.images.len(), 1);
}

#[tokio::test]
async fn test_compose_with_one_image_rejected() {
    let (app, _) = test_app(ok_outcome);
    let body = multipart_body(
        "XBOUNDARY",
        &[
            ("prompt", None, "merge these"),
            ("file", Some("a.png"), "PIXELSA"),
        ],
    );
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/compose")
                .header(
                    CONTENT_TYPE,
                    "multipart/form-data; boundary=XBOUNDARY",
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_conversations_require_api_key() {
    let (app, _) = test_app(ok_outcome);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/conversations")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"title":"my chat"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_conversation_crud_flow() {
    let (app, _) = test_app(ok_outcome);

    // Create
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/conversations")
                .header(AUTHORIZATION, "Bearer test-key")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"title":"bananas"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let created: Conversation = body_json(response).await;
    assert_eq!(created.title, "bananas");

    // Rename
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri(&format!("/conversations/{}", created.id))
                .header(AUTHORIZATION, "Bearer test-key")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"title":"more bananas"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // List
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/conversations")
                .header(AUTHORIZATION, "Bearer test-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let listed: Vec<Conversation> = body_json(response).await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].title, "more bananas");

    // Delete
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(&format!("/conversations/{}", created.id))
                .header(AUTHORIZATION, "Bearer test-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Gone
    let response = app
        .oneshot(
            Request::builder()
                .uri(&format!("/conversations/{}/messages", created.id))
                .header(AUTHORIZATION, "Bearer test-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_authenticated_generate_records_history() {
    let (app, store) = test_app(ok_outcome);
    let principal = Principal::new("test-key");
    let conversation = store.create_conversation(&principal, None);

    let body = format!(
        r#"{{"prompt":"a banana","conversation_id":"{}"}}"#,
        conversation.id
    );
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/generate")
                .header(AUTHORIZATION, "Bearer test-key")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let messages = store.list_messages(&principal, conversation.id).unwrap();
    assert_eq!(messages.len(), 2);
}

#[tokio::test]
async fn test_anonymous_generate_with_conversation_id_skips_history() {
    let (app, store) = test_app(ok_outcome);
    let principal = Principal::new("test-key");
    let conversation = store.create_conversation(&principal, None);

    let body = format!(
        r#"{{"prompt":"a banana","conversation_id":"{}"}}"#,
        conversation.id
    );
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/generate")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    // Generation succeeds, but nothing is persisted without a principal
    assert_eq!(response.status(), StatusCode::OK);
    assert!(store
        .list_messages(&principal, conversation.id)
        .unwrap()
        .is_empty());
}
