//! HTTP handlers for generation and conversation endpoints

use axum::{
    extract::{Multipart, Path, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::history::{Conversation, Message, Principal};
use crate::middleware::auth::MaybePrincipal;
use crate::orchestrator::{ConversationContext, NormalizedResponse};
use crate::upstream::traits::{
    GenerationParams, GenerationRequest, InputImage, RequestKind,
};
use crate::AppState;

/// JSON body for `POST /v1/generate`
#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    pub prompt: String,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<i32>,
    pub candidate_count: Option<i64>,
    pub seed: Option<i64>,
    pub max_output_tokens: Option<i32>,
    pub conversation_id: Option<Uuid>,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn generate(
    State(state): State<Arc<AppState>>,
    Extension(MaybePrincipal(principal)): Extension<MaybePrincipal>,
    Json(body): Json<GenerateBody>,
) -> Result<Json<NormalizedResponse>> {
    let params = GenerationParams {
        temperature: body.temperature,
        top_p: body.top_p,
        top_k: body.top_k,
        candidate_count: GenerationParams::clamp_candidate_count(body.candidate_count),
        seed: body.seed,
        max_output_tokens: body.max_output_tokens,
    };
    let model = body
        .model
        .unwrap_or_else(|| state.settings.upstream.default_model.clone());

    let request =
        GenerationRequest::new(RequestKind::Generate, body.prompt, model).with_params(params);
    let context = conversation_context(principal, body.conversation_id);

    let response = state.orchestrator.handle(request, context).await?;
    Ok(Json(response))
}

pub async fn edit(
    state: State<Arc<AppState>>,
    principal: Extension<MaybePrincipal>,
    multipart: Multipart,
) -> Result<Json<NormalizedResponse>> {
    submit_multipart(state, principal, multipart, RequestKind::Edit).await
}

pub async fn compose(
    state: State<Arc<AppState>>,
    principal: Extension<MaybePrincipal>,
    multipart: Multipart,
) -> Result<Json<NormalizedResponse>> {
    submit_multipart(state, principal, multipart, RequestKind::Compose).await
}

async fn submit_multipart(
    State(state): State<Arc<AppState>>,
    Extension(MaybePrincipal(principal)): Extension<MaybePrincipal>,
    multipart: Multipart,
    kind: RequestKind,
) -> Result<Json<NormalizedResponse>> {
    let form = EditForm::parse(multipart).await?;

    info!(
        kind = kind.as_str(),
        input_images = form.images.len(),
        prompt_len = form.prompt.len(),
        "Received multipart request"
    );

    let params = GenerationParams {
        temperature: form.temperature,
        top_p: form.top_p,
        top_k: form.top_k,
        candidate_count: GenerationParams::clamp_candidate_count(form.candidate_count),
        seed: form.seed,
        max_output_tokens: form.max_output_tokens,
    };
    let model = form
        .model
        .unwrap_or_else(|| state.settings.upstream.default_model.clone());

    let request = GenerationRequest::new(kind, form.prompt, model)
        .with_params(params)
        .with_images(form.images);
    let context = conversation_context(principal, form.conversation_id);

    let response = state.orchestrator.handle(request, context).await?;
    Ok(Json(response))
}

/// Scalar fields plus uploaded images from an edit/compose form.
#[derive(Debug, Default)]
struct EditForm {
    prompt: String,
    model: Option<String>,
    temperature: Option<f32>,
    top_p: Option<f32>,
    top_k: Option<i32>,
    candidate_count: Option<i64>,
    seed: Option<i64>,
    max_output_tokens: Option<i32>,
    conversation_id: Option<Uuid>,
    images: Vec<InputImage>,
}

impl EditForm {
    async fn parse(mut multipart: Multipart) -> Result<Self> {
        let mut form = EditForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::InvalidRequest(format!("Malformed multipart body: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" | "files" => {
                    let mime_type = field
                        .content_type()
                        .unwrap_or("image/png")
                        .to_string();
                    let data = field.bytes().await.map_err(|e| {
                        AppError::InvalidRequest(format!("Unreadable image upload: {}", e))
                    })?;
                    form.images.push(InputImage {
                        data: data.to_vec(),
                        mime_type,
                    });
                }
                "prompt" => form.prompt = text(field).await?,
                "model" => form.model = Some(text(field).await?),
                "temperature" => form.temperature = Some(parse(&name, field).await?),
                "top_p" => form.top_p = Some(parse(&name, field).await?),
                "top_k" => form.top_k = Some(parse(&name, field).await?),
                "candidate_count" => form.candidate_count = Some(parse(&name, field).await?),
                "seed" => form.seed = Some(parse(&name, field).await?),
                "max_output_tokens" => form.max_output_tokens = Some(parse(&name, field).await?),
                "conversation_id" => form.conversation_id = Some(parse(&name, field).await?),
                // Unknown fields are ignored so frontends can evolve freely
                _ => {}
            }
        }

        Ok(form)
    }
}

async fn text(field: axum::extract::multipart::Field<'_>) -> Result<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::InvalidRequest(format!("Unreadable form field: {}", e)))
}

async fn parse<T: std::str::FromStr>(
    name: &str,
    field: axum::extract::multipart::Field<'_>,
) -> Result<T> {
    let raw = text(field).await?;
    raw.trim()
        .parse()
        .map_err(|_| AppError::InvalidRequest(format!("Invalid value for '{}': {}", name, raw)))
}

fn conversation_context(
    principal: Option<Principal>,
    conversation_id: Option<Uuid>,
) -> Option<ConversationContext> {
    match (principal, conversation_id) {
        (Some(principal), Some(conversation_id)) => Some(ConversationContext {
            conversation_id,
            principal,
        }),
        _ => None,
    }
}

// =====================
// Conversation endpoints
// =====================

#[derive(Debug, Deserialize)]
pub struct ConversationBody {
    pub title: Option<String>,
}

fn require_principal(principal: Option<Principal>) -> Result<Principal> {
    principal.ok_or_else(|| {
        AppError::AuthenticationRequired("Conversation endpoints require an API key".into())
    })
}

pub async fn create_conversation(
    State(state): State<Arc<AppState>>,
    Extension(MaybePrincipal(principal)): Extension<MaybePrincipal>,
    Json(body): Json<ConversationBody>,
) -> Result<Json<Conversation>> {
    let principal = require_principal(principal)?;
    let conversation = state.store.create_conversation(&principal, body.title);
    Ok(Json(conversation))
}

pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    Extension(MaybePrincipal(principal)): Extension<MaybePrincipal>,
) -> Result<Json<Vec<Conversation>>> {
    let principal = require_principal(principal)?;
    Ok(Json(state.store.list_conversations(&principal)))
}

pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Extension(MaybePrincipal(principal)): Extension<MaybePrincipal>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Message>>> {
    let principal = require_principal(principal)?;
    Ok(Json(state.store.list_messages(&principal, id)?))
}

pub async fn rename_conversation(
    State(state): State<Arc<AppState>>,
    Extension(MaybePrincipal(principal)): Extension<MaybePrincipal>,
    Path(id): Path<Uuid>,
    Json(body): Json<ConversationBody>,
) -> Result<Json<Conversation>> {
    let principal = require_principal(principal)?;
    let title = body.title.unwrap_or_default();
    Ok(Json(state.store.rename_conversation(&principal, id, &title)?))
}

pub async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    Extension(MaybePrincipal(principal)): Extension<MaybePrincipal>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>> {
    let principal = require_principal(principal)?;
    state.store.delete_conversation(&principal, id)?;
    Ok(Json(json!({ "ok": true })))
}
