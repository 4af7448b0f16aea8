//! Generation request orchestrator
//!
//! Drives a request through admission control, retries, and normalization,
//! then appends the result to conversation history when a conversation
//! context is present. This is the only component with real control flow;
//! everything around it is plumbing.

pub mod admission;
pub mod normalize;
pub mod retry;

use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::history::{HistorySink, Principal, TurnRecord};
use crate::upstream::traits::{GenerationRequest, RequestKind, UpstreamClient};

pub use admission::AdmissionGate;
pub use normalize::NormalizedResponse;
pub use retry::{RetryController, RetryPolicy};

/// Conversation under which a successful result is persisted.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    pub conversation_id: Uuid,
    pub principal: Principal,
}

/// Front door for generation/edit/compose requests.
pub struct Orchestrator {
    retry: RetryController,
    history: Arc<dyn HistorySink>,
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn UpstreamClient>,
        gate: Arc<AdmissionGate>,
        policy: RetryPolicy,
        history: Arc<dyn HistorySink>,
    ) -> Self {
        Self {
            retry: RetryController::new(client, gate, policy),
            history,
        }
    }

    /// Handle one request end to end. Retries are invisible to the caller
    /// except as latency; every failure maps to the stable error triple.
    pub async fn handle(
        &self,
        request: GenerationRequest,
        context: Option<ConversationContext>,
    ) -> Result<NormalizedResponse> {
        validate(&request)?;

        let summary = TurnSummary::of(&request);
        let dispatched = self
            .retry
            .execute(request)
            .await
            .map_err(normalize::normalize_failure)?;
        let attempts = dispatched.attempts;
        let response = normalize::normalize_success(dispatched.result)?;

        info!(
            kind = summary.kind.as_str(),
            attempts,
            images = response.images.len(),
            texts = response.texts.len(),
            "Request completed"
        );

        // Best-effort history write: never gates the primary response.
        if let Some(context) = context {
            let turn = summary.into_turn(&response);
            if let Err(e) = self
                .history
                .append(context.conversation_id, &context.principal, turn)
                .await
            {
                warn!(
                    conversation_id = %context.conversation_id,
                    error = %e,
                    "History append failed, returning result anyway"
                );
            }
        }

        Ok(response)
    }
}

fn validate(request: &GenerationRequest) -> Result<()> {
    if request.prompt.trim().is_empty() {
        return Err(AppError::InvalidRequest("Prompt must not be empty".into()));
    }
    match request.kind {
        RequestKind::Generate => Ok(()),
        RequestKind::Edit => {
            if request.images.is_empty() {
                Err(AppError::InvalidRequest(
                    "Edit requires at least one input image".into(),
                ))
            } else {
                Ok(())
            }
        }
        RequestKind::Compose => {
            if request.images.len() < 2 {
                Err(AppError::InvalidRequest(
                    "Compose requires at least two input images".into(),
                ))
            } else {
                Ok(())
            }
        }
    }
}

/// Request fields captured before the request is consumed by the retry
/// controller, so a history turn can be recorded afterwards.
struct TurnSummary {
    kind: RequestKind,
    prompt: String,
    params: serde_json::Value,
}

impl TurnSummary {
    fn of(request: &GenerationRequest) -> Self {
        Self {
            kind: request.kind,
            prompt: request.prompt.clone(),
            params: json!({
                "model": request.model,
                "temperature": request.params.temperature,
                "top_p": request.params.top_p,
                "top_k": request.params.top_k,
                "candidate_count": request.params.candidate_count,
                "seed": request.params.seed,
                "max_output_tokens": request.params.max_output_tokens,
                "input_images": request.images.len(),
            }),
        }
    }

    fn into_turn(self, response: &NormalizedResponse) -> TurnRecord {
        TurnRecord {
            kind: self.kind.as_str().to_string(),
            prompt: self.prompt,
            params: self.params,
            images: response.images.clone(),
            texts: response.texts.clone(),
        }
    }
}
