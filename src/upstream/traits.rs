//! Request/response types and the client trait for the upstream image model

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Smallest number of output candidates the upstream accepts.
pub const CANDIDATE_COUNT_MIN: u32 = 1;
/// Largest number of output candidates we are willing to request.
pub const CANDIDATE_COUNT_MAX: u32 = 6;

/// What kind of operation a request represents. Edit and compose carry input
/// images; compose requires at least two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Generate,
    Edit,
    Compose,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Generate => "generate",
            RequestKind::Edit => "edit",
            RequestKind::Compose => "compose",
        }
    }
}

/// Input image supplied with an edit/compose request.
#[derive(Debug, Clone)]
pub struct InputImage {
    pub data: Vec<u8>,
    pub mime_type: String,
}

/// Sampling parameters forwarded to the upstream model.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<i32>,
    pub candidate_count: u32,
    pub seed: Option<i64>,
    pub max_output_tokens: Option<i32>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: None,
            top_p: None,
            top_k: None,
            candidate_count: CANDIDATE_COUNT_MIN,
            seed: None,
            max_output_tokens: None,
        }
    }
}

impl GenerationParams {
    /// Clamp the candidate count into the range the upstream accepts.
    /// Out-of-range caller values are clamped, never rejected.
    pub fn clamp_candidate_count(requested: Option<i64>) -> u32 {
        let requested = requested.unwrap_or(CANDIDATE_COUNT_MIN as i64);
        requested.clamp(CANDIDATE_COUNT_MIN as i64, CANDIDATE_COUNT_MAX as i64) as u32
    }
}

/// A single logical request to the upstream model. Immutable once built; the
/// retry controller clones it when it needs to downgrade a retry.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub kind: RequestKind,
    pub prompt: String,
    pub model: String,
    pub params: GenerationParams,
    pub images: Vec<InputImage>,
}

impl GenerationRequest {
    pub fn new(kind: RequestKind, prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            kind,
            prompt: prompt.into(),
            model: model.into(),
            params: GenerationParams::default(),
            images: Vec::new(),
        }
    }

    pub fn with_params(mut self, mut params: GenerationParams) -> Self {
        params.candidate_count = params
            .candidate_count
            .clamp(CANDIDATE_COUNT_MIN, CANDIDATE_COUNT_MAX);
        self.params = params;
        self
    }

    pub fn with_images(mut self, images: Vec<InputImage>) -> Self {
        self.images = images;
        self
    }
}

/// One image produced by the upstream model.
#[derive(Debug, Clone)]
pub struct ImageData {
    pub data: Vec<u8>,
    pub mime_type: String,
}

/// Successful upstream payload: ordered images and ordered text fragments.
#[derive(Debug, Clone, Default)]
pub struct GenerationResult {
    pub images: Vec<ImageData>,
    pub texts: Vec<String>,
}

impl GenerationResult {
    /// A nominally successful call that produced nothing usable.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.texts.is_empty()
    }
}

/// Failure taxonomy for upstream calls. Closed so retry classification is
/// exhaustive at compile time.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("quota exhausted: {message}")]
    QuotaExhausted {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("unknown failure: {0}")]
    Unknown(String),
}

impl UpstreamError {
    /// Whether another attempt could plausibly succeed. Malformed requests
    /// and authorization failures never benefit from a retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            UpstreamError::RateLimited { .. }
            | UpstreamError::QuotaExhausted { .. }
            | UpstreamError::Transient(_)
            | UpstreamError::Unknown(_) => true,
            UpstreamError::InvalidArgument(_) | UpstreamError::PermissionDenied(_) => false,
        }
    }

    /// Upstream-provided pacing hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            UpstreamError::RateLimited { retry_after, .. }
            | UpstreamError::QuotaExhausted { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Trait for clients of the upstream generative model. One call per invoke;
/// no built-in retry or throttling.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Client name for logging.
    fn name(&self) -> &str;

    /// Perform a single generation call.
    async fn invoke(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<GenerationResult, UpstreamError>;
}
