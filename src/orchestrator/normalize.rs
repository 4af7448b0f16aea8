//! Pure mapping from upstream outcomes to the stable client-facing shape

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::orchestrator::retry::UpstreamFailure;
use crate::response::base64 as b64;
use crate::upstream::traits::{GenerationResult, UpstreamError};

/// Response shape handed to the routing layer: ordered base64 image payloads
/// and ordered text fragments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedResponse {
    pub images: Vec<String>,
    pub texts: Vec<String>,
}

/// Map a successful upstream payload. A result with no images and no texts
/// is converted to an empty-output error, never surfaced as a bare success.
pub fn normalize_success(result: GenerationResult) -> Result<NormalizedResponse, AppError> {
    if result.is_empty() {
        return Err(AppError::EmptyOutput);
    }
    Ok(NormalizedResponse {
        images: result.images.iter().map(|img| b64::encode(&img.data)).collect(),
        texts: result.texts,
    })
}

/// Map a terminal upstream failure to the stable error taxonomy, annotated
/// with the total attempts made.
pub fn normalize_failure(failure: UpstreamFailure) -> AppError {
    let UpstreamFailure { error, attempts } = failure;
    match error {
        UpstreamError::RateLimited {
            message,
            retry_after,
        }
        | UpstreamError::QuotaExhausted {
            message,
            retry_after,
        } => AppError::ResourceExhausted {
            message: format!("{} ({} attempts)", message, attempts),
            retry_after,
        },
        UpstreamError::InvalidArgument(message) => AppError::InvalidRequest(message),
        UpstreamError::PermissionDenied(message) => AppError::PermissionDenied(message),
        UpstreamError::Transient(message) | UpstreamError::Unknown(message) => {
            AppError::Upstream(format!("{} ({} attempts)", message, attempts))
        }
    }
}
