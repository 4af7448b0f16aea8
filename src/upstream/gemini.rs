//! HTTP client for the Gemini generateContent API

use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::UpstreamConfig;
use crate::error::{AppError, Result};
use crate::response::base64 as b64;
use crate::upstream::traits::{
    GenerationRequest, GenerationResult, ImageData, UpstreamClient, UpstreamError,
};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Client for the Gemini REST API. Performs exactly one upstream call per
/// invoke; throttling and retries live in the orchestrator.
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    contents: Vec<ApiContent>,
    generation_config: ApiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct ApiContent {
    parts: Vec<ApiRequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum ApiRequestPart {
    #[serde(rename = "text")]
    Text(String),
    #[serde(rename = "inlineData")]
    InlineData(ApiInlineData),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiInlineData {
    mime_type: String,
    /// Base64-encoded payload.
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<i32>,
    candidate_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
}

#[derive(Debug, Deserialize)]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseContent {
    #[serde(default)]
    parts: Vec<ApiResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<ApiInlineData>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    #[serde(default)]
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl GeminiClient {
    /// Build a client from upstream configuration. The per-request timeout
    /// here is a transport ceiling; the orchestrator applies its own
    /// per-attempt timeout on top.
    pub fn from_config(config: &UpstreamConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.attempt_timeout_ms.saturating_mul(2)))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
        })
    }

    fn build_body(request: &GenerationRequest) -> ApiRequest {
        let mut parts: Vec<ApiRequestPart> = request
            .images
            .iter()
            .map(|img| {
                ApiRequestPart::InlineData(ApiInlineData {
                    mime_type: img.mime_type.clone(),
                    data: b64::encode(&img.data),
                })
            })
            .collect();
        parts.push(ApiRequestPart::Text(request.prompt.clone()));

        ApiRequest {
            contents: vec![ApiContent { parts }],
            generation_config: ApiGenerationConfig {
                temperature: request.params.temperature,
                top_p: request.params.top_p,
                top_k: request.params.top_k,
                candidate_count: request.params.candidate_count,
                seed: request.params.seed,
                max_output_tokens: request.params.max_output_tokens,
            },
        }
    }

    fn parse_success(body: ApiResponse) -> std::result::Result<GenerationResult, UpstreamError> {
        let mut result = GenerationResult::default();
        for candidate in body.candidates {
            let Some(content) = candidate.content else {
                continue;
            };
            for part in content.parts {
                if let Some(inline) = part.inline_data {
                    let data = b64::decode(&inline.data).map_err(|e| {
                        UpstreamError::Unknown(format!("undecodable image payload: {}", e))
                    })?;
                    result.images.push(ImageData {
                        data,
                        mime_type: if inline.mime_type.is_empty() {
                            "image/png".to_string()
                        } else {
                            inline.mime_type
                        },
                    });
                } else if let Some(text) = part.text {
                    if !text.is_empty() {
                        result.texts.push(text);
                    }
                }
            }
        }
        Ok(result)
    }

    fn classify_failure(
        status: StatusCode,
        retry_after: Option<Duration>,
        body: &str,
    ) -> UpstreamError {
        let detail = serde_json::from_str::<ApiErrorEnvelope>(body)
            .ok()
            .and_then(|e| e.error);
        let (message, api_status) = match detail {
            Some(d) => (d.message, d.status),
            None => (body.chars().take(200).collect::<String>(), String::new()),
        };

        if status == StatusCode::TOO_MANY_REQUESTS || api_status == "RESOURCE_EXHAUSTED" {
            // Quota exhaustion comes back on the same status; the wording is
            // the only discriminator the API gives us.
            if message.to_lowercase().contains("quota") {
                return UpstreamError::QuotaExhausted {
                    message,
                    retry_after,
                };
            }
            return UpstreamError::RateLimited {
                message,
                retry_after,
            };
        }
        if status == StatusCode::BAD_REQUEST || api_status == "INVALID_ARGUMENT" {
            return UpstreamError::InvalidArgument(message);
        }
        if status == StatusCode::FORBIDDEN
            || status == StatusCode::UNAUTHORIZED
            || api_status == "PERMISSION_DENIED"
        {
            return UpstreamError::PermissionDenied(message);
        }
        if status.is_server_error() {
            return UpstreamError::Transient(format!("upstream {}: {}", status, message));
        }
        UpstreamError::Unknown(format!("upstream {}: {}", status, message))
    }
}

#[async_trait]
impl UpstreamClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn invoke(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<GenerationResult, UpstreamError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, request.model
        );
        let body = Self::build_body(request);

        debug!(
            model = %request.model,
            kind = request.kind.as_str(),
            candidate_count = request.params.candidate_count,
            input_images = request.images.len(),
            "Dispatching upstream call"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    UpstreamError::Transient(format!("transport: {}", e))
                } else {
                    UpstreamError::Unknown(format!("transport: {}", e))
                }
            })?;

        let status = response.status();
        if status.is_success() {
            let parsed: ApiResponse = response
                .json()
                .await
                .map_err(|e| UpstreamError::Unknown(format!("malformed response: {}", e)))?;
            return Self::parse_success(parsed);
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        let text = response.text().await.unwrap_or_default();
        Err(Self::classify_failure(status, retry_after, &text))
    }
}
