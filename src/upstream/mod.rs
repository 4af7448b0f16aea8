//! Upstream generative model clients

pub mod gemini;
pub mod traits;

pub use gemini::GeminiClient;
pub use traits::{
    GenerationParams, GenerationRequest, GenerationResult, ImageData, InputImage, RequestKind,
    UpstreamClient, UpstreamError,
};
