//! Image Generation Hub
//!
//! A proxy gateway in front of an upstream generative image API. The
//! orchestrator bounds upstream concurrency, paces call starts, retries
//! transient failures with exponential backoff, and normalizes upstream
//! errors into a stable taxonomy; conversation history rides along as a
//! best-effort side effect.

pub mod api;
pub mod config;
pub mod error;
pub mod history;
pub mod middleware;
pub mod orchestrator;
pub mod response;
pub mod upstream;

pub use error::{AppError, Result};

use std::sync::Arc;

use history::MemoryStore;
use orchestrator::Orchestrator;

/// Application state shared across all handlers
pub struct AppState {
    pub settings: config::Settings,
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<MemoryStore>,
}
