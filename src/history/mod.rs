//! Conversation history: sink trait, records, and the in-memory store

pub mod store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use store::MemoryStore;

/// Authenticated caller identity attached by the auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// History write failures. Best-effort only: callers log and move on.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("conversation {0} not found")]
    NotFound(Uuid),

    #[error("conversation {0} is owned by another principal")]
    NotOwner(Uuid),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A conversation owned by one principal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    #[serde(skip)]
    pub owner: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub kind: String,
    pub prompt: Option<String>,
    pub images: Vec<String>,
    pub texts: Vec<String>,
    pub params: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Summary of one completed generation turn, appended as a user message
/// (prompt + params) followed by an assistant message (outputs).
#[derive(Debug, Clone)]
pub struct TurnRecord {
    pub kind: String,
    pub prompt: String,
    pub params: serde_json::Value,
    pub images: Vec<String>,
    pub texts: Vec<String>,
}

/// Append-side interface consumed by the orchestrator.
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn append(
        &self,
        conversation_id: Uuid,
        principal: &Principal,
        turn: TurnRecord,
    ) -> Result<(), SinkError>;
}
