//! In-memory conversation store

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::history::{
    Conversation, HistorySink, Message, Principal, Role, SinkError, TurnRecord,
};

/// Process-local key-value store for conversations and their messages.
/// Ownership is enforced on every access; a foreign conversation reads the
/// same as a missing one.
#[derive(Default)]
pub struct MemoryStore {
    conversations: DashMap<Uuid, Conversation>,
    messages: DashMap<Uuid, Vec<Message>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_conversation(&self, principal: &Principal, title: Option<String>) -> Conversation {
        let conversation = Conversation {
            id: Uuid::new_v4(),
            owner: principal.id.clone(),
            title: title.unwrap_or_else(|| "New conversation".to_string()),
            created_at: Utc::now(),
        };
        self.conversations
            .insert(conversation.id, conversation.clone());
        self.messages.insert(conversation.id, Vec::new());
        info!(conversation_id = %conversation.id, "Created conversation");
        conversation
    }

    /// Conversations owned by this principal, newest first.
    pub fn list_conversations(&self, principal: &Principal) -> Vec<Conversation> {
        let mut owned: Vec<Conversation> = self
            .conversations
            .iter()
            .filter(|entry| entry.owner == principal.id)
            .map(|entry| entry.value().clone())
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        owned
    }

    pub fn list_messages(&self, principal: &Principal, id: Uuid) -> Result<Vec<Message>> {
        self.owned(principal, id)?;
        Ok(self
            .messages
            .get(&id)
            .map(|m| m.value().clone())
            .unwrap_or_default())
    }

    pub fn rename_conversation(
        &self,
        principal: &Principal,
        id: Uuid,
        title: &str,
    ) -> Result<Conversation> {
        self.owned(principal, id)?;
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::InvalidRequest("Title cannot be empty".into()));
        }
        let mut entry = self
            .conversations
            .get_mut(&id)
            .ok_or(AppError::ConversationNotFound)?;
        entry.title = title.to_string();
        Ok(entry.value().clone())
    }

    pub fn delete_conversation(&self, principal: &Principal, id: Uuid) -> Result<()> {
        self.owned(principal, id)?;
        self.messages.remove(&id);
        self.conversations.remove(&id);
        info!(conversation_id = %id, "Deleted conversation");
        Ok(())
    }

    fn owned(&self, principal: &Principal, id: Uuid) -> Result<()> {
        match self.conversations.get(&id) {
            Some(conv) if conv.owner == principal.id => Ok(()),
            // Hide foreign conversations rather than revealing they exist.
            _ => Err(AppError::ConversationNotFound),
        }
    }
}

#[async_trait]
impl HistorySink for MemoryStore {
    async fn append(
        &self,
        conversation_id: Uuid,
        principal: &Principal,
        turn: TurnRecord,
    ) -> std::result::Result<(), SinkError> {
        let owner_ok = match self.conversations.get(&conversation_id) {
            Some(conv) => conv.owner == principal.id,
            None => return Err(SinkError::NotFound(conversation_id)),
        };
        if !owner_ok {
            return Err(SinkError::NotOwner(conversation_id));
        }

        let now = Utc::now();
        let mut messages = self
            .messages
            .entry(conversation_id)
            .or_default();
        messages.push(Message {
            role: Role::User,
            kind: turn.kind.clone(),
            prompt: Some(turn.prompt),
            images: Vec::new(),
            texts: Vec::new(),
            params: turn.params.clone(),
            created_at: now,
        });
        messages.push(Message {
            role: Role::Assistant,
            kind: turn.kind,
            prompt: None,
            images: turn.images,
            texts: turn.texts,
            params: turn.params,
            created_at: now,
        });
        Ok(())
    }
}
