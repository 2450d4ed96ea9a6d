//! Conversation and turn records.
//!
//! A turn has a two-state lifecycle: [`NewTurn`] is the unpersisted
//! form the orchestrator constructs, [`Turn`] is the persisted record
//! with a store-assigned id and timestamps. Synthetic system turns
//! (the prompt prefix) stay [`NewTurn`] for their whole life — they
//! are never written to the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role tag for a persisted turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SenderType {
    User,
    Assistant,
    AssistantReasoning,
    System,
}

impl SenderType {
    pub fn as_str(self) -> &'static str {
        match self {
            SenderType::User => "user",
            SenderType::Assistant => "assistant",
            SenderType::AssistantReasoning => "assistant-reasoning",
            SenderType::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(SenderType::User),
            "assistant" => Some(SenderType::Assistant),
            "assistant-reasoning" => Some(SenderType::AssistantReasoning),
            "system" => Some(SenderType::System),
            _ => None,
        }
    }
}

/// A durable grouping of ordered turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An unpersisted turn: everything but the store-assigned fields.
#[derive(Debug, Clone)]
pub struct NewTurn {
    pub conversation_id: i64,
    pub content: String,
    pub role: SenderType,
}

impl NewTurn {
    pub fn user(conversation_id: i64, content: impl Into<String>) -> Self {
        Self { conversation_id, content: content.into(), role: SenderType::User }
    }

    pub fn assistant(conversation_id: i64, content: impl Into<String>) -> Self {
        Self { conversation_id, content: content.into(), role: SenderType::Assistant }
    }

    pub fn reasoning(conversation_id: i64, content: impl Into<String>) -> Self {
        Self { conversation_id, content: content.into(), role: SenderType::AssistantReasoning }
    }

    pub fn system(conversation_id: i64, content: impl Into<String>) -> Self {
        Self { conversation_id, content: content.into(), role: SenderType::System }
    }
}

/// A persisted turn as read back from the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: i64,
    pub conversation_id: i64,
    pub content: Option<String>,
    /// Reserved column, unused by current behavior.
    pub summary: Option<String>,
    pub role: SenderType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
