//! Chat and chat message types.
//!
//! A chat is created once per conversation between a user and a character
//! and is immutable except by deletion. Messages are appended by the reply
//! pipeline and only mutated for interruption truncation or summarization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use crate::llm::MessageRole;

/// A conversation between a user and one character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: Uuid,
    pub character_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Chat {
    /// Start a new chat with the given character.
    pub fn new(character_id: Uuid) -> Self {
        Self {
            id: Uuid::now_v7(),
            character_id,
            created_at: Utc::now(),
        }
    }
}

/// A single message within a chat.
///
/// Messages are ordered by `timestamp`. A message with `summarized_by` set
/// has been folded into the summary message with that ID and is no longer
/// part of the live history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub role: MessageRole,
    pub text: String,
    pub token_count: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summarized_by: Option<Uuid>,
}

impl ChatMessage {
    /// Create a message timestamped now.
    pub fn new(chat_id: Uuid, role: MessageRole, text: impl Into<String>, token_count: u32) -> Self {
        Self {
            id: Uuid::now_v7(),
            chat_id,
            role,
            text: text.into(),
            token_count,
            timestamp: Utc::now(),
            summarized_by: None,
        }
    }
}
