//! Prompt types shared between the prompt builder and text-generation backends.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(MessageRole::System),
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// A single message in an assembled prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: MessageRole,
    pub content: String,
}

/// A token-budgeted prompt ready for a text-generation backend.
///
/// Backends that take a flat text prompt use [`Prompt::to_text`]; chat-style
/// backends send `system` separately and `messages` as the message array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    /// System preamble including the memory lines that fit the memory budget.
    pub system: String,
    /// Post-history instructions, appended after the conversation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_history: Option<String>,
    /// Conversation window, oldest first.
    pub messages: Vec<PromptMessage>,
    /// Tokens consumed by everything above.
    pub token_count: u32,
}

impl Prompt {
    /// Flatten the prompt into a single text block.
    pub fn to_text(&self) -> String {
        let mut parts = Vec::with_capacity(self.messages.len() + 2);
        if !self.system.is_empty() {
            parts.push(self.system.clone());
        }
        for message in &self.messages {
            parts.push(format!("{}: {}", message.role, message.content));
        }
        if let Some(post) = &self.post_history {
            parts.push(post.clone());
        }
        parts.join("\n")
    }
}
