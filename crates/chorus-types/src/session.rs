//! Per-session aggregate handed to backends.
//!
//! `ChatSessionData` bundles everything a backend may read for one turn. The
//! cached `total_message_tokens` must equal the sum of message token counts
//! whenever no writer holds the data; `chorus-core` enforces this with a
//! write guard that calls [`ChatSessionData::recompute_total_message_tokens`]
//! on release.

use serde::{Deserialize, Serialize};

use crate::character::{CharacterSnapshot, MemoryItem, UserSnapshot};
use crate::chat::{Chat, ChatMessage, MessageRole};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSessionData {
    pub chat: Chat,
    pub user: UserSnapshot,
    /// Character snapshot with placeholders already substituted.
    pub character: CharacterSnapshot,
    /// Live (non-summarized) history, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Active memory list, most relevant first.
    pub memories: Vec<MemoryItem>,
    /// Free-form context supplied by the client with the last `send`.
    pub context: Option<String>,
    /// Candidate actions supplied by the client with the last `send`.
    pub actions: Vec<String>,
    total_message_tokens: u32,
}

impl ChatSessionData {
    /// Build the aggregate. Placeholders in `character` are substituted here.
    pub fn new(
        chat: Chat,
        user: UserSnapshot,
        character: CharacterSnapshot,
        messages: Vec<ChatMessage>,
    ) -> Self {
        let character = character.substitute(&user);
        let memories = character.memories.clone();
        let mut data = Self {
            chat,
            user,
            character,
            messages,
            memories,
            context: None,
            actions: Vec::new(),
            total_message_tokens: 0,
        };
        data.recompute_total_message_tokens();
        data
    }

    /// Cached sum of all message token counts.
    pub fn total_message_tokens(&self) -> u32 {
        self.total_message_tokens
    }

    /// Restore the token invariant after the message list changed.
    pub fn recompute_total_message_tokens(&mut self) {
        self.total_message_tokens = self.messages.iter().map(|m| m.token_count).sum();
    }

    /// Most recent message with the given role.
    pub fn last_message(&self, role: MessageRole) -> Option<&ChatMessage> {
        self.messages.iter().rev().find(|m| m.role == role)
    }

    /// Mutable access to the most recent message with the given role.
    pub fn last_message_mut(&mut self, role: MessageRole) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().rev().find(|m| m.role == role)
    }
}
