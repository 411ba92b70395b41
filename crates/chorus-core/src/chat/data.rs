//! Scoped access to a session's [`ChatSessionData`].
//!
//! Readers share the data; a single writer mutates it through
//! [`SessionDataWriteGuard`], which restores the cached token total when it
//! is released. No code path can observe a stale total after a write scope
//! closes, whatever the writer changed.

use std::ops::{Deref, DerefMut};

use chorus_types::session::ChatSessionData;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub struct SessionData {
    inner: RwLock<ChatSessionData>,
}

impl SessionData {
    pub fn new(data: ChatSessionData) -> Self {
        Self {
            inner: RwLock::new(data),
        }
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, ChatSessionData> {
        self.inner.read().await
    }

    pub async fn write(&self) -> SessionDataWriteGuard<'_> {
        SessionDataWriteGuard {
            guard: self.inner.write().await,
        }
    }

    /// Owned copy for handing to a backend without holding the lock.
    pub async fn snapshot(&self) -> ChatSessionData {
        self.inner.read().await.clone()
    }
}

/// Exclusive access that recomputes `total_message_tokens` on drop.
pub struct SessionDataWriteGuard<'a> {
    guard: RwLockWriteGuard<'a, ChatSessionData>,
}

impl Deref for SessionDataWriteGuard<'_> {
    type Target = ChatSessionData;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for SessionDataWriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

impl Drop for SessionDataWriteGuard<'_> {
    fn drop(&mut self) {
        self.guard.recompute_total_message_tokens();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_types::character::{CharacterSnapshot, UserSnapshot};
    use chorus_types::chat::{Chat, ChatMessage, MessageRole};
    use uuid::Uuid;

    fn data() -> ChatSessionData {
        let chat = Chat::new(Uuid::now_v7());
        let character = CharacterSnapshot {
            id: chat.character_id,
            name: "Luna".to_string(),
            description: String::new(),
            personality: String::new(),
            scenario: String::new(),
            system_prompt: String::new(),
            post_history_instructions: None,
            culture: "en-US".to_string(),
            voice: None,
            memories: Vec::new(),
        };
        let messages = vec![ChatMessage::new(chat.id, MessageRole::User, "hi", 4)];
        ChatSessionData::new(chat, UserSnapshot::default(), character, messages)
    }

    #[tokio::test]
    async fn test_write_guard_recomputes_total_on_release() {
        let session = SessionData::new(data());
        assert_eq!(session.read().await.total_message_tokens(), 4);

        {
            let mut data = session.write().await;
            let chat_id = data.chat.id;
            data.messages
                .push(ChatMessage::new(chat_id, MessageRole::Assistant, "hello", 6));
            data.messages[0].token_count = 1;
        }
        assert_eq!(session.read().await.total_message_tokens(), 7);

        {
            let mut data = session.write().await;
            data.messages.clear();
        }
        assert_eq!(session.snapshot().await.total_message_tokens(), 0);
    }
}
