//! In-memory repositories for embedding Chorus without a database.
//!
//! Behaves like the SQLite adapters: deleting a chat removes its messages,
//! and summarized messages are hidden from [`ChatMessageRepository::get_messages`].

use chorus_core::repository::{ChatMessageRepository, ChatRepository};
use chorus_types::chat::{Chat, ChatMessage};
use chorus_types::error::RepositoryError;
use dashmap::DashMap;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryChatStore {
    chats: DashMap<Uuid, Chat>,
    messages: DashMap<Uuid, ChatMessage>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored message of a chat, summarized ones included.
    pub fn all_messages(&self, chat_id: &Uuid) -> Vec<ChatMessage> {
        let mut messages: Vec<ChatMessage> = self
            .messages
            .iter()
            .filter(|m| m.chat_id == *chat_id)
            .map(|m| m.value().clone())
            .collect();
        messages.sort_by_key(|m| m.timestamp);
        messages
    }
}

impl ChatRepository for InMemoryChatStore {
    async fn save_chat(&self, chat: &Chat) -> Result<(), RepositoryError> {
        if self.chats.contains_key(&chat.id) {
            return Err(RepositoryError::Conflict(format!("chat {} already exists", chat.id)));
        }
        self.chats.insert(chat.id, chat.clone());
        Ok(())
    }

    async fn get_chat(&self, chat_id: &Uuid) -> Result<Option<Chat>, RepositoryError> {
        Ok(self.chats.get(chat_id).map(|c| c.value().clone()))
    }

    async fn delete_chat(&self, chat_id: &Uuid) -> Result<(), RepositoryError> {
        if self.chats.remove(chat_id).is_none() {
            return Err(RepositoryError::NotFound);
        }
        self.messages.retain(|_, m| m.chat_id != *chat_id);
        Ok(())
    }

    async fn list_chats(&self, character_id: &Uuid) -> Result<Vec<Chat>, RepositoryError> {
        let mut chats: Vec<Chat> = self
            .chats
            .iter()
            .filter(|c| c.character_id == *character_id)
            .map(|c| c.value().clone())
            .collect();
        chats.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(chats)
    }
}

impl ChatMessageRepository for InMemoryChatStore {
    async fn save_message(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
        if !self.chats.contains_key(&message.chat_id) {
            return Err(RepositoryError::Query(format!(
                "chat {} does not exist",
                message.chat_id
            )));
        }
        self.messages.insert(message.id, message.clone());
        Ok(())
    }

    async fn update_message(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
        let mut stored = self
            .messages
            .get_mut(&message.id)
            .ok_or(RepositoryError::NotFound)?;
        stored.text = message.text.clone();
        stored.token_count = message.token_count;
        stored.summarized_by = message.summarized_by;
        Ok(())
    }

    async fn fold_messages(&self, summary: &ChatMessage, folded: &[Uuid]) -> Result<(), RepositoryError> {
        if !self.chats.contains_key(&summary.chat_id) {
            return Err(RepositoryError::Query(format!(
                "chat {} does not exist",
                summary.chat_id
            )));
        }
        if !folded.iter().all(|id| self.messages.contains_key(id)) {
            return Err(RepositoryError::NotFound);
        }
        self.messages.insert(summary.id, summary.clone());
        for id in folded {
            if let Some(mut stored) = self.messages.get_mut(id) {
                stored.summarized_by = Some(summary.id);
            }
        }
        Ok(())
    }

    async fn delete_message(&self, message_id: &Uuid) -> Result<(), RepositoryError> {
        self.messages.remove(message_id);
        Ok(())
    }

    async fn delete_messages(&self, chat_id: &Uuid) -> Result<(), RepositoryError> {
        self.messages.retain(|_, m| m.chat_id != *chat_id);
        Ok(())
    }

    async fn get_messages(&self, chat_id: &Uuid) -> Result<Vec<ChatMessage>, RepositoryError> {
        let mut messages = self.all_messages(chat_id);
        messages.retain(|m| m.summarized_by.is_none());
        Ok(messages)
    }
}
