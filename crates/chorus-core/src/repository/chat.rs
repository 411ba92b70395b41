//! Chat and chat message repository traits.
//!
//! Uses native async fn in traits (Rust 2024 edition, no async_trait macro).

use chorus_types::chat::{Chat, ChatMessage};
use chorus_types::error::RepositoryError;
use uuid::Uuid;

/// Repository trait for chat persistence.
pub trait ChatRepository: Send + Sync {
    /// Persist a new chat.
    fn save_chat(
        &self,
        chat: &Chat,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_chat(
        &self,
        chat_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Chat>, RepositoryError>> + Send;

    /// Delete a chat and all of its messages.
    fn delete_chat(
        &self,
        chat_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Chats with a character, newest first.
    fn list_chats(
        &self,
        character_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Chat>, RepositoryError>> + Send;
}

/// Repository trait for chat message persistence.
pub trait ChatMessageRepository: Send + Sync {
    fn save_message(
        &self,
        message: &ChatMessage,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Overwrite text, token count, and `summarized_by` of an existing message.
    fn update_message(
        &self,
        message: &ChatMessage,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Save `summary` and point every message in `folded` at it, all or
    /// nothing. A missing folded message fails with `NotFound` and leaves
    /// storage unchanged.
    fn fold_messages(
        &self,
        summary: &ChatMessage,
        folded: &[Uuid],
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn delete_message(
        &self,
        message_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete every message of a chat, summarized or not.
    fn delete_messages(
        &self,
        chat_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Live history of a chat ordered by timestamp ASC.
    ///
    /// Messages folded into a summary (`summarized_by` set) are excluded.
    fn get_messages(
        &self,
        chat_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send;
}
