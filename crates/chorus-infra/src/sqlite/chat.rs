//! SQLite chat and message repositories.
//!
//! Raw queries, private row structs, reads on the reader pool and writes on
//! the single writer connection. Timestamps are stored as fixed-width
//! RFC 3339 strings so `ORDER BY timestamp` is chronological.

use chorus_core::repository::{ChatMessageRepository, ChatRepository};
use chorus_types::chat::{Chat, ChatMessage, MessageRole};
use chorus_types::error::RepositoryError;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

pub struct SqliteChatRepository {
    pool: DatabasePool,
}

impl SqliteChatRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

pub struct SqliteChatMessageRepository {
    pool: DatabasePool,
}

impl SqliteChatMessageRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct ChatRow {
    id: String,
    character_id: String,
    created_at: String,
}

impl ChatRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            character_id: row.try_get("character_id")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_chat(self) -> Result<Chat, RepositoryError> {
        Ok(Chat {
            id: parse_uuid(&self.id, "chat id")?,
            character_id: parse_uuid(&self.character_id, "character_id")?,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

struct ChatMessageRow {
    id: String,
    chat_id: String,
    role: String,
    text: String,
    token_count: i64,
    timestamp: String,
    summarized_by: Option<String>,
}

impl ChatMessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            chat_id: row.try_get("chat_id")?,
            role: row.try_get("role")?,
            text: row.try_get("text")?,
            token_count: row.try_get("token_count")?,
            timestamp: row.try_get("timestamp")?,
            summarized_by: row.try_get("summarized_by")?,
        })
    }

    fn into_message(self) -> Result<ChatMessage, RepositoryError> {
        let role: MessageRole = self
            .role
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        Ok(ChatMessage {
            id: parse_uuid(&self.id, "message id")?,
            chat_id: parse_uuid(&self.chat_id, "chat_id")?,
            role,
            text: self.text,
            token_count: self.token_count as u32,
            timestamp: parse_datetime(&self.timestamp)?,
            summarized_by: self
                .summarized_by
                .as_deref()
                .map(|s| parse_uuid(s, "summarized_by"))
                .transpose()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_uuid(s: &str, what: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(s).map_err(|e| RepositoryError::Query(format!("invalid {what}: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn query_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

// ---------------------------------------------------------------------------
// ChatRepository implementation
// ---------------------------------------------------------------------------

impl ChatRepository for SqliteChatRepository {
    async fn save_chat(&self, chat: &Chat) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO chats (id, character_id, created_at) VALUES (?, ?, ?)")
            .bind(chat.id.to_string())
            .bind(chat.character_id.to_string())
            .bind(format_datetime(&chat.created_at))
            .execute(&self.pool.writer)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db) = &e {
                    if db.is_unique_violation() {
                        return RepositoryError::Conflict(format!("chat {} already exists", chat.id));
                    }
                }
                query_error(e)
            })?;
        Ok(())
    }

    async fn get_chat(&self, chat_id: &Uuid) -> Result<Option<Chat>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM chats WHERE id = ?")
            .bind(chat_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        match row {
            Some(row) => Ok(Some(
                ChatRow::from_row(&row).map_err(query_error)?.into_chat()?,
            )),
            None => Ok(None),
        }
    }

    async fn delete_chat(&self, chat_id: &Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM chats WHERE id = ?")
            .bind(chat_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn list_chats(&self, character_id: &Uuid) -> Result<Vec<Chat>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM chats WHERE character_id = ? ORDER BY created_at DESC")
            .bind(character_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        let mut chats = Vec::with_capacity(rows.len());
        for row in &rows {
            chats.push(ChatRow::from_row(row).map_err(query_error)?.into_chat()?);
        }
        Ok(chats)
    }
}

// ---------------------------------------------------------------------------
// ChatMessageRepository implementation
// ---------------------------------------------------------------------------

impl ChatMessageRepository for SqliteChatMessageRepository {
    async fn save_message(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO chat_messages (id, chat_id, role, text, token_count, timestamp, summarized_by)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(message.id.to_string())
        .bind(message.chat_id.to_string())
        .bind(message.role.to_string())
        .bind(&message.text)
        .bind(message.token_count as i64)
        .bind(format_datetime(&message.timestamp))
        .bind(message.summarized_by.map(|id| id.to_string()))
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;
        Ok(())
    }

    async fn update_message(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE chat_messages SET text = ?, token_count = ?, summarized_by = ? WHERE id = ?",
        )
        .bind(&message.text)
        .bind(message.token_count as i64)
        .bind(message.summarized_by.map(|id| id.to_string()))
        .bind(message.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn fold_messages(&self, summary: &ChatMessage, folded: &[Uuid]) -> Result<(), RepositoryError> {
        // Summary insert and source marks commit together; dropping `tx` on
        // an early return rolls everything back.
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        sqlx::query(
            r#"INSERT INTO chat_messages (id, chat_id, role, text, token_count, timestamp, summarized_by)
               VALUES (?, ?, ?, ?, ?, ?, NULL)"#,
        )
        .bind(summary.id.to_string())
        .bind(summary.chat_id.to_string())
        .bind(summary.role.to_string())
        .bind(&summary.text)
        .bind(summary.token_count as i64)
        .bind(format_datetime(&summary.timestamp))
        .execute(&mut *tx)
        .await
        .map_err(query_error)?;

        for id in folded {
            let result = sqlx::query(
                "UPDATE chat_messages SET summarized_by = ? WHERE id = ? AND chat_id = ?",
            )
            .bind(summary.id.to_string())
            .bind(id.to_string())
            .bind(summary.chat_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;

            if result.rows_affected() == 0 {
                return Err(RepositoryError::NotFound);
            }
        }

        tx.commit().await.map_err(query_error)?;
        Ok(())
    }

    async fn delete_message(&self, message_id: &Uuid) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM chat_messages WHERE id = ?")
            .bind(message_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;
        Ok(())
    }

    async fn delete_messages(&self, chat_id: &Uuid) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM chat_messages WHERE chat_id = ?")
            .bind(chat_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;
        Ok(())
    }

    async fn get_messages(&self, chat_id: &Uuid) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM chat_messages WHERE chat_id = ? AND summarized_by IS NULL ORDER BY timestamp ASC",
        )
        .bind(chat_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            messages.push(ChatMessageRow::from_row(row).map_err(query_error)?.into_message()?);
        }
        Ok(messages)
    }
}
