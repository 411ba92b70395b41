//! Diagnostic commands available in analysis mode.

use std::sync::Arc;

use chorus_types::chat::MessageRole;
use chorus_types::error::SessionError;
use chorus_types::protocol::ServerMessage;
use tracing::info;

use super::context::SessionContext;
use super::state::GenerationTicket;
use crate::repository::ChatMessageRepository;

pub const ANALYSIS_HELP: &str = "Available commands: help, list, repeat, regenerate, rollback, reset. \
     Say 'go online' or 'go offline' to leave analysis mode.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisCommand {
    Help,
    List,
    Reset,
    Repeat,
    Regenerate,
    Rollback,
}

impl AnalysisCommand {
    /// Parse the first word of an utterance, ignoring case and trailing
    /// punctuation.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text
            .split_whitespace()
            .next()?
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        match word.as_str() {
            "help" => Some(Self::Help),
            "list" => Some(Self::List),
            "reset" => Some(Self::Reset),
            "repeat" => Some(Self::Repeat),
            "regenerate" => Some(Self::Regenerate),
            "rollback" => Some(Self::Rollback),
            _ => None,
        }
    }
}

impl<R: ChatMessageRepository + 'static> SessionContext<R> {
    pub(crate) async fn run_analysis_command(
        self: &Arc<Self>,
        text: &str,
        ticket: &GenerationTicket,
    ) -> Result<(), SessionError> {
        let Some(command) = AnalysisCommand::parse(text) else {
            return self
                .notify(ServerMessage::reply(format!("Unknown command: {}", text.trim())))
                .await;
        };
        info!(chat_id = %self.chat_id, ?command, "analysis command");

        match command {
            AnalysisCommand::Help => self.notify(ServerMessage::reply(ANALYSIS_HELP)).await,
            AnalysisCommand::List => {
                let summary = {
                    let data = self.data.read().await;
                    format!(
                        "{} messages, {} tokens in history.",
                        data.messages.len(),
                        data.total_message_tokens()
                    )
                };
                self.notify(ServerMessage::reply(summary)).await
            }
            AnalysisCommand::Reset => {
                self.repo.delete_messages(&self.chat_id).await?;
                self.data.write().await.messages.clear();
                self.state.set_pending_user_message(None);
                self.notify(ServerMessage::reply("History cleared.")).await
            }
            AnalysisCommand::Repeat => {
                let last = self
                    .data
                    .read()
                    .await
                    .last_message(MessageRole::Assistant)
                    .map(|m| m.text.clone());
                match last {
                    Some(text) => {
                        self.notify(ServerMessage::reply(text.as_str())).await?;
                        self.deliver_speech(&text, false, ticket.token()).await
                    }
                    None => self.notify(ServerMessage::reply("Nothing to repeat.")).await,
                }
            }
            AnalysisCommand::Regenerate => {
                let removed = self.pop_trailing(&[MessageRole::Assistant]).await?;
                if removed == 0 && self.data.read().await.messages.is_empty() {
                    return self
                        .notify(ServerMessage::reply("Nothing to regenerate."))
                        .await;
                }
                self.generate_and_deliver(ticket).await
            }
            AnalysisCommand::Rollback => {
                let removed = self
                    .pop_trailing(&[MessageRole::Assistant, MessageRole::User])
                    .await?;
                let reply = if removed == 0 {
                    "Nothing to roll back."
                } else {
                    "Rolled back the last exchange."
                };
                self.state.set_pending_user_message(None);
                self.notify(ServerMessage::reply(reply)).await
            }
        }
    }

    /// Remove trailing messages whose roles match `roles` in order, newest
    /// first, stopping at the first mismatch. Returns how many were removed.
    async fn pop_trailing(&self, roles: &[MessageRole]) -> Result<usize, SessionError> {
        let mut data = self.data.write().await;
        let mut removed = 0;
        for role in roles {
            match data.messages.last() {
                Some(last) if last.role == *role => {
                    self.repo.delete_message(&last.id).await?;
                    data.messages.pop();
                    removed += 1;
                }
                _ => break,
            }
        }
        Ok(removed)
    }
}
