//! Memory summarization under token pressure.
//!
//! Once the live history reaches the text generator's trigger threshold, the
//! oldest messages that fit the summarizer's digest budget are folded into a
//! single system message. The folded messages stay in storage with
//! `summarized_by` pointing at the summary, so they drop out of the live
//! history on resume.

use chorus_types::chat::{ChatMessage, MessageRole};
use chorus_types::error::SummarizationError;
use chrono::TimeDelta;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::chat::data::SessionData;
use crate::repository::ChatMessageRepository;
use crate::service::summarization::BoxSummarization;
use crate::service::text_gen::BoxTextGen;

/// Runs at most one summarization cycle per session at a time.
pub struct MemorySummarizer {
    running: Semaphore,
}

impl Default for MemorySummarizer {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySummarizer {
    pub fn new() -> Self {
        Self {
            running: Semaphore::new(1),
        }
    }

    /// Summarize if the live history is over the trigger threshold.
    ///
    /// Returns `Ok(true)` when the history was rewritten. A concurrent call
    /// while a cycle is running returns `Ok(false)` immediately.
    #[tracing::instrument(name = "summarize", skip_all)]
    pub async fn summarize_if_needed<R: ChatMessageRepository>(
        &self,
        data: &SessionData,
        text_gen: &BoxTextGen,
        summarizer: &BoxSummarization,
        repo: &R,
        cancel: &CancellationToken,
    ) -> Result<bool, SummarizationError> {
        let Ok(_permit) = self.running.try_acquire() else {
            debug!("summarization already running, skipping");
            return Ok(false);
        };

        let trigger = text_gen.summarization_trigger_tokens();
        if data.read().await.total_message_tokens() < trigger {
            return Ok(false);
        }

        let mut data = data.write().await;
        let total = data.total_message_tokens();
        if total < trigger {
            return Ok(false);
        }

        let digest_tokens = summarizer.digest_tokens();
        let mut eligible = 0;
        let mut digest_used = 0u32;
        for message in &data.messages {
            if digest_used + message.token_count > digest_tokens {
                break;
            }
            digest_used += message.token_count;
            eligible += 1;
        }
        if eligible == 0 {
            error!(
                digest_tokens,
                first_message_tokens = data.messages.first().map(|m| m.token_count),
                "no message fits the summarization digest budget"
            );
            return Err(SummarizationError::NoEligibleMessages { digest_tokens });
        }

        let folded: Vec<ChatMessage> = data.messages[..eligible].to_vec();
        let raw = summarizer.summarize(&data, &folded, cancel).await?;
        let text = strip_unfinished_sentence(&raw);
        if text.is_empty() {
            warn!("summarizer returned no text, history left unchanged");
            return Ok(false);
        }

        let Some(last) = folded.last() else {
            return Ok(false);
        };
        let mut summary = ChatMessage::new(
            data.chat.id,
            MessageRole::System,
            text,
            text_gen.token_count(text),
        );
        summary.timestamp = last.timestamp + TimeDelta::milliseconds(1);

        let folded_ids: Vec<_> = folded.iter().map(|m| m.id).collect();
        repo.fold_messages(&summary, &folded_ids).await?;

        info!(
            chat_id = %data.chat.id,
            messages = eligible,
            tokens_before = total,
            summary_tokens = summary.token_count,
            "history summarized"
        );
        data.messages.drain(..eligible);
        data.messages.insert(0, summary);
        Ok(true)
    }
}

/// Cut `text` after its last sentence terminator. Text without one is kept.
pub fn strip_unfinished_sentence(text: &str) -> &str {
    let text = text.trim();
    match text.rfind(['.', '!', '?', '…']) {
        Some(index) => {
            let end = index + text[index..].chars().next().map_or(1, char::len_utf8);
            &text[..end]
        }
        None => text,
    }
}
