//! The reply pipeline: from a user utterance to a persisted, spoken reply.
//!
//! Submission happens on the caller's task: the active generation is aborted
//! and awaited, a new generation ticket is taken, and the turn is queued on
//! the dispatcher. Everything after that runs inside the work unit, so a
//! stale generation can never write after a newer one starts.

use std::sync::Arc;

use chorus_types::chat::{ChatMessage, MessageRole};
use chorus_types::error::{ServiceError, SessionError, SummarizationError};
use chorus_types::protocol::ServerMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::context::SessionContext;
use super::machine::{Decision, RecognitionChange, decide, recognition_change};
use super::sanitize::{correct_action, sanitize_reply};
use super::state::{ChatMode, GenerationTicket, truncate_for_interruption};
use crate::memory::rank_memories;
use crate::repository::ChatMessageRepository;
use crate::service::backend::cancellable;

/// Spoken while the chat is paused instead of generating.
pub const PAUSED_FILLER: &str = "I'm offline. Say 'go online' to resume.";

/// Separator used when a follow-up utterance is appended to a user message
/// that has not been answered yet.
const PENDING_SEPARATOR: &str = "; ";

pub(crate) struct UserTurn {
    pub text: String,
    pub context: Option<String>,
    pub actions: Option<Vec<String>>,
    /// Heard fraction of the clip playing when the user spoke.
    pub interruption: Option<f64>,
}

fn mode_acknowledgement(mode: ChatMode) -> &'static str {
    match mode {
        ChatMode::Live => "I'm back online.",
        ChatMode::Paused => "Going offline.",
        ChatMode::Analysis => "Analysis mode. Say 'help' for the list of commands.",
    }
}

impl<R: ChatMessageRepository + 'static> SessionContext<R> {
    /// Queue a user utterance, superseding any generation in flight.
    pub async fn submit(
        self: &Arc<Self>,
        text: &str,
        context: Option<String>,
        actions: Option<Vec<String>>,
    ) {
        let text = text.trim();
        if text.is_empty() {
            debug!("ignoring empty utterance");
            return;
        }
        let _serial = self.submit_lock.lock().await;
        let interruption = self.state.take_interruption_ratio();
        self.state.abort_generation_and_wait().await;
        let ticket = self.state.begin_generation(&self.shutdown);

        let turn = UserTurn {
            text: text.to_string(),
            context,
            actions,
            interruption,
        };
        let ctx = Arc::clone(self);
        self.dispatcher
            .enqueue(async move { ctx.handle_turn(turn, ticket).await });
    }

    async fn handle_turn(
        self: Arc<Self>,
        turn: UserTurn,
        ticket: GenerationTicket,
    ) -> Result<(), SessionError> {
        // Mode is read when the unit runs so queued switches take effect.
        match decide(self.state.mode(), &turn.text) {
            Decision::Reply => {
                self.record_user_turn(&turn).await?;
                self.generate_and_deliver(&ticket).await
            }
            Decision::Switch(mode) => self.switch_mode(mode).await,
            Decision::PausedFiller => {
                self.notify(ServerMessage::reply(PAUSED_FILLER)).await?;
                self.deliver_speech(PAUSED_FILLER, true, &self.shutdown).await
            }
            Decision::AnalysisCommand => self.run_analysis_command(&turn.text, &ticket).await,
        }
    }

    async fn switch_mode(&self, mode: ChatMode) -> Result<(), SessionError> {
        let previous = self.state.set_mode(mode);
        info!(chat_id = %self.chat_id, ?previous, ?mode, "chat mode changed");
        match recognition_change(previous, mode) {
            RecognitionChange::Stop => self.stop_recognition().await?,
            RecognitionChange::Start => self.start_recognition().await?,
            RecognitionChange::Keep => {}
        }
        self.notify(ServerMessage::reply(mode_acknowledgement(mode)))
            .await
    }

    /// Apply interruption truncation, then save or extend the user message.
    ///
    /// Runs even when the turn's generation was already superseded: the
    /// utterance is part of the conversation either way.
    async fn record_user_turn(&self, turn: &UserTurn) -> Result<(), SessionError> {
        let text_gen = &self.services.text_gen;
        let mut data = self.data.write().await;
        let mut text = turn.text.clone();

        if let Some(ratio) = turn.interruption {
            let truncated = data.last_message_mut(MessageRole::Assistant).and_then(|last| {
                let cut = truncate_for_interruption(&last.text, ratio)?;
                last.token_count = text_gen.token_count(&cut);
                last.text = cut;
                Some(last.clone())
            });
            if let Some(truncated) = truncated {
                debug!(ratio, "reply interrupted, history truncated");
                self.repo.update_message(&truncated).await?;
                text = format!("{}{}", self.config.interruption_marker, text);
            }
        }

        let mut extended = None;
        if let Some(id) = self.state.pending_user_message() {
            if let Some(message) = data.messages.iter_mut().find(|m| m.id == id) {
                message.text = format!("{}{PENDING_SEPARATOR}{text}", message.text);
                message.token_count = text_gen.token_count(&message.text);
                extended = Some(message.clone());
            }
        }
        match extended {
            Some(message) => self.repo.update_message(&message).await?,
            None => {
                let message = ChatMessage::new(
                    self.chat_id,
                    MessageRole::User,
                    text.as_str(),
                    text_gen.token_count(&text),
                );
                self.repo.save_message(&message).await?;
                self.state.set_pending_user_message(Some(message.id));
                data.messages.push(message);
            }
        }

        if let Some(context) = &turn.context {
            data.context = Some(context.clone());
        }
        if let Some(actions) = &turn.actions {
            data.actions = actions.clone();
        }

        let data = &mut *data;
        rank_memories(&mut data.memories, &data.messages);
        Ok(())
    }

    /// Generate a reply for the current history and deliver it.
    pub(crate) async fn generate_and_deliver(
        self: &Arc<Self>,
        ticket: &GenerationTicket,
    ) -> Result<(), SessionError> {
        let cancel = ticket.token();
        let reply = match self.generate_reply(cancel).await {
            Ok(reply) => reply,
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                if let Err(resume_err) = self.resume_recognition_after_playback().await {
                    warn!(error = %resume_err, "could not resume speech recognition");
                }
                return Err(e);
            }
        };
        // A newer turn may have aborted us after generation finished.
        if cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }

        let text_gen = &self.services.text_gen;
        let message = ChatMessage::new(
            self.chat_id,
            MessageRole::Assistant,
            reply.as_str(),
            text_gen.token_count(&reply),
        );
        self.repo.save_message(&message).await?;
        self.data.write().await.messages.push(message);
        self.state.set_pending_user_message(None);

        self.spawn_summarization();

        self.notify(ServerMessage::reply(reply.as_str())).await?;
        let (speech, action) = tokio::join!(
            self.deliver_speech(&reply, false, cancel),
            self.deliver_action(cancel),
        );
        speech?;
        action
    }

    async fn generate_reply(&self, cancel: &CancellationToken) -> Result<String, SessionError> {
        let attempts = self.config.max_reply_attempts.max(1);
        for attempt in 1..=attempts {
            let snapshot = self.data.snapshot().await;
            let raw = cancellable(
                cancel,
                self.services.text_gen.generate_reply(&snapshot, cancel),
            )
            .await?;
            let reply = sanitize_reply(&raw, &snapshot.character.name);
            if !reply.is_empty() {
                return Ok(reply);
            }
            warn!(attempt, attempts, "text generation returned an empty reply");
        }
        Err(SessionError::EmptyReply { attempts })
    }

    /// Synthesize `text` and send the speech URL, pausing recognition during
    /// playback when configured.
    pub(crate) async fn deliver_speech(
        &self,
        text: &str,
        reusable: bool,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        let Some(url) = self.speech.create_speech(text, reusable, cancel).await? else {
            return Ok(());
        };
        if self.config.pause_speech_recognition_during_playback
            && self.services.speech_to_text.is_some()
        {
            self.stop_recognition().await?;
            self.state.set_stt_paused_for_playback(true);
        }
        self.notify(ServerMessage::Speech { url }).await
    }

    async fn deliver_action(&self, cancel: &CancellationToken) -> Result<(), SessionError> {
        let Some(inference) = &self.services.action_inference else {
            return Ok(());
        };
        let snapshot = self.data.snapshot().await;
        if snapshot.actions.is_empty() {
            return Ok(());
        }
        let inferred = cancellable(cancel, inference.select_action(&snapshot, cancel)).await?;
        let value = correct_action(&inferred, &snapshot.actions);
        if value != inferred.trim() {
            debug!(%inferred, %value, "corrected inferred action");
        }
        self.notify(ServerMessage::Action { value }).await
    }

    /// Run a summarization cycle in the background. Never blocks the reply.
    fn spawn_summarization(self: &Arc<Self>) {
        let Some(summarizer) = self.services.summarization.clone() else {
            return;
        };
        let ctx = Arc::clone(self);
        tokio::spawn(async move {
            let result = ctx
                .summarizer
                .summarize_if_needed(
                    &ctx.data,
                    &ctx.services.text_gen,
                    &summarizer,
                    &*ctx.repo,
                    &ctx.shutdown,
                )
                .await;
            match result {
                Ok(_) | Err(SummarizationError::Service(ServiceError::Cancelled)) => {}
                Err(e) => error!(chat_id = %ctx.chat_id, error = %e, "summarization failed"),
            }
        });
    }
}
