//! Shared per-session state handed to work units.

use std::sync::Arc;

use chorus_types::config::ChatConfig;
use chorus_types::error::SessionError;
use chorus_types::protocol::ServerMessage;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use super::data::SessionData;
use super::dispatcher::SessionDispatcher;
use super::state::{ChatMode, ChatSessionState};
use crate::memory::MemorySummarizer;
use crate::service::SessionServices;
use crate::speech::SpeechCoordinator;
use crate::tunnel::BoxTunnel;

pub(crate) struct SessionContext<R> {
    pub chat_id: Uuid,
    pub data: SessionData,
    pub state: ChatSessionState,
    pub services: SessionServices,
    pub speech: SpeechCoordinator,
    pub summarizer: MemorySummarizer,
    pub repo: Arc<R>,
    pub tunnel: Arc<BoxTunnel>,
    pub config: ChatConfig,
    pub dispatcher: SessionDispatcher,
    pub shutdown: CancellationToken,
    /// Serializes abort-then-enqueue so concurrent submitters cannot
    /// interleave generation registration.
    pub submit_lock: tokio::sync::Mutex<()>,
}

impl<R> SessionContext<R> {
    pub async fn notify(&self, message: ServerMessage) -> Result<(), SessionError> {
        self.tunnel.send(message, &self.shutdown).await?;
        Ok(())
    }

    pub async fn stop_recognition(&self) -> Result<(), SessionError> {
        if let Some(stt) = &self.services.speech_to_text {
            stt.stop_transcription().await?;
        }
        Ok(())
    }

    pub async fn start_recognition(&self) -> Result<(), SessionError> {
        if let Some(stt) = &self.services.speech_to_text {
            stt.start_transcription().await?;
        }
        Ok(())
    }

    /// Restart recognition stopped for playback, unless the chat is paused.
    pub async fn resume_recognition_after_playback(&self) -> Result<(), SessionError> {
        if !self.state.stt_paused_for_playback() {
            return Ok(());
        }
        self.state.set_stt_paused_for_playback(false);
        self.restart_recognition_unless_paused().await
    }

    pub async fn restart_recognition_unless_paused(&self) -> Result<(), SessionError> {
        if self.state.mode() == ChatMode::Paused {
            debug!("chat paused, leaving recognition stopped");
            return Ok(());
        }
        self.start_recognition().await
    }
}
