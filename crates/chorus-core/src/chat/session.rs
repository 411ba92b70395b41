//! Chat session lifecycle: start, message loop, disposal.
//!
//! A session owns its resolved backends, its speech coordinator, and a
//! dispatcher. The transport layer builds the session once the client has
//! picked a chat, then drives [`ChatSession::run`] until the client stops or
//! disconnects, and finally calls [`ChatSession::dispose`].

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chorus_types::chat::MessageRole;
use chorus_types::config::ChatConfig;
use chorus_types::error::SessionError;
use chorus_types::protocol::{ClientMessage, ServerMessage};
use chorus_types::session::ChatSessionData;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::context::SessionContext;
use super::data::SessionData;
use super::dispatcher::SessionDispatcher;
use super::observer::{RecognitionBridge, spawn_relay};
use super::state::{ChatMode, ChatSessionState};
use crate::memory::MemorySummarizer;
use crate::repository::ChatMessageRepository;
use crate::service::SessionServices;
use crate::speech::{SpeechCoordinator, SpeechOutput};
use crate::tunnel::BoxTunnel;

/// Everything needed to start a session.
pub struct ChatSessionParams<R> {
    pub data: ChatSessionData,
    pub services: SessionServices,
    /// Server-wide speech output; `None` disables speech for the session.
    pub speech_output: Option<SpeechOutput>,
    /// Audio content type the client accepts.
    pub content_type: String,
    pub repo: Arc<R>,
    pub tunnel: Arc<BoxTunnel>,
    pub config: ChatConfig,
}

pub struct ChatSession<R: ChatMessageRepository + 'static> {
    ctx: Arc<SessionContext<R>>,
    relay: Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
}

impl<R: ChatMessageRepository + 'static> ChatSession<R> {
    /// Wire the session, announce it to the client with `ready`, and start
    /// speech recognition. On failure everything created so far is disposed.
    #[tracing::instrument(name = "chat_session_start", skip_all, fields(chat_id = %params.data.chat.id))]
    pub async fn start(params: ChatSessionParams<R>) -> Result<Self, SessionError> {
        let ChatSessionParams {
            data,
            services,
            speech_output,
            content_type,
            repo,
            tunnel,
            config,
        } = params;

        let chat_id = data.chat.id;
        let speech = match &speech_output {
            Some(output) => SpeechCoordinator::for_session(
                output,
                services.text_to_speech.clone(),
                data.character.voice.clone(),
                data.character.culture.clone(),
                content_type,
            ),
            None => SpeechCoordinator::disabled(),
        };

        let state = ChatSessionState::new();
        // A resumed chat may end with a message that never got its reply.
        if let Some(last) = data.messages.last().filter(|m| m.role == MessageRole::User) {
            state.set_pending_user_message(Some(last.id));
        }

        let shutdown = CancellationToken::new();
        let dispatcher = SessionDispatcher::spawn(shutdown.clone(), Arc::clone(&tunnel));
        let ctx = Arc::new(SessionContext {
            chat_id,
            data: SessionData::new(data),
            state,
            services,
            speech,
            summarizer: MemorySummarizer::new(),
            repo,
            tunnel,
            config,
            dispatcher,
            shutdown,
            submit_lock: tokio::sync::Mutex::new(()),
        });

        let relay = ctx.services.speech_to_text.as_ref().map(|stt| {
            let (bridge, events) = RecognitionBridge::new();
            stt.subscribe(Arc::new(bridge));
            spawn_relay(Arc::clone(&ctx), events)
        });

        let session = Self {
            ctx,
            relay: Mutex::new(relay),
            disposed: AtomicBool::new(false),
        };
        if let Err(e) = session.announce().await {
            session.dispose().await;
            return Err(e);
        }
        info!("chat session started");
        Ok(session)
    }

    async fn announce(&self) -> Result<(), SessionError> {
        let thinking_speech_urls = self.thinking_speech_urls().await;
        self.ctx
            .notify(ServerMessage::Ready {
                chat_id: self.ctx.chat_id,
                thinking_speech_urls,
                services: self.ctx.services.links().clone(),
            })
            .await?;
        self.ctx.start_recognition().await
    }

    /// Reusable filler clips for the client to play while waiting.
    async fn thinking_speech_urls(&self) -> Vec<String> {
        let Some(tts) = &self.ctx.services.text_to_speech else {
            return Vec::new();
        };
        let mut urls = Vec::new();
        for line in tts.thinking_speech_lines() {
            match self
                .ctx
                .speech
                .create_speech(&line, true, &self.ctx.shutdown)
                .await
            {
                Ok(Some(url)) => urls.push(url),
                Ok(None) => break,
                Err(e) => warn!(error = %e, %line, "could not prepare thinking speech"),
            }
        }
        urls
    }

    pub fn chat_id(&self) -> Uuid {
        self.ctx.chat_id
    }

    pub fn mode(&self) -> ChatMode {
        self.ctx.state.mode()
    }

    /// Handle one client message. Breaks when the client asked to stop.
    pub async fn handle(&self, message: ClientMessage) -> ControlFlow<()> {
        match message {
            ClientMessage::Send {
                text,
                context,
                actions,
            } => self.ctx.submit(&text, context, actions).await,
            ClientMessage::SpeechPlaybackStart { duration } => {
                match Duration::try_from_secs_f64(duration) {
                    Ok(duration) => self.ctx.state.start_playback(duration),
                    Err(_) => warn!(duration, "ignoring invalid playback duration"),
                }
            }
            ClientMessage::SpeechPlaybackComplete => {
                if self.ctx.state.complete_playback() {
                    if let Err(e) = self.ctx.restart_recognition_unless_paused().await {
                        warn!(error = %e, "could not resume speech recognition");
                    }
                }
            }
            ClientMessage::StopChat => return ControlFlow::Break(()),
            message => {
                debug!(?message, "bootstrap message on a running session");
                if let Err(e) = self
                    .ctx
                    .notify(ServerMessage::error("A chat is already running", None))
                    .await
                {
                    debug!(error = %e, "could not report protocol error");
                }
            }
        }
        ControlFlow::Continue(())
    }

    /// Receive and handle client messages until `stopChat`, disconnect, or
    /// disposal.
    pub async fn run(&self) -> Result<(), SessionError> {
        loop {
            let Some(message) = self.ctx.tunnel.receive(&self.ctx.shutdown).await? else {
                debug!(chat_id = %self.ctx.chat_id, "tunnel closed");
                return Ok(());
            };
            if self.handle(message).await.is_break() {
                info!(chat_id = %self.ctx.chat_id, "client stopped the chat");
                return Ok(());
            }
        }
    }

    /// Stop all work and release every backend. Safe to call twice.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.ctx.dispatcher.shutdown().await;

        let relay = self
            .relay
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(relay) = relay {
            if let Err(e) = relay.await {
                warn!(error = %e, "recognition relay task failed");
            }
        }

        if let Some(stt) = &self.ctx.services.speech_to_text {
            stt.unsubscribe();
            if let Err(e) = stt.stop_transcription().await {
                debug!(error = %e, "could not stop speech recognition");
            }
        }
        let released = self.ctx.speech.release();
        if released > 0 {
            debug!(released, "dropped unfetched speech entries");
        }
        self.ctx.services.dispose().await;
        info!(chat_id = %self.ctx.chat_id, "chat session disposed");
    }
}
