//! Bridge from speech recognition callbacks to the session.
//!
//! Recognizers call the observer synchronously from their own threads. The
//! bridge only forwards events into a channel; a relay task owned by the
//! session drains it in order, notifies the client, and submits finished
//! utterances like typed text.

use std::sync::Arc;

use chorus_types::error::SessionError;
use chorus_types::protocol::ServerMessage;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::context::SessionContext;
use crate::repository::ChatMessageRepository;
use crate::service::speech_to_text::SpeechRecognitionObserver;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RecognitionEvent {
    Started,
    Partial(String),
    Finished(Option<String>),
}

pub(crate) struct RecognitionBridge {
    events: mpsc::UnboundedSender<RecognitionEvent>,
}

impl RecognitionBridge {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RecognitionEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        (Self { events }, receiver)
    }

    fn forward(&self, event: RecognitionEvent) {
        if self.events.send(event).is_err() {
            debug!("recognition event after session shutdown");
        }
    }
}

impl SpeechRecognitionObserver for RecognitionBridge {
    fn speech_started(&self) {
        self.forward(RecognitionEvent::Started);
    }

    fn speech_partial(&self, text: &str) {
        self.forward(RecognitionEvent::Partial(text.to_string()));
    }

    fn speech_finished(&self, text: Option<&str>) {
        self.forward(RecognitionEvent::Finished(text.map(str::to_string)));
    }
}

/// Drain recognition events until the session shuts down.
pub(crate) fn spawn_relay<R: ChatMessageRepository + 'static>(
    ctx: Arc<SessionContext<R>>,
    mut events: mpsc::UnboundedReceiver<RecognitionEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                biased;
                _ = ctx.shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            if let Err(e) = relay(&ctx, event).await {
                debug!(error = %e, "could not relay recognition event");
            }
        }
    })
}

async fn relay<R: ChatMessageRepository + 'static>(
    ctx: &Arc<SessionContext<R>>,
    event: RecognitionEvent,
) -> Result<(), SessionError> {
    match event {
        RecognitionEvent::Started => ctx.notify(ServerMessage::SpeechRecognitionStart).await,
        RecognitionEvent::Partial(text) => {
            // Speaking over a playing clip is a barge-in.
            ctx.state.mark_barge_in();
            ctx.notify(ServerMessage::SpeechRecognitionPartial { text })
                .await
        }
        RecognitionEvent::Finished(text) => {
            ctx.notify(ServerMessage::SpeechRecognitionEnd { text: text.clone() })
                .await?;
            if let Some(text) = text {
                ctx.submit(&text, None, None).await;
            }
            Ok(())
        }
    }
}
