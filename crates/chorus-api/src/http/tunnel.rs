//! WebSocket transport for chat sessions.
//!
//! Each frame is one JSON protocol message. Malformed frames are answered
//! with an `error` message and skipped, so a bad frame never ends a session.

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use chorus_core::tunnel::Tunnel;
use chorus_types::error::TunnelError;
use chorus_types::protocol::{ClientMessage, ServerMessage};

pub struct WsTunnel {
    sender: Mutex<SplitSink<WebSocket, Message>>,
    receiver: Mutex<SplitStream<WebSocket>>,
}

impl WsTunnel {
    pub fn new(socket: WebSocket) -> Self {
        let (sender, receiver) = socket.split();
        Self {
            sender: Mutex::new(sender),
            receiver: Mutex::new(receiver),
        }
    }

    async fn send_frame(&self, message: &ServerMessage) -> Result<(), TunnelError> {
        let json = serde_json::to_string(message)
            .map_err(|e| TunnelError::Transport(format!("failed to encode message: {e}")))?;
        self.sender
            .lock()
            .await
            .send(Message::Text(json.into()))
            .await
            .map_err(|_| TunnelError::Closed)
    }
}

impl Tunnel for WsTunnel {
    async fn send(
        &self,
        message: ServerMessage,
        cancel: &CancellationToken,
    ) -> Result<(), TunnelError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TunnelError::Closed),
            result = self.send_frame(&message) => result,
        }
    }

    async fn receive(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<ClientMessage>, TunnelError> {
        let mut receiver = self.receiver.lock().await;
        loop {
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(None),
                frame = receiver.next() => frame,
            };
            match frame {
                Some(Ok(Message::Text(text))) => match parse_client_message(&text) {
                    Ok(message) => return Ok(Some(message)),
                    Err(TunnelError::Malformed(details)) => {
                        tracing::warn!(raw = %text.as_str(), error = %details, "ignoring malformed client message");
                        self.send_frame(&ServerMessage::error("Malformed message", Some(details)))
                            .await?;
                    }
                    Err(e) => return Err(e),
                },
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Err(err)) => {
                    tracing::debug!("WebSocket receive error: {err}");
                    return Err(TunnelError::Transport(err.to_string()));
                }
                // Binary, ping, and pong frames carry no protocol messages.
                Some(Ok(_)) => {}
            }
        }
    }
}

pub fn parse_client_message(text: &str) -> Result<ClientMessage, TunnelError> {
    serde_json::from_str(text).map_err(|e| TunnelError::Malformed(e.to_string()))
}
