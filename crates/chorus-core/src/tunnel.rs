//! Duplex message transport between a client and its session.
//!
//! The transport framing (WebSocket, in-process channel) lives outside the
//! core; sessions only see typed protocol messages.

use chorus_types::error::TunnelError;
use chorus_types::protocol::{ClientMessage, ServerMessage};
use futures_util::future::BoxFuture;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

/// Trait for client transports.
pub trait Tunnel: Send + Sync {
    fn send(
        &self,
        message: ServerMessage,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<(), TunnelError>> + Send;

    /// Next client message. `Ok(None)` when the client disconnected.
    fn receive(
        &self,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<Option<ClientMessage>, TunnelError>> + Send;
}

/// Object-safe version of [`Tunnel`] with boxed futures.
pub trait TunnelDyn: Send + Sync {
    fn send_boxed<'a>(
        &'a self,
        message: ServerMessage,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<(), TunnelError>>;

    fn receive_boxed<'a>(
        &'a self,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Option<ClientMessage>, TunnelError>>;
}

impl<T: Tunnel> TunnelDyn for T {
    fn send_boxed<'a>(
        &'a self,
        message: ServerMessage,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<(), TunnelError>> {
        Box::pin(self.send(message, cancel))
    }

    fn receive_boxed<'a>(
        &'a self,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Option<ClientMessage>, TunnelError>> {
        Box::pin(self.receive(cancel))
    }
}

/// Type-erased transport.
pub struct BoxTunnel {
    inner: Box<dyn TunnelDyn>,
}

impl BoxTunnel {
    pub fn new<T: Tunnel + 'static>(tunnel: T) -> Self {
        Self {
            inner: Box::new(tunnel),
        }
    }

    pub async fn send(
        &self,
        message: ServerMessage,
        cancel: &CancellationToken,
    ) -> Result<(), TunnelError> {
        self.inner.send_boxed(message, cancel).await
    }

    pub async fn receive(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<ClientMessage>, TunnelError> {
        self.inner.receive_boxed(cancel).await
    }
}

/// In-process tunnel backed by channels.
///
/// [`ChannelTunnel::pair`] returns the session side and a [`ChannelClient`]
/// that plays the client.
pub struct ChannelTunnel {
    outgoing: mpsc::UnboundedSender<ServerMessage>,
    incoming: Mutex<mpsc::UnboundedReceiver<ClientMessage>>,
}

/// Client end of a [`ChannelTunnel`].
pub struct ChannelClient {
    pub to_session: mpsc::UnboundedSender<ClientMessage>,
    pub from_session: mpsc::UnboundedReceiver<ServerMessage>,
}

impl ChannelTunnel {
    pub fn pair() -> (Self, ChannelClient) {
        let (to_client, from_session) = mpsc::unbounded_channel();
        let (to_session, from_client) = mpsc::unbounded_channel();
        (
            Self {
                outgoing: to_client,
                incoming: Mutex::new(from_client),
            },
            ChannelClient {
                to_session,
                from_session,
            },
        )
    }
}

impl Tunnel for ChannelTunnel {
    async fn send(
        &self,
        message: ServerMessage,
        _cancel: &CancellationToken,
    ) -> Result<(), TunnelError> {
        self.outgoing.send(message).map_err(|_| TunnelError::Closed)
    }

    async fn receive(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<ClientMessage>, TunnelError> {
        let mut incoming = self.incoming.lock().await;
        tokio::select! {
            _ = cancel.cancelled() => Ok(None),
            message = incoming.recv() => Ok(message),
        }
    }
}
