//! Single-consumer work queue for one session.
//!
//! Units of work run strictly in submission order and never concurrently.
//! Failures are reported to the client as protocol errors; the session keeps
//! running. Cancellation means the unit was superseded and is only logged.

use std::error::Error as _;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use chorus_types::error::SessionError;
use chorus_types::protocol::ServerMessage;
use futures_util::future::BoxFuture;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::tunnel::BoxTunnel;

type WorkItem = BoxFuture<'static, Result<(), SessionError>>;

pub struct SessionDispatcher {
    sender: mpsc::UnboundedSender<WorkItem>,
    shutdown: CancellationToken,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl SessionDispatcher {
    /// Start the consumer task. It stops when `shutdown` is cancelled.
    pub fn spawn(shutdown: CancellationToken, tunnel: Arc<BoxTunnel>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let consumer = tokio::spawn(consume(receiver, shutdown.clone(), tunnel));
        Self {
            sender,
            shutdown,
            consumer: Mutex::new(Some(consumer)),
        }
    }

    /// Append a unit of work. Does nothing once shutdown has started.
    pub fn enqueue<F>(&self, work: F)
    where
        F: Future<Output = Result<(), SessionError>> + Send + 'static,
    {
        if self.shutdown.is_cancelled() {
            return;
        }
        let _ = self.sender.send(Box::pin(work));
    }

    /// Cancel the session token and wait for the consumer to exit.
    ///
    /// Queued units that never ran are dropped.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let consumer = self
            .consumer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(consumer) = consumer {
            if let Err(e) = consumer.await {
                warn!(error = %e, "session consumer task failed");
            }
        }
    }
}

async fn consume(
    mut receiver: mpsc::UnboundedReceiver<WorkItem>,
    shutdown: CancellationToken,
    tunnel: Arc<BoxTunnel>,
) {
    loop {
        let work = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            work = receiver.recv() => match work {
                Some(work) => work,
                None => break,
            },
        };

        let result = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            result = work => result,
        };

        match result {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => debug!("work unit superseded"),
            Err(e) => {
                warn!(error = %e, "work unit failed");
                let details = e.source().map(|s| s.to_string());
                if let Err(send_err) = tunnel
                    .send(ServerMessage::error(e.to_string(), details), &shutdown)
                    .await
                {
                    debug!(error = %send_err, "could not report failure to client");
                }
            }
        }
    }
    receiver.close();
}
