//! Speech recognition capability.
//!
//! Recognition is push-based: the backend reports events to one subscribed
//! [`SpeechRecognitionObserver`]. A session subscribes when it starts and
//! unsubscribes when it is disposed.

use std::sync::Arc;

use chorus_types::error::ServiceError;
use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use super::backend::{BackendService, ServiceInit};

/// Receives recognition events. Called from the backend's own tasks, so
/// implementations must not block.
pub trait SpeechRecognitionObserver: Send + Sync {
    /// The user started speaking.
    fn speech_started(&self);

    /// Intermediate hypothesis for the current utterance.
    fn speech_partial(&self, text: &str);

    /// The utterance ended. `None` when nothing intelligible was heard.
    fn speech_finished(&self, text: Option<&str>);
}

/// Trait for speech recognition backends.
pub trait SpeechToTextService: BackendService {
    /// Attach the observer, replacing any previous one.
    fn subscribe(&self, observer: Arc<dyn SpeechRecognitionObserver>);

    /// Detach the current observer.
    fn unsubscribe(&self);

    fn start_transcription(
        &self,
    ) -> impl std::future::Future<Output = Result<(), ServiceError>> + Send;

    fn stop_transcription(
        &self,
    ) -> impl std::future::Future<Output = Result<(), ServiceError>> + Send;
}

/// Object-safe version of [`SpeechToTextService`] with boxed futures.
pub trait SpeechToTextDyn: Send + Sync {
    fn service_name(&self) -> &str;

    fn initialize_boxed<'a>(
        &'a self,
        init: &'a ServiceInit,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<bool, ServiceError>>;

    fn dispose_boxed(&self) -> BoxFuture<'_, ()>;

    fn subscribe(&self, observer: Arc<dyn SpeechRecognitionObserver>);

    fn unsubscribe(&self);

    fn start_transcription_boxed(&self) -> BoxFuture<'_, Result<(), ServiceError>>;

    fn stop_transcription_boxed(&self) -> BoxFuture<'_, Result<(), ServiceError>>;
}

impl<T: SpeechToTextService> SpeechToTextDyn for T {
    fn service_name(&self) -> &str {
        BackendService::service_name(self)
    }

    fn initialize_boxed<'a>(
        &'a self,
        init: &'a ServiceInit,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<bool, ServiceError>> {
        Box::pin(self.initialize(init, cancel))
    }

    fn dispose_boxed(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.dispose())
    }

    fn subscribe(&self, observer: Arc<dyn SpeechRecognitionObserver>) {
        SpeechToTextService::subscribe(self, observer)
    }

    fn unsubscribe(&self) {
        SpeechToTextService::unsubscribe(self)
    }

    fn start_transcription_boxed(&self) -> BoxFuture<'_, Result<(), ServiceError>> {
        Box::pin(self.start_transcription())
    }

    fn stop_transcription_boxed(&self) -> BoxFuture<'_, Result<(), ServiceError>> {
        Box::pin(self.stop_transcription())
    }
}

/// Type-erased speech recognition backend selected at runtime.
pub struct BoxSpeechToText {
    inner: Box<dyn SpeechToTextDyn>,
}

impl BoxSpeechToText {
    pub fn new<T: SpeechToTextService + 'static>(service: T) -> Self {
        Self {
            inner: Box::new(service),
        }
    }

    pub fn service_name(&self) -> &str {
        self.inner.service_name()
    }

    pub async fn initialize(
        &self,
        init: &ServiceInit,
        cancel: &CancellationToken,
    ) -> Result<bool, ServiceError> {
        self.inner.initialize_boxed(init, cancel).await
    }

    pub async fn dispose(&self) {
        self.inner.dispose_boxed().await
    }

    pub fn subscribe(&self, observer: Arc<dyn SpeechRecognitionObserver>) {
        self.inner.subscribe(observer)
    }

    pub fn unsubscribe(&self) {
        self.inner.unsubscribe()
    }

    pub async fn start_transcription(&self) -> Result<(), ServiceError> {
        self.inner.start_transcription_boxed().await
    }

    pub async fn stop_transcription(&self) -> Result<(), ServiceError> {
        self.inner.stop_transcription_boxed().await
    }
}
