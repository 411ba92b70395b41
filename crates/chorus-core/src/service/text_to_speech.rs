//! Text-to-speech capability and its type-erased wrapper.

use chorus_types::error::ServiceError;
use chorus_types::speech::{SpeechRequest, Voice};
use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use super::backend::{BackendService, ServiceInit};

/// Destination for synthesized audio bytes.
pub trait SpeechSink: Send {
    fn write(&mut self, chunk: &[u8]);
}

impl SpeechSink for Vec<u8> {
    fn write(&mut self, chunk: &[u8]) {
        self.extend_from_slice(chunk);
    }
}

/// Trait for speech synthesis backends.
pub trait TextToSpeechService: BackendService {
    /// Synthesize `request.text`, streaming audio into `sink`.
    ///
    /// Output is encoded as [`content_type`](Self::content_type).
    fn generate_speech(
        &self,
        request: &SpeechRequest,
        sink: &mut dyn SpeechSink,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<(), ServiceError>> + Send;

    fn voices(
        &self,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<Vec<Voice>, ServiceError>> + Send;

    /// Native audio content type produced by this backend.
    fn content_type(&self) -> &str;

    /// Short filler lines spoken while a reply is being generated.
    fn thinking_speech_lines(&self) -> Vec<String>;
}

/// Object-safe version of [`TextToSpeechService`] with boxed futures.
pub trait TextToSpeechDyn: Send + Sync {
    fn service_name(&self) -> &str;

    fn initialize_boxed<'a>(
        &'a self,
        init: &'a ServiceInit,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<bool, ServiceError>>;

    fn dispose_boxed(&self) -> BoxFuture<'_, ()>;

    fn generate_speech_boxed<'a>(
        &'a self,
        request: &'a SpeechRequest,
        sink: &'a mut dyn SpeechSink,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<(), ServiceError>>;

    fn voices_boxed<'a>(
        &'a self,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Vec<Voice>, ServiceError>>;

    fn content_type(&self) -> &str;

    fn thinking_speech_lines(&self) -> Vec<String>;
}

impl<T: TextToSpeechService> TextToSpeechDyn for T {
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

    fn generate_speech_boxed<'a>(
        &'a self,
        request: &'a SpeechRequest,
        sink: &'a mut dyn SpeechSink,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<(), ServiceError>> {
        Box::pin(self.generate_speech(request, sink, cancel))
    }

    fn voices_boxed<'a>(
        &'a self,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Vec<Voice>, ServiceError>> {
        Box::pin(self.voices(cancel))
    }

    fn content_type(&self) -> &str {
        TextToSpeechService::content_type(self)
    }

    fn thinking_speech_lines(&self) -> Vec<String> {
        TextToSpeechService::thinking_speech_lines(self)
    }
}

/// Type-erased speech synthesis backend selected at runtime.
pub struct BoxTextToSpeech {
    inner: Box<dyn TextToSpeechDyn>,
}

impl BoxTextToSpeech {
    pub fn new<T: TextToSpeechService + 'static>(service: T) -> Self {
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

    pub async fn generate_speech(
        &self,
        request: &SpeechRequest,
        sink: &mut dyn SpeechSink,
        cancel: &CancellationToken,
    ) -> Result<(), ServiceError> {
        self.inner.generate_speech_boxed(request, sink, cancel).await
    }

    pub async fn voices(&self, cancel: &CancellationToken) -> Result<Vec<Voice>, ServiceError> {
        self.inner.voices_boxed(cancel).await
    }

    pub fn content_type(&self) -> &str {
        self.inner.content_type()
    }

    pub fn thinking_speech_lines(&self) -> Vec<String> {
        self.inner.thinking_speech_lines()
    }
}
