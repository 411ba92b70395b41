//! Text generation capability and its type-erased wrapper.
//!
//! Follows the blanket-impl pattern used by every backend capability:
//! 1. `TextGenService` uses RPITIT for async methods
//! 2. `TextGenDyn` is the object-safe mirror with boxed futures
//! 3. `BoxTextGen` wraps `Box<dyn TextGenDyn>` and delegates

use chorus_types::error::ServiceError;
use chorus_types::llm::Prompt;
use chorus_types::session::ChatSessionData;
use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use super::backend::{BackendService, ServiceInit};

/// Trait for text generation backends.
pub trait TextGenService: BackendService {
    /// Generate the character's next reply from the session data.
    ///
    /// Backends typically build a prompt with
    /// [`PromptBuilder`](crate::prompt::PromptBuilder) and call `generate`.
    fn generate_reply(
        &self,
        data: &ChatSessionData,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<String, ServiceError>> + Send;

    /// Generate text for an already assembled prompt.
    fn generate(
        &self,
        prompt: &Prompt,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<String, ServiceError>> + Send;

    /// Tokens `text` occupies for this backend's tokenizer.
    fn token_count(&self, text: &str) -> u32;

    /// Total message tokens at which memory summarization starts.
    fn summarization_trigger_tokens(&self) -> u32;

    /// Prompt budget in tokens.
    fn max_context_tokens(&self) -> u32;

    /// Part of the prompt budget reserved for memory lines.
    fn max_memory_tokens(&self) -> u32;
}

/// Object-safe version of [`TextGenService`] with boxed futures.
pub trait TextGenDyn: Send + Sync {
    fn service_name(&self) -> &str;

    fn initialize_boxed<'a>(
        &'a self,
        init: &'a ServiceInit,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<bool, ServiceError>>;

    fn dispose_boxed(&self) -> BoxFuture<'_, ()>;

    fn generate_reply_boxed<'a>(
        &'a self,
        data: &'a ChatSessionData,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<String, ServiceError>>;

    fn generate_boxed<'a>(
        &'a self,
        prompt: &'a Prompt,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<String, ServiceError>>;

    fn token_count(&self, text: &str) -> u32;

    fn summarization_trigger_tokens(&self) -> u32;

    fn max_context_tokens(&self) -> u32;

    fn max_memory_tokens(&self) -> u32;
}

impl<T: TextGenService> TextGenDyn for T {
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

    fn generate_reply_boxed<'a>(
        &'a self,
        data: &'a ChatSessionData,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<String, ServiceError>> {
        Box::pin(self.generate_reply(data, cancel))
    }

    fn generate_boxed<'a>(
        &'a self,
        prompt: &'a Prompt,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<String, ServiceError>> {
        Box::pin(self.generate(prompt, cancel))
    }

    fn token_count(&self, text: &str) -> u32 {
        TextGenService::token_count(self, text)
    }

    fn summarization_trigger_tokens(&self) -> u32 {
        TextGenService::summarization_trigger_tokens(self)
    }

    fn max_context_tokens(&self) -> u32 {
        TextGenService::max_context_tokens(self)
    }

    fn max_memory_tokens(&self) -> u32 {
        TextGenService::max_memory_tokens(self)
    }
}

/// Type-erased text generation backend selected at runtime.
pub struct BoxTextGen {
    inner: Box<dyn TextGenDyn>,
}

impl BoxTextGen {
    pub fn new<T: TextGenService + 'static>(service: T) -> Self {
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

    pub async fn generate_reply(
        &self,
        data: &ChatSessionData,
        cancel: &CancellationToken,
    ) -> Result<String, ServiceError> {
        self.inner.generate_reply_boxed(data, cancel).await
    }

    pub async fn generate(
        &self,
        prompt: &Prompt,
        cancel: &CancellationToken,
    ) -> Result<String, ServiceError> {
        self.inner.generate_boxed(prompt, cancel).await
    }

    pub fn token_count(&self, text: &str) -> u32 {
        self.inner.token_count(text)
    }

    pub fn summarization_trigger_tokens(&self) -> u32 {
        self.inner.summarization_trigger_tokens()
    }

    pub fn max_context_tokens(&self) -> u32 {
        self.inner.max_context_tokens()
    }

    pub fn max_memory_tokens(&self) -> u32 {
        self.inner.max_memory_tokens()
    }
}
