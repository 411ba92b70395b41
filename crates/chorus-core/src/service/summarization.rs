//! Summarization capability.

use chorus_types::chat::ChatMessage;
use chorus_types::error::ServiceError;
use chorus_types::session::ChatSessionData;
use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use super::backend::{BackendService, ServiceInit};

/// Trait for backends that condense old messages into a memory summary.
pub trait SummarizationService: BackendService {
    /// Summarize `messages` (oldest first) in the context of `data`.
    fn summarize(
        &self,
        data: &ChatSessionData,
        messages: &[ChatMessage],
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<String, ServiceError>> + Send;

    /// Token budget this backend can read in one pass.
    fn digest_tokens(&self) -> u32;
}

pub trait SummarizationDyn: Send + Sync {
    fn service_name(&self) -> &str;

    fn initialize_boxed<'a>(
        &'a self,
        init: &'a ServiceInit,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<bool, ServiceError>>;

    fn dispose_boxed(&self) -> BoxFuture<'_, ()>;

    fn summarize_boxed<'a>(
        &'a self,
        data: &'a ChatSessionData,
        messages: &'a [ChatMessage],
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<String, ServiceError>>;

    fn digest_tokens(&self) -> u32;
}

impl<T: SummarizationService> SummarizationDyn for T {
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

    fn summarize_boxed<'a>(
        &'a self,
        data: &'a ChatSessionData,
        messages: &'a [ChatMessage],
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<String, ServiceError>> {
        Box::pin(self.summarize(data, messages, cancel))
    }

    fn digest_tokens(&self) -> u32 {
        SummarizationService::digest_tokens(self)
    }
}

/// Type-erased summarization backend selected at runtime.
pub struct BoxSummarization {
    inner: Box<dyn SummarizationDyn>,
}

impl BoxSummarization {
    pub fn new<T: SummarizationService + 'static>(service: T) -> Self {
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

    pub async fn summarize(
        &self,
        data: &ChatSessionData,
        messages: &[ChatMessage],
        cancel: &CancellationToken,
    ) -> Result<String, ServiceError> {
        self.inner.summarize_boxed(data, messages, cancel).await
    }

    pub fn digest_tokens(&self) -> u32 {
        self.inner.digest_tokens()
    }
}
