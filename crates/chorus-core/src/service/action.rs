//! Action inference capability.

use chorus_types::error::ServiceError;
use chorus_types::session::ChatSessionData;
use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use super::backend::{BackendService, ServiceInit};

/// Trait for backends that pick the character's next action.
pub trait ActionInferenceService: BackendService {
    /// Choose one of `data.actions` given the conversation so far.
    ///
    /// The result may be inexact; the reply pipeline corrects it against the
    /// candidate list.
    fn select_action(
        &self,
        data: &ChatSessionData,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<String, ServiceError>> + Send;
}

pub trait ActionInferenceDyn: Send + Sync {
    fn service_name(&self) -> &str;

    fn initialize_boxed<'a>(
        &'a self,
        init: &'a ServiceInit,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<bool, ServiceError>>;

    fn dispose_boxed(&self) -> BoxFuture<'_, ()>;

    fn select_action_boxed<'a>(
        &'a self,
        data: &'a ChatSessionData,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<String, ServiceError>>;
}

impl<T: ActionInferenceService> ActionInferenceDyn for T {
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

    fn select_action_boxed<'a>(
        &'a self,
        data: &'a ChatSessionData,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<String, ServiceError>> {
        Box::pin(self.select_action(data, cancel))
    }
}

/// Type-erased action inference backend selected at runtime.
pub struct BoxActionInference {
    inner: Box<dyn ActionInferenceDyn>,
}

impl BoxActionInference {
    pub fn new<T: ActionInferenceService + 'static>(service: T) -> Self {
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

    pub async fn select_action(
        &self,
        data: &ChatSessionData,
        cancel: &CancellationToken,
    ) -> Result<String, ServiceError> {
        self.inner.select_action_boxed(data, cancel).await
    }
}
