//! Lifecycle shared by every backend service.
//!
//! A backend is created by its registered factory, then asked to
//! `initialize` against the session's prerequisites. Whether it can serve
//! the session is entirely the backend's own judgment: returning `Ok(false)`
//! makes the resolver move on to the next candidate.

use chorus_types::error::ServiceError;
use chorus_types::service::Prerequisites;
use tokio_util::sync::CancellationToken;

/// Runtime requirements handed to `initialize`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceInit {
    pub prerequisites: Prerequisites,
    /// Culture of the character, e.g. `"en-US"`.
    pub culture: String,
}

impl ServiceInit {
    pub fn new(prerequisites: Prerequisites, culture: impl Into<String>) -> Self {
        Self {
            prerequisites,
            culture: culture.into(),
        }
    }
}

/// Lifecycle methods implemented by every backend capability.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition). Each
/// capability trait extends this one and has a `Box*` wrapper for dynamic
/// dispatch.
pub trait BackendService: Send + Sync {
    /// Registered service name (e.g. "openai", "piper").
    fn service_name(&self) -> &str;

    /// Prepare the backend for a session. `Ok(false)` means incompatible.
    fn initialize(
        &self,
        init: &ServiceInit,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<bool, ServiceError>> + Send;

    /// Release resources held for the session.
    fn dispose(&self) -> impl std::future::Future<Output = ()> + Send {
        async {}
    }
}

/// Await `fut` unless `cancel` fires first.
///
/// Backends are expected to honor their token, but the core never relies on
/// it: a superseded call is dropped at the next poll.
pub async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl std::future::Future<Output = Result<T, ServiceError>>,
) -> Result<T, ServiceError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ServiceError::Cancelled),
        result = fut => result,
    }
}
