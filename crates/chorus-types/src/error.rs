use thiserror::Error;

use crate::service::ServiceCategory;

/// Errors raised by backend services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service '{service}' failed: {message}")]
    Backend { service: String, message: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl ServiceError {
    pub fn backend(service: impl Into<String>, message: impl Into<String>) -> Self {
        ServiceError::Backend {
            service: service.into(),
            message: message.into(),
        }
    }
}

/// Errors from best-match service resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("preferred {category} service '{service}' is not available")]
    PreferredUnavailable {
        category: ServiceCategory,
        service: String,
    },

    #[error("no compatible {category} service found (prerequisites: {prerequisites}, culture: {culture})")]
    NoCompatibleService {
        category: ServiceCategory,
        prerequisites: String,
        culture: String,
    },

    #[error("{category} service initialization failed: {source}")]
    Initialization {
        category: ServiceCategory,
        #[source]
        source: ServiceError,
    },
}

/// Errors from repository operations (used by trait definitions in chorus-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from speech generation and retrieval.
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("speech '{0}' not found")]
    NotFound(String),

    #[error("cannot convert audio from {from} to {to}")]
    Conversion { from: String, to: String },

    #[error("speech file error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Errors from the memory summarization cycle.
#[derive(Debug, Error)]
pub enum SummarizationError {
    #[error("no message fits the summarization digest budget of {digest_tokens} tokens")]
    NoEligibleMessages { digest_tokens: u32 },

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Errors from the client transport.
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("connection closed")]
    Closed,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed message: {0}")]
    Malformed(String),
}

/// Errors from a single turn or session operation.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Service(ServiceError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Speech(SpeechError),

    #[error(transparent)]
    Summarization(SummarizationError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Tunnel(#[from] TunnelError),

    #[error("text generation returned an empty reply after {attempts} attempts")]
    EmptyReply { attempts: u32 },
}

impl SessionError {
    /// Whether this error only means the work was superseded or shut down.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            SessionError::Cancelled
                | SessionError::Service(ServiceError::Cancelled)
                | SessionError::Speech(SpeechError::Service(ServiceError::Cancelled))
                | SessionError::Summarization(SummarizationError::Service(ServiceError::Cancelled))
        )
    }
}

impl From<ServiceError> for SessionError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Cancelled => SessionError::Cancelled,
            other => SessionError::Service(other),
        }
    }
}

impl From<SpeechError> for SessionError {
    fn from(e: SpeechError) -> Self {
        match e {
            SpeechError::Service(ServiceError::Cancelled) => SessionError::Cancelled,
            other => SessionError::Speech(other),
        }
    }
}

impl From<SummarizationError> for SessionError {
    fn from(e: SummarizationError) -> Self {
        match e {
            SummarizationError::Service(ServiceError::Cancelled) => SessionError::Cancelled,
            other => SessionError::Summarization(other),
        }
    }
}
