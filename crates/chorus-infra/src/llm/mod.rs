//! Concrete text generation backends.

pub mod openai_compat;

pub use openai_compat::{OpenAiCompatService, OpenAiCompatSettings};

use chorus_core::service::ServiceRegistry;

/// Registry with every backend this crate ships.
pub fn default_registry() -> ServiceRegistry {
    let mut registry = ServiceRegistry::new();
    openai_compat::register(&mut registry);
    registry
}
