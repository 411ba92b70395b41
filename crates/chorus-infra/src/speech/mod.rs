//! Speech storage adapters for the local speech strategy.

pub mod convert;
pub mod hash;
pub mod store;

pub use convert::PassthroughConverter;
pub use hash::Sha256ContentHasher;
pub use store::{LOCAL_SPEECH_ROUTE, LocalSpeechFileStore};
