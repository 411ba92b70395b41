//! Ports used by the speech generators.
//!
//! These traits return boxed futures so generators can hold them as
//! `Arc<dyn ...>` and stay independent of the file layout and codecs chosen
//! by chorus-infra.

use chorus_types::error::SpeechError;
use futures_util::future::BoxFuture;

/// Storage for synthesized clips served over HTTP.
pub trait SpeechFileStore: Send + Sync {
    fn exists<'a>(&'a self, file: &'a str) -> BoxFuture<'a, bool>;

    fn write<'a>(&'a self, file: &'a str, audio: Vec<u8>) -> BoxFuture<'a, Result<(), SpeechError>>;

    /// Public URL of a stored clip.
    fn url_for(&self, file: &str) -> String;

    /// Remove `file` once its deletion delay elapses.
    fn schedule_deletion(&self, file: &str);

    /// Cancel a scheduled deletion.
    fn retain(&self, file: &str);
}

/// Converts audio between content types.
pub trait AudioConverter: Send + Sync {
    fn convert(&self, audio: Vec<u8>, from: &str, to: &str) -> Result<Vec<u8>, SpeechError>;
}

/// Computes hex-encoded content hashes for reusable clip names.
pub trait ContentHasher: Send + Sync {
    fn compute_hash(&self, content: &str) -> String;
}
