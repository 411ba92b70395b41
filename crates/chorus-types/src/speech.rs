//! Speech synthesis request types.

use serde::{Deserialize, Serialize};

/// Default content type produced when a client does not state a preference.
pub const DEFAULT_AUDIO_CONTENT_TYPE: &str = "audio/wav";

/// A single synthesis request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: String,
    pub culture: String,
    /// Content type the client expects to receive.
    pub content_type: String,
    /// Reusable clips are retained; one-off clips are scheduled for deletion.
    pub reusable: bool,
}

/// A voice offered by a text-to-speech backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub id: String,
    pub label: String,
}

/// File extension for an audio content type.
pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/ogg" | "audio/opus" => "ogg",
        "audio/webm" => "webm",
        "audio/x-wav" | "audio/wav" => "wav",
        _ => "bin",
    }
}

/// Content type for a file extension (inverse of [`extension_for`]).
pub fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "webm" => "audio/webm",
        "wav" => "audio/wav",
        _ => "application/octet-stream",
    }
}
