//! Wire protocol between the client and the chat server.
//!
//! Every frame is a JSON object carrying a `type` discriminator, e.g.
//! `{"type":"send","text":"hello"}` or `{"type":"reply","text":"hi!"}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::service::{ServiceCategory, ServiceLink};

/// Messages sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Resume the most recent chat with a character, or start one.
    StartChat {
        character_id: Uuid,
        #[serde(default)]
        user_name: Option<String>,
    },
    /// Always start a fresh chat with a character.
    NewChat {
        character_id: Uuid,
        #[serde(default)]
        user_name: Option<String>,
    },
    /// Resume a specific chat.
    ResumeChat {
        chat_id: Uuid,
        #[serde(default)]
        user_name: Option<String>,
    },
    /// A user utterance.
    Send {
        text: String,
        #[serde(default)]
        context: Option<String>,
        #[serde(default)]
        actions: Option<Vec<String>>,
    },
    /// The client started playing a speech clip of `duration` seconds.
    SpeechPlaybackStart { duration: f64 },
    /// The client finished playing the current speech clip.
    SpeechPlaybackComplete,
    /// End the session.
    StopChat,
}

impl ClientMessage {
    /// Whether this message bootstraps a session (handled outside the core).
    pub fn is_bootstrap(&self) -> bool {
        matches!(
            self,
            ClientMessage::StartChat { .. }
                | ClientMessage::NewChat { .. }
                | ClientMessage::ResumeChat { .. }
        )
    }
}

/// Messages sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Ready {
        chat_id: Uuid,
        thinking_speech_urls: Vec<String>,
        services: BTreeMap<ServiceCategory, ServiceLink>,
    },
    Reply {
        text: String,
    },
    Speech {
        url: String,
    },
    SpeechRecognitionStart,
    SpeechRecognitionPartial {
        text: String,
    },
    SpeechRecognitionEnd {
        #[serde(default)]
        text: Option<String>,
    },
    Action {
        value: String,
    },
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
}

impl ServerMessage {
    pub fn reply(text: impl Into<String>) -> Self {
        ServerMessage::Reply { text: text.into() }
    }

    pub fn error(message: impl Into<String>, details: Option<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
            details,
        }
    }
}
