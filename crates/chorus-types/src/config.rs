//! Global configuration types for Chorus.
//!
//! `GlobalConfig` represents the top-level `config.toml` in the data
//! directory: server binding, speech strategy, chat behavior, the service
//! profile, configured backend instances, and character definitions.

use serde::{Deserialize, Serialize};

use crate::character::CharacterSnapshot;
use crate::service::{ServiceInstanceConfig, ServiceProfile};

/// Top-level configuration. All fields have defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub speech: SpeechConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    /// Priority lists and preferred overrides per capability.
    #[serde(default)]
    pub profile: ServiceProfile,

    /// Configured backend instances referenced by the profile.
    #[serde(default)]
    pub services: Vec<ServiceInstanceConfig>,

    #[serde(default)]
    pub characters: Vec<CharacterSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Prefix prepended to generated speech URLs (e.g. `https://chat.example.com`).
    /// Empty means URLs stay relative.
    #[serde(default)]
    pub public_base_url: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5151
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_base_url: String::new(),
        }
    }
}

/// Where synthesized speech is produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechStrategy {
    /// Synthesize eagerly into files served from the data directory.
    #[default]
    Local,
    /// Register a pending entry and synthesize when the client fetches it.
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    #[serde(default)]
    pub strategy: SpeechStrategy,

    /// Seconds before a one-off local clip is removed.
    #[serde(default = "default_deletion_delay_secs")]
    pub deletion_delay_secs: u64,

    /// Content type requested from backends when the client states none.
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

fn default_deletion_delay_secs() -> u64 {
    60
}

fn default_content_type() -> String {
    crate::speech::DEFAULT_AUDIO_CONTENT_TYPE.to_string()
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            strategy: SpeechStrategy::default(),
            deletion_delay_secs: default_deletion_delay_secs(),
            content_type: default_content_type(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Stop speech recognition while the client plays a reply.
    #[serde(default)]
    pub pause_speech_recognition_during_playback: bool,

    /// Total generation attempts before an empty reply becomes an error.
    #[serde(default = "default_max_reply_attempts")]
    pub max_reply_attempts: u32,

    /// Prefix added to a user message that interrupted a reply.
    #[serde(default = "default_interruption_marker")]
    pub interruption_marker: String,
}

fn default_max_reply_attempts() -> u32 {
    3
}

fn default_interruption_marker() -> String {
    "*interrupts* ".to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            pause_speech_recognition_during_playback: false,
            max_reply_attempts: default_max_reply_attempts(),
            interruption_marker: default_interruption_marker(),
        }
    }
}
