//! Test backends and state for handler and connection tests.

use std::path::PathBuf;

use chorus_core::service::text_to_speech::SpeechSink;
use chorus_core::service::{BackendService, ServiceInit, ServiceRegistry, TextGenService, TextToSpeechService};
use chorus_infra::sqlite::{DatabasePool, database_url};
use chorus_types::character::CharacterSnapshot;
use chorus_types::chat::MessageRole;
use chorus_types::config::{GlobalConfig, SpeechStrategy};
use chorus_types::error::ServiceError;
use chorus_types::llm::Prompt;
use chorus_types::service::{ServiceInstanceConfig, ServiceLink, ServicesList};
use chorus_types::session::ChatSessionData;
use chorus_types::speech::{SpeechRequest, Voice};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::state::AppState;

/// Replies with "Echo: <last user message>".
pub struct EchoGen;

impl BackendService for EchoGen {
    fn service_name(&self) -> &str {
        "echo"
    }

    async fn initialize(
        &self,
        _init: &ServiceInit,
        _cancel: &CancellationToken,
    ) -> Result<bool, ServiceError> {
        Ok(true)
    }
}

impl TextGenService for EchoGen {
    async fn generate_reply(
        &self,
        data: &ChatSessionData,
        _cancel: &CancellationToken,
    ) -> Result<String, ServiceError> {
        let last = data
            .last_message(MessageRole::User)
            .map(|m| m.text.clone())
            .unwrap_or_default();
        Ok(format!("Echo: {last}"))
    }

    async fn generate(
        &self,
        prompt: &Prompt,
        _cancel: &CancellationToken,
    ) -> Result<String, ServiceError> {
        Ok(prompt.to_text())
    }

    fn token_count(&self, text: &str) -> u32 {
        text.split_whitespace().count() as u32
    }

    fn summarization_trigger_tokens(&self) -> u32 {
        10_000
    }

    fn max_context_tokens(&self) -> u32 {
        4096
    }

    fn max_memory_tokens(&self) -> u32 {
        512
    }
}

/// Writes the request text as the audio payload.
pub struct ToneTts;

impl BackendService for ToneTts {
    fn service_name(&self) -> &str {
        "tone"
    }

    async fn initialize(
        &self,
        _init: &ServiceInit,
        _cancel: &CancellationToken,
    ) -> Result<bool, ServiceError> {
        Ok(true)
    }
}

impl TextToSpeechService for ToneTts {
    async fn generate_speech(
        &self,
        request: &SpeechRequest,
        sink: &mut dyn SpeechSink,
        _cancel: &CancellationToken,
    ) -> Result<(), ServiceError> {
        sink.write(request.text.as_bytes());
        Ok(())
    }

    async fn voices(&self, _cancel: &CancellationToken) -> Result<Vec<Voice>, ServiceError> {
        Ok(Vec::new())
    }

    fn content_type(&self) -> &str {
        "audio/wav"
    }

    fn thinking_speech_lines(&self) -> Vec<String> {
        Vec::new()
    }
}

pub fn character() -> CharacterSnapshot {
    CharacterSnapshot {
        id: Uuid::now_v7(),
        name: "Ava".to_string(),
        description: String::new(),
        personality: String::new(),
        scenario: String::new(),
        system_prompt: "You are {{char}}.".to_string(),
        post_history_instructions: None,
        culture: "en-US".to_string(),
        voice: None,
        memories: Vec::new(),
    }
}

/// State over a temp database with one character and the echo backend.
pub async fn test_state(strategy: SpeechStrategy) -> (tempfile::TempDir, AppState) {
    let tmp = tempfile::tempdir().unwrap();
    let data_dir: PathBuf = tmp.path().to_path_buf();

    let mut config = GlobalConfig::default();
    config.speech.strategy = strategy;
    config.characters.push(character());
    config.services.push(ServiceInstanceConfig {
        id: Uuid::now_v7(),
        service_name: "echo".to_string(),
        label: None,
        enabled: true,
        settings: serde_json::json!({}),
    });
    config.profile.text_gen = ServicesList::new(vec![ServiceLink::named("echo")]);

    let mut registry = ServiceRegistry::new();
    registry.register_text_gen("echo", |_config: &ServiceInstanceConfig| Ok(EchoGen));

    let pool = DatabasePool::new(&database_url(&data_dir)).await.unwrap();
    let state = AppState::from_parts(config, registry, pool, data_dir, CancellationToken::new())
        .await
        .unwrap();
    (tmp, state)
}
