//! Mock backends and fixtures shared by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chorus_types::character::{CharacterSnapshot, UserSnapshot};
use chorus_types::chat::{Chat, ChatMessage};
use chorus_types::error::{RepositoryError, ServiceError};
use chorus_types::llm::Prompt;
use chorus_types::session::ChatSessionData;
use chorus_types::speech::{SpeechRequest, Voice};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::repository::ChatMessageRepository;
use crate::service::backend::{BackendService, ServiceInit};
use crate::service::speech_to_text::{SpeechRecognitionObserver, SpeechToTextService};
use crate::service::summarization::SummarizationService;
use crate::service::text_gen::TextGenService;
use crate::service::text_to_speech::{SpeechSink, TextToSpeechService};
use crate::service::action::ActionInferenceService;

pub fn words(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

pub fn character() -> CharacterSnapshot {
    CharacterSnapshot {
        id: Uuid::now_v7(),
        name: "Luna".to_string(),
        description: String::new(),
        personality: String::new(),
        scenario: String::new(),
        system_prompt: "You are {{char}}.".to_string(),
        post_history_instructions: None,
        culture: "en-US".to_string(),
        voice: Some("soft".to_string()),
        memories: Vec::new(),
    }
}

pub fn session_data(messages: Vec<ChatMessage>) -> ChatSessionData {
    let character = character();
    let chat = match messages.first() {
        Some(m) => Chat {
            id: m.chat_id,
            character_id: character.id,
            created_at: chrono::Utc::now(),
        },
        None => Chat::new(character.id),
    };
    ChatSessionData::new(chat, UserSnapshot::default(), character, messages)
}

/// Text generator returning scripted replies, then a fixed fallback.
pub struct MockTextGen {
    pub replies: Mutex<VecDeque<String>>,
    pub fallback: String,
    pub delay: Duration,
    pub trigger: u32,
    pub calls: Arc<AtomicUsize>,
}

impl MockTextGen {
    pub fn new(fallback: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: fallback.to_string(),
            delay: Duration::ZERO,
            trigger: 10_000,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn scripted(replies: &[&str], fallback: &str) -> Self {
        let mock = Self::new(fallback);
        *mock.replies.lock().unwrap() = replies.iter().map(|r| r.to_string()).collect();
        mock
    }
}

impl BackendService for MockTextGen {
    fn service_name(&self) -> &str {
        "mock-llm"
    }

    async fn initialize(
        &self,
        _init: &ServiceInit,
        _cancel: &CancellationToken,
    ) -> Result<bool, ServiceError> {
        Ok(true)
    }
}

impl TextGenService for MockTextGen {
    async fn generate_reply(
        &self,
        _data: &ChatSessionData,
        cancel: &CancellationToken,
    ) -> Result<String, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::select! {
            _ = cancel.cancelled() => return Err(ServiceError::Cancelled),
            _ = tokio::time::sleep(self.delay) => {}
        }
        let next = self.replies.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }

    async fn generate(
        &self,
        prompt: &Prompt,
        _cancel: &CancellationToken,
    ) -> Result<String, ServiceError> {
        Ok(prompt.to_text())
    }

    fn token_count(&self, text: &str) -> u32 {
        words(text)
    }

    fn summarization_trigger_tokens(&self) -> u32 {
        self.trigger
    }

    fn max_context_tokens(&self) -> u32 {
        4096
    }

    fn max_memory_tokens(&self) -> u32 {
        256
    }
}

/// Speech synthesizer writing the request text as bytes.
pub struct MockTts {
    pub calls: Arc<AtomicUsize>,
    pub content_type: String,
}

impl MockTts {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            content_type: "audio/wav".to_string(),
        }
    }
}

impl BackendService for MockTts {
    fn service_name(&self) -> &str {
        "mock-tts"
    }

    async fn initialize(
        &self,
        _init: &ServiceInit,
        _cancel: &CancellationToken,
    ) -> Result<bool, ServiceError> {
        Ok(true)
    }
}

impl TextToSpeechService for MockTts {
    async fn generate_speech(
        &self,
        request: &SpeechRequest,
        sink: &mut dyn SpeechSink,
        _cancel: &CancellationToken,
    ) -> Result<(), ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        sink.write(request.text.as_bytes());
        Ok(())
    }

    async fn voices(&self, _cancel: &CancellationToken) -> Result<Vec<Voice>, ServiceError> {
        Ok(vec![Voice {
            id: "soft".to_string(),
            label: "Soft".to_string(),
        }])
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn thinking_speech_lines(&self) -> Vec<String> {
        vec!["Hmm...".to_string()]
    }
}

/// Speech recognizer that counts start/stop calls.
#[derive(Default)]
pub struct MockStt {
    pub starts: Arc<AtomicUsize>,
    pub stops: Arc<AtomicUsize>,
}

impl BackendService for MockStt {
    fn service_name(&self) -> &str {
        "mock-stt"
    }

    async fn initialize(
        &self,
        _init: &ServiceInit,
        _cancel: &CancellationToken,
    ) -> Result<bool, ServiceError> {
        Ok(true)
    }
}

impl SpeechToTextService for MockStt {
    fn subscribe(&self, _observer: Arc<dyn SpeechRecognitionObserver>) {}

    fn unsubscribe(&self) {}

    async fn start_transcription(&self) -> Result<(), ServiceError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_transcription(&self) -> Result<(), ServiceError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Summarizer returning a fixed text.
pub struct MockSummarizer {
    pub summary: String,
    pub digest: u32,
    pub calls: Arc<AtomicUsize>,
}

impl MockSummarizer {
    pub fn new(summary: &str, digest: u32) -> Self {
        Self {
            summary: summary.to_string(),
            digest,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl BackendService for MockSummarizer {
    fn service_name(&self) -> &str {
        "mock-summarizer"
    }

    async fn initialize(
        &self,
        _init: &ServiceInit,
        _cancel: &CancellationToken,
    ) -> Result<bool, ServiceError> {
        Ok(true)
    }
}

impl SummarizationService for MockSummarizer {
    async fn summarize(
        &self,
        _data: &ChatSessionData,
        _messages: &[ChatMessage],
        _cancel: &CancellationToken,
    ) -> Result<String, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.summary.clone())
    }

    fn digest_tokens(&self) -> u32 {
        self.digest
    }
}

/// Action inference returning a fixed action.
pub struct MockAction(pub String);

impl BackendService for MockAction {
    fn service_name(&self) -> &str {
        "mock-action"
    }

    async fn initialize(
        &self,
        _init: &ServiceInit,
        _cancel: &CancellationToken,
    ) -> Result<bool, ServiceError> {
        Ok(true)
    }
}

impl ActionInferenceService for MockAction {
    async fn select_action(
        &self,
        _data: &ChatSessionData,
        _cancel: &CancellationToken,
    ) -> Result<String, ServiceError> {
        Ok(self.0.clone())
    }
}

/// Message repository backed by a map.
#[derive(Default)]
pub struct MemoryMessages {
    pub messages: DashMap<Uuid, ChatMessage>,
}

impl MemoryMessages {
    pub fn get(&self, id: &Uuid) -> Option<ChatMessage> {
        self.messages.get(id).map(|m| m.clone())
    }
}

impl ChatMessageRepository for MemoryMessages {
    async fn save_message(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
        self.messages.insert(message.id, message.clone());
        Ok(())
    }

    async fn update_message(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
        match self.messages.get_mut(&message.id) {
            Some(mut existing) => {
                *existing = message.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn fold_messages(&self, summary: &ChatMessage, folded: &[Uuid]) -> Result<(), RepositoryError> {
        if !folded.iter().all(|id| self.messages.contains_key(id)) {
            return Err(RepositoryError::NotFound);
        }
        self.messages.insert(summary.id, summary.clone());
        for id in folded {
            if let Some(mut message) = self.messages.get_mut(id) {
                message.summarized_by = Some(summary.id);
            }
        }
        Ok(())
    }

    async fn delete_message(&self, message_id: &Uuid) -> Result<(), RepositoryError> {
        self.messages.remove(message_id);
        Ok(())
    }

    async fn delete_messages(&self, chat_id: &Uuid) -> Result<(), RepositoryError> {
        self.messages.retain(|_, m| m.chat_id != *chat_id);
        Ok(())
    }

    async fn get_messages(&self, chat_id: &Uuid) -> Result<Vec<ChatMessage>, RepositoryError> {
        let mut messages: Vec<ChatMessage> = self
            .messages
            .iter()
            .filter(|m| m.chat_id == *chat_id && m.summarized_by.is_none())
            .map(|m| m.clone())
            .collect();
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }
}
