//! Backends and harness for driving a whole session over a channel tunnel.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chorus_core::chat::{ChatSession, ChatSessionParams};
use chorus_core::repository::ChatMessageRepository;
use chorus_core::service::backend::{BackendService, ServiceInit};
use chorus_core::service::{
    ActionInferenceService, BoxActionInference, BoxSpeechToText, BoxSummarization, BoxTextGen,
    BoxTextToSpeech, SessionServices, SpeechRecognitionObserver, SpeechSink, SpeechToTextService,
    SummarizationService, TextGenService, TextToSpeechService,
};
use chorus_core::speech::{PendingSpeechTable, SpeechOutput};
use chorus_core::tunnel::{BoxTunnel, ChannelClient, ChannelTunnel};
use chorus_types::character::{CharacterSnapshot, UserSnapshot};
use chorus_types::chat::{Chat, ChatMessage};
use chorus_types::config::ChatConfig;
use chorus_types::error::{RepositoryError, ServiceError};
use chorus_types::llm::Prompt;
use chorus_types::protocol::{ClientMessage, ServerMessage};
use chorus_types::session::ChatSessionData;
use chorus_types::speech::{SpeechRequest, Voice};
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub const WAIT: Duration = Duration::from_secs(2);

fn words(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

#[derive(Default)]
pub struct Disposals(AtomicUsize);

impl Disposals {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Replies from a script, then echoes the last user message.
pub struct ScriptedLlm {
    pub replies: Mutex<VecDeque<String>>,
    pub delay: Duration,
    pub trigger: u32,
    pub calls: Arc<AtomicUsize>,
    /// The next this many calls fail with a backend error.
    pub failures: Arc<AtomicUsize>,
    pub disposals: Arc<Disposals>,
}

impl ScriptedLlm {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            delay: Duration::ZERO,
            trigger: 10_000,
            calls: Arc::new(AtomicUsize::new(0)),
            failures: Arc::new(AtomicUsize::new(0)),
            disposals: Arc::new(Disposals::default()),
        }
    }
}

impl BackendService for ScriptedLlm {
    fn service_name(&self) -> &str {
        "scripted-llm"
    }

    async fn initialize(&self, _: &ServiceInit, _: &CancellationToken) -> Result<bool, ServiceError> {
        Ok(true)
    }

    async fn dispose(&self) {
        self.disposals.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl TextGenService for ScriptedLlm {
    async fn generate_reply(
        &self,
        data: &ChatSessionData,
        cancel: &CancellationToken,
    ) -> Result<String, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::select! {
            _ = cancel.cancelled() => return Err(ServiceError::Cancelled),
            _ = tokio::time::sleep(self.delay) => {}
        }
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ServiceError::backend("scripted-llm", "boom"));
        }
        let scripted = self.replies.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or_else(|| {
            let last = data.messages.last().map(|m| m.text.as_str()).unwrap_or_default();
            format!("You said: {last}")
        }))
    }

    async fn generate(&self, prompt: &Prompt, _: &CancellationToken) -> Result<String, ServiceError> {
        Ok(prompt.to_text())
    }

    fn token_count(&self, text: &str) -> u32 {
        words(text)
    }

    fn summarization_trigger_tokens(&self) -> u32 {
        self.trigger
    }

    fn max_context_tokens(&self) -> u32 {
        2048
    }

    fn max_memory_tokens(&self) -> u32 {
        128
    }
}

pub struct EchoTts;

impl BackendService for EchoTts {
    fn service_name(&self) -> &str {
        "echo-tts"
    }

    async fn initialize(&self, _: &ServiceInit, _: &CancellationToken) -> Result<bool, ServiceError> {
        Ok(true)
    }
}

impl TextToSpeechService for EchoTts {
    async fn generate_speech(
        &self,
        request: &SpeechRequest,
        sink: &mut dyn SpeechSink,
        _: &CancellationToken,
    ) -> Result<(), ServiceError> {
        sink.write(request.text.as_bytes());
        Ok(())
    }

    async fn voices(&self, _: &CancellationToken) -> Result<Vec<Voice>, ServiceError> {
        Ok(Vec::new())
    }

    fn content_type(&self) -> &str {
        "audio/wav"
    }

    fn thinking_speech_lines(&self) -> Vec<String> {
        vec!["Let me think.".to_string()]
    }
}

/// Recognizer whose events are pushed by the test.
#[derive(Default)]
pub struct ManualStt {
    pub observer: Mutex<Option<Arc<dyn SpeechRecognitionObserver>>>,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
}

impl ManualStt {
    pub fn observer(&self) -> Arc<dyn SpeechRecognitionObserver> {
        self.observer.lock().unwrap().clone().expect("session subscribed")
    }
}

pub struct SharedStt(pub Arc<ManualStt>);

impl BackendService for SharedStt {
    fn service_name(&self) -> &str {
        "manual-stt"
    }

    async fn initialize(&self, _: &ServiceInit, _: &CancellationToken) -> Result<bool, ServiceError> {
        Ok(true)
    }
}

impl SpeechToTextService for SharedStt {
    fn subscribe(&self, observer: Arc<dyn SpeechRecognitionObserver>) {
        *self.0.observer.lock().unwrap() = Some(observer);
    }

    fn unsubscribe(&self) {
        *self.0.observer.lock().unwrap() = None;
    }

    async fn start_transcription(&self) -> Result<(), ServiceError> {
        self.0.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_transcription(&self) -> Result<(), ServiceError> {
        self.0.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FixedAction(pub &'static str);

impl BackendService for FixedAction {
    fn service_name(&self) -> &str {
        "fixed-action"
    }

    async fn initialize(&self, _: &ServiceInit, _: &CancellationToken) -> Result<bool, ServiceError> {
        Ok(true)
    }
}

impl ActionInferenceService for FixedAction {
    async fn select_action(
        &self,
        _: &ChatSessionData,
        _: &CancellationToken,
    ) -> Result<String, ServiceError> {
        Ok(self.0.to_string())
    }
}

pub struct FixedSummary {
    pub text: &'static str,
    pub digest: u32,
}

impl BackendService for FixedSummary {
    fn service_name(&self) -> &str {
        "fixed-summary"
    }

    async fn initialize(&self, _: &ServiceInit, _: &CancellationToken) -> Result<bool, ServiceError> {
        Ok(true)
    }
}

impl SummarizationService for FixedSummary {
    async fn summarize(
        &self,
        _: &ChatSessionData,
        _: &[ChatMessage],
        _: &CancellationToken,
    ) -> Result<String, ServiceError> {
        Ok(self.text.to_string())
    }

    fn digest_tokens(&self) -> u32 {
        self.digest
    }
}

#[derive(Default)]
pub struct MemoryRepo {
    pub messages: DashMap<Uuid, ChatMessage>,
}

impl MemoryRepo {
    /// Every stored message of the chat, summarized ones included, oldest first.
    pub fn all(&self, chat_id: Uuid) -> Vec<ChatMessage> {
        let mut all: Vec<ChatMessage> = self
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .map(|m| m.clone())
            .collect();
        all.sort_by_key(|m| m.timestamp);
        all
    }
}

impl ChatMessageRepository for MemoryRepo {
    async fn save_message(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
        self.messages.insert(message.id, message.clone());
        Ok(())
    }

    async fn update_message(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
        self.messages.insert(message.id, message.clone());
        Ok(())
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
        Ok(self
            .all(*chat_id)
            .into_iter()
            .filter(|m| m.summarized_by.is_none())
            .collect())
    }
}

pub fn character() -> CharacterSnapshot {
    CharacterSnapshot {
        id: Uuid::now_v7(),
        name: "Luna".to_string(),
        description: "{{char}} is a lighthouse keeper.".to_string(),
        personality: "calm".to_string(),
        scenario: String::new(),
        system_prompt: "You are {{char}}.".to_string(),
        post_history_instructions: None,
        culture: "en-US".to_string(),
        voice: Some("soft".to_string()),
        memories: Vec::new(),
    }
}

/// Builder for a session under test.
pub struct Harness {
    pub llm: ScriptedLlm,
    pub action: Option<FixedAction>,
    pub summary: Option<FixedSummary>,
    pub stt: Option<Arc<ManualStt>>,
    pub speech: bool,
    pub config: ChatConfig,
    pub history: Vec<ChatMessage>,
}

impl Harness {
    pub fn new(llm: ScriptedLlm) -> Self {
        Self {
            llm,
            action: None,
            summary: None,
            stt: None,
            speech: true,
            config: ChatConfig::default(),
            history: Vec::new(),
        }
    }

    pub async fn start(self) -> Running {
        let repo = Arc::new(MemoryRepo::default());
        for message in &self.history {
            repo.messages.insert(message.id, message.clone());
        }
        let disposals = Arc::clone(&self.llm.disposals);
        let character = character();
        let chat = match self.history.first() {
            Some(m) => Chat {
                id: m.chat_id,
                character_id: character.id,
                created_at: chrono::Utc::now(),
            },
            None => Chat::new(character.id),
        };
        let data = ChatSessionData::new(chat, UserSnapshot::default(), character, self.history);

        let speech_table = Arc::new(PendingSpeechTable::new());
        let mut services = SessionServices::new(BoxTextGen::new(self.llm));
        let speech_output = if self.speech {
            services = services.with_text_to_speech(BoxTextToSpeech::new(EchoTts));
            Some(SpeechOutput::Remote {
                table: Arc::clone(&speech_table),
                base_url: "http://chorus.test".to_string(),
            })
        } else {
            None
        };
        if let Some(stt) = &self.stt {
            services = services.with_speech_to_text(BoxSpeechToText::new(SharedStt(Arc::clone(stt))));
        }
        if let Some(action) = self.action {
            services = services.with_action_inference(BoxActionInference::new(action));
        }
        if let Some(summary) = self.summary {
            services = services.with_summarization(BoxSummarization::new(summary));
        }

        let (tunnel, client) = ChannelTunnel::pair();
        let session = ChatSession::start(ChatSessionParams {
            data,
            services,
            speech_output,
            content_type: "audio/wav".to_string(),
            repo: Arc::clone(&repo),
            tunnel: Arc::new(BoxTunnel::new(tunnel)),
            config: self.config,
        })
        .await
        .expect("session starts");
        let chat_id = session.chat_id();
        let session = Arc::new(session);
        let runner = {
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                let result = session.run().await;
                session.dispose().await;
                result.expect("session loop");
            })
        };
        Running {
            client,
            repo,
            chat_id,
            disposals,
            runner,
            session,
            speech_table,
        }
    }
}

pub struct Running {
    pub client: ChannelClient,
    pub repo: Arc<MemoryRepo>,
    pub chat_id: Uuid,
    pub disposals: Arc<Disposals>,
    pub runner: JoinHandle<()>,
    pub session: Arc<ChatSession<MemoryRepo>>,
    pub speech_table: Arc<PendingSpeechTable>,
}

impl Running {
    pub fn send(&self, text: &str) {
        self.client
            .to_session
            .send(ClientMessage::Send {
                text: text.to_string(),
                context: None,
                actions: None,
            })
            .unwrap();
    }

    pub fn send_message(&self, message: ClientMessage) {
        self.client.to_session.send(message).unwrap();
    }

    pub async fn next(&mut self) -> ServerMessage {
        tokio::time::timeout(WAIT, self.client.from_session.recv())
            .await
            .expect("server message in time")
            .expect("tunnel open")
    }

    /// Skip messages until the next reply and return its text.
    pub async fn next_reply(&mut self) -> String {
        loop {
            if let ServerMessage::Reply { text } = self.next().await {
                return text;
            }
        }
    }

    /// Collect every message that arrives before the channel goes quiet.
    pub async fn drain(&mut self, quiet: Duration) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(Some(message)) =
            tokio::time::timeout(quiet, self.client.from_session.recv()).await
        {
            messages.push(message);
        }
        messages
    }

    pub async fn stop(self) -> Arc<Disposals> {
        self.send_message(ClientMessage::StopChat);
        tokio::time::timeout(WAIT, self.runner)
            .await
            .expect("session stops in time")
            .expect("runner task");
        self.disposals
    }
}
