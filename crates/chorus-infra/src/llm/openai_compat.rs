//! Text generation and summarization over the OpenAI chat completions protocol.
//!
//! Works with any server that speaks `/chat/completions` (OpenAI, llama.cpp,
//! vLLM, Ollama, LM Studio). Settings come from the instance's `settings`
//! table in `config.toml`:
//!
//! ```toml
//! [[services]]
//! id = "0190d7a6-8c1e-7000-8000-000000000001"
//! service_name = "openai"
//! settings = { base_url = "http://localhost:8080/v1", model = "local", features = ["nsfw"] }
//! ```
//!
//! The API key is wrapped in [`secrecy::SecretString`] and is only exposed
//! when building the `Authorization` header.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use chorus_core::prompt::{PromptBudget, PromptBuilder};
use chorus_core::service::backend::{BackendService, ServiceInit, cancellable};
use chorus_core::service::registry::ServiceRegistry;
use chorus_core::service::summarization::SummarizationService;
use chorus_core::service::text_gen::TextGenService;
use chorus_types::chat::{ChatMessage, MessageRole};
use chorus_types::error::ServiceError;
use chorus_types::llm::{Prompt, PromptMessage};
use chorus_types::service::ServiceInstanceConfig;
use chorus_types::session::ChatSessionData;

/// Registered service name.
pub const SERVICE_NAME: &str = "openai";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Instance settings. Everything except `model` has a default.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiCompatSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: u32,
    #[serde(default = "default_max_memory_tokens")]
    pub max_memory_tokens: u32,
    #[serde(default = "default_max_reply_tokens")]
    pub max_reply_tokens: u32,
    #[serde(default = "default_summarization_trigger_tokens")]
    pub summarization_trigger_tokens: u32,
    #[serde(default = "default_digest_tokens")]
    pub digest_tokens: u32,
    /// Feature flags this endpoint supports.
    #[serde(default)]
    pub features: Vec<String>,
    /// Supported cultures (`"en"` matches `"en-US"`). Empty means any.
    #[serde(default)]
    pub cultures: Vec<String>,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_max_context_tokens() -> u32 {
    4096
}

fn default_max_memory_tokens() -> u32 {
    512
}

fn default_max_reply_tokens() -> u32 {
    300
}

fn default_summarization_trigger_tokens() -> u32 {
    3072
}

fn default_digest_tokens() -> u32 {
    2048
}

impl OpenAiCompatSettings {
    fn supports_culture(&self, culture: &str) -> bool {
        if self.cultures.is_empty() {
            return true;
        }
        let language = culture.split(['-', '_']).next().unwrap_or(culture);
        self.cultures
            .iter()
            .any(|c| c.eq_ignore_ascii_case(culture) || c.eq_ignore_ascii_case(language))
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatCompletionMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatCompletionMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionContent,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionContent {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiCompatService {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    settings: OpenAiCompatSettings,
}

impl OpenAiCompatService {
    pub fn new(settings: OpenAiCompatSettings) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ServiceError::backend(SERVICE_NAME, format!("HTTP client: {e}")))?;
        let api_key = settings.api_key.clone().map(SecretString::from);
        Ok(Self {
            client,
            api_key,
            settings,
        })
    }

    /// Factory used by the service registry.
    pub fn from_config(config: &ServiceInstanceConfig) -> Result<Self, ServiceError> {
        let settings: OpenAiCompatSettings = serde_json::from_value(config.settings.clone())
            .map_err(|e| {
                ServiceError::backend(&config.service_name, format!("invalid settings: {e}"))
            })?;
        Self::new(settings)
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'))
    }

    fn request_body<'a>(&'a self, prompt: &'a Prompt) -> ChatCompletionRequest<'a> {
        let mut messages = Vec::with_capacity(prompt.messages.len() + 2);
        if !prompt.system.is_empty() {
            messages.push(ChatCompletionMessage {
                role: "system",
                content: &prompt.system,
            });
        }
        messages.extend(prompt.messages.iter().map(|m| ChatCompletionMessage {
            role: role_name(m.role),
            content: &m.content,
        }));
        if let Some(post) = &prompt.post_history {
            messages.push(ChatCompletionMessage {
                role: "system",
                content: post,
            });
        }
        ChatCompletionRequest {
            model: &self.settings.model,
            messages,
            max_tokens: self.settings.max_reply_tokens,
        }
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String, ServiceError> {
        let url = self.url();
        tracing::debug!(url = %url, model = %self.settings.model, tokens = prompt.token_count, "chat completion request");

        let mut request = self.client.post(&url).json(&self.request_body(prompt));
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key.expose_secret()));
        }
        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::backend(SERVICE_NAME, format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %error_body, url = %url, "chat completion error response");
            return Err(ServiceError::backend(
                SERVICE_NAME,
                format!("HTTP {status}: {error_body}"),
            ));
        }

        let body: ChatCompletionResponse = response.json().await.map_err(|e| {
            ServiceError::backend(SERVICE_NAME, format!("failed to parse response: {e}"))
        })?;
        Ok(body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}

fn role_name(role: MessageRole) -> &'static str {
    match role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
    }
}

/// Register the backend for text generation and summarization.
pub fn register(registry: &mut ServiceRegistry) {
    registry.register_text_gen(SERVICE_NAME, OpenAiCompatService::from_config);
    registry.register_summarization(SERVICE_NAME, OpenAiCompatService::from_config);
}

impl BackendService for OpenAiCompatService {
    fn service_name(&self) -> &str {
        SERVICE_NAME
    }

    async fn initialize(
        &self,
        init: &ServiceInit,
        _cancel: &CancellationToken,
    ) -> Result<bool, ServiceError> {
        let missing: Vec<&String> = init
            .prerequisites
            .features
            .iter()
            .filter(|f| !self.settings.features.contains(f))
            .collect();
        if !missing.is_empty() {
            tracing::debug!(?missing, model = %self.settings.model, "missing required features");
            return Ok(false);
        }
        if !self.settings.supports_culture(&init.culture) {
            tracing::debug!(culture = %init.culture, model = %self.settings.model, "unsupported culture");
            return Ok(false);
        }
        Ok(true)
    }
}

impl TextGenService for OpenAiCompatService {
    #[tracing::instrument(name = "generate_reply", skip_all, fields(chat_id = %data.chat.id, model = %self.settings.model))]
    async fn generate_reply(
        &self,
        data: &ChatSessionData,
        cancel: &CancellationToken,
    ) -> Result<String, ServiceError> {
        let prompt = PromptBuilder::new(
            PromptBudget {
                max_context_tokens: self.settings.max_context_tokens,
                max_memory_tokens: self.settings.max_memory_tokens,
            },
            |text: &str| self.token_count(text),
        )
        .build(data);
        self.generate(&prompt, cancel).await
    }

    async fn generate(
        &self,
        prompt: &Prompt,
        cancel: &CancellationToken,
    ) -> Result<String, ServiceError> {
        cancellable(cancel, self.complete(prompt)).await
    }

    /// Approximation: one token per four characters.
    fn token_count(&self, text: &str) -> u32 {
        u32::try_from(text.chars().count().div_ceil(4)).unwrap_or(u32::MAX)
    }

    fn summarization_trigger_tokens(&self) -> u32 {
        self.settings.summarization_trigger_tokens
    }

    fn max_context_tokens(&self) -> u32 {
        self.settings.max_context_tokens
    }

    fn max_memory_tokens(&self) -> u32 {
        self.settings.max_memory_tokens
    }
}

impl SummarizationService for OpenAiCompatService {
    #[tracing::instrument(name = "summarize", skip_all, fields(chat_id = %data.chat.id, messages = messages.len()))]
    async fn summarize(
        &self,
        data: &ChatSessionData,
        messages: &[ChatMessage],
        cancel: &CancellationToken,
    ) -> Result<String, ServiceError> {
        let prompt = summary_prompt(data, messages);
        cancellable(cancel, self.complete(&prompt)).await
    }

    fn digest_tokens(&self) -> u32 {
        self.settings.digest_tokens
    }
}

fn summary_prompt(data: &ChatSessionData, messages: &[ChatMessage]) -> Prompt {
    let user = &data.user.name;
    let character = &data.character.name;
    let transcript = messages
        .iter()
        .map(|m| {
            let speaker = match m.role {
                MessageRole::User => user.as_str(),
                MessageRole::Assistant => character.as_str(),
                MessageRole::System => "Narrator",
            };
            format!("{speaker}: {}", m.text)
        })
        .collect::<Vec<_>>()
        .join("\n");
    Prompt {
        system: format!(
            "Summarize the conversation between {user} and {character} in a few sentences, \
             in the past tense. Keep names, facts, and promises."
        ),
        post_history: None,
        messages: vec![PromptMessage {
            role: MessageRole::User,
            content: transcript,
        }],
        token_count: 0,
    }
}
