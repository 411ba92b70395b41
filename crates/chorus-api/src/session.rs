//! Connection lifecycle: bootstrap a chat, run its session, dispose it.
//!
//! A connection starts without a session. `startChat`, `newChat`, and
//! `resumeChat` pick the chat and its character, resolve the backends, and
//! start a [`ChatSession`]. When the session ends with `stopChat` the
//! connection may bootstrap another chat.

use std::sync::Arc;

use chorus_core::chat::{ChatSession, ChatSessionParams};
use chorus_core::repository::{ChatMessageRepository, ChatRepository};
use chorus_core::service::ServiceInit;
use chorus_core::tunnel::BoxTunnel;
use chorus_infra::sqlite::SqliteChatMessageRepository;
use chorus_types::character::{CharacterSnapshot, UserSnapshot};
use chorus_types::chat::Chat;
use chorus_types::error::{RepositoryError, SessionError};
use chorus_types::protocol::{ClientMessage, ServerMessage};
use chorus_types::session::ChatSessionData;
use uuid::Uuid;

use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("Unknown character {0}")]
    UnknownCharacter(Uuid),

    #[error("Chat {0} not found")]
    ChatNotFound(Uuid),

    #[error("Could not load the chat")]
    Repository(#[from] RepositoryError),

    #[error("Could not start the chat")]
    Session(#[from] SessionError),
}

impl BootstrapError {
    fn to_message(&self) -> ServerMessage {
        let details = match self {
            BootstrapError::Repository(e) => Some(e.to_string()),
            BootstrapError::Session(e) => Some(e.to_string()),
            _ => None,
        };
        ServerMessage::error(self.to_string(), details)
    }
}

/// Which chat a bootstrap message asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatRequest {
    /// Most recent chat with the character, created when there is none.
    Latest { character_id: Uuid, user_name: Option<String> },
    New { character_id: Uuid, user_name: Option<String> },
    Resume { chat_id: Uuid, user_name: Option<String> },
}

impl ChatRequest {
    /// Bootstrap request carried by `message`, or the message itself when it
    /// is not a bootstrap message.
    pub fn from_message(message: ClientMessage) -> Result<Self, ClientMessage> {
        match message {
            ClientMessage::StartChat {
                character_id,
                user_name,
            } => Ok(ChatRequest::Latest {
                character_id,
                user_name,
            }),
            ClientMessage::NewChat {
                character_id,
                user_name,
            } => Ok(ChatRequest::New {
                character_id,
                user_name,
            }),
            ClientMessage::ResumeChat { chat_id, user_name } => {
                Ok(ChatRequest::Resume { chat_id, user_name })
            }
            other => Err(other),
        }
    }
}

/// Serve one client connection until it disconnects or the server stops.
pub async fn serve_connection(state: AppState, tunnel: Arc<BoxTunnel>) {
    let cancel = state.shutdown.child_token();
    loop {
        let message = match tunnel.receive(&cancel).await {
            Ok(Some(message)) => message,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "connection receive failed");
                break;
            }
        };

        let reply = match ChatRequest::from_message(message) {
            Ok(request) => match start_session(&state, request, Arc::clone(&tunnel)).await {
                Ok(session) => {
                    run_session(&state, &session).await;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "chat bootstrap failed");
                    e.to_message()
                }
            },
            Err(ClientMessage::StopChat) => continue,
            Err(message) => {
                tracing::debug!(?message, "message before a chat was started");
                ServerMessage::error("No chat is running", None)
            }
        };
        if tunnel.send(reply, &cancel).await.is_err() {
            break;
        }
    }
    tracing::debug!("connection closed");
}

async fn run_session(state: &AppState, session: &ChatSession<SqliteChatMessageRepository>) {
    tokio::select! {
        _ = state.shutdown.cancelled() => {
            tracing::info!(chat_id = %session.chat_id(), "server shutting down, ending chat");
        }
        result = session.run() => {
            if let Err(e) = result {
                tracing::warn!(chat_id = %session.chat_id(), error = %e, "chat session ended with an error");
            }
        }
    }
    session.dispose().await;
}

#[tracing::instrument(name = "bootstrap_chat", skip_all)]
async fn start_session(
    state: &AppState,
    request: ChatRequest,
    tunnel: Arc<BoxTunnel>,
) -> Result<ChatSession<SqliteChatMessageRepository>, BootstrapError> {
    let data = load_session_data(state, request).await?;

    let init = ServiceInit::new(
        state.config.profile.prerequisites.clone(),
        data.character.culture.clone(),
    );
    let services = state
        .resolver
        .resolve_session(&state.config.profile, &init, &state.shutdown)
        .await
        .map_err(SessionError::from)?;

    let session = ChatSession::start(ChatSessionParams {
        data,
        services,
        speech_output: Some(state.speech_output.clone()),
        content_type: state.config.speech.content_type.clone(),
        repo: Arc::clone(&state.messages),
        tunnel,
        config: state.config.chat.clone(),
    })
    .await?;
    Ok(session)
}

/// Pick or create the requested chat and load its history.
pub async fn load_session_data(
    state: &AppState,
    request: ChatRequest,
) -> Result<ChatSessionData, BootstrapError> {
    let (chat, character, user_name) = match request {
        ChatRequest::Latest {
            character_id,
            user_name,
        } => {
            let character = find_character(state, character_id)?;
            let latest = state.chats.list_chats(&character_id).await?.into_iter().next();
            let chat = match latest {
                Some(chat) => chat,
                None => create_chat(state, character_id).await?,
            };
            (chat, character, user_name)
        }
        ChatRequest::New {
            character_id,
            user_name,
        } => {
            let character = find_character(state, character_id)?;
            (create_chat(state, character_id).await?, character, user_name)
        }
        ChatRequest::Resume { chat_id, user_name } => {
            let chat = state
                .chats
                .get_chat(&chat_id)
                .await?
                .ok_or(BootstrapError::ChatNotFound(chat_id))?;
            let character = find_character(state, chat.character_id)?;
            (chat, character, user_name)
        }
    };

    let messages = state.messages.get_messages(&chat.id).await?;
    tracing::info!(chat_id = %chat.id, character = %character.name, messages = messages.len(), "chat loaded");

    let user = match user_name.filter(|n| !n.trim().is_empty()) {
        Some(name) => UserSnapshot { name },
        None => UserSnapshot::default(),
    };
    Ok(ChatSessionData::new(chat, user, character, messages))
}

fn find_character(state: &AppState, id: Uuid) -> Result<CharacterSnapshot, BootstrapError> {
    state
        .config
        .characters
        .iter()
        .find(|c| c.id == id)
        .cloned()
        .ok_or(BootstrapError::UnknownCharacter(id))
}

async fn create_chat(state: &AppState, character_id: Uuid) -> Result<Chat, BootstrapError> {
    let chat = Chat::new(character_id);
    state.chats.save_chat(&chat).await?;
    tracing::info!(chat_id = %chat.id, %character_id, "chat created");
    Ok(chat)
}
