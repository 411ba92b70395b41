//! Remote speech generation: register now, synthesize on fetch.
//!
//! The session only registers a pending entry and hands the client a URL.
//! Synthesis happens when the client fetches that URL; the entry is removed
//! by the fetch, so each id can be rendered at most once. Entries a session
//! registered but the client never fetched are released when the session is
//! disposed.

use std::sync::Arc;

use chorus_types::error::SpeechError;
use chorus_types::speech::SpeechRequest;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use super::store::AudioConverter;
use crate::service::text_to_speech::BoxTextToSpeech;

/// A registered, not yet rendered, synthesis request.
pub struct PendingSpeechEntry {
    /// Generator that registered the entry.
    pub owner: Uuid,
    pub service: Arc<BoxTextToSpeech>,
    pub request: SpeechRequest,
}

/// Audio produced for a fetched entry.
#[derive(Debug)]
pub struct RenderedSpeech {
    pub audio: Vec<u8>,
    pub content_type: String,
    pub reusable: bool,
}

/// Pending entries shared by every session of the server.
#[derive(Default)]
pub struct PendingSpeechTable {
    entries: DashMap<String, PendingSpeechEntry>,
}

impl PendingSpeechTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an entry under a fresh id.
    pub fn register(&self, entry: PendingSpeechEntry) -> String {
        let id = Uuid::now_v7().simple().to_string();
        self.entries.insert(id.clone(), entry);
        id
    }

    /// Remove and return the entry. A second call for the same id is `None`.
    pub fn take(&self, id: &str) -> Option<PendingSpeechEntry> {
        self.entries.remove(id).map(|(_, entry)| entry)
    }

    /// Drop every entry registered by `owner`. Returns how many were dropped.
    pub fn release_owner(&self, owner: &Uuid) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.owner != *owner);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consume the entry for `id` and synthesize it.
    pub async fn render(
        &self,
        id: &str,
        converter: &dyn AudioConverter,
        cancel: &CancellationToken,
    ) -> Result<RenderedSpeech, SpeechError> {
        let entry = self
            .take(id)
            .ok_or_else(|| SpeechError::NotFound(id.to_string()))?;
        debug!(id, service = entry.service.service_name(), "rendering pending speech");

        let mut audio = Vec::new();
        entry
            .service
            .generate_speech(&entry.request, &mut audio, cancel)
            .await?;

        let native = entry.service.content_type();
        let content_type = entry.request.content_type.clone();
        if native != content_type {
            audio = converter.convert(audio, native, &content_type)?;
        }
        Ok(RenderedSpeech {
            audio,
            content_type,
            reusable: entry.request.reusable,
        })
    }
}

pub struct RemoteSpeechGenerator {
    owner: Uuid,
    tts: Arc<BoxTextToSpeech>,
    table: Arc<PendingSpeechTable>,
    base_url: String,
}

impl RemoteSpeechGenerator {
    pub fn new(tts: Arc<BoxTextToSpeech>, table: Arc<PendingSpeechTable>, base_url: impl Into<String>) -> Self {
        Self {
            owner: Uuid::now_v7(),
            tts,
            table,
            base_url: base_url.into(),
        }
    }

    /// Drop the entries this generator registered that were never fetched.
    pub fn release(&self) -> usize {
        self.table.release_owner(&self.owner)
    }

    pub fn generate(&self, request: &SpeechRequest) -> String {
        let id = self.table.register(PendingSpeechEntry {
            owner: self.owner,
            service: Arc::clone(&self.tts),
            request: request.clone(),
        });
        format!("{}/speech/remote/{id}", self.base_url.trim_end_matches('/'))
    }
}
