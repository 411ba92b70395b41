//! Local speech generation: synthesize eagerly into served files.

use std::sync::Arc;

use chorus_types::error::SpeechError;
use chorus_types::speech::{SpeechRequest, extension_for};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use super::store::{AudioConverter, ContentHasher, SpeechFileStore};
use crate::service::text_to_speech::BoxTextToSpeech;

pub struct LocalSpeechGenerator {
    tts: Arc<BoxTextToSpeech>,
    store: Arc<dyn SpeechFileStore>,
    converter: Arc<dyn AudioConverter>,
    hasher: Arc<dyn ContentHasher>,
}

impl LocalSpeechGenerator {
    pub fn new(
        tts: Arc<BoxTextToSpeech>,
        store: Arc<dyn SpeechFileStore>,
        converter: Arc<dyn AudioConverter>,
        hasher: Arc<dyn ContentHasher>,
    ) -> Self {
        Self {
            tts,
            store,
            converter,
            hasher,
        }
    }

    /// File name for a request: content-addressed for reusable clips, random
    /// otherwise.
    pub fn file_name(&self, request: &SpeechRequest) -> String {
        let id = if request.reusable {
            self.hasher
                .compute_hash(&format!("{}\n{}", request.voice, request.text))
        } else {
            Uuid::now_v7().simple().to_string()
        };
        format!("{id}.{}", extension_for(&request.content_type))
    }

    pub async fn generate(
        &self,
        request: &SpeechRequest,
        cancel: &CancellationToken,
    ) -> Result<String, SpeechError> {
        let file = self.file_name(request);
        if self.store.exists(&file).await {
            debug!(file, "reusing speech clip");
            if request.reusable {
                self.store.retain(&file);
            }
            return Ok(self.store.url_for(&file));
        }
        if !request.reusable {
            self.store.schedule_deletion(&file);
        }

        let mut audio = Vec::new();
        self.tts.generate_speech(request, &mut audio, cancel).await?;

        let native = self.tts.content_type();
        if native != request.content_type {
            audio = self
                .converter
                .convert(audio, native, &request.content_type)?;
        }
        self.store.write(&file, audio).await?;
        Ok(self.store.url_for(&file))
    }
}
