//! Speech coordination: turn a line of text into a URL the client can play.
//!
//! The strategy is chosen once per session:
//! - no text-to-speech backend or no voice: never produces a URL
//! - local: synthesize into a served file, reusing content-addressed clips
//! - remote: register a pending entry rendered when the client fetches it

pub mod local;
pub mod remote;
pub mod store;

use std::sync::Arc;

use chorus_types::error::SpeechError;
use chorus_types::speech::SpeechRequest;
use tokio_util::sync::CancellationToken;

pub use local::LocalSpeechGenerator;
pub use remote::{PendingSpeechEntry, PendingSpeechTable, RemoteSpeechGenerator, RenderedSpeech};
pub use store::{AudioConverter, ContentHasher, SpeechFileStore};

use crate::service::text_to_speech::BoxTextToSpeech;

/// Server-wide speech output chosen from configuration.
#[derive(Clone)]
pub enum SpeechOutput {
    Local {
        store: Arc<dyn SpeechFileStore>,
        converter: Arc<dyn AudioConverter>,
        hasher: Arc<dyn ContentHasher>,
    },
    Remote {
        table: Arc<PendingSpeechTable>,
        base_url: String,
    },
}

enum SpeechGenerator {
    None,
    Local(LocalSpeechGenerator),
    Remote(RemoteSpeechGenerator),
}

/// Per-session speech front end.
pub struct SpeechCoordinator {
    generator: SpeechGenerator,
    voice: String,
    culture: String,
    content_type: String,
}

impl SpeechCoordinator {
    /// Coordinator that never produces speech.
    pub fn disabled() -> Self {
        Self {
            generator: SpeechGenerator::None,
            voice: String::new(),
            culture: String::new(),
            content_type: String::new(),
        }
    }

    /// Build the coordinator for one session. Without a backend or a voice
    /// the coordinator is disabled.
    pub fn for_session(
        output: &SpeechOutput,
        tts: Option<Arc<BoxTextToSpeech>>,
        voice: Option<String>,
        culture: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        let (Some(tts), Some(voice)) = (tts, voice) else {
            return Self::disabled();
        };
        let generator = match output {
            SpeechOutput::Local {
                store,
                converter,
                hasher,
            } => SpeechGenerator::Local(LocalSpeechGenerator::new(
                tts,
                Arc::clone(store),
                Arc::clone(converter),
                Arc::clone(hasher),
            )),
            SpeechOutput::Remote { table, base_url } => SpeechGenerator::Remote(
                RemoteSpeechGenerator::new(tts, Arc::clone(table), base_url.clone()),
            ),
        };
        Self {
            generator,
            voice,
            culture: culture.into(),
            content_type: content_type.into(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self.generator, SpeechGenerator::None)
    }

    /// Release speech resources the client never claimed. Returns the number
    /// of pending remote entries dropped.
    pub fn release(&self) -> usize {
        match &self.generator {
            SpeechGenerator::Remote(remote) => remote.release(),
            SpeechGenerator::None | SpeechGenerator::Local(_) => 0,
        }
    }

    /// URL for `text` spoken in the session's voice, or `None` when speech is
    /// disabled.
    pub async fn create_speech(
        &self,
        text: &str,
        reusable: bool,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, SpeechError> {
        let request = SpeechRequest {
            text: text.to_string(),
            voice: self.voice.clone(),
            culture: self.culture.clone(),
            content_type: self.content_type.clone(),
            reusable,
        };
        match &self.generator {
            SpeechGenerator::None => Ok(None),
            SpeechGenerator::Local(local) => local.generate(&request, cancel).await.map(Some),
            SpeechGenerator::Remote(remote) => Ok(Some(remote.generate(&request))),
        }
    }
}
