//! Backend service ports, the service registry, and best-match resolution.

pub mod action;
pub mod backend;
pub mod registry;
pub mod resolver;
pub mod speech_to_text;
pub mod summarization;
pub mod text_gen;
pub mod text_to_speech;

pub use action::{ActionInferenceService, BoxActionInference};
pub use backend::{BackendService, ServiceInit};
pub use registry::{RegisteredService, ServiceRegistry};
pub use resolver::{Resolved, ServiceResolver, SessionServices};
pub use speech_to_text::{BoxSpeechToText, SpeechRecognitionObserver, SpeechToTextService};
pub use summarization::{BoxSummarization, SummarizationService};
pub use text_gen::{BoxTextGen, TextGenService};
pub use text_to_speech::{BoxTextToSpeech, SpeechSink, TextToSpeechService};
