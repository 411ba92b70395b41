//! Service registry for runtime backend construction.
//!
//! Maps a service name to a factory per capability. The resolver looks up
//! a configured instance's `service_name` here and calls the factory with
//! the instance settings.

use std::collections::HashMap;
use std::sync::Arc;

use chorus_types::error::ServiceError;
use chorus_types::service::{ServiceCategory, ServiceInstanceConfig};
use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use super::action::{ActionInferenceService, BoxActionInference};
use super::backend::ServiceInit;
use super::speech_to_text::{BoxSpeechToText, SpeechToTextService};
use super::summarization::{BoxSummarization, SummarizationService};
use super::text_gen::{BoxTextGen, TextGenService};
use super::text_to_speech::{BoxTextToSpeech, TextToSpeechService};

/// Builds a backend from its instance configuration.
pub type ServiceFactory<S> =
    Arc<dyn Fn(&ServiceInstanceConfig) -> Result<S, ServiceError> + Send + Sync>;

/// Name-indexed factories, one table per capability.
#[derive(Default)]
pub struct ServiceRegistry {
    text_gen: HashMap<String, ServiceFactory<BoxTextGen>>,
    text_to_speech: HashMap<String, ServiceFactory<BoxTextToSpeech>>,
    speech_to_text: HashMap<String, ServiceFactory<BoxSpeechToText>>,
    action_inference: HashMap<String, ServiceFactory<BoxActionInference>>,
    summarization: HashMap<String, ServiceFactory<BoxSummarization>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a text generation factory. Replaces an existing one.
    pub fn register_text_gen<T, F>(&mut self, name: impl Into<String>, factory: F)
    where
        T: TextGenService + 'static,
        F: Fn(&ServiceInstanceConfig) -> Result<T, ServiceError> + Send + Sync + 'static,
    {
        self.text_gen
            .insert(name.into(), Arc::new(move |cfg| factory(cfg).map(BoxTextGen::new)));
    }

    pub fn register_text_to_speech<T, F>(&mut self, name: impl Into<String>, factory: F)
    where
        T: TextToSpeechService + 'static,
        F: Fn(&ServiceInstanceConfig) -> Result<T, ServiceError> + Send + Sync + 'static,
    {
        self.text_to_speech.insert(
            name.into(),
            Arc::new(move |cfg| factory(cfg).map(BoxTextToSpeech::new)),
        );
    }

    pub fn register_speech_to_text<T, F>(&mut self, name: impl Into<String>, factory: F)
    where
        T: SpeechToTextService + 'static,
        F: Fn(&ServiceInstanceConfig) -> Result<T, ServiceError> + Send + Sync + 'static,
    {
        self.speech_to_text.insert(
            name.into(),
            Arc::new(move |cfg| factory(cfg).map(BoxSpeechToText::new)),
        );
    }

    pub fn register_action_inference<T, F>(&mut self, name: impl Into<String>, factory: F)
    where
        T: ActionInferenceService + 'static,
        F: Fn(&ServiceInstanceConfig) -> Result<T, ServiceError> + Send + Sync + 'static,
    {
        self.action_inference.insert(
            name.into(),
            Arc::new(move |cfg| factory(cfg).map(BoxActionInference::new)),
        );
    }

    pub fn register_summarization<T, F>(&mut self, name: impl Into<String>, factory: F)
    where
        T: SummarizationService + 'static,
        F: Fn(&ServiceInstanceConfig) -> Result<T, ServiceError> + Send + Sync + 'static,
    {
        self.summarization.insert(
            name.into(),
            Arc::new(move |cfg| factory(cfg).map(BoxSummarization::new)),
        );
    }

    /// Factory for `name` in the capability table of `S`.
    pub fn factory<S: RegisteredService>(&self, name: &str) -> Option<&ServiceFactory<S>> {
        S::factories(self).get(name)
    }

    /// Registered names for a capability, sorted.
    pub fn names(&self, category: ServiceCategory) -> Vec<&str> {
        let mut names: Vec<&str> = match category {
            ServiceCategory::TextGen => self.text_gen.keys().map(String::as_str).collect(),
            ServiceCategory::TextToSpeech => {
                self.text_to_speech.keys().map(String::as_str).collect()
            }
            ServiceCategory::SpeechToText => {
                self.speech_to_text.keys().map(String::as_str).collect()
            }
            ServiceCategory::ActionInference => {
                self.action_inference.keys().map(String::as_str).collect()
            }
            ServiceCategory::Summarization => {
                self.summarization.keys().map(String::as_str).collect()
            }
        };
        names.sort_unstable();
        names
    }
}

/// A boxed backend the resolver can construct, initialize, and dispose
/// without knowing its capability.
pub trait RegisteredService: Send + Sync + Sized + 'static {
    const CATEGORY: ServiceCategory;

    fn factories(registry: &ServiceRegistry) -> &HashMap<String, ServiceFactory<Self>>;

    fn service_name(&self) -> &str;

    fn initialize<'a>(
        &'a self,
        init: &'a ServiceInit,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<bool, ServiceError>>;

    fn dispose(&self) -> BoxFuture<'_, ()>;
}

macro_rules! registered_service {
    ($ty:ty, $category:expr, $field:ident) => {
        impl RegisteredService for $ty {
            const CATEGORY: ServiceCategory = $category;

            fn factories(registry: &ServiceRegistry) -> &HashMap<String, ServiceFactory<Self>> {
                &registry.$field
            }

            fn service_name(&self) -> &str {
                <$ty>::service_name(self)
            }

            fn initialize<'a>(
                &'a self,
                init: &'a ServiceInit,
                cancel: &'a CancellationToken,
            ) -> BoxFuture<'a, Result<bool, ServiceError>> {
                Box::pin(<$ty>::initialize(self, init, cancel))
            }

            fn dispose(&self) -> BoxFuture<'_, ()> {
                Box::pin(<$ty>::dispose(self))
            }
        }
    };
}

registered_service!(BoxTextGen, ServiceCategory::TextGen, text_gen);
registered_service!(BoxTextToSpeech, ServiceCategory::TextToSpeech, text_to_speech);
registered_service!(BoxSpeechToText, ServiceCategory::SpeechToText, speech_to_text);
registered_service!(BoxActionInference, ServiceCategory::ActionInference, action_inference);
registered_service!(BoxSummarization, ServiceCategory::Summarization, summarization);
