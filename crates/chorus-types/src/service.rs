//! Backend service references, priority lists, and instance configuration.
//!
//! A profile holds one priority-ordered [`ServicesList`] per capability. The
//! order of the list is the fallback order used by best-match resolution.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Capability a backend provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    TextGen,
    TextToSpeech,
    SpeechToText,
    ActionInference,
    Summarization,
}

impl fmt::Display for ServiceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceCategory::TextGen => write!(f, "text_gen"),
            ServiceCategory::TextToSpeech => write!(f, "text_to_speech"),
            ServiceCategory::SpeechToText => write!(f, "speech_to_text"),
            ServiceCategory::ActionInference => write!(f, "action_inference"),
            ServiceCategory::Summarization => write!(f, "summarization"),
        }
    }
}

impl FromStr for ServiceCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text_gen" => Ok(ServiceCategory::TextGen),
            "text_to_speech" => Ok(ServiceCategory::TextToSpeech),
            "speech_to_text" => Ok(ServiceCategory::SpeechToText),
            "action_inference" => Ok(ServiceCategory::ActionInference),
            "summarization" => Ok(ServiceCategory::Summarization),
            other => Err(format!("invalid service category: '{other}'")),
        }
    }
}

/// A named backend reference, optionally pinned to one configured instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLink {
    pub service_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<Uuid>,
}

impl ServiceLink {
    pub fn named(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            service_id: None,
        }
    }
}

impl fmt::Display for ServiceLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.service_id {
            Some(id) => write!(f, "{} ({id})", self.service_name),
            None => write!(f, "{}", self.service_name),
        }
    }
}

/// Priority-ordered list of backend references for one capability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServicesList {
    pub services: Vec<ServiceLink>,
}

impl ServicesList {
    pub fn new(services: Vec<ServiceLink>) -> Self {
        Self { services }
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Requirements a backend must satisfy to be selected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prerequisites {
    /// Feature flags the backend must support (e.g. `"nsfw"`, `"streaming"`).
    #[serde(default)]
    pub features: Vec<String>,
}

impl fmt::Display for Prerequisites {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.features.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", self.features.join(", "))
        }
    }
}

/// A configured backend instance.
///
/// `settings` is opaque to the core and handed to the registered factory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInstanceConfig {
    pub id: Uuid,
    pub service_name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub settings: serde_json::Value,
}

fn default_enabled() -> bool {
    true
}

/// Per-capability priority lists plus optional preferred overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceProfile {
    pub text_gen: ServicesList,
    pub text_to_speech: ServicesList,
    pub speech_to_text: ServicesList,
    pub action_inference: ServicesList,
    pub summarization: ServicesList,
    pub preferred: PreferredServices,
    /// Features every backend of a session must support.
    pub prerequisites: Prerequisites,
}

impl ServiceProfile {
    /// Priority list for a capability.
    pub fn list(&self, category: ServiceCategory) -> &ServicesList {
        match category {
            ServiceCategory::TextGen => &self.text_gen,
            ServiceCategory::TextToSpeech => &self.text_to_speech,
            ServiceCategory::SpeechToText => &self.speech_to_text,
            ServiceCategory::ActionInference => &self.action_inference,
            ServiceCategory::Summarization => &self.summarization,
        }
    }
}

/// Explicit per-capability overrides. When set, resolution tries only this link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferredServices {
    pub text_gen: Option<ServiceLink>,
    pub text_to_speech: Option<ServiceLink>,
    pub speech_to_text: Option<ServiceLink>,
    pub action_inference: Option<ServiceLink>,
    pub summarization: Option<ServiceLink>,
}

impl PreferredServices {
    pub fn get(&self, category: ServiceCategory) -> Option<&ServiceLink> {
        match category {
            ServiceCategory::TextGen => self.text_gen.as_ref(),
            ServiceCategory::TextToSpeech => self.text_to_speech.as_ref(),
            ServiceCategory::SpeechToText => self.speech_to_text.as_ref(),
            ServiceCategory::ActionInference => self.action_inference.as_ref(),
            ServiceCategory::Summarization => self.summarization.as_ref(),
        }
    }
}
