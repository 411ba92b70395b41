//! Character, user, and memory types.
//!
//! A session works on snapshots: the character and user are copied when the
//! session starts and `{{char}}` / `{{user}}` placeholders are substituted
//! once, so the reply pipeline never sees raw template text.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A keyword-triggered memory item attached to a character.
///
/// When any of `keywords` appears in the conversation, the item is moved to
/// the front of the session's active memory list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    #[serde(default = "Uuid::now_v7")]
    pub id: Uuid,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub weight: f32,
    pub text: String,
}

/// The user side of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub name: String,
}

impl Default for UserSnapshot {
    fn default() -> Self {
        Self {
            name: "User".to_string(),
        }
    }
}

/// Character definition as used by a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterSnapshot {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub personality: String,
    #[serde(default)]
    pub scenario: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub post_history_instructions: Option<String>,
    #[serde(default = "default_culture")]
    pub culture: String,
    /// Voice identifier for text-to-speech; `None` disables speech.
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub memories: Vec<MemoryItem>,
}

fn default_culture() -> String {
    "en-US".to_string()
}

impl CharacterSnapshot {
    /// Replace `{{char}}` and `{{user}}` (case-insensitive) in every text field.
    pub fn substitute(mut self, user: &UserSnapshot) -> Self {
        let char_name = self.name.clone();
        let apply = |text: &str| replace_placeholders(text, &char_name, &user.name);

        self.description = apply(&self.description);
        self.personality = apply(&self.personality);
        self.scenario = apply(&self.scenario);
        self.system_prompt = apply(&self.system_prompt);
        self.post_history_instructions = self.post_history_instructions.as_deref().map(apply);
        for memory in &mut self.memories {
            memory.text = apply(&memory.text);
        }
        self
    }
}

/// Substitute `{{char}}` and `{{user}}` placeholders, ignoring ASCII case.
pub fn replace_placeholders(text: &str, char_name: &str, user_name: &str) -> String {
    const CHAR: &str = "{{char}}";
    const USER: &str = "{{user}}";

    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < text.len() {
        let rest = &bytes[i..];
        if rest.len() >= CHAR.len() && rest[..CHAR.len()].eq_ignore_ascii_case(CHAR.as_bytes()) {
            out.push_str(char_name);
            i += CHAR.len();
            continue;
        }
        if rest.len() >= USER.len() && rest[..USER.len()].eq_ignore_ascii_case(USER.as_bytes()) {
            out.push_str(user_name);
            i += USER.len();
            continue;
        }
        // Placeholders are ASCII, so `i` is always on a char boundary here.
        let ch = text[i..].chars().next().unwrap_or_default();
        out.push(ch);
        i += ch.len_utf8().max(1);
    }
    out
}
