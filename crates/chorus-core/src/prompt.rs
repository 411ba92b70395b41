//! Token-budgeted prompt assembly.
//!
//! The prompt is built from three parts, in priority order:
//! - the system preamble (character definition and client context) and the
//!   post-history instructions, which are always included
//! - memory lines appended to the preamble while the memory budget allows
//! - the newest contiguous window of history that fits what is left
//!
//! History is never truncated mid-message: the window stops before the first
//! (walking newest to oldest) message that would exceed the remaining budget.

use chorus_types::llm::{Prompt, PromptMessage};
use chorus_types::session::ChatSessionData;

/// Token limits for one prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptBudget {
    pub max_context_tokens: u32,
    /// Tokens memory lines may use, counted inside `max_context_tokens`.
    pub max_memory_tokens: u32,
}

/// Assembles prompts using a backend's tokenizer.
pub struct PromptBuilder<F> {
    budget: PromptBudget,
    token_count: F,
    post_history: bool,
}

impl<F: Fn(&str) -> u32> PromptBuilder<F> {
    pub fn new(budget: PromptBudget, token_count: F) -> Self {
        Self {
            budget,
            token_count,
            post_history: true,
        }
    }

    /// Drop post-history instructions for backends that cannot place text
    /// after the conversation.
    pub fn without_post_history(mut self) -> Self {
        self.post_history = false;
        self
    }

    /// System preamble without memory lines.
    fn preamble(data: &ChatSessionData) -> String {
        let character = &data.character;
        let mut sections = Vec::new();
        if !character.system_prompt.is_empty() {
            sections.push(character.system_prompt.clone());
        }
        if !character.description.is_empty() {
            sections.push(character.description.clone());
        }
        if !character.personality.is_empty() {
            sections.push(format!(
                "{}'s personality: {}",
                character.name, character.personality
            ));
        }
        if !character.scenario.is_empty() {
            sections.push(format!("Scenario: {}", character.scenario));
        }
        if let Some(context) = data.context.as_deref().filter(|c| !c.is_empty()) {
            sections.push(format!("Current context: {context}"));
        }
        sections.join("\n")
    }

    pub fn build(&self, data: &ChatSessionData) -> Prompt {
        let mut system = Self::preamble(data);
        let mut used = (self.token_count)(&system);

        let post_history = if self.post_history {
            data.character
                .post_history_instructions
                .clone()
                .filter(|p| !p.is_empty())
        } else {
            None
        };
        if let Some(post) = &post_history {
            used += (self.token_count)(post);
        }

        let mut memory_used = 0u32;
        for memory in &data.memories {
            let tokens = (self.token_count)(&memory.text);
            if memory_used + tokens > self.budget.max_memory_tokens {
                break;
            }
            memory_used += tokens;
            if !system.is_empty() {
                system.push('\n');
            }
            system.push_str(&memory.text);
        }
        used += memory_used;

        let mut remaining = self.budget.max_context_tokens.saturating_sub(used);
        let mut window = Vec::new();
        for message in data.messages.iter().rev() {
            if message.token_count > remaining {
                break;
            }
            remaining -= message.token_count;
            used += message.token_count;
            window.push(PromptMessage {
                role: message.role,
                content: message.text.clone(),
            });
        }
        window.reverse();

        Prompt {
            system,
            post_history,
            messages: window,
            token_count: used,
        }
    }
}
