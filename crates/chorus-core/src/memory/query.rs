//! Keyword-driven memory ranking.
//!
//! A cheap relevance heuristic, not semantic search: for every message in
//! history, oldest first, each memory item whose keywords intersect the
//! message's lowercase word set is moved to the front of the active list.
//! The most recently mentioned memories therefore end up first, which is the
//! order the prompt builder consumes them in.

use std::collections::HashSet;

use chorus_types::character::MemoryItem;
use chorus_types::chat::ChatMessage;

/// Lowercase words of `text`, split on anything that is not alphanumeric
/// or an apostrophe.
pub fn word_set(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn matches(item: &MemoryItem, words: &HashSet<String>) -> bool {
    item.keywords
        .iter()
        .any(|k| words.contains(&k.to_lowercase()))
}

/// Reorder `memories` in place by keyword hits in `messages`.
pub fn rank_memories(memories: &mut Vec<MemoryItem>, messages: &[ChatMessage]) {
    if memories.is_empty() {
        return;
    }
    for message in messages {
        let words = word_set(&message.text);
        // Walk the list so items already promoted by this message keep
        // their relative order.
        let mut index = 0;
        let mut front = 0;
        while index < memories.len() {
            if matches(&memories[index], &words) {
                if index != front {
                    let item = memories.remove(index);
                    memories.insert(front, item);
                }
                front += 1;
            }
            index += 1;
        }
    }
}
