//! Cleanup of backend output before it reaches the client.

/// Action sent when inference matches none of the candidates.
pub const IDLE_ACTION: &str = "idle";

/// Largest edit distance at which an inferred action is corrected to a
/// candidate.
pub const MAX_ACTION_DISTANCE: usize = 3;

/// Trim a generated reply and strip a leading `"<character>:"` label.
///
/// Returns an empty string when nothing but punctuation or whitespace is
/// left, which the pipeline treats as an empty generation.
pub fn sanitize_reply(text: &str, character_name: &str) -> String {
    let mut text = text.trim();
    if !character_name.is_empty() {
        let labelled = text
            .get(..character_name.len())
            .filter(|prefix| prefix.eq_ignore_ascii_case(character_name))
            .and_then(|_| text[character_name.len()..].trim_start().strip_prefix(':'));
        if let Some(rest) = labelled {
            text = rest.trim();
        }
    }
    if text.chars().all(|c| !c.is_alphanumeric()) {
        return String::new();
    }
    text.to_string()
}

/// Map an inferred action onto the candidate list.
///
/// Exact matches pass through. Otherwise the candidate with the smallest
/// Levenshtein distance wins when it is within [`MAX_ACTION_DISTANCE`];
/// ties go to the earlier candidate. Anything further away becomes
/// [`IDLE_ACTION`].
pub fn correct_action(inferred: &str, candidates: &[String]) -> String {
    let inferred = inferred.trim();
    if candidates.iter().any(|c| c == inferred) {
        return inferred.to_string();
    }
    candidates
        .iter()
        .map(|c| (strsim::levenshtein(inferred, c), c))
        .filter(|(distance, _)| *distance <= MAX_ACTION_DISTANCE)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, c)| c.clone())
        .unwrap_or_else(|| IDLE_ACTION.to_string())
}
