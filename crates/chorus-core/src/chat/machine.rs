//! Mode transitions driven by user text.
//!
//! | Mode     | Text contains       | Decision                      |
//! |----------|---------------------|-------------------------------|
//! | Live     | "go offline"        | switch to Paused              |
//! | Live     | "analysis mode"     | switch to Analysis            |
//! | Live     | anything else       | generate a reply              |
//! | Paused   | "go online"         | switch to Live                |
//! | Paused   | "analysis mode"     | switch to Analysis            |
//! | Paused   | anything else       | filler acknowledgement        |
//! | Analysis | "go online"         | switch to Live                |
//! | Analysis | "go offline"        | switch to Paused              |
//! | Analysis | anything else       | diagnostic command            |
//!
//! Matching is a case-insensitive substring test.

use super::state::ChatMode;

pub const GO_OFFLINE: &str = "go offline";
pub const GO_ONLINE: &str = "go online";
pub const ANALYSIS_MODE: &str = "analysis mode";

/// What to do with a user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Reply,
    Switch(ChatMode),
    PausedFiller,
    AnalysisCommand,
}

pub fn decide(mode: ChatMode, text: &str) -> Decision {
    let text = text.to_lowercase();
    match mode {
        ChatMode::Live if text.contains(GO_OFFLINE) => Decision::Switch(ChatMode::Paused),
        ChatMode::Live if text.contains(ANALYSIS_MODE) => Decision::Switch(ChatMode::Analysis),
        ChatMode::Live => Decision::Reply,
        ChatMode::Paused if text.contains(GO_ONLINE) => Decision::Switch(ChatMode::Live),
        ChatMode::Paused if text.contains(ANALYSIS_MODE) => Decision::Switch(ChatMode::Analysis),
        ChatMode::Paused => Decision::PausedFiller,
        ChatMode::Analysis if text.contains(GO_ONLINE) => Decision::Switch(ChatMode::Live),
        ChatMode::Analysis if text.contains(GO_OFFLINE) => Decision::Switch(ChatMode::Paused),
        ChatMode::Analysis => Decision::AnalysisCommand,
    }
}

/// Speech recognition change implied by a mode switch: stopped when
/// entering Paused, restarted when leaving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionChange {
    Stop,
    Start,
    Keep,
}

pub fn recognition_change(from: ChatMode, to: ChatMode) -> RecognitionChange {
    match (from, to) {
        (ChatMode::Paused, ChatMode::Paused) => RecognitionChange::Keep,
        (_, ChatMode::Paused) => RecognitionChange::Stop,
        (ChatMode::Paused, _) => RecognitionChange::Start,
        _ => RecognitionChange::Keep,
    }
}
