//! Chat session orchestration.
//!
//! Each connected client gets one [`ChatSession`]. User turns flow through
//! the [`dispatcher`] one at a time; the [`machine`] decides whether a turn
//! produces a reply, a mode switch, a paused filler, or an analysis command.

pub mod analysis;
mod context;
pub mod data;
pub mod dispatcher;
pub mod machine;
mod observer;
pub mod pipeline;
pub mod sanitize;
pub mod session;
pub mod state;

pub use analysis::AnalysisCommand;
pub use data::SessionData;
pub use session::{ChatSession, ChatSessionParams};
pub use state::ChatMode;
