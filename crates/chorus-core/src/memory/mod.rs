//! Session memory: keyword ranking and history summarization.

pub mod query;
pub mod summarizer;

pub use query::rank_memories;
pub use summarizer::MemorySummarizer;
