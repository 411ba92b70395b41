//! Infrastructure adapters for Chorus: SQLite persistence, local speech
//! storage, configuration loading, and concrete backends.

pub mod config;
pub mod llm;
pub mod memory;
pub mod speech;
pub mod sqlite;
