//! Shared domain types for Chorus.
//!
//! This crate contains the domain types used across the Chorus workspace:
//! chats and messages, character snapshots, backend service links, the
//! client/server wire protocol, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod character;
pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod protocol;
pub mod service;
pub mod session;
pub mod speech;
