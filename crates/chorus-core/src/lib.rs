//! Core orchestration for Chorus.
//!
//! Defines the ports the infrastructure implements (backend services,
//! repositories, the client tunnel, speech storage) and all session logic
//! built on them. Nothing here knows about HTTP, SQL, or the file system.

pub mod chat;
pub mod memory;
pub mod prompt;
pub mod repository;
pub mod service;
pub mod speech;
pub mod tunnel;

#[cfg(test)]
mod testing;
