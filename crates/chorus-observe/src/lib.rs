//! Observability setup shared by Chorus binaries.

pub mod tracing_setup;
