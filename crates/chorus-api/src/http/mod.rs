//! HTTP layer: WebSocket chat endpoint and speech clip routes.

pub mod error;
pub mod handlers;
pub mod router;
pub mod tunnel;
