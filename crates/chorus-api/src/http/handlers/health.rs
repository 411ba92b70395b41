use axum::Json;
use axum::extract::State;
use serde::Serialize;

use chorus_types::config::SpeechStrategy;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub speech_strategy: SpeechStrategy,
    pub characters: usize,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        speech_strategy: state.config.speech.strategy,
        characters: state.config.characters.len(),
    })
}
