//! Application error type mapping to HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use chorus_types::error::SpeechError;

#[derive(Debug)]
pub enum AppError {
    Speech(SpeechError),
    NotFound(String),
}

impl From<SpeechError> for AppError {
    fn from(e: SpeechError) -> Self {
        AppError::Speech(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Speech(SpeechError::NotFound(id)) | AppError::NotFound(id) => (
                StatusCode::NOT_FOUND,
                "SPEECH_NOT_FOUND",
                format!("Speech '{id}' not found"),
            ),
            AppError::Speech(SpeechError::Service(e)) => {
                tracing::warn!(error = %e, "speech synthesis failed");
                (StatusCode::BAD_GATEWAY, "SPEECH_BACKEND_ERROR", e.to_string())
            }
            AppError::Speech(e) => {
                tracing::error!(error = %e, "speech request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "SPEECH_ERROR", e.to_string())
            }
        };

        let body = json!({
            "error": {
                "code": code,
                "message": message,
            }
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}
