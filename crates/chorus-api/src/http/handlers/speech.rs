//! Speech clip routes.
//!
//! - `GET /speech/local/{file}` serves a clip from the local speech store.
//! - `GET /speech/remote/{id}` synthesizes a pending entry on first fetch.
//!   The entry is consumed, so a second fetch of the same id is a 404.

use axum::extract::{Path, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};

use chorus_types::speech::content_type_for;

use crate::http::error::AppError;
use crate::state::AppState;

const REUSABLE_CACHE: &str = "public, max-age=86400";
const ONE_OFF_CACHE: &str = "no-store";

pub async fn local_speech(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Response, AppError> {
    let Some(store) = &state.local_speech else {
        return Err(AppError::NotFound(file));
    };
    let audio = store.read(&file).await?;
    let extension = file.rsplit_once('.').map(|(_, ext)| ext).unwrap_or_default();
    Ok(audio_response(audio, content_type_for(extension).to_string(), REUSABLE_CACHE))
}

pub async fn remote_speech(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let cancel = state.shutdown.child_token();
    let rendered = state
        .pending_speech
        .render(&id, state.converter.as_ref(), &cancel)
        .await?;
    tracing::debug!(%id, bytes = rendered.audio.len(), "remote speech rendered");
    let cache = if rendered.reusable {
        REUSABLE_CACHE
    } else {
        ONE_OFF_CACHE
    };
    Ok(audio_response(rendered.audio, rendered.content_type, cache))
}

fn audio_response(audio: Vec<u8>, content_type: String, cache: &'static str) -> Response {
    (
        [(CONTENT_TYPE, content_type), (CACHE_CONTROL, cache.to_string())],
        audio,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::http::StatusCode;
    use chorus_core::service::BoxTextToSpeech;
    use chorus_core::speech::{PendingSpeechEntry, SpeechFileStore};
    use chorus_types::config::SpeechStrategy;
    use chorus_types::speech::SpeechRequest;
    use uuid::Uuid;

    use crate::testing::{ToneTts, test_state};

    fn request(reusable: bool) -> SpeechRequest {
        SpeechRequest {
            text: "Hello".to_string(),
            voice: "soft".to_string(),
            culture: "en-US".to_string(),
            content_type: "audio/wav".to_string(),
            reusable,
        }
    }

    #[tokio::test]
    async fn remote_speech_is_served_once() {
        let (_tmp, state) = test_state(SpeechStrategy::Remote).await;
        let id = state.pending_speech.register(PendingSpeechEntry {
            owner: Uuid::now_v7(),
            service: Arc::new(BoxTextToSpeech::new(ToneTts)),
            request: request(false),
        });

        let first = remote_speech(State(state.clone()), Path(id.clone())).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()[CONTENT_TYPE], "audio/wav");
        assert_eq!(first.headers()[CACHE_CONTROL], ONE_OFF_CACHE);
        let body = axum::body::to_bytes(first.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), b"Hello");

        let second = remote_speech(State(state), Path(id)).await.unwrap_err();
        assert_eq!(second.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn local_speech_serves_stored_clips() {
        let (_tmp, state) = test_state(SpeechStrategy::Local).await;
        let store = state.local_speech.clone().unwrap();
        store.write("abc.wav", vec![1, 2, 3]).await.unwrap();

        let response = local_speech(State(state.clone()), Path("abc.wav".to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "audio/wav");

        let missing = local_speech(State(state.clone()), Path("nope.wav".to_string()))
            .await
            .unwrap_err();
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);

        let escape = local_speech(State(state), Path("..%2Fchorus.db".to_string()))
            .await
            .unwrap_err();
        assert_eq!(escape.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn local_route_is_404_with_remote_strategy() {
        let (_tmp, state) = test_state(SpeechStrategy::Remote).await;
        let response = local_speech(State(state), Path("abc.wav".to_string()))
            .await
            .unwrap_err();
        assert_eq!(response.into_response().status(), StatusCode::NOT_FOUND);
    }
}
