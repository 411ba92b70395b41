//! WebSocket chat endpoint.
//!
//! `/ws` upgrades the connection and hands it to
//! [`serve_connection`](crate::session::serve_connection), which bootstraps
//! and runs chat sessions over it. Disconnecting disposes the running
//! session.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;

use chorus_core::tunnel::BoxTunnel;

use crate::http::tunnel::WsTunnel;
use crate::session::serve_connection;
use crate::state::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

async fn handle_ws_connection(socket: WebSocket, state: AppState) {
    tracing::debug!("WebSocket connection opened");
    let tunnel = Arc::new(BoxTunnel::new(WsTunnel::new(socket)));
    serve_connection(state, tunnel).await;
}
