//! Axum WebSocket upgrade handler.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::response::IntoResponse;
use serde::Deserialize;

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::error::GatewayError;

/// Query parameters accepted by `GET /ws`.
#[derive(Debug, Default, Deserialize)]
pub struct WsAuthParams {
    /// Bearer token, for clients that cannot set headers on the upgrade.
    pub token: Option<String>,
}

/// `GET /ws` — Upgrade HTTP connection to WebSocket.
///
/// The caller is authenticated before the upgrade, from the
/// `Authorization` header or the `token` query parameter.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthenticated`] if neither credential
/// verifies.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<WsAuthParams>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, GatewayError> {
    let caller = match params.token {
        Some(token) => state.verifier.verify(&token)?,
        None => state
            .verifier
            .verify_header(headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()))?,
    };

    let event_rx = state.event_bus.subscribe();
    let pool_service = Arc::clone(&state.pool_service);
    tracing::debug!(user_id = %caller.user_id, "ws connection accepted");

    Ok(ws.on_upgrade(move |socket| run_connection(socket, event_rx, pool_service, caller)))
}
