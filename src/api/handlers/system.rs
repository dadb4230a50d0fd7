//! Liveness endpoint, mounted outside `/api/v1` and open without a token.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Liveness report with registry sizes.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Always `"ok"` while the process serves requests.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Server time.
    pub timestamp: DateTime<Utc>,
    /// Pools in the registry.
    pub pools: usize,
    /// Cities in the loaded catalog.
    pub cities: usize,
    /// Live event listeners (WebSocket sessions).
    pub listeners: usize,
}

/// `GET /health` — Liveness and registry sizes.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    responses(
        (status = 200, description = "Gateway is serving", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let registry = state.pool_service.registry();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        pools: registry.len().await,
        cities: registry.catalog().len(),
        listeners: state.event_bus.receiver_count(),
    })
}

/// Routes outside the versioned API prefix.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}
