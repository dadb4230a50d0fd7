//! Operator panel handlers: slot-assigned pool creation, statistics, cities.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{CityDto, CreatePoolRequest, OperatorStatsResponse, PoolDto};
use crate::app_state::AppState;
use crate::auth::Caller;
use crate::error::{ErrorResponse, GatewayError};

/// `POST /pools/operator/create-pool` — Create a pool in the next free slot.
///
/// # Errors
///
/// Returns [`GatewayError`] for non-operators, an unknown city, a bad
/// sector or price, a duplicate sector, or a full city.
#[utoipa::path(
    post,
    path = "/api/v1/pools/operator/create-pool",
    tag = "Operator",
    summary = "Create a pool",
    description = "Assigns the lowest free 3-digit sector slot of the city. Fails if the city already has a pool for the sector.",
    request_body = CreatePoolRequest,
    responses(
        (status = 201, description = "Pool created", body = PoolDto),
        (status = 400, description = "Invalid city, sector, or price", body = ErrorResponse),
        (status = 403, description = "Operator role required", body = ErrorResponse),
        (status = 409, description = "Duplicate sector or no free slot", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn create_pool(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<CreatePoolRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let (city_code, draft) = req.into_parts();
    let pool = state
        .pool_service
        .create_pool(&caller, &city_code, draft)
        .await?;
    let catalog = state.pool_service.registry().catalog();
    Ok((StatusCode::CREATED, Json(PoolDto::from_pool(pool, catalog))))
}

/// `GET /pools/operator/stats` — Cross-pool statistics.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthorized`] for non-operators.
#[utoipa::path(
    get,
    path = "/api/v1/pools/operator/stats",
    tag = "Operator",
    summary = "Operator statistics",
    description = "Totals over all pools and the cities with the most pools.",
    responses(
        (status = 200, description = "Statistics", body = OperatorStatsResponse),
        (status = 403, description = "Operator role required", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn operator_stats(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<impl IntoResponse, GatewayError> {
    let stats = state.pool_service.operator_stats(&caller).await?;
    let catalog = state.pool_service.registry().catalog();
    Ok(Json(OperatorStatsResponse::from_stats(stats, catalog)))
}

/// `GET /pools/operator/cities` — The city catalog.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthorized`] for non-operators.
#[utoipa::path(
    get,
    path = "/api/v1/pools/operator/cities",
    tag = "Operator",
    summary = "List recognized cities",
    responses(
        (status = 200, description = "Cities sorted by code", body = Vec<CityDto>),
        (status = 403, description = "Operator role required", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn list_cities(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<impl IntoResponse, GatewayError> {
    let cities: Vec<CityDto> = state
        .pool_service
        .cities(&caller)?
        .into_iter()
        .map(|c| CityDto {
            code: c.code,
            name: c.name,
        })
        .collect();
    Ok(Json(cities))
}

/// Operator routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/pools/operator/create-pool", post(create_pool))
        .route("/pools/operator/stats", get(operator_stats))
        .route("/pools/operator/cities", get(list_cities))
}
