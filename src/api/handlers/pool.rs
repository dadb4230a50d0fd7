//! Pool handlers: register, list, join, get, stats.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    JoinPoolRequest, JoinPoolResponse, ListPoolsParams, PoolDto, PoolListResponse,
    PoolStatsDto, RegisterPoolRequest,
};
use crate::app_state::AppState;
use crate::auth::Caller;
use crate::error::{ErrorResponse, GatewayError};

/// `POST /pools` — Create a pool at an explicit code.
///
/// # Errors
///
/// Returns [`GatewayError`] for non-operators, invalid input, or a taken
/// code.
#[utoipa::path(
    post,
    path = "/api/v1/pools",
    tag = "Pools",
    summary = "Register a pool at an explicit code",
    description = "Operator-only. Claims the given 5-digit code for a city and sector.",
    request_body = RegisterPoolRequest,
    responses(
        (status = 201, description = "Pool created", body = PoolDto),
        (status = 400, description = "Invalid code, city, sector, or price", body = ErrorResponse),
        (status = 403, description = "Operator role required", body = ErrorResponse),
        (status = 409, description = "Code or sector already taken", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn register_pool(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<RegisterPoolRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let (pool_code, draft) = req.into_parts();
    let pool = state
        .pool_service
        .register_pool(&caller, &pool_code, draft)
        .await?;
    let catalog = state.pool_service.registry().catalog();
    Ok((StatusCode::CREATED, Json(PoolDto::from_pool(pool, catalog))))
}

/// `GET /pools` — List pools, newest first.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidCityCode`] for a malformed city filter.
#[utoipa::path(
    get,
    path = "/api/v1/pools",
    tag = "Pools",
    summary = "List pools",
    description = "Returns up to `limit` pools (max 500), newest first, optionally filtered by city.",
    params(ListPoolsParams),
    responses(
        (status = 200, description = "Pool list", body = PoolListResponse),
        (status = 400, description = "Invalid city filter", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn list_pools(
    State(state): State<AppState>,
    caller: Caller,
    Query(params): Query<ListPoolsParams>,
) -> Result<impl IntoResponse, GatewayError> {
    let pools = state
        .pool_service
        .list_pools(
            &caller,
            params.clamped_limit(),
            params.city_plate_code.as_deref(),
        )
        .await?;
    let catalog = state.pool_service.registry().catalog();
    Ok(Json(PoolListResponse::new(pools, catalog)))
}

/// `GET /pools/my-pools` — Pools the caller joined.
#[utoipa::path(
    get,
    path = "/api/v1/pools/my-pools",
    tag = "Pools",
    summary = "List joined pools",
    description = "Returns the pools the caller is a member of, in join order.",
    responses(
        (status = 200, description = "Joined pools", body = PoolListResponse),
    ),
    security(("bearer" = []))
)]
pub async fn list_my_pools(State(state): State<AppState>, caller: Caller) -> impl IntoResponse {
    let pools = state.pool_service.list_my_pools(&caller).await;
    let catalog = state.pool_service.registry().catalog();
    Json(PoolListResponse::new(pools, catalog))
}

/// `POST /pools/join` — Join a pool by code.
///
/// # Errors
///
/// Returns [`GatewayError`] for a malformed code, out-of-range settings,
/// an unknown pool, or an existing membership.
#[utoipa::path(
    post,
    path = "/api/v1/pools/join",
    tag = "Pools",
    summary = "Join a pool",
    description = "Registers the caller as a member with the given auto-block settings.",
    request_body = JoinPoolRequest,
    responses(
        (status = 201, description = "Joined", body = JoinPoolResponse),
        (status = 400, description = "Invalid code or settings", body = ErrorResponse),
        (status = 404, description = "Pool not found", body = ErrorResponse),
        (status = 409, description = "Already a member", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn join_pool(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<JoinPoolRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let membership = state
        .pool_service
        .join_pool(
            &caller,
            &req.pool_code,
            req.click_threshold,
            req.block_duration_days,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(JoinPoolResponse::from(membership))))
}

/// `GET /pools/{pool_code}` — Pool details.
///
/// # Errors
///
/// Returns [`GatewayError::PoolNotFound`] if the pool does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/pools/{pool_code}",
    tag = "Pools",
    summary = "Get pool details",
    params(
        ("pool_code" = String, Path, description = "Five-digit pool code"),
    ),
    responses(
        (status = 200, description = "Pool details", body = PoolDto),
        (status = 400, description = "Malformed pool code", body = ErrorResponse),
        (status = 404, description = "Pool not found", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn get_pool(
    State(state): State<AppState>,
    caller: Caller,
    Path(pool_code): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let pool = state.pool_service.get_pool(&caller, &pool_code).await?;
    let catalog = state.pool_service.registry().catalog();
    Ok(Json(PoolDto::from_pool(pool, catalog)))
}

/// `GET /pools/{pool_code}/stats` — Pool activity.
///
/// # Errors
///
/// Returns [`GatewayError::PoolNotFound`] if the pool does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/pools/{pool_code}/stats",
    tag = "Pools",
    summary = "Get pool statistics",
    description = "Member count, blocked addresses, and blocks made in the last 24 hours.",
    params(
        ("pool_code" = String, Path, description = "Five-digit pool code"),
    ),
    responses(
        (status = 200, description = "Pool statistics", body = PoolStatsDto),
        (status = 404, description = "Pool not found", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn pool_stats(
    State(state): State<AppState>,
    caller: Caller,
    Path(pool_code): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let stats = state.pool_service.pool_stats(&caller, &pool_code).await?;
    Ok(Json(PoolStatsDto::from(stats)))
}

/// `GET /pools/{pool_code}/members` — Member ids of a pool.
///
/// # Errors
///
/// Returns [`GatewayError::NotAMember`] unless the caller is a member or an
/// operator.
#[utoipa::path(
    get,
    path = "/api/v1/pools/{pool_code}/members",
    tag = "Pools",
    summary = "List pool members",
    params(
        ("pool_code" = String, Path, description = "Five-digit pool code"),
    ),
    responses(
        (status = 200, description = "Member user ids in join order", body = Vec<String>),
        (status = 403, description = "Not a member", body = ErrorResponse),
        (status = 404, description = "Pool not found", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn pool_members(
    State(state): State<AppState>,
    caller: Caller,
    Path(pool_code): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let members = state.pool_service.pool_members(&caller, &pool_code).await?;
    Ok(Json(members))
}

/// Pool routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/pools", post(register_pool).get(list_pools))
        .route("/pools/my-pools", get(list_my_pools))
        .route("/pools/join", post(join_pool))
        .route("/pools/{pool_code}", get(get_pool))
        .route("/pools/{pool_code}/stats", get(pool_stats))
        .route("/pools/{pool_code}/members", get(pool_members))
}
