//! Blocklist handlers: manual blocks, suspicious clicks, address checks,
//! and admin global blocks.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    BlockIpRequest, BlockResponse, BlockedIpDto, BlockedIpListResponse, GlobalBlockResponse,
    IpCheckResponse, LimitParams, SuspiciousClickRequest, SuspiciousClickResponse, parse_ip,
};
use crate::app_state::AppState;
use crate::auth::Caller;
use crate::error::{ErrorResponse, GatewayError};

/// `GET /pools/{pool_code}/blocked-ips` — Blocks attributed to a pool.
///
/// # Errors
///
/// Returns [`GatewayError::NotAMember`] unless the caller is a member or an
/// operator, or [`GatewayError::PoolNotFound`].
#[utoipa::path(
    get,
    path = "/api/v1/pools/{pool_code}/blocked-ips",
    tag = "Blocklist",
    summary = "List blocked addresses of a pool",
    description = "Newest block first. Members and operators only.",
    params(
        ("pool_code" = String, Path, description = "Five-digit pool code"),
        LimitParams,
    ),
    responses(
        (status = 200, description = "Blocked addresses", body = BlockedIpListResponse),
        (status = 403, description = "Not a member", body = ErrorResponse),
        (status = 404, description = "Pool not found", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn list_blocked_ips(
    State(state): State<AppState>,
    caller: Caller,
    Path(pool_code): Path<String>,
    Query(params): Query<LimitParams>,
) -> Result<impl IntoResponse, GatewayError> {
    let data: Vec<BlockedIpDto> = state
        .pool_service
        .pool_blocked_ips(&caller, &pool_code, params.clamped())
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(BlockedIpListResponse {
        count: data.len(),
        data,
    }))
}

/// `POST /pools/{pool_code}/blocked-ips` — Report an address for a pool.
///
/// # Errors
///
/// Returns [`GatewayError`] for a bad address, an empty reason, a duration
/// above the maximum, or a caller that is neither member nor operator.
#[utoipa::path(
    post,
    path = "/api/v1/pools/{pool_code}/blocked-ips",
    tag = "Blocklist",
    summary = "Block an address for a pool",
    description = "Attributes the address to the pool. A repeated report only extends the block.",
    params(
        ("pool_code" = String, Path, description = "Five-digit pool code"),
    ),
    request_body = BlockIpRequest,
    responses(
        (status = 201, description = "Block recorded", body = BlockResponse),
        (status = 400, description = "Invalid address, reason, or duration", body = ErrorResponse),
        (status = 403, description = "Not a member", body = ErrorResponse),
        (status = 404, description = "Pool not found", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn record_blocked_ip(
    State(state): State<AppState>,
    caller: Caller,
    Path(pool_code): Path<String>,
    Json(req): Json<BlockIpRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let ip = parse_ip(&req.ip_address)?;
    let outcome = state
        .pool_service
        .record_blocked_ip(&caller, &pool_code, ip, req.reason, req.duration_days)
        .await?;
    Ok((StatusCode::CREATED, Json(BlockResponse::from(outcome))))
}

/// `POST /pools/{pool_code}/suspicious-clicks` — Count a suspicious click.
///
/// # Errors
///
/// Returns [`GatewayError::NotAMember`] if the caller has not joined the
/// pool, or [`GatewayError::InvalidIpAddress`].
#[utoipa::path(
    post,
    path = "/api/v1/pools/{pool_code}/suspicious-clicks",
    tag = "Blocklist",
    summary = "Report a suspicious click",
    description = "Counts the click against the caller's threshold; reaching it blocks the source for the caller's block duration.",
    params(
        ("pool_code" = String, Path, description = "Five-digit pool code"),
    ),
    request_body = SuspiciousClickRequest,
    responses(
        (status = 200, description = "Click counted", body = SuspiciousClickResponse),
        (status = 400, description = "Invalid address", body = ErrorResponse),
        (status = 403, description = "Not a member", body = ErrorResponse),
        (status = 404, description = "Pool not found", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn report_suspicious_click(
    State(state): State<AppState>,
    caller: Caller,
    Path(pool_code): Path<String>,
    Json(req): Json<SuspiciousClickRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let ip = parse_ip(&req.ip_address)?;
    let outcome = state
        .pool_service
        .report_suspicious_click(&caller, &pool_code, ip)
        .await?;
    Ok(Json(SuspiciousClickResponse::from(outcome)))
}

/// `GET /pools/ip-check/{ip}` — Is the address blocked for the caller?
///
/// # Errors
///
/// Returns [`GatewayError::InvalidIpAddress`] for a malformed address.
#[utoipa::path(
    get,
    path = "/api/v1/pools/ip-check/{ip}",
    tag = "Blocklist",
    summary = "Check an address",
    description = "True when an unexpired block is global or attributed to a pool the caller joined.",
    params(
        ("ip" = String, Path, description = "IPv4 or IPv6 address"),
    ),
    responses(
        (status = 200, description = "Check result", body = IpCheckResponse),
        (status = 400, description = "Invalid address", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn check_ip(
    State(state): State<AppState>,
    caller: Caller,
    Path(ip): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let address = parse_ip(&ip)?;
    let is_blocked = state.pool_service.is_ip_blocked(&caller, address).await;
    Ok(Json(IpCheckResponse {
        ip_address: address.to_string(),
        is_blocked,
    }))
}

/// `POST /admin/pools/{pool_code}/global-block` — Promote a pool's blocks.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthorized`] for non-admins, or
/// [`GatewayError::PoolNotFound`].
#[utoipa::path(
    post,
    path = "/api/v1/admin/pools/{pool_code}/global-block",
    tag = "Admin",
    summary = "Make a pool's blocks global",
    params(
        ("pool_code" = String, Path, description = "Five-digit pool code"),
    ),
    responses(
        (status = 200, description = "Blocks promoted", body = GlobalBlockResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 404, description = "Pool not found", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn apply_global_block(
    State(state): State<AppState>,
    caller: Caller,
    Path(pool_code): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let outcome = state
        .pool_service
        .apply_global_block(&caller, &pool_code)
        .await?;
    Ok(Json(GlobalBlockResponse {
        pool_code: outcome.pool_code.to_string(),
        affected: outcome.affected,
        applied_at: outcome.applied_at,
    }))
}

/// Blocklist routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/pools/{pool_code}/blocked-ips",
            get(list_blocked_ips).post(record_blocked_ip),
        )
        .route(
            "/pools/{pool_code}/suspicious-clicks",
            post(report_suspicious_click),
        )
        .route("/pools/ip-check/{ip}", get(check_ip))
        .route(
            "/admin/pools/{pool_code}/global-block",
            post(apply_global_block),
        )
}
