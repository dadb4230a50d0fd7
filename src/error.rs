//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Each variant
//! maps to a specific HTTP status code and structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{CityCode, PoolCode};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2003,
///     "message": "user u1 is already a member of pool 34001",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see the table on [`GatewayError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category          | HTTP Status                  |
/// |-----------|-------------------|------------------------------|
/// | 1000–1999 | Validation        | 400 Bad Request              |
/// | 2000–2999 | State / Not Found | 404 Not Found / 409 Conflict |
/// | 3000–3999 | Server            | 500 Internal Server Error    |
/// | 4000–4999 | Access            | 401 / 403                    |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request validation failed for a reason not covered below.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// City code is malformed or not in the city catalog.
    #[error("invalid city code: {0}")]
    InvalidCityCode(String),

    /// Sector name is empty, too long, or otherwise unusable.
    #[error("invalid sector name: {0}")]
    InvalidSectorName(String),

    /// Pool code is not exactly five ASCII digits.
    #[error("invalid pool code {0:?}: expected 2-digit city code + 3-digit sector code")]
    InvalidPoolCodeFormat(String),

    /// Click threshold outside the accepted range.
    #[error("click threshold must be between 1 and {max}, got {value}")]
    InvalidThreshold {
        /// Value supplied by the caller.
        value: i64,
        /// Configured upper bound.
        max: u32,
    },

    /// Block duration outside the accepted range.
    #[error("block duration must be between 0 and {max} days, got {value}")]
    InvalidBlockDuration {
        /// Value supplied by the caller.
        value: i64,
        /// Configured upper bound.
        max: u32,
    },

    /// Membership price is negative.
    #[error("membership price must not be negative, got {0}")]
    InvalidMembershipPrice(Decimal),

    /// IP address could not be parsed.
    #[error("invalid ip address: {0}")]
    InvalidIpAddress(String),

    /// Pool with the given code was not found.
    #[error("pool not found: {0}")]
    PoolNotFound(PoolCode),

    /// A pool with the same code or the same (city, sector) already exists.
    #[error("pool already exists: {0}")]
    DuplicatePool(String),

    /// The user already holds a membership in the pool.
    #[error("user {user_id} is already a member of pool {pool_code}")]
    AlreadyMember {
        /// Target pool.
        pool_code: PoolCode,
        /// User that attempted to join.
        user_id: String,
    },

    /// Every sector slot of the city is taken.
    #[error("no free sector slot left in city {0}")]
    SectorSlotsExhausted(CityCode),

    /// Missing, malformed, or expired credentials.
    #[error("authentication required: {0}")]
    Unauthenticated(String),

    /// Caller lacks the role required by the operation.
    #[error("forbidden: {0}")]
    Unauthorized(String),

    /// Caller is not a member of the pool and is not an operator.
    #[error("not a member of pool {0}")]
    NotAMember(PoolCode),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidCityCode(_) => 1002,
            Self::InvalidSectorName(_) => 1003,
            Self::InvalidPoolCodeFormat(_) => 1004,
            Self::InvalidThreshold { .. } => 1005,
            Self::InvalidBlockDuration { .. } => 1006,
            Self::InvalidMembershipPrice(_) => 1007,
            Self::InvalidIpAddress(_) => 1008,
            Self::PoolNotFound(_) => 2001,
            Self::DuplicatePool(_) => 2002,
            Self::AlreadyMember { .. } => 2003,
            Self::SectorSlotsExhausted(_) => 2004,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::Unauthenticated(_) => 4001,
            Self::Unauthorized(_) => 4003,
            Self::NotAMember(_) => 4004,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_)
            | Self::InvalidCityCode(_)
            | Self::InvalidSectorName(_)
            | Self::InvalidPoolCodeFormat(_)
            | Self::InvalidThreshold { .. }
            | Self::InvalidBlockDuration { .. }
            | Self::InvalidMembershipPrice(_)
            | Self::InvalidIpAddress(_) => StatusCode::BAD_REQUEST,
            Self::PoolNotFound(_) => StatusCode::NOT_FOUND,
            Self::DuplicatePool(_) | Self::AlreadyMember { .. } | Self::SectorSlotsExhausted(_) => {
                StatusCode::CONFLICT
            }
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Unauthorized(_) | Self::NotAMember(_) => StatusCode::FORBIDDEN,
            Self::PersistenceError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
