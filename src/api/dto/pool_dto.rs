//! Pool-related DTOs for create, list, join, and stats operations.
//!
//! Membership prices are serialized as JSON strings to avoid float
//! rounding.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::common_dto::DEFAULT_LIMIT;
use crate::domain::{CityCatalog, MAX_LIST_LIMIT, Pool, PoolDraft, PoolMembership, PoolStats};

fn default_premium() -> bool {
    true
}

fn default_threshold() -> i64 {
    1
}

fn default_duration() -> i64 {
    7
}

/// Request body for `POST /pools/operator/create-pool`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePoolRequest {
    /// Two-digit city plate code, e.g. `"34"`.
    pub city_plate_code: String,
    /// Business sector label (max 100 chars).
    pub sector_name: String,
    /// Monthly membership price.
    #[schema(value_type = String, example = "99.0")]
    pub membership_price: Decimal,
    /// Premium flag (default `true`).
    #[serde(default = "default_premium")]
    pub is_premium: bool,
}

impl CreatePoolRequest {
    /// Splits off the draft part of the request.
    #[must_use]
    pub fn into_parts(self) -> (String, PoolDraft) {
        let draft = PoolDraft {
            sector_name: self.sector_name,
            membership_price: self.membership_price,
            is_premium: self.is_premium,
        };
        (self.city_plate_code, draft)
    }
}

/// Request body for `POST /pools` (explicit code).
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterPoolRequest {
    /// Five-digit pool code, e.g. `"34001"`.
    pub pool_code: String,
    /// Business sector label (max 100 chars).
    pub sector_name: String,
    /// Monthly membership price.
    #[schema(value_type = String, example = "99.0")]
    pub membership_price: Decimal,
    /// Premium flag (default `true`).
    #[serde(default = "default_premium")]
    pub is_premium: bool,
}

impl RegisterPoolRequest {
    /// Splits off the draft part of the request.
    #[must_use]
    pub fn into_parts(self) -> (String, PoolDraft) {
        let draft = PoolDraft {
            sector_name: self.sector_name,
            membership_price: self.membership_price,
            is_premium: self.is_premium,
        };
        (self.pool_code, draft)
    }
}

/// Pool as returned by every pool endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PoolDto {
    /// Five-digit pool code.
    pub pool_code: String,
    /// Two-digit city code.
    pub city_plate_code: String,
    /// City display name from the catalog.
    pub city_name: String,
    /// Three-digit sector slot.
    pub sector_code: String,
    /// Business sector label.
    pub sector_name: String,
    /// Monthly membership price.
    #[schema(value_type = String, example = "99.0")]
    pub membership_price: Decimal,
    /// Number of members.
    pub member_count: u64,
    /// Distinct addresses blocked for the pool.
    pub total_blocked_ips: u64,
    /// Premium flag.
    pub is_premium: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl PoolDto {
    /// Converts a pool, resolving its city name through `catalog`.
    #[must_use]
    pub fn from_pool(pool: Pool, catalog: &CityCatalog) -> Self {
        Self {
            pool_code: pool.pool_code.to_string(),
            city_plate_code: pool.city_plate_code.to_string(),
            city_name: catalog.display_name(pool.city_plate_code),
            sector_code: pool.sector_code.to_string(),
            sector_name: pool.sector_name,
            membership_price: pool.membership_price,
            member_count: pool.member_count,
            total_blocked_ips: pool.total_blocked_ips,
            is_premium: pool.is_premium,
            created_at: pool.created_at,
        }
    }
}

/// Query parameters for `GET /pools`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ListPoolsParams {
    /// Maximum number of pools (default 100, max 500).
    pub limit: Option<usize>,
    /// Restrict to one city.
    pub city_plate_code: Option<String>,
}

impl ListPoolsParams {
    /// Returns the requested limit clamped to `1..=500`.
    #[must_use]
    pub fn clamped_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIST_LIMIT)
    }
}

/// List response for `GET /pools` and `GET /pools/my-pools`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PoolListResponse {
    /// Pools, newest first (join order for `my-pools`).
    pub data: Vec<PoolDto>,
    /// Number of pools in `data`.
    pub count: usize,
}

impl PoolListResponse {
    /// Builds a list response.
    #[must_use]
    pub fn new(pools: Vec<Pool>, catalog: &CityCatalog) -> Self {
        let data: Vec<PoolDto> = pools
            .into_iter()
            .map(|p| PoolDto::from_pool(p, catalog))
            .collect();
        Self {
            count: data.len(),
            data,
        }
    }
}

/// Request body for `POST /pools/join`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct JoinPoolRequest {
    /// Five-digit pool code.
    pub pool_code: String,
    /// Suspicious clicks before auto-block (1..=10, default 1).
    #[serde(default = "default_threshold")]
    pub click_threshold: i64,
    /// Auto-block lifetime in days (0..=30, default 7).
    #[serde(default = "default_duration")]
    pub block_duration_days: i64,
}

/// Settings echoed back after joining.
#[derive(Debug, Serialize, ToSchema)]
pub struct MembershipSettingsDto {
    /// Suspicious clicks before auto-block.
    pub click_threshold: u32,
    /// Auto-block lifetime in days.
    pub block_duration_days: u32,
}

/// Response body for `POST /pools/join` (201 Created).
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinPoolResponse {
    /// Human-readable summary.
    pub message: String,
    /// Joined pool.
    pub pool_code: String,
    /// Accepted settings.
    pub settings: MembershipSettingsDto,
    /// Join timestamp.
    pub joined_at: DateTime<Utc>,
}

impl From<PoolMembership> for JoinPoolResponse {
    fn from(m: PoolMembership) -> Self {
        Self {
            message: format!("Successfully joined pool {}", m.pool_code),
            pool_code: m.pool_code.to_string(),
            settings: MembershipSettingsDto {
                click_threshold: m.click_threshold,
                block_duration_days: m.block_duration_days,
            },
            joined_at: m.joined_at,
        }
    }
}

/// Response body for `GET /pools/{pool_code}/stats`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PoolStatsDto {
    /// Five-digit pool code.
    pub pool_code: String,
    /// Business sector label.
    pub sector_name: String,
    /// Number of members.
    pub member_count: u64,
    /// Distinct addresses blocked for the pool.
    pub total_blocked_ips: u64,
    /// Blocks made in the last 24 hours.
    pub recent_threats: u64,
}

impl From<PoolStats> for PoolStatsDto {
    fn from(s: PoolStats) -> Self {
        Self {
            pool_code: s.pool_code.to_string(),
            sector_name: s.sector_name,
            member_count: s.member_count,
            total_blocked_ips: s.total_blocked_ips,
            recent_threats: s.recent_threats,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn join_request_defaults() {
        let Ok(req) = serde_json::from_str::<JoinPoolRequest>(r#"{"pool_code":"34001"}"#) else {
            panic!("parse failed");
        };
        assert_eq!(req.click_threshold, 1);
        assert_eq!(req.block_duration_days, 7);
    }

    #[test]
    fn price_accepts_string_and_number() {
        let body = r#"{"city_plate_code":"34","sector_name":"Plumber","membership_price":"99.50"}"#;
        let Ok(req) = serde_json::from_str::<CreatePoolRequest>(body) else {
            panic!("parse failed");
        };
        assert!(req.is_premium);
        assert_eq!(req.membership_price.to_string(), "99.50");

        let body = r#"{"city_plate_code":"34","sector_name":"Plumber","membership_price":99}"#;
        assert!(serde_json::from_str::<CreatePoolRequest>(body).is_ok());
    }
}
