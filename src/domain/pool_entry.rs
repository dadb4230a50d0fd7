//! Pool aggregate and the read models derived from it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{CityCode, PoolCode, SectorCode};

/// Longest accepted sector name, in characters.
pub const MAX_SECTOR_NAME_CHARS: usize = 100;

/// A protection pool: one shared blocklist per city + business sector.
///
/// `member_count` and `total_blocked_ips` are owned by the registry and
/// only move forward as memberships and blocks are recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    /// Unique pool identifier (immutable after creation).
    pub pool_code: PoolCode,
    /// City part of the code.
    pub city_plate_code: CityCode,
    /// Sector slot part of the code.
    pub sector_code: SectorCode,
    /// Human label of the business sector, e.g. `"Plumber"`.
    pub sector_name: String,
    /// Monthly membership price, currency-agnostic.
    pub membership_price: Decimal,
    /// Number of memberships.
    pub member_count: u64,
    /// Number of distinct addresses blocked for this pool.
    pub total_blocked_ips: u64,
    /// Premium flag, fixed at creation.
    pub is_premium: bool,
    /// Creation timestamp (immutable after creation).
    pub created_at: DateTime<Utc>,
}

impl Pool {
    /// Creates a pool with zeroed counters.
    #[must_use]
    pub fn new(pool_code: PoolCode, draft: PoolDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            pool_code,
            city_plate_code: pool_code.city(),
            sector_code: pool_code.sector(),
            sector_name: draft.sector_name.trim().to_string(),
            membership_price: draft.membership_price,
            member_count: 0,
            total_blocked_ips: 0,
            is_premium: draft.is_premium,
            created_at,
        }
    }
}

/// Caller-supplied attributes of a pool that is about to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolDraft {
    /// Sector label; trimmed before storage.
    pub sector_name: String,
    /// Monthly membership price.
    pub membership_price: Decimal,
    /// Premium flag.
    pub is_premium: bool,
}

impl PoolDraft {
    /// Creates a premium draft, the default for operator-created pools.
    #[must_use]
    pub fn new(sector_name: impl Into<String>, membership_price: Decimal) -> Self {
        Self {
            sector_name: sector_name.into(),
            membership_price,
            is_premium: true,
        }
    }
}

/// Per-pool activity summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Pool identifier.
    pub pool_code: PoolCode,
    /// Sector label.
    pub sector_name: String,
    /// Number of memberships.
    pub member_count: u64,
    /// Distinct addresses blocked for the pool.
    pub total_blocked_ips: u64,
    /// Addresses first blocked within the last 24 hours.
    pub recent_threats: u64,
}

/// Pool count of one city in the operator ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CityRank {
    /// City plate code.
    pub city_code: CityCode,
    /// Number of pools in the city.
    pub pool_count: u64,
}

/// Cross-pool figures for the operator panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperatorStats {
    /// Number of pools.
    pub total_pools: u64,
    /// Sum of memberships over all pools.
    pub total_members: u64,
    /// Distinct blocked addresses across the registry.
    pub total_blocked_ips: u64,
    /// Cities ranked by pool count (descending), ties by ascending code.
    pub top_cities: Vec<CityRank>,
}
