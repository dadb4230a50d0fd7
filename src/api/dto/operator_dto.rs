//! Operator panel DTOs.

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{CityCatalog, OperatorStats};

/// One row of the city ranking.
#[derive(Debug, Serialize, ToSchema)]
pub struct CityRankDto {
    /// Two-digit plate code.
    pub city_code: String,
    /// Display name from the catalog.
    pub city_name: String,
    /// Pools in the city.
    pub pool_count: u64,
}

/// Response body for `GET /pools/operator/stats`.
#[derive(Debug, Serialize, ToSchema)]
pub struct OperatorStatsResponse {
    /// Number of pools.
    pub total_pools: u64,
    /// Sum of memberships over all pools.
    pub total_members: u64,
    /// Distinct blocked addresses.
    pub total_blocked_ips: u64,
    /// Cities by pool count, descending; ties by ascending code.
    pub top_cities: Vec<CityRankDto>,
}

impl OperatorStatsResponse {
    /// Converts domain statistics, resolving city names through `catalog`.
    #[must_use]
    pub fn from_stats(stats: OperatorStats, catalog: &CityCatalog) -> Self {
        Self {
            total_pools: stats.total_pools,
            total_members: stats.total_members,
            total_blocked_ips: stats.total_blocked_ips,
            top_cities: stats
                .top_cities
                .into_iter()
                .map(|rank| CityRankDto {
                    city_code: rank.city_code.to_string(),
                    city_name: catalog.display_name(rank.city_code),
                    pool_count: rank.pool_count,
                })
                .collect(),
        }
    }
}
