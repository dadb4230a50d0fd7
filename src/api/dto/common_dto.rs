//! Shared DTO types used across multiple endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::MAX_LIST_LIMIT;

/// Page size used when `limit` is omitted.
pub const DEFAULT_LIMIT: usize = 100;

/// `?limit=N` query parameter for list endpoints.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct LimitParams {
    /// Maximum number of items (default 100, max 500).
    pub limit: Option<usize>,
}

impl LimitParams {
    /// Returns the requested limit clamped to `1..=500`.
    #[must_use]
    pub fn clamped(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIST_LIMIT)
    }
}

/// One entry of the city catalog.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CityDto {
    /// Two-digit plate code.
    pub code: String,
    /// Display name.
    pub name: String,
}

/// Plain acknowledgement body.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageResponse {
    /// Human-readable summary.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_clamped() {
        assert_eq!(LimitParams::default().clamped(), DEFAULT_LIMIT);
        assert_eq!(LimitParams { limit: Some(0) }.clamped(), 1);
        assert_eq!(LimitParams { limit: Some(10_000) }.clamped(), MAX_LIST_LIMIT);
        assert_eq!(LimitParams { limit: Some(25) }.clamped(), 25);
    }
}
