//! Pool membership and its auto-blocking settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PoolCode;
use crate::error::GatewayError;

/// Upper bounds applied to membership settings at join time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MembershipLimits {
    /// Largest accepted click threshold.
    pub max_click_threshold: u32,
    /// Largest accepted block duration, in days.
    pub max_block_duration_days: u32,
}

impl Default for MembershipLimits {
    fn default() -> Self {
        Self {
            max_click_threshold: 10,
            max_block_duration_days: 30,
        }
    }
}

/// Validated auto-blocking settings of one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSettings {
    /// Suspicious clicks from one source before it is blocked (≥ 1).
    pub click_threshold: u32,
    /// How long a triggered block lasts, in days (≥ 0).
    pub block_duration_days: u32,
}

impl BlockSettings {
    /// Validates raw request values against `limits`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidThreshold`] or
    /// [`GatewayError::InvalidBlockDuration`] for out-of-range values.
    pub fn new(
        click_threshold: i64,
        block_duration_days: i64,
        limits: MembershipLimits,
    ) -> Result<Self, GatewayError> {
        let threshold = u32::try_from(click_threshold)
            .ok()
            .filter(|t| (1..=limits.max_click_threshold).contains(t))
            .ok_or(GatewayError::InvalidThreshold {
                value: click_threshold,
                max: limits.max_click_threshold,
            })?;
        let duration = u32::try_from(block_duration_days)
            .ok()
            .filter(|d| *d <= limits.max_block_duration_days)
            .ok_or(GatewayError::InvalidBlockDuration {
                value: block_duration_days,
                max: limits.max_block_duration_days,
            })?;
        Ok(Self {
            click_threshold: threshold,
            block_duration_days: duration,
        })
    }
}

/// A user's membership in a pool. Keyed by `(pool_code, user_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolMembership {
    /// Pool joined.
    pub pool_code: PoolCode,
    /// Member.
    pub user_id: String,
    /// Suspicious clicks from one source before it is blocked.
    pub click_threshold: u32,
    /// Lifetime of a triggered block, in days.
    pub block_duration_days: u32,
    /// Join timestamp.
    pub joined_at: DateTime<Utc>,
    /// Always `true`; there is no leave path.
    pub is_active: bool,
}

impl PoolMembership {
    /// Creates an active membership.
    #[must_use]
    pub fn new(
        pool_code: PoolCode,
        user_id: impl Into<String>,
        settings: BlockSettings,
        joined_at: DateTime<Utc>,
    ) -> Self {
        Self {
            pool_code,
            user_id: user_id.into(),
            click_threshold: settings.click_threshold,
            block_duration_days: settings.block_duration_days,
            joined_at,
            is_active: true,
        }
    }

    /// Returns the member's blocking settings.
    #[must_use]
    pub const fn settings(&self) -> BlockSettings {
        BlockSettings {
            click_threshold: self.click_threshold,
            block_duration_days: self.block_duration_days,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn accepts_bounds() {
        let limits = MembershipLimits::default();
        assert!(BlockSettings::new(1, 0, limits).is_ok());
        assert!(BlockSettings::new(10, 30, limits).is_ok());
    }

    #[test]
    fn rejects_zero_and_negative_threshold() {
        let limits = MembershipLimits::default();
        for value in [0, -1, 11, i64::MAX] {
            let result = BlockSettings::new(value, 7, limits);
            assert!(
                matches!(result, Err(GatewayError::InvalidThreshold { value: v, .. }) if v == value),
                "accepted threshold {value}"
            );
        }
    }

    #[test]
    fn rejects_out_of_range_duration() {
        let limits = MembershipLimits::default();
        for value in [-1, 31] {
            let result = BlockSettings::new(1, value, limits);
            assert!(matches!(
                result,
                Err(GatewayError::InvalidBlockDuration { .. })
            ));
        }
    }

    #[test]
    fn threshold_checked_before_duration() {
        let result = BlockSettings::new(0, -5, MembershipLimits::default());
        assert!(matches!(result, Err(GatewayError::InvalidThreshold { .. })));
    }
}
