//! Shared blocklist records.
//!
//! One [`BlockedIp`] exists per address. Pools that report the address are
//! added to its `pool_codes`; a global block applies to every pool.

use std::collections::BTreeSet;
use std::net::IpAddr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::PoolCode;

/// Blocklist entry for one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedIp {
    /// Blocked address.
    pub ip_address: IpAddr,
    /// Reason given by the first report.
    pub reason: String,
    /// Pools the address is attributed to.
    pub pool_codes: BTreeSet<PoolCode>,
    /// User whose report created the entry.
    pub blocked_by_user_id: String,
    /// Start of the current block period.
    pub blocked_at: DateTime<Utc>,
    /// Block end; extended by later reports, never shortened.
    pub expires_at: DateTime<Utc>,
    /// Blocked for every pool when `true`.
    pub is_global: bool,
    /// Number of pools that reported the address.
    pub detection_count: u32,
}

impl BlockedIp {
    /// Creates an entry attributed to a single pool.
    #[must_use]
    pub fn new(
        ip_address: IpAddr,
        pool_code: PoolCode,
        reason: impl Into<String>,
        blocked_by_user_id: impl Into<String>,
        blocked_at: DateTime<Utc>,
        duration_days: u32,
    ) -> Self {
        Self {
            ip_address,
            reason: reason.into(),
            pool_codes: BTreeSet::from([pool_code]),
            blocked_by_user_id: blocked_by_user_id.into(),
            blocked_at,
            expires_at: expiry(blocked_at, duration_days),
            is_global: false,
            detection_count: 1,
        }
    }

    /// Returns `true` while the block is in force at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// Returns `true` if the block covers `pool_code` at `now`.
    #[must_use]
    pub fn blocks_pool_at(&self, pool_code: PoolCode, now: DateTime<Utc>) -> bool {
        self.is_active_at(now) && (self.is_global || self.pool_codes.contains(&pool_code))
    }

    /// Pushes `expires_at` to at least `now + duration_days`.
    pub fn extend(&mut self, now: DateTime<Utc>, duration_days: u32) {
        self.expires_at = self.expires_at.max(expiry(now, duration_days));
    }
}

/// A request to attribute an address to a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockReport {
    /// Pool the address is reported in.
    pub pool_code: PoolCode,
    /// Reported address.
    pub ip_address: IpAddr,
    /// Why the address is blocked.
    pub reason: String,
    /// Reporting user.
    pub reported_by: String,
    /// Requested block lifetime, in days.
    pub duration_days: u32,
}

/// Result of attributing an address to a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockOutcome {
    /// Report that was applied.
    pub report: BlockReport,
    /// When the report was applied.
    pub reported_at: DateTime<Utc>,
    /// Entry after the update.
    pub blocked_ip: BlockedIp,
    /// `true` if the pool had not reported this address before; only then
    /// does the pool's `total_blocked_ips` grow.
    pub newly_attributed: bool,
    /// Pool counter after the update.
    pub pool_total_blocked_ips: u64,
}

/// Result of promoting a pool's blocks to global blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GlobalBlockOutcome {
    /// Pool whose blocks were promoted.
    pub pool_code: PoolCode,
    /// Entries that changed.
    pub affected: usize,
    /// When the promotion was applied, taken under the registry lock.
    pub applied_at: DateTime<Utc>,
}

/// Result of reporting one suspicious click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuspiciousClickOutcome {
    /// Pool the report was made in.
    pub pool_code: PoolCode,
    /// Reported source.
    pub ip_address: IpAddr,
    /// Clicks counted toward the threshold, including this one.
    pub suspicious_clicks: u32,
    /// Member's click threshold.
    pub click_threshold: u32,
    /// Present when this report triggered a block.
    pub block: Option<BlockOutcome>,
}

fn expiry(from: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    from + Duration::days(i64::from(days))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn code(s: &str) -> PoolCode {
        let Ok(c) = PoolCode::parse(s) else {
            panic!("valid code rejected");
        };
        c
    }

    fn ip() -> IpAddr {
        IpAddr::from([203, 0, 113, 7])
    }

    #[test]
    fn new_block_expires_after_duration() {
        let now = Utc::now();
        let block = BlockedIp::new(ip(), code("34001"), "bot", "u1", now, 7);
        assert_eq!(block.expires_at, now + Duration::days(7));
        assert!(block.is_active_at(now));
        assert!(!block.is_active_at(now + Duration::days(8)));
    }

    #[test]
    fn zero_duration_is_never_active() {
        let now = Utc::now();
        let block = BlockedIp::new(ip(), code("34001"), "bot", "u1", now, 0);
        assert!(!block.is_active_at(now));
    }

    #[test]
    fn extend_never_shortens() {
        let now = Utc::now();
        let mut block = BlockedIp::new(ip(), code("34001"), "bot", "u1", now, 30);
        let before = block.expires_at;
        block.extend(now, 1);
        assert_eq!(block.expires_at, before);
        block.extend(now + Duration::days(10), 30);
        assert!(block.expires_at > before);
    }

    #[test]
    fn global_block_covers_other_pools() {
        let now = Utc::now();
        let mut block = BlockedIp::new(ip(), code("34001"), "bot", "u1", now, 7);
        assert!(!block.blocks_pool_at(code("06001"), now));
        block.is_global = true;
        assert!(block.blocks_pool_at(code("06001"), now));
    }
}
