//! Blocklist DTOs: manual reports, suspicious clicks, and address checks.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{BlockOutcome, BlockedIp, SuspiciousClickOutcome};
use crate::error::GatewayError;

/// Parses a client-supplied address.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidIpAddress`] if `raw` is not an IPv4 or
/// IPv6 address.
pub fn parse_ip(raw: &str) -> Result<IpAddr, GatewayError> {
    raw.trim()
        .parse()
        .map_err(|_| GatewayError::InvalidIpAddress(raw.to_string()))
}

/// Request body for `POST /pools/{pool_code}/blocked-ips`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct BlockIpRequest {
    /// Address to block.
    pub ip_address: String,
    /// Why the address is blocked.
    pub reason: String,
    /// Block lifetime in days; the server default applies when omitted.
    #[serde(default)]
    pub duration_days: Option<u32>,
}

/// Request body for `POST /pools/{pool_code}/suspicious-clicks`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SuspiciousClickRequest {
    /// Source of the suspicious click.
    pub ip_address: String,
}

/// A blocklist entry.
#[derive(Debug, Serialize, ToSchema)]
pub struct BlockedIpDto {
    /// Blocked address.
    pub ip_address: String,
    /// Reason of the current block period.
    pub reason: String,
    /// Pools the address is attributed to.
    pub pool_codes: Vec<String>,
    /// User whose report started the block.
    pub blocked_by_user_id: String,
    /// Start of the current block period.
    pub blocked_at: DateTime<Utc>,
    /// Block end.
    pub expires_at: DateTime<Utc>,
    /// Blocked for every pool.
    pub is_global: bool,
    /// Pools that reported the address.
    pub detection_count: u32,
}

impl From<BlockedIp> for BlockedIpDto {
    fn from(b: BlockedIp) -> Self {
        Self {
            ip_address: b.ip_address.to_string(),
            reason: b.reason,
            pool_codes: b.pool_codes.iter().map(ToString::to_string).collect(),
            blocked_by_user_id: b.blocked_by_user_id,
            blocked_at: b.blocked_at,
            expires_at: b.expires_at,
            is_global: b.is_global,
            detection_count: b.detection_count,
        }
    }
}

/// Response body for a recorded block.
#[derive(Debug, Serialize, ToSchema)]
pub struct BlockResponse {
    /// Entry after the update.
    pub blocked_ip: BlockedIpDto,
    /// `true` if the pool had not reported this address before.
    pub newly_attributed: bool,
    /// Pool counter after the update.
    pub pool_total_blocked_ips: u64,
}

impl From<BlockOutcome> for BlockResponse {
    fn from(o: BlockOutcome) -> Self {
        Self {
            blocked_ip: o.blocked_ip.into(),
            newly_attributed: o.newly_attributed,
            pool_total_blocked_ips: o.pool_total_blocked_ips,
        }
    }
}

/// Response body for `POST /pools/{pool_code}/suspicious-clicks`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SuspiciousClickResponse {
    /// Pool the click was reported in.
    pub pool_code: String,
    /// Reported source.
    pub ip_address: String,
    /// Clicks counted toward the threshold, 0 after a block.
    pub suspicious_clicks: u32,
    /// Member's click threshold.
    pub click_threshold: u32,
    /// `true` if this report blocked the source.
    pub blocked: bool,
    /// The block, when one was made.
    pub block: Option<BlockResponse>,
}

impl From<SuspiciousClickOutcome> for SuspiciousClickResponse {
    fn from(o: SuspiciousClickOutcome) -> Self {
        let blocked = o.block.is_some();
        Self {
            pool_code: o.pool_code.to_string(),
            ip_address: o.ip_address.to_string(),
            suspicious_clicks: if blocked { 0 } else { o.suspicious_clicks },
            click_threshold: o.click_threshold,
            blocked,
            block: o.block.map(Into::into),
        }
    }
}

/// List response for `GET /pools/{pool_code}/blocked-ips`.
#[derive(Debug, Serialize, ToSchema)]
pub struct BlockedIpListResponse {
    /// Entries, newest block first.
    pub data: Vec<BlockedIpDto>,
    /// Number of entries in `data`.
    pub count: usize,
}

/// Response body for `GET /pools/ip-check/{ip}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct IpCheckResponse {
    /// Checked address.
    pub ip_address: String,
    /// `true` if blocked for any pool the caller joined.
    pub is_blocked: bool,
}

/// Response body for `POST /admin/pools/{pool_code}/global-block`.
#[derive(Debug, Serialize, ToSchema)]
pub struct GlobalBlockResponse {
    /// Pool whose blocks were promoted.
    pub pool_code: String,
    /// Entries that became global.
    pub affected: usize,
    /// When the promotion was applied.
    pub applied_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_v4_and_v6() {
        assert!(parse_ip("203.0.113.9").is_ok());
        assert!(parse_ip(" 2001:db8::1 ").is_ok());
        assert!(matches!(
            parse_ip("999.1.1.1"),
            Err(GatewayError::InvalidIpAddress(_))
        ));
    }
}
