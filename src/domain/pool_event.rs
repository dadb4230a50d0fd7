//! Domain events reflecting registry mutations.
//!
//! Every state change emits a [`PoolEvent`] through the [`super::EventBus`].
//! Events are broadcast to WebSocket subscribers and optionally appended to
//! the PostgreSQL event log, from which the registry is rebuilt on startup.
//! Each event therefore carries everything needed to replay it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BlockReport, Pool, PoolCode, PoolMembership};

/// Domain event emitted after every state mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum PoolEvent {
    /// Emitted when a pool is created.
    PoolCreated {
        /// Pool as stored, with zeroed counters.
        pool: Pool,
        /// Creation timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted when a user joins a pool.
    MemberJoined {
        /// New membership.
        membership: PoolMembership,
        /// Join timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted when an address is attributed to a pool or its block is
    /// renewed.
    IpBlocked {
        /// Applied report.
        report: BlockReport,
        /// Block timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted when an admin makes a pool's blocks global.
    GlobalBlockApplied {
        /// Pool whose addresses were promoted.
        pool_code: PoolCode,
        /// Number of entries changed.
        affected: usize,
        /// Timestamp of the change.
        timestamp: DateTime<Utc>,
    },
}

impl PoolEvent {
    /// Returns the pool code associated with this event.
    #[must_use]
    pub fn pool_code(&self) -> PoolCode {
        match self {
            Self::PoolCreated { pool, .. } => pool.pool_code,
            Self::MemberJoined { membership, .. } => membership.pool_code,
            Self::IpBlocked { report, .. } => report.pool_code,
            Self::GlobalBlockApplied { pool_code, .. } => *pool_code,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::PoolCreated { .. } => "pool_created",
            Self::MemberJoined { .. } => "member_joined",
            Self::IpBlocked { .. } => "ip_blocked",
            Self::GlobalBlockApplied { .. } => "global_block_applied",
        }
    }

    /// Returns the event timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::PoolCreated { timestamp, .. }
            | Self::MemberJoined { timestamp, .. }
            | Self::IpBlocked { timestamp, .. }
            | Self::GlobalBlockApplied { timestamp, .. } => *timestamp,
        }
    }
}
