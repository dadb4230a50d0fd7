//! Domain layer: pool codes, pools, memberships, the shared blocklist, and
//! the event system.
//!
//! Everything here is transport-agnostic. [`PoolRegistry`] owns the state;
//! [`EventBus`] carries the [`PoolEvent`]s emitted after each mutation.

pub mod blocklist;
pub mod city_catalog;
pub mod event_bus;
pub mod membership;
pub mod pool_code;
pub mod pool_entry;
pub mod pool_event;
pub mod pool_registry;

pub use blocklist::{
    BlockOutcome, BlockReport, BlockedIp, GlobalBlockOutcome, SuspiciousClickOutcome,
};
pub use city_catalog::{CityCatalog, CityEntry};
pub use event_bus::{EventBus, JournalReceiver};
pub use membership::{BlockSettings, MembershipLimits, PoolMembership};
pub use pool_code::{CityCode, MAX_SECTOR_SLOT, MIN_SECTOR_SLOT, PoolCode, SectorCode};
pub use pool_entry::{CityRank, MAX_SECTOR_NAME_CHARS, OperatorStats, Pool, PoolDraft, PoolStats};
pub use pool_event::PoolEvent;
pub use pool_registry::{MAX_LIST_LIMIT, PoolRegistry};
