//! Pool registry: pool identity, memberships, and the shared blocklist.
//!
//! [`PoolRegistry`] keeps all state behind a single
//! [`tokio::sync::RwLock`]. Every mutation performs its uniqueness checks
//! and its counter updates under one write guard, which makes each
//! operation a single transaction: two concurrent creations of the same
//! (city, sector) cannot both succeed, and counters are never updated
//! through a read-modify-write race.
//!
//! Mutation timestamps are taken while the write guard is held, so ordering
//! events by timestamp reproduces the order they were applied in.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use super::blocklist::{
    BlockOutcome, BlockReport, BlockedIp, GlobalBlockOutcome, SuspiciousClickOutcome,
};
use super::membership::{BlockSettings, MembershipLimits, PoolMembership};
use super::pool_code::{MAX_SECTOR_SLOT, MIN_SECTOR_SLOT};
use super::pool_entry::{
    CityRank, MAX_SECTOR_NAME_CHARS, OperatorStats, Pool, PoolDraft, PoolStats,
};
use super::{CityCatalog, CityCode, PoolCode, PoolEvent, SectorCode};
use crate::error::GatewayError;

/// Largest page `list_pools` returns.
pub const MAX_LIST_LIMIT: usize = 500;

/// Window used for `recent_threats` in [`PoolStats`].
const RECENT_THREAT_HOURS: i64 = 24;

/// Central store for all pools, memberships and blocks.
///
/// # Concurrency
///
/// - Reads take a shared guard and return owned snapshots.
/// - Writes are serialized; each one validates and mutates under the same
///   guard, so no partial write is ever observable.
#[derive(Debug)]
pub struct PoolRegistry {
    catalog: Arc<CityCatalog>,
    limits: MembershipLimits,
    state: RwLock<RegistryState>,
}

#[derive(Debug, Default)]
struct RegistryState {
    pools: HashMap<PoolCode, Pool>,
    creation_order: Vec<PoolCode>,
    sectors: HashMap<(CityCode, String), PoolCode>,
    memberships: HashMap<(PoolCode, String), PoolMembership>,
    user_pools: HashMap<String, Vec<PoolCode>>,
    blocked_ips: HashMap<IpAddr, BlockedIp>,
    click_counts: HashMap<(PoolCode, String, IpAddr), u32>,
}

impl PoolRegistry {
    /// Creates an empty registry validating cities against `catalog`.
    #[must_use]
    pub fn new(catalog: Arc<CityCatalog>, limits: MembershipLimits) -> Self {
        Self {
            catalog,
            limits,
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Returns the injected city catalog.
    #[must_use]
    pub fn catalog(&self) -> &CityCatalog {
        &self.catalog
    }

    /// Returns the membership limits applied at join time.
    #[must_use]
    pub const fn limits(&self) -> MembershipLimits {
        self.limits
    }

    /// Creates a pool in the lowest free sector slot of `city_code`.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::InvalidCityCode`] if the city is malformed or not
    ///   in the catalog.
    /// - [`GatewayError::InvalidSectorName`] /
    ///   [`GatewayError::InvalidMembershipPrice`] for a bad draft.
    /// - [`GatewayError::DuplicatePool`] if the (city, sector) pair exists.
    /// - [`GatewayError::SectorSlotsExhausted`] if all 999 slots are used.
    pub async fn create_pool(&self, city_code: &str, draft: PoolDraft) -> Result<Pool, GatewayError> {
        let city = self.recognized_city(city_code)?;
        validate_draft(&draft)?;

        let mut state = self.state.write().await;
        state.ensure_sector_free(city, &draft.sector_name)?;
        let sector = state
            .free_slot(city)
            .ok_or(GatewayError::SectorSlotsExhausted(city))?;
        state.insert_pool(Pool::new(PoolCode::new(city, sector), draft, Utc::now()))
    }

    /// Creates a pool at an explicit code.
    ///
    /// # Errors
    ///
    /// Same as [`Self::create_pool`], plus
    /// [`GatewayError::InvalidPoolCodeFormat`] for a malformed code and
    /// [`GatewayError::DuplicatePool`] if the code is taken.
    pub async fn register_pool(&self, pool_code: &str, draft: PoolDraft) -> Result<Pool, GatewayError> {
        let code = PoolCode::parse(pool_code)?;
        self.recognized_city(&code.city().to_string())?;
        validate_draft(&draft)?;

        let mut state = self.state.write().await;
        state.insert_pool(Pool::new(code, draft, Utc::now()))
    }

    /// Registers `user_id` as a member of the pool.
    ///
    /// Validation happens before the registry is touched; a rejected call
    /// leaves every counter unchanged.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::InvalidPoolCodeFormat`] unless `pool_code` is five
    ///   digits.
    /// - [`GatewayError::InvalidThreshold`] /
    ///   [`GatewayError::InvalidBlockDuration`] for out-of-range settings.
    /// - [`GatewayError::PoolNotFound`] if no pool has that code.
    /// - [`GatewayError::AlreadyMember`] if the user already joined.
    pub async fn join_pool(
        &self,
        pool_code: &str,
        user_id: &str,
        click_threshold: i64,
        block_duration_days: i64,
    ) -> Result<PoolMembership, GatewayError> {
        let code = PoolCode::parse(pool_code)?;
        let settings = BlockSettings::new(click_threshold, block_duration_days, self.limits)?;
        if user_id.is_empty() {
            return Err(GatewayError::InvalidRequest("user id must not be empty".to_string()));
        }

        let mut state = self.state.write().await;
        state.insert_membership(PoolMembership::new(code, user_id, settings, Utc::now()))
    }

    /// Returns one pool.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidPoolCodeFormat`] or
    /// [`GatewayError::PoolNotFound`].
    pub async fn get_pool(&self, pool_code: &str) -> Result<Pool, GatewayError> {
        let code = PoolCode::parse(pool_code)?;
        self.state.read().await.pool(code).cloned()
    }

    /// Returns up to `limit` pools, newest first, optionally restricted to
    /// one city. `limit` is capped at [`MAX_LIST_LIMIT`].
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidCityCode`] for a malformed filter.
    pub async fn list_pools(
        &self,
        limit: usize,
        city_code: Option<&str>,
    ) -> Result<Vec<Pool>, GatewayError> {
        let city = city_code.map(CityCode::parse).transpose()?;
        let state = self.state.read().await;

        let mut pools: Vec<Pool> = state
            .creation_order
            .iter()
            .rev()
            .filter(|code| city.is_none_or(|c| code.city() == c))
            .filter_map(|code| state.pools.get(code).cloned())
            .collect();
        // Stable: equal timestamps keep the later insert first.
        pools.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        pools.truncate(limit.min(MAX_LIST_LIMIT));
        Ok(pools)
    }

    /// Returns the pools `user_id` joined, in join order.
    pub async fn list_user_pools(&self, user_id: &str) -> Vec<Pool> {
        let state = self.state.read().await;
        state
            .user_pools
            .get(user_id)
            .map(|codes| {
                codes
                    .iter()
                    .filter_map(|code| state.pools.get(code).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the membership of `user_id` in the pool, if any.
    pub async fn membership(&self, pool_code: PoolCode, user_id: &str) -> Option<PoolMembership> {
        self.state
            .read()
            .await
            .memberships
            .get(&(pool_code, user_id.to_string()))
            .cloned()
    }

    /// Returns the user ids of all members of a pool, in join order.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidPoolCodeFormat`] or
    /// [`GatewayError::PoolNotFound`].
    pub async fn pool_members(&self, pool_code: &str) -> Result<Vec<String>, GatewayError> {
        let code = PoolCode::parse(pool_code)?;
        let state = self.state.read().await;
        state.pool(code)?;

        let mut members: Vec<&PoolMembership> = state
            .memberships
            .values()
            .filter(|m| m.pool_code == code && m.is_active)
            .collect();
        members.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
        Ok(members.into_iter().map(|m| m.user_id.clone()).collect())
    }

    /// Returns activity figures of one pool.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidPoolCodeFormat`] or
    /// [`GatewayError::PoolNotFound`].
    pub async fn pool_stats(&self, pool_code: &str) -> Result<PoolStats, GatewayError> {
        let code = PoolCode::parse(pool_code)?;
        let since = Utc::now() - Duration::hours(RECENT_THREAT_HOURS);
        let state = self.state.read().await;
        let pool = state.pool(code)?;

        let recent_threats = state
            .blocked_ips
            .values()
            .filter(|b| b.pool_codes.contains(&code) && b.blocked_at >= since)
            .count();

        Ok(PoolStats {
            pool_code: code,
            sector_name: pool.sector_name.clone(),
            member_count: pool.member_count,
            total_blocked_ips: pool.total_blocked_ips,
            recent_threats: u64::try_from(recent_threats).unwrap_or(u64::MAX),
        })
    }

    /// Attributes an address to a pool.
    ///
    /// A first attribution grows the pool's `total_blocked_ips` by one; a
    /// repeated one only extends the block.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::InvalidRequest`] for an empty reason.
    /// - [`GatewayError::InvalidBlockDuration`] above the configured maximum.
    /// - [`GatewayError::PoolNotFound`] if the pool does not exist.
    pub async fn record_blocked_ip(&self, report: BlockReport) -> Result<BlockOutcome, GatewayError> {
        if report.reason.trim().is_empty() {
            return Err(GatewayError::InvalidRequest("block reason must not be empty".to_string()));
        }
        if report.duration_days > self.limits.max_block_duration_days {
            return Err(GatewayError::InvalidBlockDuration {
                value: i64::from(report.duration_days),
                max: self.limits.max_block_duration_days,
            });
        }
        let mut state = self.state.write().await;
        state.record_block(report, Utc::now())
    }

    /// Counts one suspicious click from `ip_address` against the member's
    /// threshold; reaching it blocks the address for the pool for the
    /// member's block duration and restarts the count.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::InvalidPoolCodeFormat`] /
    ///   [`GatewayError::PoolNotFound`] for a bad pool.
    /// - [`GatewayError::NotAMember`] if `user_id` has not joined the pool.
    pub async fn report_suspicious_click(
        &self,
        pool_code: &str,
        user_id: &str,
        ip_address: IpAddr,
    ) -> Result<SuspiciousClickOutcome, GatewayError> {
        let code = PoolCode::parse(pool_code)?;
        let mut state = self.state.write().await;
        let now = Utc::now();
        state.pool(code)?;

        let settings = state
            .memberships
            .get(&(code, user_id.to_string()))
            .map(PoolMembership::settings)
            .ok_or(GatewayError::NotAMember(code))?;

        let key = (code, user_id.to_string(), ip_address);
        let count = state.click_counts.entry(key.clone()).or_insert(0);
        *count = count.saturating_add(1);
        let suspicious_clicks = *count;

        let block = if suspicious_clicks >= settings.click_threshold {
            state.click_counts.remove(&key);
            let report = BlockReport {
                pool_code: code,
                ip_address,
                reason: format!(
                    "click threshold reached: {suspicious_clicks} suspicious clicks (limit {})",
                    settings.click_threshold
                ),
                reported_by: user_id.to_string(),
                duration_days: settings.block_duration_days,
            };
            Some(state.record_block(report, now)?)
        } else {
            None
        };

        Ok(SuspiciousClickOutcome {
            pool_code: code,
            ip_address,
            suspicious_clicks,
            click_threshold: settings.click_threshold,
            block,
        })
    }

    /// Returns up to `limit` blocks attributed to the pool, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidPoolCodeFormat`] or
    /// [`GatewayError::PoolNotFound`].
    pub async fn pool_blocked_ips(
        &self,
        pool_code: &str,
        limit: usize,
    ) -> Result<Vec<BlockedIp>, GatewayError> {
        let code = PoolCode::parse(pool_code)?;
        let state = self.state.read().await;
        state.pool(code)?;

        let mut blocks: Vec<BlockedIp> = state
            .blocked_ips
            .values()
            .filter(|b| b.pool_codes.contains(&code))
            .cloned()
            .collect();
        blocks.sort_by(|a, b| {
            b.blocked_at
                .cmp(&a.blocked_at)
                .then_with(|| a.ip_address.cmp(&b.ip_address))
        });
        blocks.truncate(limit.min(MAX_LIST_LIMIT));
        Ok(blocks)
    }

    /// Returns `true` if an unexpired block on `ip_address` is global or
    /// attributed to any pool `user_id` joined. Users without pools are
    /// never covered.
    pub async fn is_ip_blocked_for_user(&self, ip_address: IpAddr, user_id: &str) -> bool {
        let now = Utc::now();
        let state = self.state.read().await;
        let Some(pools) = state.user_pools.get(user_id) else {
            return false;
        };
        let Some(block) = state.blocked_ips.get(&ip_address) else {
            return false;
        };
        pools.iter().any(|code| block.blocks_pool_at(*code, now))
    }

    /// Marks every address attributed to the pool as globally blocked.
    ///
    /// `applied_at` is taken under the write guard, so it orders the
    /// promotion against every other mutation.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidPoolCodeFormat`] or
    /// [`GatewayError::PoolNotFound`].
    pub async fn apply_global_block(
        &self,
        pool_code: &str,
    ) -> Result<GlobalBlockOutcome, GatewayError> {
        let code = PoolCode::parse(pool_code)?;
        let mut state = self.state.write().await;
        let affected = state.global_block(code)?;
        Ok(GlobalBlockOutcome {
            pool_code: code,
            affected,
            applied_at: Utc::now(),
        })
    }

    /// Returns cross-pool figures; `top_cities` holds at most
    /// `top_cities_limit` entries.
    pub async fn operator_stats(&self, top_cities_limit: usize) -> OperatorStats {
        let state = self.state.read().await;

        let mut per_city: BTreeMap<CityCode, u64> = BTreeMap::new();
        let mut total_members: u64 = 0;
        for pool in state.pools.values() {
            let count = per_city.entry(pool.city_plate_code).or_insert(0);
            *count = count.saturating_add(1);
            total_members = total_members.saturating_add(pool.member_count);
        }

        let mut top_cities: Vec<CityRank> = per_city
            .into_iter()
            .map(|(city_code, pool_count)| CityRank {
                city_code,
                pool_count,
            })
            .collect();
        top_cities.sort_by(|a, b| {
            b.pool_count
                .cmp(&a.pool_count)
                .then_with(|| a.city_code.cmp(&b.city_code))
        });
        top_cities.truncate(top_cities_limit);

        OperatorStats {
            total_pools: u64::try_from(state.pools.len()).unwrap_or(u64::MAX),
            total_members,
            total_blocked_ips: u64::try_from(state.blocked_ips.len()).unwrap_or(u64::MAX),
            top_cities,
        }
    }

    /// Re-applies a logged event while rebuilding the registry.
    ///
    /// Catalog and limit checks are skipped: the event was valid when it
    /// was recorded. Structural invariants still hold.
    ///
    /// # Errors
    ///
    /// Returns the error the original operation would have returned if the
    /// event conflicts with the current state.
    pub async fn apply_event(&self, event: &PoolEvent) -> Result<(), GatewayError> {
        let mut state = self.state.write().await;
        match event {
            PoolEvent::PoolCreated { pool, .. } => {
                let mut pool = pool.clone();
                pool.member_count = 0;
                pool.total_blocked_ips = 0;
                state.insert_pool(pool)?;
            }
            PoolEvent::MemberJoined { membership, .. } => {
                state.insert_membership(membership.clone())?;
            }
            PoolEvent::IpBlocked { report, timestamp } => {
                state.record_block(report.clone(), *timestamp)?;
            }
            PoolEvent::GlobalBlockApplied { pool_code, .. } => {
                state.global_block(*pool_code)?;
            }
        }
        Ok(())
    }

    /// Returns the number of pools in the registry.
    pub async fn len(&self) -> usize {
        self.state.read().await.pools.len()
    }

    /// Returns `true` if the registry contains no pools.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.pools.is_empty()
    }

    fn recognized_city(&self, city_code: &str) -> Result<CityCode, GatewayError> {
        let city = CityCode::parse(city_code)?;
        if !self.catalog.contains(city) {
            return Err(GatewayError::InvalidCityCode(format!(
                "{city} is not a recognized city"
            )));
        }
        Ok(city)
    }
}

impl RegistryState {
    fn pool(&self, code: PoolCode) -> Result<&Pool, GatewayError> {
        self.pools.get(&code).ok_or(GatewayError::PoolNotFound(code))
    }

    fn ensure_sector_free(&self, city: CityCode, sector_name: &str) -> Result<(), GatewayError> {
        match self.sectors.get(&(city, sector_key(sector_name))) {
            Some(existing) => Err(GatewayError::DuplicatePool(format!(
                "sector {:?} already has pool {existing} in city {city}",
                sector_name.trim()
            ))),
            None => Ok(()),
        }
    }

    fn free_slot(&self, city: CityCode) -> Option<SectorCode> {
        (MIN_SECTOR_SLOT..=MAX_SECTOR_SLOT)
            .filter_map(SectorCode::from_slot)
            .find(|sector| !self.pools.contains_key(&PoolCode::new(city, *sector)))
    }

    fn insert_pool(&mut self, pool: Pool) -> Result<Pool, GatewayError> {
        let code = pool.pool_code;
        if self.pools.contains_key(&code) {
            return Err(GatewayError::DuplicatePool(code.to_string()));
        }
        self.ensure_sector_free(pool.city_plate_code, &pool.sector_name)?;

        self.sectors
            .insert((pool.city_plate_code, sector_key(&pool.sector_name)), code);
        self.creation_order.push(code);
        self.pools.insert(code, pool.clone());
        Ok(pool)
    }

    fn insert_membership(&mut self, membership: PoolMembership) -> Result<PoolMembership, GatewayError> {
        let code = membership.pool_code;
        let pool = self
            .pools
            .get_mut(&code)
            .ok_or(GatewayError::PoolNotFound(code))?;

        match self.memberships.entry((code, membership.user_id.clone())) {
            Entry::Occupied(_) => Err(GatewayError::AlreadyMember {
                pool_code: code,
                user_id: membership.user_id,
            }),
            Entry::Vacant(slot) => {
                pool.member_count = pool.member_count.saturating_add(1);
                self.user_pools
                    .entry(membership.user_id.clone())
                    .or_default()
                    .push(code);
                slot.insert(membership.clone());
                Ok(membership)
            }
        }
    }

    fn record_block(&mut self, report: BlockReport, now: DateTime<Utc>) -> Result<BlockOutcome, GatewayError> {
        let code = report.pool_code;
        let pool = self
            .pools
            .get_mut(&code)
            .ok_or(GatewayError::PoolNotFound(code))?;

        let (blocked_ip, newly_attributed) = match self.blocked_ips.entry(report.ip_address) {
            Entry::Occupied(mut existing) => {
                let block = existing.get_mut();
                if !block.is_active_at(now) {
                    block.reason.clone_from(&report.reason);
                    block.blocked_by_user_id.clone_from(&report.reported_by);
                    block.blocked_at = now;
                }
                let newly_attributed = block.pool_codes.insert(code);
                if newly_attributed {
                    block.detection_count = block.detection_count.saturating_add(1);
                }
                block.extend(now, report.duration_days);
                (block.clone(), newly_attributed)
            }
            Entry::Vacant(slot) => {
                let block = BlockedIp::new(
                    report.ip_address,
                    code,
                    report.reason.clone(),
                    report.reported_by.clone(),
                    now,
                    report.duration_days,
                );
                (slot.insert(block).clone(), true)
            }
        };

        if newly_attributed {
            pool.total_blocked_ips = pool.total_blocked_ips.saturating_add(1);
        }

        Ok(BlockOutcome {
            report,
            reported_at: now,
            blocked_ip,
            newly_attributed,
            pool_total_blocked_ips: pool.total_blocked_ips,
        })
    }

    fn global_block(&mut self, code: PoolCode) -> Result<usize, GatewayError> {
        self.pool(code)?;
        let mut affected = 0;
        for block in self.blocked_ips.values_mut() {
            if block.pool_codes.contains(&code) && !block.is_global {
                block.is_global = true;
                affected += 1;
            }
        }
        Ok(affected)
    }
}

/// Uniqueness key of a sector name within a city.
fn sector_key(sector_name: &str) -> String {
    sector_name.trim().to_lowercase()
}

fn validate_draft(draft: &PoolDraft) -> Result<(), GatewayError> {
    let name = draft.sector_name.trim();
    if name.is_empty() {
        return Err(GatewayError::InvalidSectorName("must not be empty".to_string()));
    }
    if name.chars().count() > MAX_SECTOR_NAME_CHARS {
        return Err(GatewayError::InvalidSectorName(format!(
            "must be at most {MAX_SECTOR_NAME_CHARS} characters"
        )));
    }
    if draft.membership_price < Decimal::ZERO {
        return Err(GatewayError::InvalidMembershipPrice(draft.membership_price));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn make_registry() -> PoolRegistry {
        PoolRegistry::new(Arc::new(CityCatalog::builtin()), MembershipLimits::default())
    }

    async fn create(registry: &PoolRegistry, city: &str, sector: &str) -> Pool {
        let Ok(pool) = registry
            .create_pool(city, PoolDraft::new(sector, dec!(99.0)))
            .await
        else {
            panic!("pool creation failed");
        };
        pool
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([203, 0, 113, last])
    }

    fn report(code: PoolCode, ip_address: IpAddr, duration_days: u32) -> BlockReport {
        BlockReport {
            pool_code: code,
            ip_address,
            reason: "bot user agent".to_string(),
            reported_by: "u1".to_string(),
            duration_days,
        }
    }

    #[tokio::test]
    async fn create_assigns_first_slot() {
        let registry = make_registry();
        let pool = create(&registry, "34", "Plumber").await;
        assert_eq!(pool.pool_code.to_string(), "34001");
        assert_eq!(pool.city_plate_code.to_string(), "34");
        assert_eq!(pool.sector_code.to_string(), "001");
        assert_eq!(pool.member_count, 0);
        assert!(pool.is_premium);

        let second = create(&registry, "34", "Electrician").await;
        assert_eq!(second.pool_code.to_string(), "34002");

        let other_city = create(&registry, "06", "Plumber").await;
        assert_eq!(other_city.pool_code.to_string(), "06001");
    }

    #[tokio::test]
    async fn create_fills_gaps_left_by_explicit_codes() {
        let registry = make_registry();
        let registered = registry
            .register_pool("34001", PoolDraft::new("Locksmith", dec!(10)))
            .await;
        assert!(registered.is_ok());

        let pool = create(&registry, "34", "Plumber").await;
        assert_eq!(pool.pool_code.to_string(), "34002");
    }

    #[tokio::test]
    async fn create_then_list_contains_pool_once() {
        let registry = make_registry();
        let pool = create(&registry, "35", "Dentist").await;

        let Ok(list) = registry.list_pools(100, None).await else {
            panic!("list failed");
        };
        let hits = list.iter().filter(|p| p.pool_code == pool.pool_code).count();
        assert_eq!(hits, 1);
    }

    #[tokio::test]
    async fn create_rejects_unknown_city() {
        let registry = make_registry();
        for city in ["99", "3", "abc", ""] {
            let result = registry
                .create_pool(city, PoolDraft::new("Plumber", dec!(1)))
                .await;
            assert!(
                matches!(result, Err(GatewayError::InvalidCityCode(_))),
                "accepted city {city:?}"
            );
        }
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn create_rejects_bad_sector_and_price() {
        let registry = make_registry();
        let blank = registry.create_pool("34", PoolDraft::new("   ", dec!(1))).await;
        assert!(matches!(blank, Err(GatewayError::InvalidSectorName(_))));

        let long = registry
            .create_pool("34", PoolDraft::new("x".repeat(101), dec!(1)))
            .await;
        assert!(matches!(long, Err(GatewayError::InvalidSectorName(_))));

        let negative = registry
            .create_pool("34", PoolDraft::new("Plumber", dec!(-0.01)))
            .await;
        assert!(matches!(negative, Err(GatewayError::InvalidMembershipPrice(_))));

        let free = registry.create_pool("34", PoolDraft::new("Plumber", dec!(0))).await;
        assert!(free.is_ok());
    }

    #[tokio::test]
    async fn duplicate_sector_is_rejected_case_insensitively() {
        let registry = make_registry();
        let _ = create(&registry, "34", "Plumber").await;

        let result = registry
            .create_pool("34", PoolDraft::new("  plumber ", dec!(50)))
            .await;
        assert!(matches!(result, Err(GatewayError::DuplicatePool(_))));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn register_rejects_taken_code() {
        let registry = make_registry();
        let _ = create(&registry, "34", "Plumber").await;

        let result = registry
            .register_pool("34001", PoolDraft::new("Roofer", dec!(1)))
            .await;
        assert!(matches!(result, Err(GatewayError::DuplicatePool(_))));

        let bad = registry
            .register_pool("99001", PoolDraft::new("Roofer", dec!(1)))
            .await;
        assert!(matches!(bad, Err(GatewayError::InvalidCityCode(_))));

        let slot_zero = registry
            .register_pool("34000", PoolDraft::new("Roofer", dec!(1)))
            .await;
        assert!(matches!(
            slot_zero,
            Err(GatewayError::InvalidPoolCodeFormat(_))
        ));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn sector_slots_run_out() {
        let registry = make_registry();
        for slot in 1..=MAX_SECTOR_SLOT {
            let result = registry
                .register_pool(
                    &format!("07{slot:03}"),
                    PoolDraft::new(format!("Sector {slot}"), dec!(1)),
                )
                .await;
            assert!(result.is_ok());
        }
        let result = registry
            .create_pool("07", PoolDraft::new("One too many", dec!(1)))
            .await;
        assert!(matches!(result, Err(GatewayError::SectorSlotsExhausted(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_duplicate_creation_has_one_winner() {
        let registry = Arc::new(make_registry());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                registry
                    .create_pool("34", PoolDraft::new("Plumber", dec!(99)))
                    .await
            }));
        }

        let mut created = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await {
                Ok(Ok(_)) => created += 1,
                Ok(Err(GatewayError::DuplicatePool(_))) => duplicates += 1,
                other => panic!("unexpected result: {other:?}"),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(duplicates, 7);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn join_scenario_counts_member_once() {
        let registry = make_registry();
        let pool = create(&registry, "34", "Plumber").await;
        let code = pool.pool_code.to_string();

        let Ok(membership) = registry.join_pool(&code, "u1", 1, 7).await else {
            panic!("join failed");
        };
        assert_eq!(membership.click_threshold, 1);
        assert_eq!(membership.block_duration_days, 7);

        let second = registry.join_pool(&code, "u1", 2, 14).await;
        assert!(matches!(second, Err(GatewayError::AlreadyMember { .. })));

        let Ok(pool) = registry.get_pool(&code).await else {
            panic!("pool missing");
        };
        assert_eq!(pool.member_count, 1);

        let Some(stored) = registry.membership(pool.pool_code, "u1").await else {
            panic!("membership missing");
        };
        assert_eq!(stored.block_duration_days, 7);
    }

    #[tokio::test]
    async fn join_rejects_malformed_codes_without_mutation() {
        let registry = make_registry();
        let _ = create(&registry, "34", "Plumber").await;

        for bad in ["3400", "340011", "34a01", "", "34 01"] {
            let result = registry.join_pool(bad, "u1", 1, 7).await;
            assert!(matches!(result, Err(GatewayError::InvalidPoolCodeFormat(_))));
        }
        let stats = registry.operator_stats(10).await;
        assert_eq!(stats.total_members, 0);
        assert!(registry.list_user_pools("u1").await.is_empty());
    }

    #[tokio::test]
    async fn join_unknown_pool_fails() {
        let registry = make_registry();
        let result = registry.join_pool("34001", "u1", 1, 7).await;
        assert!(matches!(result, Err(GatewayError::PoolNotFound(_))));
    }

    #[tokio::test]
    async fn join_validates_settings() {
        let registry = make_registry();
        let _ = create(&registry, "34", "Plumber").await;

        let threshold = registry.join_pool("34001", "u1", 0, 7).await;
        assert!(matches!(threshold, Err(GatewayError::InvalidThreshold { .. })));

        let duration = registry.join_pool("34001", "u1", 1, -1).await;
        assert!(matches!(duration, Err(GatewayError::InvalidBlockDuration { .. })));

        let Ok(pool) = registry.get_pool("34001").await else {
            panic!("pool missing");
        };
        assert_eq!(pool.member_count, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_joins_count_every_member() {
        let registry = Arc::new(make_registry());
        let _ = create(&registry, "34", "Plumber").await;

        let mut handles = Vec::new();
        for i in 0..50 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                registry.join_pool("34001", &format!("user-{i}"), 1, 7).await
            }));
        }
        for handle in handles {
            assert!(matches!(handle.await, Ok(Ok(_))));
        }

        let Ok(pool) = registry.get_pool("34001").await else {
            panic!("pool missing");
        };
        assert_eq!(pool.member_count, 50);
    }

    #[tokio::test]
    async fn list_is_newest_first_and_limited() {
        let registry = make_registry();
        let first = create(&registry, "34", "Plumber").await;
        let second = create(&registry, "06", "Plumber").await;
        let third = create(&registry, "34", "Roofer").await;

        let Ok(all) = registry.list_pools(10, None).await else {
            panic!("list failed");
        };
        let codes: Vec<PoolCode> = all.iter().map(|p| p.pool_code).collect();
        assert_eq!(codes, vec![third.pool_code, second.pool_code, first.pool_code]);

        let Ok(limited) = registry.list_pools(2, None).await else {
            panic!("list failed");
        };
        assert_eq!(limited.len(), 2);

        let Ok(istanbul) = registry.list_pools(10, Some("34")).await else {
            panic!("list failed");
        };
        assert_eq!(istanbul.len(), 2);

        let bad = registry.list_pools(10, Some("3x")).await;
        assert!(matches!(bad, Err(GatewayError::InvalidCityCode(_))));
    }

    #[tokio::test]
    async fn user_pools_follow_join_order() {
        let registry = make_registry();
        let a = create(&registry, "34", "Plumber").await;
        let b = create(&registry, "06", "Dentist").await;
        let _ = registry.join_pool(&b.pool_code.to_string(), "u1", 1, 7).await;
        let _ = registry.join_pool(&a.pool_code.to_string(), "u1", 1, 7).await;
        let _ = registry.join_pool(&a.pool_code.to_string(), "u2", 1, 7).await;

        let mine: Vec<PoolCode> = registry
            .list_user_pools("u1")
            .await
            .iter()
            .map(|p| p.pool_code)
            .collect();
        assert_eq!(mine, vec![b.pool_code, a.pool_code]);

        let Ok(members) = registry.pool_members(&a.pool_code.to_string()).await else {
            panic!("members failed");
        };
        assert_eq!(members.len(), 2);
    }

    #[tokio::test]
    async fn operator_stats_rank_cities() {
        let registry = make_registry();
        for sector in ["A", "B", "C"] {
            let _ = create(&registry, "06", sector).await;
            let _ = create(&registry, "01", sector).await;
        }
        let _ = create(&registry, "34", "A").await;
        let _ = registry.join_pool("06001", "u1", 1, 7).await;
        let _ = registry.join_pool("06002", "u1", 1, 7).await;

        let stats = registry.operator_stats(10).await;
        assert_eq!(stats.total_pools, 7);
        assert_eq!(stats.total_members, 2);
        let ranking: Vec<(String, u64)> = stats
            .top_cities
            .iter()
            .map(|r| (r.city_code.to_string(), r.pool_count))
            .collect();
        assert_eq!(
            ranking,
            vec![
                ("01".to_string(), 3),
                ("06".to_string(), 3),
                ("34".to_string(), 1)
            ]
        );

        let truncated = registry.operator_stats(1).await;
        assert_eq!(truncated.top_cities.len(), 1);
    }

    #[tokio::test]
    async fn blocked_ips_are_counted_per_distinct_address() {
        let registry = make_registry();
        let pool = create(&registry, "34", "Plumber").await;
        let code = pool.pool_code;

        let Ok(first) = registry.record_blocked_ip(report(code, ip(1), 7)).await else {
            panic!("block failed");
        };
        assert!(first.newly_attributed);
        assert_eq!(first.pool_total_blocked_ips, 1);

        let Ok(repeat) = registry.record_blocked_ip(report(code, ip(1), 14)).await else {
            panic!("block failed");
        };
        assert!(!repeat.newly_attributed);
        assert_eq!(repeat.pool_total_blocked_ips, 1);
        assert!(repeat.blocked_ip.expires_at > first.blocked_ip.expires_at);

        let _ = registry.record_blocked_ip(report(code, ip(2), 7)).await;
        let Ok(stats) = registry.pool_stats(&code.to_string()).await else {
            panic!("stats failed");
        };
        assert_eq!(stats.total_blocked_ips, 2);
        assert_eq!(stats.recent_threats, 2);
    }

    #[tokio::test]
    async fn shared_address_counts_for_each_pool() {
        let registry = make_registry();
        let a = create(&registry, "34", "Plumber").await;
        let b = create(&registry, "06", "Plumber").await;

        let _ = registry.record_blocked_ip(report(a.pool_code, ip(9), 7)).await;
        let Ok(outcome) = registry.record_blocked_ip(report(b.pool_code, ip(9), 7)).await else {
            panic!("block failed");
        };
        assert!(outcome.newly_attributed);
        assert_eq!(outcome.blocked_ip.detection_count, 2);
        assert_eq!(outcome.blocked_ip.pool_codes.len(), 2);

        let stats = registry.operator_stats(10).await;
        assert_eq!(stats.total_blocked_ips, 1);
    }

    #[tokio::test]
    async fn record_block_validates_input() {
        let registry = make_registry();
        let pool = create(&registry, "34", "Plumber").await;

        let mut empty = report(pool.pool_code, ip(1), 7);
        empty.reason = " ".to_string();
        let result = registry.record_blocked_ip(empty).await;
        assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));

        let too_long = registry.record_blocked_ip(report(pool.pool_code, ip(1), 31)).await;
        assert!(matches!(too_long, Err(GatewayError::InvalidBlockDuration { .. })));

        let Ok(missing) = PoolCode::parse("34999") else {
            panic!("valid code rejected");
        };
        let not_found = registry.record_blocked_ip(report(missing, ip(1), 7)).await;
        assert!(matches!(not_found, Err(GatewayError::PoolNotFound(_))));
    }

    #[tokio::test]
    async fn suspicious_clicks_trigger_block_at_threshold() {
        let registry = make_registry();
        let pool = create(&registry, "34", "Plumber").await;
        let code = pool.pool_code.to_string();
        let _ = registry.join_pool(&code, "u1", 3, 14).await;

        for expected in 1..3 {
            let Ok(outcome) = registry.report_suspicious_click(&code, "u1", ip(5)).await else {
                panic!("report failed");
            };
            assert_eq!(outcome.suspicious_clicks, expected);
            assert!(outcome.block.is_none());
        }

        let Ok(outcome) = registry.report_suspicious_click(&code, "u1", ip(5)).await else {
            panic!("report failed");
        };
        assert_eq!(outcome.click_threshold, 3);
        let Some(block) = outcome.block else {
            panic!("threshold did not block");
        };
        assert_eq!(block.report.duration_days, 14);
        assert!(block.newly_attributed);

        let Ok(after) = registry.report_suspicious_click(&code, "u1", ip(5)).await else {
            panic!("report failed");
        };
        assert_eq!(after.suspicious_clicks, 1);

        assert!(registry.is_ip_blocked_for_user(ip(5), "u1").await);
    }

    #[tokio::test]
    async fn suspicious_click_requires_membership() {
        let registry = make_registry();
        let _ = create(&registry, "34", "Plumber").await;
        let result = registry.report_suspicious_click("34001", "stranger", ip(5)).await;
        assert!(matches!(result, Err(GatewayError::NotAMember(_))));
    }

    #[tokio::test]
    async fn ip_check_covers_joined_pools_and_global_blocks() {
        let registry = make_registry();
        let a = create(&registry, "34", "Plumber").await;
        let b = create(&registry, "06", "Plumber").await;
        let _ = registry.join_pool(&b.pool_code.to_string(), "u2", 1, 7).await;
        let _ = registry.record_blocked_ip(report(a.pool_code, ip(7), 7)).await;

        assert!(!registry.is_ip_blocked_for_user(ip(7), "u2").await);
        assert!(!registry.is_ip_blocked_for_user(ip(7), "no-pools").await);

        let Ok(outcome) = registry.apply_global_block(&a.pool_code.to_string()).await else {
            panic!("global block failed");
        };
        assert_eq!(outcome.affected, 1);
        assert!(registry.is_ip_blocked_for_user(ip(7), "u2").await);
        assert!(!registry.is_ip_blocked_for_user(ip(7), "no-pools").await);

        let Ok(again) = registry.apply_global_block(&a.pool_code.to_string()).await else {
            panic!("global block failed");
        };
        assert_eq!(again.affected, 0);
    }

    #[tokio::test]
    async fn global_block_is_stamped_between_neighbouring_blocks() {
        let registry = make_registry();
        let pool = create(&registry, "34", "Plumber").await;
        let code = pool.pool_code.to_string();

        let Ok(before) = registry.record_blocked_ip(report(pool.pool_code, ip(1), 7)).await else {
            panic!("block failed");
        };
        let Ok(global) = registry.apply_global_block(&code).await else {
            panic!("global block failed");
        };
        let Ok(after) = registry.record_blocked_ip(report(pool.pool_code, ip(2), 7)).await else {
            panic!("block failed");
        };

        assert!(before.reported_at <= global.applied_at);
        assert!(global.applied_at <= after.reported_at);
        assert!(registry.is_ip_blocked_for_user(ip(1), "nobody").await);
        assert!(!registry.is_ip_blocked_for_user(ip(2), "nobody").await);

        // Replaying in timestamp order reproduces the live result.
        let replica = make_registry();
        let mut events = vec![
            PoolEvent::PoolCreated {
                timestamp: pool.created_at,
                pool,
            },
            PoolEvent::IpBlocked {
                timestamp: before.reported_at,
                report: before.report,
            },
            PoolEvent::GlobalBlockApplied {
                pool_code: global.pool_code,
                affected: global.affected,
                timestamp: global.applied_at,
            },
            PoolEvent::IpBlocked {
                timestamp: after.reported_at,
                report: after.report,
            },
        ];
        events.sort_by_key(PoolEvent::timestamp);
        for event in &events {
            let Ok(()) = replica.apply_event(event).await else {
                panic!("replay failed");
            };
        }
        assert!(replica.is_ip_blocked_for_user(ip(1), "nobody").await);
        assert!(!replica.is_ip_blocked_for_user(ip(2), "nobody").await);
    }

    #[tokio::test]
    async fn blocked_ip_listing_is_limited() {
        let registry = make_registry();
        let pool = create(&registry, "34", "Plumber").await;
        for last in 1..=5 {
            let _ = registry.record_blocked_ip(report(pool.pool_code, ip(last), 7)).await;
        }
        let Ok(list) = registry.pool_blocked_ips("34001", 3).await else {
            panic!("listing failed");
        };
        assert_eq!(list.len(), 3);
    }

    #[tokio::test]
    async fn replaying_events_rebuilds_state() {
        let source = make_registry();
        let pool = create(&source, "34", "Plumber").await;
        let Ok(membership) = source.join_pool("34001", "u1", 2, 7).await else {
            panic!("join failed");
        };
        let now = Utc::now();
        let events = vec![
            PoolEvent::PoolCreated {
                pool: pool.clone(),
                timestamp: pool.created_at,
            },
            PoolEvent::MemberJoined {
                membership: membership.clone(),
                timestamp: membership.joined_at,
            },
            PoolEvent::IpBlocked {
                report: report(pool.pool_code, ip(3), 7),
                timestamp: now,
            },
            PoolEvent::GlobalBlockApplied {
                pool_code: pool.pool_code,
                affected: 1,
                timestamp: now,
            },
        ];

        let replica = make_registry();
        for event in &events {
            assert!(replica.apply_event(event).await.is_ok());
        }

        let Ok(restored) = replica.get_pool("34001").await else {
            panic!("pool not restored");
        };
        assert_eq!(restored.member_count, 1);
        assert_eq!(restored.total_blocked_ips, 1);
        assert_eq!(replica.membership(pool.pool_code, "u1").await, Some(membership));

        let duplicate = replica.apply_event(&events[0]).await;
        assert!(matches!(duplicate, Err(GatewayError::DuplicatePool(_))));
    }
}
