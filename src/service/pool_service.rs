//! Pool service: authorizes callers, delegates to the registry, emits
//! events.

use std::net::IpAddr;
use std::sync::Arc;

use crate::auth::Caller;
use crate::domain::{
    BlockOutcome, BlockReport, BlockedIp, CityEntry, EventBus, GlobalBlockOutcome, OperatorStats,
    Pool, PoolCode, PoolDraft, PoolEvent, PoolMembership, PoolRegistry, PoolStats,
    SuspiciousClickOutcome,
};
use crate::error::GatewayError;

/// Service-level settings that do not belong to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSettings {
    /// Duration applied to manual block reports that omit one.
    pub default_block_duration_days: u32,
    /// Length of `top_cities` in operator statistics.
    pub top_cities_limit: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            default_block_duration_days: 7,
            top_cities_limit: 10,
        }
    }
}

/// Orchestration layer for all pool operations.
///
/// Stateless coordinator: owns references to [`PoolRegistry`] for state
/// and [`EventBus`] for event emission. Every method follows the pattern:
/// check the caller's role → call the registry → emit events → return
/// result. Role checks run before any lookup, so a denied caller learns
/// nothing about which pools exist.
#[derive(Debug, Clone)]
pub struct PoolService {
    registry: Arc<PoolRegistry>,
    event_bus: EventBus,
    settings: ServiceSettings,
}

impl PoolService {
    /// Creates a new `PoolService`.
    #[must_use]
    pub fn new(registry: Arc<PoolRegistry>, event_bus: EventBus, settings: ServiceSettings) -> Self {
        Self {
            registry,
            event_bus,
            settings,
        }
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Returns a reference to the inner [`PoolRegistry`].
    #[must_use]
    pub fn registry(&self) -> &Arc<PoolRegistry> {
        &self.registry
    }

    /// Creates a pool in the next free sector slot of a city.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Unauthorized`] for non-operators, otherwise any error
    /// of [`PoolRegistry::create_pool`].
    pub async fn create_pool(
        &self,
        caller: &Caller,
        city_code: &str,
        draft: PoolDraft,
    ) -> Result<Pool, GatewayError> {
        caller.require_operator()?;
        let pool = self.registry.create_pool(city_code, draft).await?;
        self.announce_pool(caller, &pool);
        Ok(pool)
    }

    /// Creates a pool at an explicit code.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Unauthorized`] for non-operators, otherwise any error
    /// of [`PoolRegistry::register_pool`].
    pub async fn register_pool(
        &self,
        caller: &Caller,
        pool_code: &str,
        draft: PoolDraft,
    ) -> Result<Pool, GatewayError> {
        caller.require_operator()?;
        let pool = self.registry.register_pool(pool_code, draft).await?;
        self.announce_pool(caller, &pool);
        Ok(pool)
    }

    /// Joins the caller to a pool.
    ///
    /// # Errors
    ///
    /// Any error of [`PoolRegistry::join_pool`].
    pub async fn join_pool(
        &self,
        caller: &Caller,
        pool_code: &str,
        click_threshold: i64,
        block_duration_days: i64,
    ) -> Result<PoolMembership, GatewayError> {
        let membership = self
            .registry
            .join_pool(pool_code, &caller.user_id, click_threshold, block_duration_days)
            .await?;

        let _ = self.event_bus.publish(PoolEvent::MemberJoined {
            membership: membership.clone(),
            timestamp: membership.joined_at,
        });

        tracing::info!(
            pool_code = %membership.pool_code,
            user_id = %membership.user_id,
            click_threshold = membership.click_threshold,
            block_duration_days = membership.block_duration_days,
            "member joined"
        );
        Ok(membership)
    }

    /// Returns one pool.
    ///
    /// # Errors
    ///
    /// Any error of [`PoolRegistry::get_pool`].
    pub async fn get_pool(&self, _caller: &Caller, pool_code: &str) -> Result<Pool, GatewayError> {
        self.registry.get_pool(pool_code).await
    }

    /// Lists pools, newest first.
    ///
    /// # Errors
    ///
    /// Any error of [`PoolRegistry::list_pools`].
    pub async fn list_pools(
        &self,
        _caller: &Caller,
        limit: usize,
        city_code: Option<&str>,
    ) -> Result<Vec<Pool>, GatewayError> {
        self.registry.list_pools(limit, city_code).await
    }

    /// Lists the pools the caller joined.
    pub async fn list_my_pools(&self, caller: &Caller) -> Vec<Pool> {
        self.registry.list_user_pools(&caller.user_id).await
    }

    /// Returns activity figures of one pool.
    ///
    /// # Errors
    ///
    /// Any error of [`PoolRegistry::pool_stats`].
    pub async fn pool_stats(
        &self,
        _caller: &Caller,
        pool_code: &str,
    ) -> Result<PoolStats, GatewayError> {
        self.registry.pool_stats(pool_code).await
    }

    /// Lists the members of a pool.
    ///
    /// # Errors
    ///
    /// [`GatewayError::NotAMember`] unless the caller is a member or an
    /// operator, otherwise any error of [`PoolRegistry::pool_members`].
    pub async fn pool_members(
        &self,
        caller: &Caller,
        pool_code: &str,
    ) -> Result<Vec<String>, GatewayError> {
        self.require_member_or_operator(caller, pool_code).await?;
        self.registry.pool_members(pool_code).await
    }

    /// Returns cross-pool statistics.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Unauthorized`] for non-operators.
    pub async fn operator_stats(&self, caller: &Caller) -> Result<OperatorStats, GatewayError> {
        caller.require_operator()?;
        Ok(self
            .registry
            .operator_stats(self.settings.top_cities_limit)
            .await)
    }

    /// Returns the city catalog.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Unauthorized`] for non-operators.
    pub fn cities(&self, caller: &Caller) -> Result<Vec<CityEntry>, GatewayError> {
        caller.require_operator()?;
        Ok(self.registry.catalog().entries())
    }

    /// Reports an address as blocked for a pool.
    ///
    /// `duration_days` falls back to the configured default.
    ///
    /// # Errors
    ///
    /// [`GatewayError::NotAMember`] unless the caller is a member or an
    /// operator, otherwise any error of [`PoolRegistry::record_blocked_ip`].
    pub async fn record_blocked_ip(
        &self,
        caller: &Caller,
        pool_code: &str,
        ip_address: IpAddr,
        reason: String,
        duration_days: Option<u32>,
    ) -> Result<BlockOutcome, GatewayError> {
        let code = self.require_member_or_operator(caller, pool_code).await?;
        let report = BlockReport {
            pool_code: code,
            ip_address,
            reason,
            reported_by: caller.user_id.clone(),
            duration_days: duration_days.unwrap_or(self.settings.default_block_duration_days),
        };
        let outcome = self.registry.record_blocked_ip(report).await?;
        self.announce_block(&outcome);
        Ok(outcome)
    }

    /// Counts one suspicious click reported by the caller.
    ///
    /// # Errors
    ///
    /// Any error of [`PoolRegistry::report_suspicious_click`].
    pub async fn report_suspicious_click(
        &self,
        caller: &Caller,
        pool_code: &str,
        ip_address: IpAddr,
    ) -> Result<SuspiciousClickOutcome, GatewayError> {
        let outcome = self
            .registry
            .report_suspicious_click(pool_code, &caller.user_id, ip_address)
            .await?;

        tracing::debug!(
            pool_code = %outcome.pool_code,
            ip = %outcome.ip_address,
            clicks = outcome.suspicious_clicks,
            threshold = outcome.click_threshold,
            "suspicious click counted"
        );
        if let Some(block) = &outcome.block {
            self.announce_block(block);
        }
        Ok(outcome)
    }

    /// Lists blocks attributed to a pool, newest first.
    ///
    /// # Errors
    ///
    /// [`GatewayError::NotAMember`] unless the caller is a member or an
    /// operator, otherwise any error of [`PoolRegistry::pool_blocked_ips`].
    pub async fn pool_blocked_ips(
        &self,
        caller: &Caller,
        pool_code: &str,
        limit: usize,
    ) -> Result<Vec<BlockedIp>, GatewayError> {
        self.require_member_or_operator(caller, pool_code).await?;
        self.registry.pool_blocked_ips(pool_code, limit).await
    }

    /// Returns `true` if `ip_address` is blocked for any pool the caller
    /// joined.
    pub async fn is_ip_blocked(&self, caller: &Caller, ip_address: IpAddr) -> bool {
        self.registry
            .is_ip_blocked_for_user(ip_address, &caller.user_id)
            .await
    }

    /// Promotes every block of a pool to a global block.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Unauthorized`] for non-admins, otherwise any error of
    /// [`PoolRegistry::apply_global_block`].
    pub async fn apply_global_block(
        &self,
        caller: &Caller,
        pool_code: &str,
    ) -> Result<GlobalBlockOutcome, GatewayError> {
        caller.require_admin()?;
        let outcome = self.registry.apply_global_block(pool_code).await?;

        let _ = self.event_bus.publish(PoolEvent::GlobalBlockApplied {
            pool_code: outcome.pool_code,
            affected: outcome.affected,
            timestamp: outcome.applied_at,
        });

        tracing::warn!(
            pool_code = %outcome.pool_code,
            affected = outcome.affected,
            admin = %caller.user_id,
            "pool blocks promoted to global"
        );
        Ok(outcome)
    }

    /// Checks membership before any block data of the pool is touched.
    async fn require_member_or_operator(
        &self,
        caller: &Caller,
        pool_code: &str,
    ) -> Result<PoolCode, GatewayError> {
        let code = PoolCode::parse(pool_code)?;
        if caller.is_operator() || self.registry.membership(code, &caller.user_id).await.is_some() {
            Ok(code)
        } else {
            Err(GatewayError::NotAMember(code))
        }
    }

    fn announce_pool(&self, caller: &Caller, pool: &Pool) {
        let _ = self.event_bus.publish(PoolEvent::PoolCreated {
            pool: pool.clone(),
            timestamp: pool.created_at,
        });

        tracing::info!(
            pool_code = %pool.pool_code,
            sector = %pool.sector_name,
            operator = %caller.user_id,
            "pool created"
        );
    }

    fn announce_block(&self, outcome: &BlockOutcome) {
        let _ = self.event_bus.publish(PoolEvent::IpBlocked {
            report: outcome.report.clone(),
            timestamp: outcome.reported_at,
        });

        tracing::info!(
            pool_code = %outcome.report.pool_code,
            ip = %outcome.report.ip_address,
            newly_attributed = outcome.newly_attributed,
            expires_at = %outcome.blocked_ip.expires_at,
            "ip blocked"
        );
    }
}
