//! Persistence layer: PostgreSQL event log.
//!
//! Every published event reaches the `pool_events` table through the
//! [`EventBus`] journal, an unbounded channel separate from the lossy live
//! broadcast. The writer appends events in publish order and retries a
//! failed append until it succeeds, so no event is dropped while the
//! process runs. At startup the registry is rebuilt by replaying the log,
//! so memberships, counters and blocks survive restarts.
//!
//! [`EventBus`]: crate::domain::EventBus

pub mod models;
pub mod postgres;

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::domain::{JournalReceiver, PoolEvent, PoolRegistry};
use crate::error::GatewayError;
pub use postgres::PostgresPersistence;

/// First delay before retrying a failed append.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(50);

/// Upper bound for the retry delay.
const RETRY_MAX_DELAY: Duration = Duration::from_secs(5);

/// Append-only sink for published events.
pub trait EventStore: Send + Sync + 'static {
    /// Appends one event and returns its log id.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] if the event was not
    /// stored.
    fn append(&self, event: &PoolEvent) -> impl Future<Output = Result<i64, GatewayError>> + Send;
}

impl EventStore for PostgresPersistence {
    fn append(&self, event: &PoolEvent) -> impl Future<Output = Result<i64, GatewayError>> + Send {
        self.save_event(event)
    }
}

/// Counts reported after a replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Events applied to the registry.
    pub applied: usize,
    /// Events skipped because they conflicted with the rebuilt state.
    pub skipped: usize,
}

/// Spawns the task that appends every journaled event to `store`.
///
/// The task ends once every [`EventBus`](crate::domain::EventBus) clone
/// holding the journal is dropped and the backlog is written.
pub fn spawn_event_log_writer<S: EventStore>(
    store: S,
    mut journal: JournalReceiver,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = journal.recv().await {
            append_until_stored(&store, &event).await;
        }
        tracing::debug!("event log writer stopped");
    })
}

/// Appends `event`, backing off between failed attempts.
async fn append_until_stored<S: EventStore>(store: &S, event: &PoolEvent) {
    let mut delay = RETRY_BASE_DELAY;
    let mut attempt: u32 = 1;
    loop {
        match store.append(event).await {
            Ok(id) => {
                tracing::trace!(id, event_type = event.event_type_str(), "event appended");
                return;
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    attempt,
                    retry_in = ?delay,
                    event_type = event.event_type_str(),
                    pool_code = %event.pool_code(),
                    "failed to append event, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2).min(RETRY_MAX_DELAY);
                attempt = attempt.saturating_add(1);
            }
        }
    }
}

/// Loads the log and replays it into `registry`.
///
/// # Errors
///
/// Returns [`GatewayError::PersistenceError`] if the log cannot be read or
/// holds an undecodable payload.
pub async fn restore_registry(
    persistence: &PostgresPersistence,
    registry: &PoolRegistry,
) -> Result<ReplaySummary, GatewayError> {
    let events = persistence
        .load_events()
        .await?
        .iter()
        .map(models::StoredEvent::decode)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(replay(registry, events).await)
}

/// Applies `events` in timestamp order; equal timestamps keep log order.
///
/// Conflicting events are logged and skipped rather than aborting startup.
pub async fn replay(registry: &PoolRegistry, mut events: Vec<PoolEvent>) -> ReplaySummary {
    events.sort_by_key(PoolEvent::timestamp);

    let mut summary = ReplaySummary::default();
    for event in &events {
        match registry.apply_event(event).await {
            Ok(()) => summary.applied += 1,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    event_type = event.event_type_str(),
                    pool_code = %event.pool_code(),
                    "skipping event during replay"
                );
                summary.skipped += 1;
            }
        }
    }
    tracing::info!(
        applied = summary.applied,
        skipped = summary.skipped,
        "registry restored from event log"
    );
    summary
}
