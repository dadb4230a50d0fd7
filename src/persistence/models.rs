//! Database models for the event log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::PoolEvent;
use crate::error::GatewayError;

/// A stored event row from the `pool_events` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Auto-increment row ID.
    pub id: i64,
    /// Pool that generated the event.
    pub pool_code: String,
    /// Event type discriminator (e.g. `"member_joined"`).
    pub event_type: String,
    /// JSONB payload: the serialized [`PoolEvent`].
    pub payload: serde_json::Value,
    /// Server-side insertion timestamp.
    pub created_at: DateTime<Utc>,
}

impl StoredEvent {
    /// Decodes the payload back into a [`PoolEvent`].
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] if the payload does not
    /// match the current event schema.
    pub fn decode(&self) -> Result<PoolEvent, GatewayError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            GatewayError::PersistenceError(format!("event {} is unreadable: {e}", self.id))
        })
    }
}
