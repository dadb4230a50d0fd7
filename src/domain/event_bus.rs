//! Fan-out of [`PoolEvent`]s to live listeners and the durable journal.
//!
//! The service layer publishes one event per accepted mutation. Live
//! listeners are WebSocket sessions; one that falls more than `capacity`
//! events behind loses the oldest ones and sees `RecvError::Lagged`.
//!
//! The event log is fed through a separate unbounded journal channel
//! instead, so it receives every event no matter how far behind it is.

use tokio::sync::{broadcast, mpsc};

use super::PoolEvent;

/// Receiving end of the journal, drained by the event-log writer.
pub type JournalReceiver = mpsc::UnboundedReceiver<PoolEvent>;

/// Cloneable handle to the shared event channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PoolEvent>,
    journal: Option<mpsc::UnboundedSender<PoolEvent>>,
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` events (at least one) for
    /// live listeners, without a journal.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            journal: None,
        }
    }

    /// Creates a bus that also forwards every event, in publish order, to
    /// the returned journal receiver.
    #[must_use]
    pub fn with_journal(capacity: usize) -> (Self, JournalReceiver) {
        let (journal, receiver) = mpsc::unbounded_channel();
        let mut bus = Self::new(capacity);
        bus.journal = Some(journal);
        (bus, receiver)
    }

    /// Sends `event` to the journal, if any, and to every current live
    /// listener. Returns how many live listeners got it.
    ///
    /// With no live listeners the event still reaches the journal.
    pub fn publish(&self, event: PoolEvent) -> usize {
        let event_type = event.event_type_str();
        if let Some(journal) = &self.journal
            && journal.send(event.clone()).is_err()
        {
            tracing::error!(event_type, "event journal closed, event not persisted");
        }
        let delivered = self.sender.send(event).unwrap_or(0);
        tracing::trace!(event_type, delivered, "event published");
        delivered
    }

    /// Registers a live listener that sees events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.sender.subscribe()
    }

    /// Number of live listeners.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::PoolCode;
    use chrono::Utc;

    fn make_event(code: &str) -> PoolEvent {
        let Ok(pool_code) = PoolCode::parse(code) else {
            panic!("valid code rejected");
        };
        PoolEvent::GlobalBlockApplied {
            pool_code,
            affected: 0,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn publish_without_receivers_returns_zero() {
        let bus = EventBus::new(100);
        assert_eq!(bus.publish(make_event("34001")), 0);
    }

    #[tokio::test]
    async fn subscriber_receives_event() {
        let bus = EventBus::new(100);
        let mut rx = bus.subscribe();

        bus.publish(make_event("06002"));

        let Ok(event) = rx.recv().await else {
            panic!("expected to receive event");
        };
        assert_eq!(event.pool_code().to_string(), "06002");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(100);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.publish(make_event("35010")), 2);

        let (Ok(e1), Ok(e2)) = (rx1.recv().await, rx2.recv().await) else {
            panic!("receivers failed");
        };
        assert_eq!(e1, e2);
    }

    #[test]
    fn receiver_count_tracks_subscribers() {
        let bus = EventBus::new(100);
        assert_eq!(bus.receiver_count(), 0);

        let rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.receiver_count(), 2);

        drop(rx1);
        assert_eq!(bus.receiver_count(), 1);
    }

    #[tokio::test]
    async fn journal_keeps_events_a_lagging_listener_loses() {
        let (bus, mut journal) = EventBus::with_journal(2);
        let mut live = bus.subscribe();

        let codes = ["34001", "34002", "34003", "34004", "34005"];
        for code in codes {
            bus.publish(make_event(code));
        }

        assert!(matches!(
            live.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));

        for code in codes {
            let Some(event) = journal.recv().await else {
                panic!("journal closed early");
            };
            assert_eq!(event.pool_code().to_string(), code);
        }
        assert!(journal.try_recv().is_err());
    }

    #[test]
    fn journal_receives_without_live_listeners() {
        let (bus, mut journal) = EventBus::with_journal(1);
        assert_eq!(bus.publish(make_event("06001")), 0);
        assert!(journal.try_recv().is_ok());
    }
}
