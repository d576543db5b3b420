//! Event bus for decision coordination
//!
//! Provides pub/sub messaging using Tokio broadcast channels. A filtered
//! receiver narrows the stream to a single proposal.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use super::types::DecisionEvent;

/// Channel capacity for broadcast
pub const CHANNEL_CAPACITY: usize = 256;

/// Shared reference to EventBus
pub type SharedEventBus = Arc<EventBus>;

/// Event bus backed by a broadcast channel.
///
/// Publishing never blocks and never fails on absent or lagging
/// subscribers; a subscriber that falls behind sees `Lagged` on its own
/// receiver without affecting the others.
pub struct EventBus {
    sender: broadcast::Sender<DecisionEvent>,
}

impl EventBus {
    /// Create a new event bus with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Create a shared reference to this event bus
    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    /// Publish an event to all current subscribers, returning how many received it
    pub fn publish(&self, event: DecisionEvent) -> usize {
        let event_type = event.event_type();
        match self.sender.send(event) {
            Ok(count) => {
                debug!(event_type, receivers = count, "Event published");
                count
            }
            Err(_) => {
                debug!(event_type, "Event published (no receivers)");
                0
            }
        }
    }

    /// Subscribe to receive events
    pub fn subscribe(&self) -> broadcast::Receiver<DecisionEvent> {
        self.sender.subscribe()
    }

    /// Subscribe to a single proposal's events
    pub fn subscribe_proposal(&self, proposal_id: &str) -> FilteredReceiver {
        FilteredReceiver::new(self.subscribe(), EventFilter::new().proposal(proposal_id))
    }

    /// Get the number of current subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Event filter for selective subscription
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Filter by proposal ID
    pub proposal_id: Option<String>,
    /// Filter by event types
    pub event_types: Option<Vec<String>>,
}

impl EventFilter {
    /// Create a new empty filter (matches all events)
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by proposal ID
    pub fn proposal(mut self, proposal_id: &str) -> Self {
        self.proposal_id = Some(proposal_id.to_string());
        self
    }

    /// Filter by event types
    pub fn types(mut self, event_types: Vec<&str>) -> Self {
        self.event_types = Some(event_types.into_iter().map(String::from).collect());
        self
    }

    /// Check if an event matches this filter
    pub fn matches(&self, event: &DecisionEvent) -> bool {
        if let Some(ref pid) = self.proposal_id {
            if event.proposal_id() != Some(pid.as_str()) {
                return false;
            }
        }

        if let Some(ref types) = self.event_types {
            if !types.iter().any(|t| t == event.event_type()) {
                return false;
            }
        }

        true
    }
}

/// Filtered event receiver that only yields matching events
pub struct FilteredReceiver {
    receiver: broadcast::Receiver<DecisionEvent>,
    filter: EventFilter,
}

impl FilteredReceiver {
    /// Create a new filtered receiver
    pub fn new(receiver: broadcast::Receiver<DecisionEvent>, filter: EventFilter) -> Self {
        Self { receiver, filter }
    }

    /// Receive the next matching event
    pub async fn recv(&mut self) -> Result<DecisionEvent, broadcast::error::RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.filter.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Drain already-delivered matching events without waiting
    pub fn try_recv(&mut self) -> Option<DecisionEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ProposalKind;
    use chrono::Utc;

    fn opened(id: &str) -> DecisionEvent {
        DecisionEvent::ProposalOpened {
            proposal_id: id.to_string(),
            kind: ProposalKind::Navigation,
            options: vec!["north".to_string(), "south".to_string()],
            revote_round: 0,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        assert_eq!(bus.publish(opened("p-1")), 1);

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.event_type(), "proposal_opened");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(opened("p-1")), 0);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new().shared();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(opened("p-1"));

        let e1 = rx1.recv().await.unwrap();
        let e2 = rx2.recv().await.unwrap();
        assert_eq!(e1.event_type(), e2.event_type());
    }

    #[test]
    fn test_dropped_subscriber_does_not_affect_others() {
        let bus = EventBus::new();
        let dropped = bus.subscribe();
        let mut kept = bus.subscribe();
        drop(dropped);

        assert_eq!(bus.publish(opened("p-1")), 1);
        assert!(kept.try_recv().is_ok());
    }

    #[test]
    fn test_event_filter() {
        let filter = EventFilter::new()
            .proposal("p-1")
            .types(vec!["proposal_opened", "consensus_reached"]);

        assert!(filter.matches(&opened("p-1")));
        assert!(!filter.matches(&opened("p-2")));
        assert!(!filter.matches(&DecisionEvent::ProposalExpired {
            proposal_id: "p-1".to_string(),
            responses: 0,
            timestamp: Utc::now(),
        }));
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let bus = EventBus::new().shared();
        let mut filtered = bus.subscribe_proposal("target");

        let publisher = bus.clone();
        tokio::spawn(async move {
            publisher.publish(opened("other"));
            publisher.publish(opened("target"));
        });

        let event = filtered.recv().await.unwrap();
        assert_eq!(event.proposal_id(), Some("target"));
    }
}
