//! Broadcast channel for domain events.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. Every committed
//! engine mutation publishes a [`RegistrationEvent`] through the bus, and all
//! WebSocket connections subscribe to receive filtered events.

use tokio::sync::broadcast;

use super::RegistrationEvent;

/// Broadcast bus for [`RegistrationEvent`]s.
///
/// Backed by a `tokio::broadcast` channel with a configurable capacity.
/// When the ring buffer is full, the oldest events are dropped for lagging
/// receivers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RegistrationEvent>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event.
    /// If there are no active receivers, the event is silently dropped.
    pub fn publish(&self, event: RegistrationEvent) -> usize {
        let event_type = event.event_type_str();
        let event_id = event.event_id();
        let receivers = self.sender.send(event).unwrap_or(0);
        tracing::trace!(event_type, %event_id, receivers, "registration event published");
        receivers
    }

    /// Publishes the events of one committed transaction, in order.
    ///
    /// Every event goes out to the receivers alive at the moment it is sent,
    /// so a subscriber present for the whole call sees the batch contiguously
    /// and in commit order. Returns the total number of deliveries.
    pub fn publish_all<I>(&self, events: I) -> usize
    where
        I: IntoIterator<Item = RegistrationEvent>,
    {
        events.into_iter().map(|event| self.publish(event)).sum()
    }

    /// Creates a new receiver that will receive all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RegistrationEvent> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
