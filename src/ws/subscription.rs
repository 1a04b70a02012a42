//! Per-connection subscription manager.
//!
//! A connection chooses its feed along two axes: which events (explicit ids
//! or the `"*"` wildcard) and which kinds of change (`event_type` names such
//! as `attendee_promoted`). An empty type filter delivers every kind.
//! Explicit ids are capped per connection so one client cannot grow an
//! unbounded set.

use std::collections::{BTreeSet, HashSet};

use crate::domain::{EventId, RegistrationEvent};

/// Most event ids a single connection may subscribe to explicitly. The
/// wildcard does not count against it.
pub const MAX_EVENT_SUBSCRIPTIONS: usize = 100;

/// Manages the subscriptions of a single WebSocket connection.
#[derive(Debug)]
pub struct SubscriptionManager {
    event_ids: HashSet<EventId>,
    /// When set, `event_ids` is ignored for matching.
    subscribe_all: bool,
    /// Empty means every event type.
    event_types: BTreeSet<&'static str>,
    limit: usize,
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::with_limit(MAX_EVENT_SUBSCRIPTIONS)
    }
}

impl SubscriptionManager {
    /// Creates an empty manager with the default id limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty manager accepting at most `limit` explicit ids.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            event_ids: HashSet::new(),
            subscribe_all: false,
            event_types: BTreeSet::new(),
            limit,
        }
    }

    /// Adds event ids to the subscription set. `wildcard` enables `"*"`.
    ///
    /// Ids beyond the per-connection limit are not added and are returned.
    /// Re-subscribing to an id already held never counts twice.
    pub fn subscribe(&mut self, ids: &[EventId], wildcard: bool) -> Vec<EventId> {
        if wildcard {
            self.subscribe_all = true;
        }
        let mut rejected = Vec::new();
        for id in ids {
            if self.event_ids.contains(id) {
                continue;
            }
            if self.event_ids.len() >= self.limit {
                rejected.push(*id);
            } else {
                self.event_ids.insert(*id);
            }
        }
        if !rejected.is_empty() {
            tracing::debug!(
                rejected = rejected.len(),
                limit = self.limit,
                "ws subscription limit reached"
            );
        }
        rejected
    }

    /// Removes event ids from the subscription set. `wildcard` drops `"*"`.
    pub fn unsubscribe(&mut self, ids: &[EventId], wildcard: bool) {
        if wildcard {
            self.subscribe_all = false;
        }
        for id in ids {
            self.event_ids.remove(id);
        }
    }

    /// Restricts delivery to the given event types, in addition to any
    /// already selected.
    pub fn add_event_types(&mut self, types: &[&'static str]) {
        self.event_types.extend(types.iter().copied());
    }

    /// Drops event types from the filter. Removing the last one opens the
    /// filter to every type again.
    pub fn remove_event_types(&mut self, types: &[&'static str]) {
        for t in types {
            self.event_types.remove(t);
        }
    }

    /// Returns `true` if the event passes both the id and the type filter.
    #[must_use]
    pub fn matches(&self, event: &RegistrationEvent) -> bool {
        let wanted_event = self.subscribe_all || self.event_ids.contains(&event.event_id());
        let wanted_type =
            self.event_types.is_empty() || self.event_types.contains(event.event_type_str());
        wanted_event && wanted_type
    }

    /// Returns the number of explicitly subscribed event ids.
    #[must_use]
    pub fn count(&self) -> usize {
        self.event_ids.len()
    }

    /// Returns the per-connection id limit.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub const fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }

    /// Returns the active type filter in name order; empty means all types.
    #[must_use]
    pub fn event_types(&self) -> Vec<&'static str> {
        self.event_types.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn deleted(event_id: EventId) -> RegistrationEvent {
        RegistrationEvent::EventDeleted {
            event_id,
            timestamp: Utc::now(),
        }
    }

    fn updated(event_id: EventId) -> RegistrationEvent {
        RegistrationEvent::EventUpdated {
            event_id,
            capacity: 10,
            confirmed_count: 3,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn empty_matches_nothing() {
        let mgr = SubscriptionManager::new();
        assert!(!mgr.matches(&deleted(EventId::new())));
    }

    #[test]
    fn subscribe_specific_event() {
        let mut mgr = SubscriptionManager::new();
        let id = EventId::new();
        assert!(mgr.subscribe(&[id], false).is_empty());
        assert!(mgr.matches(&deleted(id)));
        assert!(!mgr.matches(&deleted(EventId::new())));
    }

    #[test]
    fn wildcard_comes_and_goes() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[], true);
        assert!(mgr.matches(&deleted(EventId::new())));
        mgr.unsubscribe(&[], true);
        assert!(!mgr.is_subscribed_all());
        assert!(!mgr.matches(&deleted(EventId::new())));
    }

    #[test]
    fn unsubscribe_removes_event() {
        let mut mgr = SubscriptionManager::new();
        let id = EventId::new();
        mgr.subscribe(&[id, EventId::new()], false);
        assert_eq!(mgr.count(), 2);
        mgr.unsubscribe(&[id], false);
        assert!(!mgr.matches(&deleted(id)));
        assert_eq!(mgr.count(), 1);
    }

    #[test]
    fn type_filter_narrows_and_reopens() {
        let mut mgr = SubscriptionManager::new();
        let id = EventId::new();
        mgr.subscribe(&[id], false);

        mgr.add_event_types(&["event_deleted"]);
        assert!(mgr.matches(&deleted(id)));
        assert!(!mgr.matches(&updated(id)));
        assert!(!mgr.matches(&deleted(EventId::new())));
        assert_eq!(mgr.event_types(), ["event_deleted"]);

        mgr.remove_event_types(&["event_deleted"]);
        assert!(mgr.event_types().is_empty());
        assert!(mgr.matches(&updated(id)));
    }

    #[test]
    fn ids_beyond_limit_are_rejected() {
        let mut mgr = SubscriptionManager::with_limit(2);
        let (a, b, c) = (EventId::new(), EventId::new(), EventId::new());

        assert!(mgr.subscribe(&[a, b], false).is_empty());
        assert_eq!(mgr.subscribe(&[a, c], false), [c]);
        assert_eq!(mgr.count(), 2);
        assert!(!mgr.matches(&deleted(c)));

        mgr.unsubscribe(&[a], false);
        assert!(mgr.subscribe(&[c], false).is_empty());
        assert!(mgr.matches(&deleted(c)));
    }

    #[test]
    fn wildcard_ignores_limit() {
        let mut mgr = SubscriptionManager::with_limit(0);
        assert_eq!(mgr.subscribe(&[EventId::new()], true).len(), 1);
        assert!(mgr.matches(&deleted(EventId::new())));
    }
}
