//! Event record: a schedulable activity with a finite attendance capacity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::EventId;

/// Persisted event document.
///
/// `confirmed_count` is stored denormalized and is only ever changed inside
/// the same store transaction that creates or cancels the corresponding
/// [`super::Registration`], so `confirmed_count <= capacity` holds whenever a
/// transaction commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Unique event identifier (immutable after creation).
    #[serde(rename = "_id")]
    pub id: EventId,

    /// Human-readable title.
    pub title: String,

    /// Maximum number of confirmed registrations.
    pub capacity: u32,

    /// Number of registrations currently in the `confirmed` state.
    pub confirmed_count: u32,

    /// Creation timestamp (immutable after creation).
    pub created_at: DateTime<Utc>,

    /// Timestamp of the last mutation of this document.
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Creates a new, empty event.
    #[must_use]
    pub fn new(title: String, capacity: u32) -> Self {
        let now = Utc::now();
        Self {
            id: EventId::new(),
            title,
            capacity,
            confirmed_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns `true` if another confirmed registration fits.
    #[must_use]
    pub const fn has_open_slot(&self) -> bool {
        self.confirmed_count < self.capacity
    }

    /// Number of confirmed registrations that can still be accepted.
    #[must_use]
    pub const fn open_slots(&self) -> u32 {
        self.capacity.saturating_sub(self.confirmed_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_event_is_empty() {
        let event = Event::new("Swing night".to_string(), 3);
        assert_eq!(event.confirmed_count, 0);
        assert_eq!(event.open_slots(), 3);
        assert!(event.has_open_slot());
    }

    #[test]
    fn zero_capacity_has_no_slot() {
        let event = Event::new("Closed rehearsal".to_string(), 0);
        assert!(!event.has_open_slot());
        assert_eq!(event.open_slots(), 0);
    }

    #[test]
    fn serializes_document_shape() {
        let event = Event::new("Talk".to_string(), 10);
        let json = serde_json::to_value(&event).unwrap_or_default();
        assert!(json.get("_id").is_some());
        assert_eq!(json.get("confirmedCount"), Some(&serde_json::json!(0)));
        assert_eq!(json.get("capacity"), Some(&serde_json::json!(10)));
        assert!(json.get("createdAt").is_some());
    }
}
