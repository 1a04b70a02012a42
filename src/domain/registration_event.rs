//! Domain events reflecting committed registration state changes.
//!
//! Every committed engine mutation emits a [`RegistrationEvent`] through the
//! [`super::EventBus`]. Events are broadcast to WebSocket subscribers of the
//! live feed.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{
    AttendeeIdentity, EventId, Registration, RegistrationId, WaitlistEntry, WaitlistEntryId,
};

/// Domain event emitted after a store transaction commits.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum RegistrationEvent {
    /// A new event was created.
    EventCreated {
        /// Event identifier.
        event_id: EventId,
        /// Event title.
        title: String,
        /// Capacity at creation.
        capacity: u32,
        /// Creation timestamp.
        timestamp: DateTime<Utc>,
    },

    /// An event's title or capacity changed.
    EventUpdated {
        /// Event identifier.
        event_id: EventId,
        /// Capacity after the update.
        capacity: u32,
        /// Confirmed count after the update (including promotions).
        confirmed_count: u32,
        /// Update timestamp.
        timestamp: DateTime<Utc>,
    },

    /// An event and all of its records were removed.
    EventDeleted {
        /// Event identifier.
        event_id: EventId,
        /// Removal timestamp.
        timestamp: DateTime<Utc>,
    },

    /// An attendee received a seat directly.
    RegistrationConfirmed {
        /// Event identifier.
        event_id: EventId,
        /// New registration.
        registration_id: RegistrationId,
        /// Attendee e-mail.
        attendee_identity: AttendeeIdentity,
        /// Confirmation timestamp.
        timestamp: DateTime<Utc>,
    },

    /// An attendee joined the waitlist of a full event.
    AttendeeWaitlisted {
        /// Event identifier.
        event_id: EventId,
        /// New waitlist entry.
        waitlist_entry_id: WaitlistEntryId,
        /// Attendee e-mail.
        attendee_identity: AttendeeIdentity,
        /// Position in the waitlist.
        position: u64,
        /// Timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A confirmed registration was cancelled.
    RegistrationCancelled {
        /// Event identifier.
        event_id: EventId,
        /// Cancelled registration.
        registration_id: RegistrationId,
        /// Attendee e-mail.
        attendee_identity: AttendeeIdentity,
        /// Timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The head of the waitlist was moved into a confirmed registration.
    AttendeePromoted {
        /// Event identifier.
        event_id: EventId,
        /// Waitlist entry that was consumed.
        waitlist_entry_id: WaitlistEntryId,
        /// Registration that was created.
        registration_id: RegistrationId,
        /// Attendee e-mail.
        attendee_identity: AttendeeIdentity,
        /// Timestamp.
        timestamp: DateTime<Utc>,
    },

    /// An attendee left the waitlist voluntarily.
    WaitlistWithdrawn {
        /// Event identifier.
        event_id: EventId,
        /// Removed entry.
        waitlist_entry_id: WaitlistEntryId,
        /// Attendee e-mail.
        attendee_identity: AttendeeIdentity,
        /// Timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl RegistrationEvent {
    /// Returns the event id this domain event relates to.
    #[must_use]
    pub const fn event_id(&self) -> EventId {
        match self {
            Self::EventCreated { event_id, .. }
            | Self::EventUpdated { event_id, .. }
            | Self::EventDeleted { event_id, .. }
            | Self::RegistrationConfirmed { event_id, .. }
            | Self::AttendeeWaitlisted { event_id, .. }
            | Self::RegistrationCancelled { event_id, .. }
            | Self::AttendeePromoted { event_id, .. }
            | Self::WaitlistWithdrawn { event_id, .. } => *event_id,
        }
    }

    /// Returns the snake_case discriminator string.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::EventCreated { .. } => "event_created",
            Self::EventUpdated { .. } => "event_updated",
            Self::EventDeleted { .. } => "event_deleted",
            Self::RegistrationConfirmed { .. } => "registration_confirmed",
            Self::AttendeeWaitlisted { .. } => "attendee_waitlisted",
            Self::RegistrationCancelled { .. } => "registration_cancelled",
            Self::AttendeePromoted { .. } => "attendee_promoted",
            Self::WaitlistWithdrawn { .. } => "waitlist_withdrawn",
        }
    }

    /// Every discriminator string, in declaration order.
    pub const EVENT_TYPES: [&'static str; 8] = [
        "event_created",
        "event_updated",
        "event_deleted",
        "registration_confirmed",
        "attendee_waitlisted",
        "registration_cancelled",
        "attendee_promoted",
        "waitlist_withdrawn",
    ];

    /// Resolves a client-supplied type name to its discriminator string.
    #[must_use]
    pub fn parse_event_type(name: &str) -> Option<&'static str> {
        Self::EVENT_TYPES.iter().copied().find(|t| *t == name)
    }

    /// Builds the event for a direct confirmation.
    #[must_use]
    pub fn confirmed(registration: &Registration) -> Self {
        Self::RegistrationConfirmed {
            event_id: registration.event_id,
            registration_id: registration.id,
            attendee_identity: registration.attendee_identity.clone(),
            timestamp: registration.created_at,
        }
    }

    /// Builds the event for a new waitlist entry.
    #[must_use]
    pub fn waitlisted(entry: &WaitlistEntry) -> Self {
        Self::AttendeeWaitlisted {
            event_id: entry.event_id,
            waitlist_entry_id: entry.id,
            attendee_identity: entry.attendee_identity.clone(),
            position: entry.position,
            timestamp: entry.created_at,
        }
    }

    /// Builds the event for a cancellation.
    #[must_use]
    pub fn cancelled(registration: &Registration) -> Self {
        Self::RegistrationCancelled {
            event_id: registration.event_id,
            registration_id: registration.id,
            attendee_identity: registration.attendee_identity.clone(),
            timestamp: registration.cancelled_at.unwrap_or_else(Utc::now),
        }
    }

    /// Builds the event for a promotion of `entry` into `registration`.
    #[must_use]
    pub fn promoted(entry: WaitlistEntryId, registration: &Registration) -> Self {
        Self::AttendeePromoted {
            event_id: registration.event_id,
            waitlist_entry_id: entry,
            registration_id: registration.id,
            attendee_identity: registration.attendee_identity.clone(),
            timestamp: registration.created_at,
        }
    }

    /// Builds the event for a waitlist withdrawal.
    #[must_use]
    pub fn withdrawn(entry: &WaitlistEntry) -> Self {
        Self::WaitlistWithdrawn {
            event_id: entry.event_id,
            waitlist_entry_id: entry.id,
            attendee_identity: entry.attendee_identity.clone(),
            timestamp: Utc::now(),
        }
    }
}
