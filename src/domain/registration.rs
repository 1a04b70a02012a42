//! Registration and waitlist records, plus the outcomes the engine returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{AttendeeIdentity, EventId, RegistrationId, WaitlistEntryId};

/// Lifecycle state of a [`Registration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    /// The attendee holds a seat.
    Confirmed,
    /// The attendee gave the seat back. Terminal.
    Cancelled,
}

impl RegistrationStatus {
    /// Stable lowercase name, as stored and serialized.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses the stored representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "confirmed" => Some(Self::Confirmed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Attendance record for one attendee at one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    /// Unique registration identifier.
    #[serde(rename = "_id")]
    pub id: RegistrationId,
    /// Owning event.
    pub event_id: EventId,
    /// Normalized attendee e-mail.
    pub attendee_identity: AttendeeIdentity,
    /// Current lifecycle state.
    pub status: RegistrationStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Set when the registration was cancelled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Registration {
    /// Creates a new confirmed registration.
    #[must_use]
    pub fn confirmed(event_id: EventId, attendee_identity: AttendeeIdentity) -> Self {
        Self {
            id: RegistrationId::new(),
            event_id,
            attendee_identity,
            status: RegistrationStatus::Confirmed,
            created_at: Utc::now(),
            cancelled_at: None,
        }
    }

    /// Returns `true` while the registration holds a seat.
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.status == RegistrationStatus::Confirmed
    }
}

/// Partial update applied to a stored [`Registration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationPatch {
    /// New status.
    pub status: RegistrationStatus,
    /// New cancellation timestamp.
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl RegistrationPatch {
    /// Patch that moves a registration to [`RegistrationStatus::Cancelled`].
    #[must_use]
    pub fn cancel_now() -> Self {
        Self {
            status: RegistrationStatus::Cancelled,
            cancelled_at: Some(Utc::now()),
        }
    }

    /// Applies the patch to a registration in place.
    pub fn apply(&self, registration: &mut Registration) {
        registration.status = self.status;
        registration.cancelled_at = self.cancelled_at;
    }
}

/// Pending request for a seat, materialized only when the event is full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistEntry {
    /// Unique entry identifier.
    #[serde(rename = "_id")]
    pub id: WaitlistEntryId,
    /// Owning event.
    pub event_id: EventId,
    /// Normalized attendee e-mail.
    pub attendee_identity: AttendeeIdentity,
    /// Arrival order within the event; the lowest position is promoted first.
    pub position: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl WaitlistEntry {
    /// Creates a new entry at the given position.
    #[must_use]
    pub fn new(event_id: EventId, attendee_identity: AttendeeIdentity, position: u64) -> Self {
        Self {
            id: WaitlistEntryId::new(),
            event_id,
            attendee_identity,
            position,
            created_at: Utc::now(),
        }
    }
}

/// The record that makes an attendee "active" for an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveEntry {
    /// A confirmed registration.
    Registration(Registration),
    /// A waitlist entry.
    Waitlist(WaitlistEntry),
}

/// Result of a successful `register` call, tagged with its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// A seat was free; the attendee is confirmed.
    Confirmed(Registration),
    /// The event was full; the attendee joined the waitlist.
    Waitlisted(WaitlistEntry),
}

impl RegistrationOutcome {
    /// Returns the event the outcome belongs to.
    #[must_use]
    pub const fn event_id(&self) -> EventId {
        match self {
            Self::Confirmed(r) => r.event_id,
            Self::Waitlisted(w) => w.event_id,
        }
    }
}

/// Result of a successful `cancel` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancellation {
    /// The registration that was cancelled.
    pub cancelled: Registration,
    /// The registration created by promoting the head of the waitlist, if any.
    pub promoted: Option<Registration>,
}
