//! Domain layer: identifiers, records, value types, and the event system.
//!
//! This module contains the server-side domain model: typed identifiers,
//! the event / registration / waitlist documents, the validated attendee
//! identity, and the broadcast bus that carries committed state changes.

pub mod attendee;
pub mod event;
pub mod event_bus;
pub mod ids;
pub mod registration;
pub mod registration_event;

pub use attendee::{AttendeeIdentity, InvalidAttendee};
pub use event::Event;
pub use event_bus::EventBus;
pub use ids::{EventId, RegistrationId, WaitlistEntryId};
pub use registration::{
    ActiveEntry, Cancellation, Registration, RegistrationOutcome, RegistrationPatch,
    RegistrationStatus, WaitlistEntry,
};
pub use registration_event::RegistrationEvent;
