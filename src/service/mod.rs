//! Service layer: business logic orchestration.
//!
//! [`RegistrationEngine`] runs every registration operation inside a store
//! transaction and emits events through the [`super::domain::EventBus`]
//! once the transaction has committed.

pub mod registration_engine;

pub use registration_engine::{EventChanges, EventUpdate, RegistrationEngine};
