//! # event-registration
//!
//! REST API and WebSocket feed for capacity-bounded event registration.
//!
//! Attendees register for events with a fixed capacity. While seats are
//! free a registration is confirmed immediately; once the event is full the
//! attendee joins an ordered waitlist. Cancelling a confirmed registration
//! promotes the head of the waitlist in the same store transaction, so the
//! confirmed count never exceeds the capacity and no seat is lost.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── RegistrationEngine (service/)
//!     ├── EventBus (domain/)
//!     │
//!     └── RegistrationStore (store/)
//!           ├── PostgresStore
//!           └── MemoryStore
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod server;
pub mod service;
pub mod store;
pub mod ws;
