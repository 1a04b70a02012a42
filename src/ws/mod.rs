//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws` streams committed registration events to
//! clients that subscribed to the events they care about.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
