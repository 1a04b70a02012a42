//! Data Transfer Objects for REST request/response serialization.
//!
//! Field names are camelCase on the wire. Request bodies are validated into
//! domain value types here, before anything reaches the engine.

pub mod common_dto;
pub mod event_dto;
pub mod registration_dto;

pub use common_dto::*;
pub use event_dto::*;
pub use registration_dto::*;
