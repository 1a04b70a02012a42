//! WebSocket message types: envelope and commands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::RegistrationEvent;

/// Top-level WebSocket message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Client-provided ID for requests; server-generated for events.
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// ISO-8601 timestamp.
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    pub payload: serde_json::Value,
}

/// Discriminator for WebSocket message types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Client → Server command.
    Command,
    /// Server → Client response to a command.
    Response,
    /// Server → Client broadcast event.
    Event,
    /// Server → Client error.
    Error,
}

/// Commands that a client can send over WebSocket, carried in the payload
/// of a [`WsMessageType::Command`] message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WsCommand {
    /// Subscribe to the feed of specific events.
    Subscribe {
        /// Event IDs to subscribe to. Use `["*"]` for all events.
        #[serde(default)]
        event_ids: Vec<String>,
        /// Event types to narrow the feed to, e.g. `attendee_promoted`.
        /// Omitted or empty keeps the current type filter.
        #[serde(default)]
        event_types: Vec<String>,
    },
    /// Unsubscribe from specific events. `"*"` drops the wildcard.
    Unsubscribe {
        /// Event IDs to unsubscribe from.
        #[serde(default)]
        event_ids: Vec<String>,
        /// Event types to remove from the type filter.
        #[serde(default)]
        event_types: Vec<String>,
    },
}

impl WsMessage {
    /// Wraps a registration event for delivery.
    #[must_use]
    pub fn event(event: &RegistrationEvent) -> Self {
        Self::server(
            uuid::Uuid::new_v4().to_string(),
            WsMessageType::Event,
            serde_json::to_value(event).unwrap_or_default(),
        )
    }

    /// Answers the command with the given `id`.
    #[must_use]
    pub fn response(id: String, payload: serde_json::Value) -> Self {
        Self::server(id, WsMessageType::Response, payload)
    }

    /// Reports a failed command.
    #[must_use]
    pub fn error(id: String, code: u16, message: &str) -> Self {
        Self::server(
            id,
            WsMessageType::Error,
            serde_json::json!({ "code": code, "message": message }),
        )
    }

    fn server(id: String, msg_type: WsMessageType, payload: serde_json::Value) -> Self {
        Self {
            id,
            msg_type,
            timestamp: Utc::now(),
            payload,
        }
    }
}
