//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching subscription commands and forwarding filtered events.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{WsCommand, WsMessage, WsMessageType};
use super::subscription::SubscriptionManager;
use crate::domain::{EventId, RegistrationEvent};

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and applies them to its subscriptions.
/// - Forwards matching events from the [`broadcast::Receiver`] to the client.
pub async fn run_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<RegistrationEvent>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_text_message(&text, &mut subs);
                        let Ok(json) = serde_json::to_string(&reply) else {
                            continue;
                        };
                        if ws_tx.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(event) => {
                        if !subs.matches(&event) {
                            continue;
                        }
                        let Ok(json) = serde_json::to_string(&WsMessage::event(&event)) else {
                            continue;
                        };
                        if ws_tx.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}

/// Handles a text message from the client and builds the reply.
fn handle_text_message(text: &str, subs: &mut SubscriptionManager) -> WsMessage {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return WsMessage::error(String::new(), 400, "malformed JSON");
    };
    if msg.msg_type != WsMessageType::Command {
        return WsMessage::error(msg.id, 400, "expected a command message");
    }
    let Ok(command) = serde_json::from_value::<WsCommand>(msg.payload) else {
        return WsMessage::error(msg.id, 404, "unknown command");
    };

    match command {
        WsCommand::Subscribe {
            event_ids,
            event_types,
        } => {
            let (ids, wildcard, invalid) = parse_event_ids(&event_ids);
            let (types, invalid_types) = parse_event_types(&event_types);
            let rejected = subs.subscribe(&ids, wildcard);
            subs.add_event_types(&types);
            let subscribed: Vec<String> = ids
                .iter()
                .filter(|id| !rejected.contains(id))
                .map(ToString::to_string)
                .collect();
            WsMessage::response(
                msg.id,
                serde_json::json!({
                    "subscribed": subscribed,
                    "rejected": rejected.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "invalid": invalid,
                    "invalid_types": invalid_types,
                    "count": subs.count(),
                    "limit": subs.limit(),
                    "wildcard": subs.is_subscribed_all(),
                    "event_types": subs.event_types(),
                }),
            )
        }
        WsCommand::Unsubscribe {
            event_ids,
            event_types,
        } => {
            let (ids, wildcard, invalid) = parse_event_ids(&event_ids);
            let (types, invalid_types) = parse_event_types(&event_types);
            subs.unsubscribe(&ids, wildcard);
            subs.remove_event_types(&types);
            WsMessage::response(
                msg.id,
                serde_json::json!({
                    "unsubscribed": ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "invalid": invalid,
                    "invalid_types": invalid_types,
                    "remaining_count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                    "event_types": subs.event_types(),
                }),
            )
        }
    }
}

/// Splits raw ids into parsed event ids, the wildcard flag and the
/// entries that were neither.
fn parse_event_ids(raw: &[String]) -> (Vec<EventId>, bool, Vec<String>) {
    let mut ids = Vec::new();
    let mut wildcard = false;
    let mut invalid = Vec::new();
    for s in raw {
        if s == "*" {
            wildcard = true;
        } else if let Ok(uuid) = s.parse::<uuid::Uuid>() {
            ids.push(EventId::from_uuid(uuid));
        } else {
            invalid.push(s.clone());
        }
    }
    (ids, wildcard, invalid)
}

/// Splits raw type names into known discriminators and unknown names.
fn parse_event_types(raw: &[String]) -> (Vec<&'static str>, Vec<String>) {
    let mut types = Vec::new();
    let mut invalid = Vec::new();
    for name in raw {
        match RegistrationEvent::parse_event_type(name) {
            Some(t) => types.push(t),
            None => invalid.push(name.clone()),
        }
    }
    (types, invalid)
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn command(payload: serde_json::Value) -> String {
        serde_json::json!({
            "id": "req-1",
            "type": "command",
            "timestamp": chrono::Utc::now(),
            "payload": payload,
        })
        .to_string()
    }

    fn deleted(event_id: EventId) -> RegistrationEvent {
        RegistrationEvent::EventDeleted {
            event_id,
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn subscribe_then_unsubscribe() {
        let mut subs = SubscriptionManager::new();
        let id = EventId::new();

        let reply = handle_text_message(
            &command(serde_json::json!({"command": "subscribe", "event_ids": [id.to_string(), "nope"]})),
            &mut subs,
        );
        assert_eq!(reply.msg_type, WsMessageType::Response);
        assert_eq!(reply.id, "req-1");
        assert_eq!(reply.payload["invalid"][0], "nope");
        assert!(subs.matches(&deleted(id)));

        let reply = handle_text_message(
            &command(serde_json::json!({"command": "unsubscribe", "event_ids": [id.to_string()]})),
            &mut subs,
        );
        assert_eq!(reply.payload["remaining_count"], 0);
        assert!(!subs.matches(&deleted(id)));
    }

    #[test]
    fn type_filter_is_applied_and_unknown_types_reported() {
        let mut subs = SubscriptionManager::new();
        let id = EventId::new();

        let reply = handle_text_message(
            &command(serde_json::json!({
                "command": "subscribe",
                "event_ids": [id.to_string()],
                "event_types": ["attendee_promoted", "seat_sold"],
            })),
            &mut subs,
        );
        assert_eq!(reply.payload["event_types"][0], "attendee_promoted");
        assert_eq!(reply.payload["invalid_types"][0], "seat_sold");

        assert!(!subs.matches(&deleted(id)));

        let reply = handle_text_message(
            &command(serde_json::json!({
                "command": "unsubscribe",
                "event_types": ["attendee_promoted"],
            })),
            &mut subs,
        );
        assert_eq!(reply.payload["event_types"], serde_json::json!([]));
        assert!(subs.matches(&deleted(id)));
    }

    #[test]
    fn subscriptions_past_the_limit_are_rejected() {
        let mut subs = SubscriptionManager::with_limit(1);
        let (a, b) = (EventId::new(), EventId::new());

        let reply = handle_text_message(
            &command(serde_json::json!({
                "command": "subscribe",
                "event_ids": [a.to_string(), b.to_string()],
            })),
            &mut subs,
        );
        assert_eq!(reply.msg_type, WsMessageType::Response);
        assert_eq!(reply.payload["subscribed"], serde_json::json!([a.to_string()]));
        assert_eq!(reply.payload["rejected"], serde_json::json!([b.to_string()]));
        assert_eq!(reply.payload["limit"], 1);
        assert_eq!(reply.payload["count"], 1);
    }

    #[test]
    fn malformed_and_unknown_messages_yield_errors() {
        let mut subs = SubscriptionManager::new();
        let reply = handle_text_message("{not json", &mut subs);
        assert_eq!(reply.msg_type, WsMessageType::Error);

        let reply = handle_text_message(
            &command(serde_json::json!({"command": "get_state"})),
            &mut subs,
        );
        assert_eq!(reply.msg_type, WsMessageType::Error);
        assert_eq!(reply.payload["code"], 404);
    }
}
