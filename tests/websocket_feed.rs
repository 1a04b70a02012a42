//! End-to-end tests of the `/ws` live feed.

#![allow(clippy::panic, clippy::indexing_slicing)]

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use event_registration::app_state::AppState;
use event_registration::config::ServiceConfig;
use event_registration::domain::EventBus;
use event_registration::server;
use event_registration::store::MemoryStore;

type Socket =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn spawn_app() -> std::net::SocketAddr {
    let state = AppState::new(MemoryStore::new(), EventBus::new(64));
    let app = server::build_app(state, &ServiceConfig::default());
    let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn connect(addr: std::net::SocketAddr) -> Socket {
    let Ok((socket, _)) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws")).await else {
        panic!("ws handshake failed");
    };
    socket
}

async fn send_command(socket: &mut Socket, id: &str, payload: Value) {
    let msg = json!({
        "id": id,
        "type": "command",
        "timestamp": chrono::Utc::now(),
        "payload": payload,
    });
    if socket.send(Message::text(msg.to_string())).await.is_err() {
        panic!("ws send failed");
    }
}

async fn next_json(socket: &mut Socket) -> Value {
    loop {
        let Ok(Some(Ok(msg))) = tokio::time::timeout(Duration::from_secs(5), socket.next()).await
        else {
            panic!("no ws message within timeout");
        };
        if let Message::Text(text) = msg {
            let Ok(value) = serde_json::from_str::<Value>(&text) else {
                panic!("invalid json from server");
            };
            return value;
        }
    }
}

async fn post(url: String, body: Value) -> Value {
    let Ok(res) = reqwest::Client::new().post(url).json(&body).send().await else {
        panic!("request failed");
    };
    res.json::<Value>().await.unwrap_or(Value::Null)
}

#[tokio::test]
async fn wildcard_subscriber_sees_registration_flow() {
    let addr = spawn_app().await;
    let mut socket = connect(addr).await;

    send_command(&mut socket, "sub-1", json!({"command": "subscribe", "event_ids": ["*"]})).await;
    let reply = next_json(&mut socket).await;
    assert_eq!(reply["type"], "response");
    assert_eq!(reply["id"], "sub-1");
    assert_eq!(reply["payload"]["wildcard"], true);

    let event = post(
        format!("http://{addr}/api/events"),
        json!({"title": "Balboa night", "capacity": 1}),
    )
    .await;
    let Some(event_id) = event["_id"].as_str() else {
        panic!("event id missing");
    };

    let created = next_json(&mut socket).await;
    assert_eq!(created["type"], "event");
    assert_eq!(created["payload"]["event_type"], "event_created");

    post(
        format!("http://{addr}/api/events/{event_id}/registrations"),
        json!({"attendeeIdentity": "a@example.org"}),
    )
    .await;
    let confirmed = next_json(&mut socket).await;
    assert_eq!(confirmed["payload"]["event_type"], "registration_confirmed");
    assert_eq!(confirmed["payload"]["event_id"], event_id);

    post(
        format!("http://{addr}/api/events/{event_id}/registrations"),
        json!({"attendeeIdentity": "b@example.org"}),
    )
    .await;
    let waitlisted = next_json(&mut socket).await;
    assert_eq!(waitlisted["payload"]["event_type"], "attendee_waitlisted");
    assert_eq!(waitlisted["payload"]["position"], 1);
}

#[tokio::test]
async fn specific_subscription_filters_other_events() {
    let addr = spawn_app().await;
    let mut socket = connect(addr).await;

    let watched = post(
        format!("http://{addr}/api/events"),
        json!({"title": "Watched", "capacity": 5}),
    )
    .await;
    let other = post(
        format!("http://{addr}/api/events"),
        json!({"title": "Other", "capacity": 5}),
    )
    .await;
    let (Some(watched_id), Some(other_id)) = (watched["_id"].as_str(), other["_id"].as_str())
    else {
        panic!("event ids missing");
    };

    send_command(
        &mut socket,
        "sub-2",
        json!({"command": "subscribe", "event_ids": [watched_id]}),
    )
    .await;
    let reply = next_json(&mut socket).await;
    assert_eq!(reply["payload"]["count"], 1);

    post(
        format!("http://{addr}/api/events/{other_id}/registrations"),
        json!({"attendeeIdentity": "x@example.org"}),
    )
    .await;
    post(
        format!("http://{addr}/api/events/{watched_id}/registrations"),
        json!({"attendeeIdentity": "y@example.org"}),
    )
    .await;

    let first = next_json(&mut socket).await;
    assert_eq!(first["payload"]["event_id"], watched_id);
    assert_eq!(first["payload"]["attendee_identity"], "y@example.org");
}

#[tokio::test]
async fn unknown_command_gets_an_error() {
    let addr = spawn_app().await;
    let mut socket = connect(addr).await;

    send_command(&mut socket, "bad-1", json!({"command": "register"})).await;
    let reply = next_json(&mut socket).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["id"], "bad-1");
}

#[tokio::test]
async fn type_filter_delivers_only_promotions() {
    let addr = spawn_app().await;
    let mut socket = connect(addr).await;

    send_command(
        &mut socket,
        "sub-3",
        json!({
            "command": "subscribe",
            "event_ids": ["*"],
            "event_types": ["attendee_promoted"],
        }),
    )
    .await;
    let reply = next_json(&mut socket).await;
    assert_eq!(reply["payload"]["event_types"], json!(["attendee_promoted"]));

    let event = post(
        format!("http://{addr}/api/events"),
        json!({"title": "Solo jazz", "capacity": 1}),
    )
    .await;
    let Some(event_id) = event["_id"].as_str() else {
        panic!("event id missing");
    };
    let a = post(
        format!("http://{addr}/api/events/{event_id}/registrations"),
        json!({"attendeeIdentity": "a@example.org"}),
    )
    .await;
    post(
        format!("http://{addr}/api/events/{event_id}/registrations"),
        json!({"attendeeIdentity": "b@example.org"}),
    )
    .await;
    let Some(reg_id) = a["registration"]["_id"].as_str() else {
        panic!("registration id missing");
    };
    let Ok(_) = reqwest::Client::new()
        .delete(format!("http://{addr}/api/registrations/{reg_id}"))
        .send()
        .await
    else {
        panic!("cancel failed");
    };

    let promoted = next_json(&mut socket).await;
    assert_eq!(promoted["type"], "event");
    assert_eq!(promoted["payload"]["event_type"], "attendee_promoted");
    assert_eq!(promoted["payload"]["attendee_identity"], "b@example.org");
}
