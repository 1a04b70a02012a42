//! Axum WebSocket upgrade handler.

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::store::RegistrationStore;

/// `GET /ws` : Upgrade HTTP connection to WebSocket.
///
/// The bus receiver is taken before the upgrade so no event committed after
/// the handshake is missed.
pub async fn ws_handler<S: RegistrationStore>(
    ws: WebSocketUpgrade,
    State(state): State<AppState<S>>,
) -> impl IntoResponse {
    let event_rx = state.event_bus.subscribe();
    ws.on_upgrade(move |socket| run_connection(socket, event_rx))
}
