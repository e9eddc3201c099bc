use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};

use crate::state::AppState;
use crate::ws::actor;

/// GET /ws
/// WebSocket upgrade endpoint. The connection authenticates in-band: the
/// first frame must be `authenticate {user_id}` (the upstream gateway has
/// already verified the user's identity token). Unauthenticated sockets are
/// closed after a short deadline by the actor.
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    actor::run_connection(socket, state).await;
}
