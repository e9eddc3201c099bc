use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitStream, StreamExt};
use futures_util::SinkExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::state::AppState;
use crate::ws::protocol::{self, ClientMessage};
use crate::ws::ConnectionSender;

/// Ping interval: server sends WebSocket ping every 30 seconds.
/// Prevents connection leaks from abrupt disconnects.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Pong timeout: if pong not received within 10 seconds after ping, close.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Deadline for the client's authenticate frame after the upgrade.
const AUTH_DEADLINE: Duration = Duration::from_secs(10);

/// Close codes:
/// 4000 = connection superseded by a newer one for the same user
/// 4001 = authentication required / deadline expired
const CLOSE_SUPERSEDED: u16 = 4000;
const CLOSE_AUTH_REQUIRED: u16 = 4001;

/// Run the actor-per-connection pattern for one WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Reader task: processes incoming frames, dispatches to protocol handlers
///
/// The connection starts unauthenticated. The first frame must be
/// `authenticate {user_id}` — the upstream gateway has already verified the
/// identity token, so the declared user id is trusted here. Only after that
/// does the connection enter the registry and become addressable.
pub async fn run_connection(socket: WebSocket, state: AppState) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    // Spawn writer task: forwards mpsc messages to the WebSocket sink
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    let user_id = match await_authenticate(&mut ws_receiver, &tx).await {
        Some(user_id) => user_id,
        None => {
            let _ = tx.send(Message::Close(Some(CloseFrame {
                code: CLOSE_AUTH_REQUIRED,
                reason: "Authentication required".into(),
            })));
            // Drop our sender so the writer drains the close frame and exits.
            drop(tx);
            let _ = writer_handle.await;
            return;
        }
    };

    // Register this connection. Closing the superseded socket, if any, is
    // the transport layer's job — the registry only returns the old handle.
    if let Some(stale) = state.registry.register(&user_id, tx.clone()) {
        let _ = stale.send(Message::Close(Some(CloseFrame {
            code: CLOSE_SUPERSEDED,
            reason: "Connection superseded".into(),
        })));
    }

    protocol::send_event(
        &tx,
        "authenticated",
        &serde_json::json!({ "user_id": user_id }),
    );

    tracing::info!(user_id = %user_id, "WebSocket actor started");

    // Track pong reception
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();

    // Spawn ping task: sends periodic pings and monitors pong responses
    let ping_tx = tx.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(PING_INTERVAL);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                // Writer task has died — connection is gone
                break;
            }

            match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
                Ok(Some(())) => {
                    // Pong received, continue
                }
                _ => {
                    tracing::warn!("Pong timeout, closing connection");
                    let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "Pong timeout".into(),
                    })));
                    break;
                }
            }
        }
    });

    // Reader loop: process incoming WebSocket frames
    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    handle_client_frame(&text, &tx, &state, &user_id);
                }
                Message::Binary(_) => {
                    tracing::debug!(
                        user_id = %user_id,
                        "Ignoring binary frame (protocol is JSON text)"
                    );
                }
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(
                        user_id = %user_id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    user_id = %user_id,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                tracing::info!(user_id = %user_id, "WebSocket stream ended");
                break;
            }
        }
    }

    // Cleanup: abort writer and ping tasks
    writer_handle.abort();
    ping_handle.abort();

    // Guarded unregister: a no-op if a newer connection already owns the
    // mapping. Room subscriptions are torn down only on a real disconnect —
    // when superseded, the user is still online and the new connection
    // re-subscribes idempotently as pages reload.
    if state.registry.unregister(&user_id, &tx) {
        state.rooms.leave_all(&user_id);
    }

    tracing::info!(user_id = %user_id, "WebSocket actor stopped");
}

/// Wait for the authenticate frame, answering pings in the meantime.
/// Returns None on deadline expiry, close, or transport error.
async fn await_authenticate(
    ws_receiver: &mut SplitStream<WebSocket>,
    tx: &ConnectionSender,
) -> Option<String> {
    let handshake = timeout(AUTH_DEADLINE, async {
        loop {
            match ws_receiver.next().await {
                Some(Ok(Message::Text(text))) => match ClientMessage::parse(&text) {
                    Ok(ClientMessage::Authenticate { user_id }) if !user_id.is_empty() => {
                        return Some(user_id);
                    }
                    Ok(ClientMessage::Authenticate { .. }) => {
                        protocol::send_error(tx, 400, "user_id must be non-empty");
                    }
                    Ok(_) => {
                        protocol::send_error(tx, 401, "Authenticate first");
                    }
                    Err(_) => {
                        protocol::send_error(tx, 400, "Invalid message");
                    }
                },
                Some(Ok(Message::Ping(data))) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;

    match handshake {
        Ok(user_id) => user_id,
        Err(_) => {
            tracing::debug!("Authentication deadline expired");
            None
        }
    }
}

/// Dispatch one authenticated client frame.
fn handle_client_frame(text: &str, tx: &ConnectionSender, state: &AppState, user_id: &str) {
    match ClientMessage::parse(text) {
        Ok(ClientMessage::Authenticate { .. }) => {
            protocol::send_error(tx, 400, "Already authenticated");
        }
        Ok(ClientMessage::Subscribe { room_id }) => {
            if room_id.is_empty() {
                protocol::send_error(tx, 400, "room_id must be non-empty");
                return;
            }
            state.rooms.subscribe(&room_id, user_id);
            tracing::debug!(
                user_id = %user_id,
                room_id = %room_id,
                "Subscribed to room channel"
            );
        }
        Ok(ClientMessage::Unsubscribe { room_id }) => {
            state.rooms.unsubscribe(&room_id, user_id);
            tracing::debug!(
                user_id = %user_id,
                room_id = %room_id,
                "Unsubscribed from room channel"
            );
        }
        Err(e) => {
            tracing::debug!(
                user_id = %user_id,
                error = %e,
                "Unparseable client frame"
            );
            protocol::send_error(tx, 400, "Invalid message");
        }
    }
}

/// Writer task: receives messages from the mpsc channel and forwards them to
/// the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed — connection is broken
            break;
        }
    }
}
