//! JSON wire protocol: one `{"event": ..., "data": ...}` object per text
//! frame, both directions. Payloads are opaque structured data — the event
//! name tells the receiver how to interpret them.

use axum::extract::ws::Message;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;

/// Messages a client may send over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Required first frame. The upstream gateway has already verified the
    /// user's identity token; the socket hands us the resulting user id.
    Authenticate { user_id: String },
    /// Subscribe this connection to a room channel (viewing a class page).
    Subscribe { room_id: String },
    /// Leave a room channel.
    Unsubscribe { room_id: String },
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Build the text frame for a server event. Serialization happens once per
/// event; fan-out paths clone the resulting frame per recipient.
pub fn event_frame(event: &str, data: &Value) -> Message {
    let text = serde_json::json!({ "event": event, "data": data }).to_string();
    Message::Text(text.into())
}

/// Push an `error` event to one connection. Best-effort.
pub fn send_error(tx: &mpsc::UnboundedSender<Message>, code: u16, message: &str) {
    let frame = event_frame(
        "error",
        &serde_json::json!({ "code": code, "message": message }),
    );
    let _ = tx.send(frame);
}

/// Push a named event to one connection. Best-effort.
pub fn send_event(tx: &mpsc::UnboundedSender<Message>, event: &str, data: &Value) {
    let _ = tx.send(event_frame(event, data));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_authenticate() {
        let msg =
            ClientMessage::parse(r#"{"event":"authenticate","data":{"user_id":"u1"}}"#).unwrap();
        match msg {
            ClientMessage::Authenticate { user_id } => assert_eq!(user_id, "u1"),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn parses_subscribe_and_unsubscribe() {
        let msg =
            ClientMessage::parse(r#"{"event":"subscribe","data":{"room_id":"class-1"}}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Subscribe { room_id } if room_id == "class-1"));

        let msg = ClientMessage::parse(r#"{"event":"unsubscribe","data":{"room_id":"class-1"}}"#)
            .unwrap();
        assert!(matches!(msg, ClientMessage::Unsubscribe { room_id } if room_id == "class-1"));
    }

    #[test]
    fn rejects_unknown_event() {
        assert!(ClientMessage::parse(r#"{"event":"fly_away","data":{}}"#).is_err());
    }

    #[test]
    fn event_frame_wraps_payload() {
        let frame = event_frame("notification", &serde_json::json!({"title": "Grade Posted"}));
        let Message::Text(text) = frame else {
            panic!("expected text frame");
        };
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["event"], "notification");
        assert_eq!(value["data"]["title"], "Grade Posted");
    }
}
