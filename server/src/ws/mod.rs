pub mod actor;
pub mod handler;
pub mod protocol;

use tokio::sync::mpsc;

/// Sender half of one connection's outbound queue. Any part of the system
/// can clone this to push frames to the client; the connection's writer
/// task owns the receiving end and the socket sink.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;
