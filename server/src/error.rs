//! Core error taxonomy.
//!
//! Delivery failures are deliberately absent: a failed push is contained at
//! the router (logged, implicit unregister) and never surfaces as an error
//! to the producer pipeline.

use thiserror::Error;

/// The durable store could not complete a write or read.
/// Surfaced synchronously to the producer, which owns retry/drop policy —
/// the recorder never retries internally (no idempotency key, retries would
/// risk duplicate records).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("durable store unavailable: {0}")]
    Unavailable(String),
}

/// Failure resolving a room's data-level membership.
#[derive(Debug, Error)]
pub enum RosterError {
    /// The room does not exist. Distinct from a room that exists with zero
    /// members, which resolves to an empty list.
    #[error("room {0} not found")]
    RoomNotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
