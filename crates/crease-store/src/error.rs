//! Error types for the store.

use crease_protocol::{ProtocolError, RoomCode};

/// Errors from the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached or refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be encoded or decoded.
    #[error("stored value is corrupt: {0}")]
    Codec(#[from] ProtocolError),

    /// `update_room` was called for a room that does not exist.
    #[error("room {0} does not exist")]
    RoomMissing(RoomCode),
}
