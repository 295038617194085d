//! Error types for the coordinators.

use crease_auction::AuctionError;
use crease_protocol::{ProtocolError, RoomCode, SocketId};
use crease_store::StoreError;
use crease_tournament::TournamentError;

/// Errors from room and auction operations.
///
/// Whenever one of these is returned the stored room is unchanged.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No live room has this code.
    #[error("room {0} not found")]
    NotFound(RoomCode),

    /// The user typed something that cannot be a room code.
    #[error("invalid room code {0:?}")]
    InvalidCode(String),

    /// The room is at capacity for its mode.
    #[error("room {0} is full")]
    RoomFull(RoomCode),

    /// Every side letter is taken.
    #[error("no side letter left in room {0}")]
    SideUnavailable(RoomCode),

    /// `create_room` could not find an unused code.
    #[error("no free room code after {0} attempts")]
    CodeExhausted(u32),

    /// Another participant already plays as this franchise.
    #[error("team {0} is already taken")]
    TeamAlreadyTaken(String),

    /// The socket is not a participant of the room it addressed.
    #[error("socket {0} is not in a room")]
    NotInRoom(SocketId),

    /// A command named a room other than the one the socket is in.
    #[error("socket is in room {actual}, not {claimed}")]
    CodeMismatch { claimed: RoomCode, actual: RoomCode },

    /// The socket is already in a different room.
    #[error("already in room {0}")]
    AlreadyInRoom(RoomCode),

    /// A match snapshot not newer than the stored one.
    #[error("stale match state: seq {incoming} is not newer than {stored}")]
    StaleMatchState { incoming: u64, stored: u64 },

    /// An auction command for a room with no auction running.
    #[error("no auction in room {0}")]
    NoAuction(RoomCode),

    #[error(transparent)]
    Auction(#[from] AuctionError),

    #[error(transparent)]
    Tournament(#[from] TournamentError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for RoomError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RoomMissing(code) => Self::NotFound(code),
            other => Self::Store(other),
        }
    }
}

impl From<ProtocolError> for RoomError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::InvalidRoomCode(input) => Self::InvalidCode(input),
            other => Self::Store(StoreError::Codec(other)),
        }
    }
}
