//! Wire protocol for Crease.
//!
//! This crate defines what clients and the server say to each other and
//! what gets persisted:
//!
//! - **Types** ([`Room`], [`PlayerInRoom`], [`RoomCode`], [`SocketId`]):
//!   the room record every event mutates.
//! - **Events** ([`ClientEvent`], [`ServerEvent`]): one JSON frame per
//!   event, `{"event": "<name>", "data": {...}}`.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how events and rooms
//!   become bytes.
//!
//! It knows nothing about sockets or storage.
//!
//! ```text
//! Transport (frames) → Protocol (ClientEvent) → Coordinators (Room)
//! ```

mod codec;
mod error;
mod events;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use events::{ClientEvent, ServerEvent, TeamsPayload, TournamentSnapshot};
pub use types::{Mode, PlayerInRoom, Recipient, Room, RoomCode, SocketId};
