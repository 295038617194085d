//! # Crease
//!
//! Multiplayer session server for a cricket game: rooms with shareable
//! codes, a player auction with a server-side clock, league-and-knockout
//! tournaments and ball-by-ball matches replicated between peers.
//!
//! The server keeps every room in a [`SessionStore`](crease_store::SessionStore)
//! and never simulates deliveries itself: the peer that controls the ball
//! runs the engine and pushes snapshots, which the server stores and fans
//! out. [`SessionClient`] is that peer's side of the protocol.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use crease::prelude::*;
//!
//! # async fn run() -> Result<(), CreaseError> {
//! let server = CreaseServer::builder()
//!     .bind("0.0.0.0:3001")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod client;
mod config;
mod error;
mod handler;
mod hub;
mod server;
mod transport;

pub use client::SessionClient;
pub use config::ServerConfig;
pub use error::{CreaseError, TransportError};
pub use server::{CreaseServer, CreaseServerBuilder};

/// Everything needed to run a server or drive a client.
pub mod prelude {
    pub use crate::{CreaseError, CreaseServer, CreaseServerBuilder, ServerConfig, SessionClient};
    pub use crease_auction::{AuctionPhase, AuctionState, Bidder};
    pub use crease_engine::{
        ApplyOutcome, MatchEngine, MatchMode, MatchState, Player, PlayerId, PlayerPool, Side, Team,
    };
    pub use crease_protocol::{
        ClientEvent, Codec, JsonCodec, Mode, Room, RoomCode, ServerEvent, SocketId,
    };
    pub use crease_room::{AuctionConfig, RoomConfig};
    pub use crease_store::{KeyValueStore, MemoryStore, StoreConfig};
    pub use crease_tournament::{TournamentPhase, TournamentTeam};
}
