//! Room and auction coordination for Crease.
//!
//! Every operation here is a read-modify-write of one [`Room`] through the
//! session store, so the store stays the single source of truth and two
//! commands for the same room never interleave.
//!
//! # Key types
//!
//! - [`RoomCoordinator`]: room lifecycle, squads, match snapshots and the
//!   tournament
//! - [`AuctionCoordinator`]: auction commands plus one countdown task per
//!   bidding room
//! - [`AuctionSignal`]: what a countdown reports back for broadcast
//! - [`RoomConfig`], [`AuctionConfig`]: tunables
//!
//! [`Room`]: crease_protocol::Room

mod auction;
mod code;
mod config;
mod coordinator;
mod countdown;
mod error;

pub use auction::{AuctionCoordinator, AuctionSignal, PassResult};
pub use code::CodeGenerator;
pub use config::{AuctionConfig, RoomConfig};
pub use coordinator::{Departure, RoomCoordinator};
pub use error::RoomError;
