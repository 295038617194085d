//! Match simulation for Crease.
//!
//! This crate is pure: no I/O, no clocks, no async. Everything that touches
//! a ball lives here:
//!
//! - **Players** ([`Player`], [`Team`], [`PlayerPool`]): the squads a
//!   match is played between.
//! - **State** ([`MatchState`]): the full, serializable snapshot that
//!   travels between peers.
//! - **Engine** ([`MatchEngine`]): the state transition `advance(state) → state'`
//!   and the innings break.
//! - **Replication** ([`ReplicationController`]): which peer may push
//!   a snapshot, and whether an incoming one is newer than ours.
//!
//! ```text
//! controller peer: advance() → should_broadcast()? → matchStateUpdate
//! other peers:     matchStateUpdate → apply_remote() → local snapshot
//! ```

mod engine;
mod error;
mod player;
mod replication;
mod state;

pub use engine::{
    BallOutcome, MatchEngine, handle_innings_break, outcome_weights,
    start_match,
};
pub use error::EngineError;
pub use player::{Player, PlayerId, PlayerPool, Role, Side, Team};
pub use replication::{ApplyOutcome, ReplicationController};
pub use state::{
    BatsmanStats, BowlerStats, Innings, InningsSummary, MatchMode,
    MatchResult, MatchState, format_overs,
};
