//! Error types for the match engine.

use crate::PlayerId;

/// Invalid transitions on a [`MatchState`](crate::MatchState).
///
/// The engine never mutates a snapshot it cannot make sense of. Instead of
/// handing back the unchanged state, every lookup failure or out-of-order
/// call is reported so the caller can decide whether it raced with a
/// newer snapshot or hit a bug.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The match already has a result. The state is frozen.
    #[error("match is already over")]
    MatchOver,

    /// The first innings has ended; call `handle_innings_break` first.
    #[error("innings is over, waiting for the innings break")]
    InningsOver,

    /// `handle_innings_break` was called mid-innings or after the second
    /// innings started.
    #[error("not at an innings break")]
    NotAtInningsBreak,

    /// A striker, non-striker or bowler id does not belong to its team.
    /// Usually means the snapshot was replaced underneath the caller.
    #[error("player {0} is not part of this match (stale state?)")]
    StalePlayer(PlayerId),

    /// A team needs at least two players to bat.
    #[error("team {0} needs at least two players")]
    TeamTooSmall(String),

    /// A match needs at least one over per side.
    #[error("a match needs at least one over")]
    NoOvers,
}
