//! Error types for the auction.

use crease_engine::PlayerId;

use crate::AuctionPhase;

/// Rejected auction transitions. The state is unchanged when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuctionError {
    /// The operation is not allowed in the current phase.
    #[error("invalid auction phase: {0}")]
    InvalidPhase(AuctionPhase),

    /// The bid does not beat the current price.
    #[error("bid of {amount} is too low, minimum is {minimum}")]
    BidTooLow { amount: u32, minimum: u32 },

    /// The team passed on this player and cannot bid until the next bid or
    /// the next player.
    #[error("team {0} has already passed")]
    AlreadyPassed(String),

    /// `mark_sold` with nobody bidding.
    #[error("no bids placed on the current player")]
    NoBids,

    /// The player was already sold or went unsold.
    #[error("player {0} has already been offered")]
    AlreadyOffered(PlayerId),
}
