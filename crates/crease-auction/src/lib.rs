//! Player auction for Crease.
//!
//! [`AuctionState`] is the persisted record of one room's auction. Every
//! transition is a synchronous method that either applies fully or returns
//! an [`AuctionError`] and leaves the state untouched; the countdown and the
//! store live in `crease-room`.
//!
//! ```text
//! waiting ──next_player──▶ bidding ──mark_sold───▶ sold ──next_player──▶ bidding …
//!                            │  ▲    └─mark_unsold─▶ unsold
//!                            └──┘ place_bid / pass / tick
//! any non-bidding phase ──close──▶ closed
//! ```

mod error;
mod state;

pub use error::AuctionError;
pub use state::{
    AUCTION_TIMER_SECS, AuctionPhase, AuctionState, Bid, Bidder, PassOutcome,
    SoldPlayer, TickOutcome,
};
