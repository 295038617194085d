//! Coordinator settings.

use std::time::Duration;

use crease_auction::AUCTION_TIMER_SECS;

/// Settings for [`RoomCoordinator`](crate::RoomCoordinator).
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// How many fresh codes `create_room` tries before giving up.
    pub code_attempts: u32,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self { code_attempts: 100 }
    }
}

/// Settings for [`AuctionCoordinator`](crate::AuctionCoordinator).
#[derive(Debug, Clone)]
pub struct AuctionConfig {
    /// Seconds on the clock for each player and after each bid.
    pub timer_secs: u32,

    /// Time between countdown ticks. One second in production; tests may
    /// shorten it.
    pub tick_period: Duration,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            timer_secs: AUCTION_TIMER_SECS,
            tick_period: Duration::from_secs(1),
        }
    }
}
