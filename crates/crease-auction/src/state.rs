//! The auction record and its transitions.

use std::fmt;

use crease_engine::{Player, PlayerPool};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::AuctionError;

/// Seconds on the clock when a player comes up or a bid lands.
pub const AUCTION_TIMER_SECS: u32 = 10;

/// Where the auction is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuctionPhase {
    /// Started, no player on the block yet.
    Waiting,
    /// A player is on the block and the clock is running.
    Bidding,
    /// The last player went to the highest bidder.
    Sold,
    /// The last player found no buyer.
    Unsold,
    /// The auction is over.
    Closed,
}

impl fmt::Display for AuctionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Waiting => "waiting",
            Self::Bidding => "bidding",
            Self::Sold => "sold",
            Self::Unsold => "unsold",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// The franchise currently holding the floor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bidder {
    pub team_id: String,
    pub team_name: String,
}

/// One accepted bid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    pub team_id: String,
    pub team_name: String,
    pub amount: u32,
}

/// A completed sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoldPlayer {
    pub player: Player,
    pub team_id: String,
    pub team_name: String,
    pub price: u32,
}

/// Result of [`AuctionState::pass`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// The pass was recorded; bidding continues.
    Recorded,
    /// The team had already passed. Nothing changed.
    Repeat,
    /// Every franchise except the leader has passed. The caller should
    /// resolve the player without waiting for the clock: sold to `leader`,
    /// or unsold when nobody bid.
    AllPassed { leader: Option<Bidder> },
}

/// Result of one countdown step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Seconds left on the clock.
    Running(u32),
    /// The clock reached zero.
    Expired,
    /// Not bidding; the countdown should stop.
    Stopped,
}

/// One room's auction.
///
/// Prices are whole units (lakhs); the core never does arithmetic on them
/// beyond comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionState {
    pub phase: AuctionPhase,
    #[serde(default)]
    pub current_player: Option<Player>,
    pub base_price: u32,
    pub current_bid: u32,
    #[serde(default)]
    pub current_bidder: Option<Bidder>,
    /// Seconds left on the clock while bidding.
    pub timer: u32,
    /// Value `timer` resets to.
    #[serde(default = "default_timer_secs")]
    pub timer_secs: u32,
    /// Unix millis at which the clock runs out. Survives restarts.
    #[serde(default)]
    pub deadline_ms: Option<u64>,
    /// Bumped every time a new player comes up.
    pub round: u32,
    pub bid_history: Vec<Bid>,
    pub passed_teams: Vec<String>,
    pub sold_players: Vec<SoldPlayer>,
    pub unsold_players: Vec<Player>,
}

fn default_timer_secs() -> u32 {
    AUCTION_TIMER_SECS
}

impl Default for AuctionState {
    fn default() -> Self {
        Self::start(AUCTION_TIMER_SECS)
    }
}

impl AuctionState {
    /// A fresh auction in `waiting` with empty lists.
    pub fn start(timer_secs: u32) -> Self {
        Self {
            phase: AuctionPhase::Waiting,
            current_player: None,
            base_price: 0,
            current_bid: 0,
            current_bidder: None,
            timer: timer_secs,
            timer_secs,
            deadline_ms: None,
            round: 0,
            bid_history: Vec::new(),
            passed_teams: Vec::new(),
            sold_players: Vec::new(),
            unsold_players: Vec::new(),
        }
    }

    pub fn is_bidding(&self) -> bool {
        self.phase == AuctionPhase::Bidding
    }

    /// Whether `player` was already sold or went unsold.
    pub fn was_offered(&self, player: &Player) -> bool {
        self.sold_players.iter().any(|s| s.player.id == player.id)
            || self.unsold_players.iter().any(|p| p.id == player.id)
    }

    /// The first pool player that has not been on the block yet.
    pub fn next_from_pool<'a>(&self, pool: &'a PlayerPool) -> Option<&'a Player> {
        pool.iter().find(|p| {
            !self.was_offered(p)
                && self.current_player.as_ref().is_none_or(|c| c.id != p.id)
        })
    }

    /// Puts `player` on the block at `base_price`.
    pub fn next_player(
        &mut self,
        player: Player,
        base_price: u32,
        now_ms: u64,
    ) -> Result<(), AuctionError> {
        if matches!(self.phase, AuctionPhase::Bidding | AuctionPhase::Closed) {
            return Err(AuctionError::InvalidPhase(self.phase));
        }
        if self.was_offered(&player) {
            return Err(AuctionError::AlreadyOffered(player.id));
        }

        debug!(player = %player.name, base_price, "player up for auction");
        self.phase = AuctionPhase::Bidding;
        self.current_player = Some(player);
        self.base_price = base_price;
        self.current_bid = base_price;
        self.current_bidder = None;
        self.bid_history.clear();
        self.passed_teams.clear();
        self.round += 1;
        self.reset_clock(now_ms);
        Ok(())
    }

    /// Places a bid for the player on the block.
    ///
    /// The opening bid may equal the base price; every later bid must beat
    /// the current one. Resets the clock and clears the passes.
    pub fn place_bid(
        &mut self,
        team_id: &str,
        team_name: &str,
        amount: u32,
        now_ms: u64,
    ) -> Result<(), AuctionError> {
        if !self.is_bidding() {
            return Err(AuctionError::InvalidPhase(self.phase));
        }
        if self.passed_teams.iter().any(|t| t == team_id) {
            return Err(AuctionError::AlreadyPassed(team_id.to_string()));
        }
        let minimum = if self.current_bidder.is_some() {
            self.current_bid + 1
        } else {
            self.base_price
        };
        if amount < minimum {
            return Err(AuctionError::BidTooLow { amount, minimum });
        }

        debug!(team = team_id, amount, "bid accepted");
        self.current_bid = amount;
        self.current_bidder = Some(Bidder {
            team_id: team_id.to_string(),
            team_name: team_name.to_string(),
        });
        self.bid_history.push(Bid {
            team_id: team_id.to_string(),
            team_name: team_name.to_string(),
            amount,
        });
        self.passed_teams.clear();
        self.reset_clock(now_ms);
        Ok(())
    }

    /// Records that `team_id` will not bid on the current player.
    ///
    /// `franchises` is every team id a room participant has picked. Once all
    /// of them except the leader have passed the result is
    /// [`PassOutcome::AllPassed`].
    pub fn pass(
        &mut self,
        team_id: &str,
        franchises: &[String],
    ) -> Result<PassOutcome, AuctionError> {
        if !self.is_bidding() {
            return Err(AuctionError::InvalidPhase(self.phase));
        }
        if self.passed_teams.iter().any(|t| t == team_id) {
            return Ok(PassOutcome::Repeat);
        }
        self.passed_teams.push(team_id.to_string());

        let leader = self.current_bidder.as_ref().map(|b| b.team_id.as_str());
        let mut eligible = franchises
            .iter()
            .filter(|id| Some(id.as_str()) != leader)
            .peekable();
        let all_passed = eligible.peek().is_some()
            && eligible.all(|id| self.passed_teams.contains(id));

        if all_passed {
            debug!(leader = ?leader, "all eligible teams passed");
            self.deadline_ms = None;
            return Ok(PassOutcome::AllPassed {
                leader: self.current_bidder.clone(),
            });
        }
        Ok(PassOutcome::Recorded)
    }

    /// Sells the player on the block to the highest bidder.
    pub fn mark_sold(&mut self) -> Result<SoldPlayer, AuctionError> {
        if !self.is_bidding() {
            return Err(AuctionError::InvalidPhase(self.phase));
        }
        let bidder = self.current_bidder.clone().ok_or(AuctionError::NoBids)?;
        let player = self
            .current_player
            .clone()
            .ok_or(AuctionError::InvalidPhase(self.phase))?;

        let sold = SoldPlayer {
            player,
            team_id: bidder.team_id,
            team_name: bidder.team_name,
            price: self.current_bid,
        };
        debug!(player = %sold.player.name, team = %sold.team_id, price = sold.price, "sold");
        self.sold_players.push(sold.clone());
        self.phase = AuctionPhase::Sold;
        self.deadline_ms = None;
        Ok(sold)
    }

    /// Closes the round with no sale.
    pub fn mark_unsold(&mut self) -> Result<Player, AuctionError> {
        if !self.is_bidding() {
            return Err(AuctionError::InvalidPhase(self.phase));
        }
        let player = self
            .current_player
            .clone()
            .ok_or(AuctionError::InvalidPhase(self.phase))?;
        debug!(player = %player.name, "unsold");
        self.unsold_players.push(player.clone());
        self.phase = AuctionPhase::Unsold;
        self.deadline_ms = None;
        Ok(player)
    }

    /// Ends the auction. Not allowed while a player is on the block.
    pub fn close(&mut self) -> Result<(), AuctionError> {
        if self.is_bidding() {
            return Err(AuctionError::InvalidPhase(self.phase));
        }
        self.phase = AuctionPhase::Closed;
        self.current_player = None;
        self.deadline_ms = None;
        Ok(())
    }

    /// Advances the clock by one second.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.is_bidding() {
            return TickOutcome::Stopped;
        }
        self.timer = self.timer.saturating_sub(1);
        if self.timer == 0 {
            TickOutcome::Expired
        } else {
            TickOutcome::Running(self.timer)
        }
    }

    /// Recomputes `timer` from the persisted deadline, e.g. after a restart.
    ///
    /// Returns the outcome the countdown should resume from.
    pub fn resume_from_deadline(&mut self, now_ms: u64) -> TickOutcome {
        if !self.is_bidding() {
            return TickOutcome::Stopped;
        }
        let Some(deadline) = self.deadline_ms else {
            return if self.timer == 0 {
                TickOutcome::Expired
            } else {
                TickOutcome::Running(self.timer)
            };
        };
        let remaining_ms = deadline.saturating_sub(now_ms);
        let remaining = remaining_ms.div_ceil(1000).min(u64::from(self.timer_secs)) as u32;
        self.timer = remaining;
        if remaining == 0 {
            TickOutcome::Expired
        } else {
            TickOutcome::Running(remaining)
        }
    }

    fn reset_clock(&mut self, now_ms: u64) {
        self.timer = self.timer_secs;
        self.deadline_ms = Some(now_ms + u64::from(self.timer_secs) * 1000);
    }
}
