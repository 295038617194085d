//! Auction commands and their countdowns.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use crease_auction::{AuctionState, PassOutcome, TickOutcome};
use crease_engine::Player;
use crease_protocol::{Room, RoomCode, ServerEvent};
use crease_store::{KeyValueStore, MemoryStore, SessionStore};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{AuctionConfig, RoomError, countdown};

/// Something a countdown wants the room to hear.
#[derive(Debug, Clone, PartialEq)]
pub enum AuctionSignal {
    /// One second fewer on the clock.
    TimerUpdate { code: RoomCode, timer: u32, round: u32 },
    /// The clock for `round` ran out.
    TimerExpired { code: RoomCode, round: u32 },
}

impl AuctionSignal {
    pub fn code(&self) -> &RoomCode {
        match self {
            Self::TimerUpdate { code, .. } | Self::TimerExpired { code, .. } => code,
        }
    }

    /// Splits into the target room and the event to broadcast there.
    pub fn into_event(self) -> (RoomCode, ServerEvent) {
        match self {
            Self::TimerUpdate { code, timer, round } => {
                (code, ServerEvent::AuctionTimerUpdate { timer, round })
            }
            Self::TimerExpired { code, round } => (code, ServerEvent::AuctionTimerExpired { round }),
        }
    }
}

/// Result of [`AuctionCoordinator::pass`].
#[derive(Debug, Clone)]
pub struct PassResult {
    pub outcome: PassOutcome,
    pub state: AuctionState,
}

struct Countdown {
    id: u64,
    round: u32,
    handle: JoinHandle<()>,
}

/// Runs auction commands against the store and keeps one countdown per
/// bidding room.
///
/// Countdown ticks arrive on the receiver returned by
/// [`new`](Self::new). Dropping the coordinator aborts every countdown.
pub struct AuctionCoordinator<S = MemoryStore> {
    store: Arc<SessionStore<S>>,
    config: AuctionConfig,
    signals: mpsc::UnboundedSender<AuctionSignal>,
    countdowns: Arc<Mutex<HashMap<RoomCode, Countdown>>>,
    next_id: AtomicU64,
}

impl<S: KeyValueStore> AuctionCoordinator<S> {
    pub fn new(
        store: Arc<SessionStore<S>>,
        config: AuctionConfig,
    ) -> (Self, mpsc::UnboundedReceiver<AuctionSignal>) {
        let (signals, rx) = mpsc::unbounded_channel();
        let coordinator = Self {
            store,
            config,
            signals,
            countdowns: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        };
        (coordinator, rx)
    }

    /// Opens a fresh auction in `waiting`, replacing any previous one.
    pub async fn start(&self, code: &RoomCode) -> Result<AuctionState, RoomError> {
        let timer_secs = self.config.timer_secs;
        let updated = self
            .store
            .update_room(code, |room: &mut Room| -> Result<AuctionState, RoomError> {
                let auction = AuctionState::start(timer_secs);
                room.auction_state = Some(auction.clone());
                Ok(auction)
            })
            .await?;
        self.cancel_room(code);
        info!(%code, "auction started");
        Ok(updated.value)
    }

    /// Puts `player` on the block and starts the clock.
    pub async fn next_player(
        &self,
        code: &RoomCode,
        player: Player,
        base_price: u32,
    ) -> Result<AuctionState, RoomError> {
        let now = now_ms();
        let state = self
            .mutate(code, |auction, _| {
                auction.next_player(player, base_price, now)?;
                Ok(auction.clone())
            })
            .await?;
        self.restart_countdown(code, state.round);
        Ok(state)
    }

    /// Places a bid and restarts the clock.
    pub async fn place_bid(
        &self,
        code: &RoomCode,
        team_id: &str,
        team_name: &str,
        amount: u32,
    ) -> Result<AuctionState, RoomError> {
        let now = now_ms();
        let state = self
            .mutate(code, |auction, _| {
                auction.place_bid(team_id, team_name, amount, now)?;
                Ok(auction.clone())
            })
            .await?;
        self.restart_countdown(code, state.round);
        Ok(state)
    }

    /// Records a pass. Once every franchise but the leader has passed the
    /// clock stops and the outcome is [`PassOutcome::AllPassed`].
    pub async fn pass(&self, code: &RoomCode, team_id: &str) -> Result<PassResult, RoomError> {
        let result = self
            .mutate(code, |auction, franchises| {
                let outcome = auction.pass(team_id, franchises)?;
                Ok(PassResult {
                    outcome,
                    state: auction.clone(),
                })
            })
            .await?;
        if matches!(result.outcome, PassOutcome::AllPassed { .. }) {
            self.cancel_room(code);
            info!(%code, round = result.state.round, "all teams passed");
        }
        Ok(result)
    }

    /// Sells the player on the block to the leader.
    pub async fn sold(&self, code: &RoomCode) -> Result<AuctionState, RoomError> {
        let state = self
            .mutate(code, |auction, _| {
                auction.mark_sold()?;
                Ok(auction.clone())
            })
            .await?;
        self.cancel_room(code);
        Ok(state)
    }

    pub async fn unsold(&self, code: &RoomCode) -> Result<AuctionState, RoomError> {
        let state = self
            .mutate(code, |auction, _| {
                auction.mark_unsold()?;
                Ok(auction.clone())
            })
            .await?;
        self.cancel_room(code);
        Ok(state)
    }

    /// Closes the auction.
    pub async fn complete(&self, code: &RoomCode) -> Result<AuctionState, RoomError> {
        let state = self
            .mutate(code, |auction, _| {
                auction.close()?;
                Ok(auction.clone())
            })
            .await?;
        self.cancel_room(code);
        info!(%code, sold = state.sold_players.len(), "auction closed");
        Ok(state)
    }

    /// Restarts clocks for every stored room caught mid-round, e.g. after
    /// a restart. The remaining time comes from the persisted deadline; a
    /// deadline already passed is reported as expired straight away.
    ///
    /// Returns how many countdowns were started.
    pub async fn recover_countdowns(&self) -> Result<usize, RoomError> {
        let now = now_ms();
        let mut started = 0;
        for code in self.store.room_codes().await? {
            let result = self
                .mutate(&code, |auction, _| {
                    if auction.deadline_ms.is_none() {
                        return Ok(None);
                    }
                    Ok(Some((auction.resume_from_deadline(now), auction.round)))
                })
                .await;
            let resumed = match result {
                Ok(resumed) => resumed,
                Err(RoomError::NoAuction(_) | RoomError::NotFound(_)) => None,
                Err(err) => {
                    warn!(%code, error = %err, "could not recover auction clock");
                    None
                }
            };
            match resumed {
                Some((TickOutcome::Running(timer), round)) => {
                    debug!(%code, round, timer, "auction clock recovered");
                    self.restart_countdown(&code, round);
                    started += 1;
                }
                Some((TickOutcome::Expired, round)) => {
                    let _ = self.signals.send(AuctionSignal::TimerExpired { code, round });
                }
                Some((TickOutcome::Stopped, _)) | None => {}
            }
        }
        if started > 0 {
            info!(started, "auction countdowns recovered");
        }
        Ok(started)
    }

    /// Stops the room's countdown, if any.
    pub fn cancel_room(&self, code: &RoomCode) {
        if let Some(countdown) = lock(&self.countdowns).remove(code) {
            countdown.handle.abort();
            debug!(%code, round = countdown.round, "countdown cancelled");
        }
    }

    /// Whether a countdown is running for the room.
    pub fn is_counting(&self, code: &RoomCode) -> bool {
        lock(&self.countdowns).contains_key(code)
    }

    /// Runs `f` on the room's auction under the room lock. `f` also gets
    /// the franchises picked in the room.
    async fn mutate<T, F>(&self, code: &RoomCode, f: F) -> Result<T, RoomError>
    where
        F: FnOnce(&mut AuctionState, &[String]) -> Result<T, RoomError> + Send,
        T: Send,
    {
        let updated = self
            .store
            .update_room(code, |room: &mut Room| -> Result<T, RoomError> {
                let franchises = room.franchises();
                let auction = room
                    .auction_state
                    .as_mut()
                    .ok_or_else(|| RoomError::NoAuction(room.code.clone()))?;
                f(auction, &franchises)
            })
            .await?;
        Ok(updated.value)
    }

    fn restart_countdown(&self, code: &RoomCode, round: u32) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let clock = countdown::run(
            Arc::clone(&self.store),
            code.clone(),
            round,
            self.config.tick_period,
            self.signals.clone(),
        );
        let countdowns = Arc::clone(&self.countdowns);
        let owned = code.clone();

        let mut map = lock(&self.countdowns);
        let handle = tokio::spawn(async move {
            clock.await;
            let mut map = lock(&countdowns);
            if map.get(&owned).is_some_and(|c| c.id == id) {
                map.remove(&owned);
            }
        });
        if let Some(previous) = map.insert(code.clone(), Countdown { id, round, handle }) {
            previous.handle.abort();
        }
    }
}

impl<S> Drop for AuctionCoordinator<S> {
    fn drop(&mut self) {
        for (_, countdown) in lock(&self.countdowns).drain() {
            countdown.handle.abort();
        }
    }
}

fn lock(countdowns: &Mutex<HashMap<RoomCode, Countdown>>) -> MutexGuard<'_, HashMap<RoomCode, Countdown>> {
    countdowns.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crease_store::StoreConfig;

    #[test]
    fn test_signal_into_event() {
        let code = RoomCode::parse("ABCDE").unwrap();
        let (target, event) = AuctionSignal::TimerUpdate {
            code: code.clone(),
            timer: 7,
            round: 2,
        }
        .into_event();
        assert_eq!(target, code);
        assert_eq!(event, ServerEvent::AuctionTimerUpdate { timer: 7, round: 2 });

        let (_, event) = AuctionSignal::TimerExpired { code, round: 2 }.into_event();
        assert_eq!(event, ServerEvent::AuctionTimerExpired { round: 2 });
    }

    #[tokio::test]
    async fn test_commands_without_auction_fail() {
        use crease_protocol::{Mode, PlayerInRoom, SocketId};

        let store = Arc::new(SessionStore::in_memory(StoreConfig::default()));
        let code = RoomCode::parse("ABCDE").unwrap();
        let host = PlayerInRoom::new(SocketId(1), "Host", crease_engine::Side::ALL[0]);
        store.put_room(&Room::new(code.clone(), Mode::Auction, host)).await.unwrap();

        let (auction, _rx) = AuctionCoordinator::new(store, AuctionConfig::default());
        let err = auction.place_bid(&code, "csk", "CSK", 20).await.unwrap_err();
        assert!(matches!(err, RoomError::NoAuction(c) if c == code));
        assert!(!auction.is_counting(&code));
    }
}
