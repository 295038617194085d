//! The per-room auction clock.
//!
//! One task per bidding room. Each tick re-reads the room through the
//! store, so a bid, a sale or a deleted room seen by any writer stops or
//! supersedes the clock without talking to the task.

use std::sync::Arc;
use std::time::Duration;

use crease_auction::TickOutcome;
use crease_protocol::{Room, RoomCode};
use crease_store::{KeyValueStore, SessionStore};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

use crate::{AuctionSignal, RoomError};

/// Runs the clock for `round` of the auction in `code` until it expires or
/// the round is over.
pub(crate) async fn run<S: KeyValueStore>(
    store: Arc<SessionStore<S>>,
    code: RoomCode,
    round: u32,
    period: Duration,
    signals: mpsc::UnboundedSender<AuctionSignal>,
) {
    let mut next = Instant::now() + period;
    loop {
        time::sleep_until(next).await;
        next += period;

        let result = store
            .update_room(&code, |room: &mut Room| -> Result<TickOutcome, RoomError> {
                match room.auction_state.as_mut() {
                    Some(auction) if auction.round == round && auction.is_bidding() => {
                        Ok(auction.tick())
                    }
                    _ => Err(RoomError::NoAuction(room.code.clone())),
                }
            })
            .await;

        let signal = match result {
            Ok(updated) => match updated.value {
                TickOutcome::Running(timer) => AuctionSignal::TimerUpdate {
                    code: code.clone(),
                    timer,
                    round,
                },
                TickOutcome::Expired => AuctionSignal::TimerExpired {
                    code: code.clone(),
                    round,
                },
                TickOutcome::Stopped => break,
            },
            Err(RoomError::NoAuction(_) | RoomError::NotFound(_)) => {
                trace!(%code, round, "round over, countdown stopped");
                break;
            }
            Err(err) => {
                warn!(%code, round, error = %err, "countdown tick failed, clock stopped");
                break;
            }
        };

        let expired = matches!(signal, AuctionSignal::TimerExpired { .. });
        if signals.send(signal).is_err() {
            debug!(%code, "signal receiver gone, countdown stopped");
            break;
        }
        if expired {
            debug!(%code, round, "auction timer expired");
            break;
        }
    }
}
