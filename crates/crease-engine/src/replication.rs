//! Deciding who may push a match snapshot, and which snapshots to accept.
//!
//! Every peer runs the same [`ReplicationController`]. Exactly one of them
//! (the owner of the bowling side, or the host if nobody owns it) controls
//! the ball; the rest only apply what they receive. Snapshots are replaced
//! wholesale, guarded by [`MatchState::seq`]: anything not strictly newer
//! than what a peer already holds is dropped.

use tracing::{debug, trace, warn};

use crate::{Innings, MatchState, Side, handle_innings_break};

/// What [`ReplicationController::apply_remote`] did with a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The snapshot replaced the local state.
    Applied,
    /// The snapshot ended the first innings; the local state is now the
    /// opening of the second innings, computed locally.
    InningsBreak,
    /// The snapshot was not newer than the local state and was ignored.
    Stale,
}

/// `(balls_bowled, is_match_over)` of the last snapshot this peer pushed.
type Marker = (u32, bool);

/// Per-peer replication bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct ReplicationController {
    side: Option<Side>,
    is_host: bool,
    last_broadcast: Option<Marker>,
    innings: Option<Innings>,
}

impl ReplicationController {
    /// A controller for a seated participant.
    pub fn new(side: Side, is_host: bool) -> Self {
        Self {
            side: Some(side),
            is_host,
            ..Self::default()
        }
    }

    /// A controller for an observer with no side. It never broadcasts.
    pub fn spectator() -> Self {
        Self::default()
    }

    /// Updates identity, e.g. after host failover.
    pub fn set_identity(&mut self, side: Option<Side>, is_host: bool) {
        self.side = side;
        self.is_host = is_host;
    }

    pub fn side(&self) -> Option<Side> {
        self.side
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    /// Whether this peer drives the ball for `state`.
    pub fn controls(&self, state: &MatchState) -> bool {
        let Some(side) = self.side else {
            return false;
        };
        match state.bowling_team.owner {
            Some(owner) => owner == side,
            None => self.is_host,
        }
    }

    /// Whether `state` should be pushed to the other peers.
    ///
    /// True at most once per `(balls_bowled, is_match_over)` marker, so a
    /// wide (which leaves `balls_bowled` unchanged) is not pushed a second
    /// time. Marks the snapshot as broadcast when returning true.
    pub fn should_broadcast(&mut self, state: &MatchState) -> bool {
        self.track_innings(state.innings);
        if !self.controls(state) {
            return false;
        }
        let marker = (state.balls_bowled, state.is_match_over);
        if self.last_broadcast == Some(marker) {
            trace!(balls = state.balls_bowled, "marker unchanged, not broadcasting");
            return false;
        }
        self.last_broadcast = Some(marker);
        true
    }

    /// Records a snapshot this peer produced with the engine.
    ///
    /// Returns the snapshot to push if it should be broadcast. When the
    /// snapshot closes the first innings the break is applied to `local`
    /// after the push; the others compute the same break on receipt.
    pub fn commit_local(
        &mut self,
        local: &mut Option<MatchState>,
        next: MatchState,
    ) -> Option<MatchState> {
        let outgoing = self.should_broadcast(&next).then(|| next.clone());
        *local = Some(self.settle(next));
        outgoing
    }

    /// Applies a snapshot received from another peer.
    ///
    /// Never fails: stale snapshots are reported and dropped.
    pub fn apply_remote(
        &mut self,
        local: &mut Option<MatchState>,
        incoming: MatchState,
    ) -> ApplyOutcome {
        if let Some(current) = local.as_ref() {
            if incoming.seq <= current.seq {
                debug!(incoming = incoming.seq, local = current.seq, "dropping stale snapshot");
                return ApplyOutcome::Stale;
            }
        }
        self.track_innings(incoming.innings);

        let at_break = incoming.innings == Innings::First && incoming.innings_over;
        let settled = self.settle(incoming);
        let outcome = if at_break && settled.innings == Innings::Second {
            ApplyOutcome::InningsBreak
        } else {
            ApplyOutcome::Applied
        };
        *local = Some(settled);
        outcome
    }

    /// Forgets broadcast tracking, e.g. when a new match starts.
    pub fn reset(&mut self) {
        self.last_broadcast = None;
        self.innings = None;
    }

    fn track_innings(&mut self, innings: Innings) {
        if self.innings != Some(innings) {
            self.innings = Some(innings);
            self.last_broadcast = None;
        }
    }

    /// Runs the innings break if `state` is waiting for one.
    fn settle(&mut self, state: MatchState) -> MatchState {
        if state.innings != Innings::First || !state.innings_over || state.is_match_over {
            return state;
        }
        match handle_innings_break(&state) {
            Ok(next) => {
                self.track_innings(next.innings);
                next
            }
            Err(e) => {
                warn!(error = %e, "innings break failed; keeping snapshot");
                state
            }
        }
    }
}
