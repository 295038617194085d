//! A transport-agnostic client session.
//!
//! [`SessionClient`] holds one participant's view of its room and queues
//! the commands it wants to send. Feed it every [`ServerEvent`] through
//! [`apply`](SessionClient::apply) and drain
//! [`poll_outbound`](SessionClient::poll_outbound) onto whatever socket
//! you have. Match snapshots go through the [`ReplicationController`], so
//! only the peer that controls the ball ever pushes one.
//!
//! Commands issued while in a room carry that room's code, so the server
//! can refuse one that arrives after the client has moved elsewhere.

use std::collections::VecDeque;

use crease_auction::AuctionState;
use crease_engine::{
    ApplyOutcome, EngineError, MatchEngine, MatchMode, MatchState, Player, PlayerPool,
    ReplicationController, Team, start_match,
};
use crease_protocol::{
    ClientEvent, Mode, Room, ServerEvent, SocketId, TournamentSnapshot,
};
use rand::Rng;
use rand::rngs::StdRng;
use tracing::{debug, trace};

pub struct SessionClient<R: Rng = StdRng> {
    socket_id: Option<SocketId>,
    room: Option<Room>,
    match_state: Option<MatchState>,
    auction: Option<AuctionState>,
    tournament: Option<TournamentSnapshot>,
    last_error: Option<ServerEvent>,
    replication: ReplicationController,
    engine: MatchEngine<R>,
    outbox: VecDeque<ClientEvent>,
}

impl SessionClient<StdRng> {
    /// A client whose engine is seeded from the operating system.
    pub fn new() -> Self {
        Self::with_engine(MatchEngine::from_os_rng())
    }

    /// A client whose deliveries are fully determined by `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self::with_engine(MatchEngine::seeded(seed))
    }
}

impl Default for SessionClient<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> SessionClient<R> {
    pub fn with_engine(engine: MatchEngine<R>) -> Self {
        Self {
            socket_id: None,
            room: None,
            match_state: None,
            auction: None,
            tournament: None,
            last_error: None,
            replication: ReplicationController::spectator(),
            engine,
            outbox: VecDeque::new(),
        }
    }

    // -- State ------------------------------------------------------------

    pub fn socket_id(&self) -> Option<SocketId> {
        self.socket_id
    }

    pub fn room(&self) -> Option<&Room> {
        self.room.as_ref()
    }

    pub fn match_state(&self) -> Option<&MatchState> {
        self.match_state.as_ref()
    }

    pub fn auction(&self) -> Option<&AuctionState> {
        self.auction.as_ref()
    }

    pub fn tournament(&self) -> Option<&TournamentSnapshot> {
        self.tournament.as_ref()
    }

    /// The most recent error event the server sent us.
    pub fn last_error(&self) -> Option<&ServerEvent> {
        self.last_error.as_ref()
    }

    pub fn is_host(&self) -> bool {
        self.replication.is_host()
    }

    /// Whether this client drives the ball in the current match.
    pub fn controls_ball(&self) -> bool {
        self.match_state
            .as_ref()
            .is_some_and(|state| self.replication.controls(state))
    }

    // -- Commands ---------------------------------------------------------

    /// The current room's code, stamped on room commands.
    fn code(&self) -> Option<String> {
        self.room.as_ref().map(|room| room.code.to_string())
    }

    /// Queues any command.
    pub fn send(&mut self, event: ClientEvent) {
        trace!(event = event.name(), "queued");
        self.outbox.push_back(event);
    }

    pub fn heartbeat(&mut self) {
        self.send(ClientEvent::Heartbeat);
    }

    pub fn create_room(&mut self, name: &str, mode: Mode) {
        self.send(ClientEvent::CreateRoom {
            name: name.to_string(),
            mode,
        });
    }

    pub fn join_room(&mut self, code: &str, name: &str) {
        self.send(ClientEvent::JoinRoom {
            code: code.to_string(),
            name: name.to_string(),
        });
    }

    /// Leaves the room and forgets everything about it. The server does
    /// not answer the leaver.
    pub fn leave_room(&mut self) {
        let code = self.code();
        self.send(ClientEvent::LeaveRoom { code });
        self.room = None;
        self.match_state = None;
        self.auction = None;
        self.tournament = None;
        self.replication.set_identity(None, false);
        self.replication.reset();
    }

    pub fn select_ipl_team(&mut self, team_id: Option<&str>) {
        self.send(ClientEvent::SelectIplTeam {
            code: self.code(),
            team_id: team_id.map(str::to_string),
        });
    }

    pub fn update_teams(&mut self, team_a: Option<Team>, team_b: Option<Team>) {
        self.send(ClientEvent::TeamUpdate {
            code: self.code(),
            team_a,
            team_b,
        });
    }

    pub fn place_bid(&mut self, team_id: &str, team_name: &str, amount: u32) {
        self.send(ClientEvent::AuctionPlaceBid {
            code: self.code(),
            team_id: team_id.to_string(),
            team_name: team_name.to_string(),
            amount,
        });
    }

    pub fn pass(&mut self, team_id: &str, team_name: &str) {
        self.send(ClientEvent::AuctionPass {
            code: self.code(),
            team_id: team_id.to_string(),
            team_name: team_name.to_string(),
        });
    }

    /// Puts the first pool player not yet offered on the block.
    ///
    /// Returns `None` without queueing anything when the pool is exhausted
    /// or no auction is known.
    pub fn nominate_next_player(&mut self, pool: &PlayerPool, base_price: u32) -> Option<Player> {
        let player = self.auction.as_ref()?.next_from_pool(pool)?.clone();
        self.send(ClientEvent::AuctionNextPlayer {
            code: self.code(),
            player: player.clone(),
            base_price,
        });
        Some(player)
    }

    /// Starts a match locally and queues `startOnlineMatch` plus the
    /// opening snapshot for the others.
    ///
    /// A previous match must have been ended with
    /// [`end_match`](Self::end_match): the server drops an opening snapshot
    /// that is not newer than the one it holds.
    pub fn start_match(
        &mut self,
        batting: Team,
        bowling: Team,
        total_overs: u32,
        mode: MatchMode,
    ) -> Result<(), EngineError> {
        let state = start_match(batting, bowling, total_overs, mode)?;
        self.replication.reset();
        self.match_state = Some(state.clone());
        self.send(ClientEvent::StartOnlineMatch { code: self.code() });
        self.send(ClientEvent::MatchStateUpdate {
            code: self.code(),
            match_state: Box::new(state),
        });
        Ok(())
    }

    pub fn end_match(&mut self) {
        self.send(ClientEvent::EndOnlineMatch { code: self.code() });
    }

    /// Bowls one delivery if this client controls the ball.
    ///
    /// Returns whether a delivery was bowled. The new snapshot is queued
    /// for the others when it moves the match on.
    pub fn bowl(&mut self) -> Result<bool, EngineError> {
        let Some(current) = self.match_state.as_ref() else {
            return Ok(false);
        };
        if current.is_match_over || !self.replication.controls(current) {
            return Ok(false);
        }
        let next = self.engine.advance(current)?;
        if let Some(outgoing) = self.replication.commit_local(&mut self.match_state, next) {
            self.send(ClientEvent::MatchStateUpdate {
                code: self.code(),
                match_state: Box::new(outgoing),
            });
        }
        Ok(true)
    }

    // -- Inbound ----------------------------------------------------------

    /// Applies one event from the server.
    ///
    /// Returns the replication outcome for a match snapshot and `None` for
    /// every other event.
    pub fn apply(&mut self, event: ServerEvent) -> Option<ApplyOutcome> {
        if event.is_error() {
            debug!(event = event.name(), "server reported an error");
            self.last_error = Some(event);
            return None;
        }
        match event {
            ServerEvent::Connected { socket_id } => {
                self.socket_id = Some(socket_id);
            }
            ServerEvent::RoomCreated(room)
            | ServerEvent::RoomJoined(room)
            | ServerEvent::RoomUpdate(room) => self.set_room(*room),

            ServerEvent::MatchStateUpdate(state) => {
                return Some(self.apply_remote_snapshot(*state));
            }
            ServerEvent::StartOnlineMatch => self.replication.reset(),
            ServerEvent::EndOnlineMatch => {
                self.match_state = None;
                self.replication.reset();
            }
            ServerEvent::TeamUpdate(teams) => {
                if let Some(room) = self.room.as_mut() {
                    if teams.team_a.is_some() {
                        room.team_a = teams.team_a;
                    }
                    if teams.team_b.is_some() {
                        room.team_b = teams.team_b;
                    }
                }
            }

            ServerEvent::StartAuction => self.auction = Some(AuctionState::default()),
            ServerEvent::AuctionStateUpdate(auction) => self.auction = Some(*auction),
            ServerEvent::AuctionTimerUpdate { timer, round } => {
                if let Some(auction) = self.auction.as_mut().filter(|a| a.round == round) {
                    auction.timer = timer;
                }
            }

            ServerEvent::TournamentFixturesGenerated(snapshot)
            | ServerEvent::TournamentResultsUpdate(snapshot) => {
                if let Some(room) = self.room.as_mut() {
                    room.tournament_teams = snapshot.teams.clone();
                }
                self.tournament = Some(snapshot);
            }
            ServerEvent::TournamentTeamUpdate { teams } => {
                if let Some(room) = self.room.as_mut() {
                    room.tournament_teams = teams;
                }
            }

            // Navigation and clock signals carry nothing to store.
            _ => {}
        }
        None
    }

    /// Applies a snapshot from another peer. Stale snapshots are ignored.
    pub fn apply_remote_snapshot(&mut self, state: MatchState) -> ApplyOutcome {
        self.replication.apply_remote(&mut self.match_state, state)
    }

    // -- Outbound ---------------------------------------------------------

    /// The next queued command, oldest first.
    pub fn poll_outbound(&mut self) -> Option<ClientEvent> {
        self.outbox.pop_front()
    }

    pub fn drain_outbound(&mut self) -> Vec<ClientEvent> {
        self.outbox.drain(..).collect()
    }

    fn set_room(&mut self, room: Room) {
        let me = self.socket_id.and_then(|socket| room.player(socket));
        let side = me.map(|player| player.side);
        let is_host = self.socket_id == Some(room.host_id);
        self.replication.set_identity(side, is_host);
        self.room = Some(room);
    }
}
