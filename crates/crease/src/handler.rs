//! Per-connection handler: greeting, receive loop and event routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Upgrade to WebSocket, register the outbox with the hub
//!   2. Send `connected` with the socket id
//!   3. Loop: receive frames → decode → dispatch, until close or idle
//!   4. On exit the guard unregisters the socket and leaves its room
//!
//! ## Errors
//!
//! Two kinds of failure reach this module and they end differently. A
//! command the coordinators refuse (full room, bid too low, wrong room
//! code, a store that is down) is answered with the scoped error event
//! from `ErrorScope` and the loop carries on. Only a failure to talk to
//! the socket itself, i.e. the upgrade or an encode for the hub, ends the
//! connection. A frame that does not decode counts as a refused command.
//!
//! ## Send
//!
//! [`handle_connection`] is handed to `tokio::spawn`, so its future must be
//! `Send`. Nothing that is not `Send` may live across an `.await` in here;
//! in particular values for `tracing` macros are computed into locals
//! before the macro runs, since the macro's argument list holds
//! `&dyn Value` borrows.

use std::net::SocketAddr;
use std::sync::Arc;

use crease_auction::PassOutcome;
use crease_protocol::{
    ClientEvent, Codec, Recipient, Room, RoomCode, ServerEvent, SocketId, TeamsPayload,
    TournamentSnapshot,
};
use crease_room::{Departure, RoomError};
use crease_store::KeyValueStore;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::CreaseError;
use crate::server::ServerState;
use crate::transport::upgrade;

/// Drop guard that cleans up after a socket when its handler exits.
///
/// Runs even if the handler panics. `Drop` is synchronous, so the async
/// cleanup is spawned.
struct SocketGuard<S: KeyValueStore> {
    socket: SocketId,
    state: Arc<ServerState<S>>,
}

impl<S: KeyValueStore> Drop for SocketGuard<S> {
    fn drop(&mut self) {
        let socket = self.socket;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.hub.unregister(socket).await;
            match state.rooms.disconnect(socket).await {
                Ok(Some(departure)) => {
                    if let Err(e) = after_departure(&state, departure).await {
                        warn!(%socket, error = %e, "departure not announced");
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(%socket, error = %e, "disconnect cleanup failed"),
            }
        });
    }
}

/// Handles a single connection from accept to close.
///
/// Returns `Ok` when the client closes cleanly, goes idle for
/// `idle_timeout`, or the read side errors. Returns `Err` only when the
/// upgrade fails or an event cannot be encoded. Either way the socket's
/// room departure is announced by the drop guard.
pub(crate) async fn handle_connection<S: KeyValueStore>(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState<S>>,
) -> Result<(), CreaseError> {
    let conn = upgrade(stream, addr).await?;
    let socket = conn.id();

    let (outbox, rx) = mpsc::unbounded_channel();
    let (mut reader, _writer) = conn.split(rx);
    state.hub.register(socket, outbox).await;
    let _guard = SocketGuard {
        socket,
        state: Arc::clone(&state),
    };
    let connections = state.hub.connections().await;
    debug!(%socket, %addr, connections, "socket registered");

    state
        .hub
        .send(socket, &ServerEvent::Connected { socket_id: socket })
        .await?;

    loop {
        let data = match tokio::time::timeout(state.config.idle_timeout, reader.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                info!(%socket, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                debug!(%socket, error = %e, "recv error");
                break;
            }
            Err(_) => {
                info!(%socket, "connection idle, closing");
                break;
            }
        };

        let event: ClientEvent = match state.codec.decode(&data) {
            Ok(event) => event,
            Err(e) => {
                debug!(%socket, error = %e, "failed to decode event");
                let reply = ServerEvent::RoomError {
                    message: format!("invalid event: {e}"),
                };
                state.hub.send(socket, &reply).await?;
                continue;
            }
        };

        dispatch(&state, socket, event).await?;
    }

    // _guard drops here → hub unregister and room departure fire.
    Ok(())
}

/// Runs one event. A failed command is answered with the scoped error
/// event and the connection stays open.
async fn dispatch<S: KeyValueStore>(
    state: &ServerState<S>,
    socket: SocketId,
    event: ClientEvent,
) -> Result<(), CreaseError> {
    let name = event.name();
    let scope = ErrorScope::of(&event);
    trace!(%socket, event = name, "event received");

    let Err(err) = handle_event(state, socket, event).await else {
        return Ok(());
    };
    match &err {
        CreaseError::Room(_) => debug!(%socket, event = name, error = %err, "command rejected"),
        _ => warn!(%socket, event = name, error = %err, "command failed"),
    }
    state.hub.send(socket, &scope.event(err.to_string())).await?;
    Ok(())
}

/// Routes one decoded command to the coordinators and fans the result out.
///
/// Room-scoped commands resolve their room through
/// [`RoomCoordinator::resolve_room`](crease_room::RoomCoordinator::resolve_room):
/// the socket index picks the room and any `code` the client sent must
/// agree with it. Nothing is written or broadcast before that check passes.
///
/// Who hears the outcome depends on the command. Replies to `createRoom`
/// and `joinRoom` go to the sender alone; squad, tournament-team and match
/// snapshots go to everyone but the sender, who already has them; all
/// other outcomes go to the whole room.
async fn handle_event<S: KeyValueStore>(
    state: &ServerState<S>,
    socket: SocketId,
    event: ClientEvent,
) -> Result<(), CreaseError> {
    match event {
        ClientEvent::Heartbeat => {
            state.hub.send(socket, &ServerEvent::HeartbeatAck).await?;
        }

        // -- Rooms --------------------------------------------------------
        ClientEvent::CreateRoom { name, mode } => {
            let room = state.rooms.create_room(socket, &name, mode).await?;
            state
                .hub
                .send(socket, &ServerEvent::RoomCreated(Box::new(room)))
                .await?;
        }

        ClientEvent::JoinRoom { code, name } => {
            let room = state.rooms.join_room(socket, &code, &name).await?;
            state
                .hub
                .send(socket, &ServerEvent::RoomJoined(Box::new(room.clone())))
                .await?;
            let update = ServerEvent::RoomUpdate(Box::new(room.clone()));
            state
                .broadcast(&room, Recipient::AllExcept(socket), &update)
                .await?;
        }

        ClientEvent::LeaveRoom { code } => {
            // Leaving from no room stays a no-op; only a wrong code is refused.
            match state.rooms.resolve_room(socket, code.as_deref()).await {
                Ok(_) | Err(RoomError::NotInRoom(_)) => {}
                Err(err) => return Err(err.into()),
            }
            if let Some(departure) = state.rooms.leave_room(socket).await? {
                after_departure(state, departure).await?;
            }
        }

        ClientEvent::SelectIplTeam { code, team_id } => {
            let code = state.rooms.resolve_room(socket, code.as_deref()).await?;
            let room = state.rooms.select_ipl_team(socket, &code, team_id).await?;
            let update = ServerEvent::RoomUpdate(Box::new(room.clone()));
            state.broadcast(&room, Recipient::All, &update).await?;
        }

        nav @ (ClientEvent::NavigateToQuickSetup { .. }
        | ClientEvent::NavigateToAuctionSetup { .. }
        | ClientEvent::NavigateToTournamentSetup { .. }
        | ClientEvent::NavigateToTournamentHub { .. }
        | ClientEvent::StartOnlineMatch { .. }) => {
            let room = current_room(state, socket, nav.room_code()).await?;
            if let Some(echo) = ServerEvent::navigation_echo(&nav) {
                state.broadcast(&room, Recipient::All, &echo).await?;
            }
        }

        // -- Auction ------------------------------------------------------
        ClientEvent::StartAuction { code } => {
            let code = state.rooms.resolve_room(socket, code.as_deref()).await?;
            let auction = state.auction.start(&code).await?;
            let room = state.rooms.ensure_room(&code).await?;
            state
                .broadcast(&room, Recipient::All, &ServerEvent::StartAuction)
                .await?;
            let update = ServerEvent::AuctionStateUpdate(Box::new(auction));
            state.broadcast(&room, Recipient::All, &update).await?;
        }

        ClientEvent::AuctionNextPlayer {
            code,
            player,
            base_price,
        } => {
            let code = state.rooms.resolve_room(socket, code.as_deref()).await?;
            let auction = state.auction.next_player(&code, player, base_price).await?;
            announce_auction(state, &code, auction).await?;
        }

        ClientEvent::AuctionPlaceBid {
            code,
            team_id,
            team_name,
            amount,
        } => {
            let code = state.rooms.resolve_room(socket, code.as_deref()).await?;
            let auction = state
                .auction
                .place_bid(&code, &team_id, &team_name, amount)
                .await?;
            announce_auction(state, &code, auction).await?;
        }

        ClientEvent::AuctionPass { code, team_id, .. } => {
            let code = state.rooms.resolve_room(socket, code.as_deref()).await?;
            let result = state.auction.pass(&code, &team_id).await?;
            let round = result.state.round;
            announce_auction(state, &code, result.state).await?;
            if let PassOutcome::AllPassed { leader } = result.outcome {
                let event = ServerEvent::AuctionAllPassed { round, leader };
                state.broadcast_code(&code, Recipient::All, &event).await?;
            }
        }

        ClientEvent::AuctionPlayerSold { code } => {
            let code = state.rooms.resolve_room(socket, code.as_deref()).await?;
            let auction = state.auction.sold(&code).await?;
            announce_auction(state, &code, auction).await?;
        }

        ClientEvent::AuctionPlayerUnsold { code } => {
            let code = state.rooms.resolve_room(socket, code.as_deref()).await?;
            let auction = state.auction.unsold(&code).await?;
            announce_auction(state, &code, auction).await?;
        }

        ClientEvent::AuctionComplete { code } => {
            let code = state.rooms.resolve_room(socket, code.as_deref()).await?;
            let auction = state.auction.complete(&code).await?;
            announce_auction(state, &code, auction).await?;
        }

        // -- Tournament ---------------------------------------------------
        ClientEvent::GenerateTournamentFixtures { code } => {
            let code = state.rooms.resolve_room(socket, code.as_deref()).await?;
            let snapshot = state.rooms.generate_fixtures(&code).await?;
            let event = ServerEvent::TournamentFixturesGenerated(snapshot);
            state.broadcast_code(&code, Recipient::All, &event).await?;
        }

        ClientEvent::TournamentResultsUpdate {
            code,
            fixtures,
            teams,
            phase,
        } => {
            let code = state.rooms.resolve_room(socket, code.as_deref()).await?;
            let snapshot = TournamentSnapshot {
                fixtures,
                teams,
                phase,
            };
            let snapshot = state.rooms.replace_tournament(&code, snapshot).await?;
            let event = ServerEvent::TournamentResultsUpdate(snapshot);
            state.broadcast_code(&code, Recipient::All, &event).await?;
        }

        ClientEvent::CompleteTournamentFixture(result) => {
            let code = state.rooms.room_of(socket).await?;
            let snapshot = state.rooms.complete_fixture(&code, result).await?;
            let event = ServerEvent::TournamentResultsUpdate(snapshot);
            state.broadcast_code(&code, Recipient::All, &event).await?;
        }

        ClientEvent::TournamentTeamUpdate { code, teams } => {
            let code = state.rooms.resolve_room(socket, code.as_deref()).await?;
            let room = state.rooms.set_tournament_teams(&code, teams.clone()).await?;
            let event = ServerEvent::TournamentTeamUpdate { teams };
            state
                .broadcast(&room, Recipient::AllExcept(socket), &event)
                .await?;
        }

        // -- Match --------------------------------------------------------
        ClientEvent::MatchStateUpdate { code, match_state } => {
            let code = state.rooms.resolve_room(socket, code.as_deref()).await?;
            let event = ServerEvent::MatchStateUpdate(match_state.clone());
            if let Some(room) = state.rooms.store_match_state(&code, *match_state).await? {
                state
                    .broadcast(&room, Recipient::AllExcept(socket), &event)
                    .await?;
            }
        }

        ClientEvent::EndOnlineMatch { code } => {
            let code = state.rooms.resolve_room(socket, code.as_deref()).await?;
            let room = state.rooms.clear_match_state(&code).await?;
            state
                .broadcast(&room, Recipient::All, &ServerEvent::EndOnlineMatch)
                .await?;
        }

        ClientEvent::TeamUpdate {
            code,
            team_a,
            team_b,
        } => {
            let code = state.rooms.resolve_room(socket, code.as_deref()).await?;
            let room = state
                .rooms
                .set_squads(&code, team_a.clone(), team_b.clone())
                .await?;
            let event = ServerEvent::TeamUpdate(TeamsPayload { team_a, team_b });
            state
                .broadcast(&room, Recipient::AllExcept(socket), &event)
                .await?;
        }
    }
    Ok(())
}

/// The room the socket is in, read fresh from the store, after checking
/// the code the command named.
async fn current_room<S: KeyValueStore>(
    state: &ServerState<S>,
    socket: SocketId,
    claimed: Option<&str>,
) -> Result<Room, CreaseError> {
    let code = state.rooms.resolve_room(socket, claimed).await?;
    Ok(state.rooms.ensure_room(&code).await?)
}

async fn announce_auction<S: KeyValueStore>(
    state: &ServerState<S>,
    code: &RoomCode,
    auction: crease_auction::AuctionState,
) -> Result<(), CreaseError> {
    let event = ServerEvent::AuctionStateUpdate(Box::new(auction));
    state.broadcast_code(code, Recipient::All, &event).await?;
    Ok(())
}

/// Tells the remaining players who left, or stops the clock of a room
/// that closed with the departure.
async fn after_departure<S: KeyValueStore>(
    state: &ServerState<S>,
    departure: Departure,
) -> Result<(), CreaseError> {
    match departure.room {
        Some(room) => {
            if departure.host_changed {
                debug!(code = %departure.code, host = %room.host_id, "host handed over");
            }
            let update = ServerEvent::RoomUpdate(Box::new(room.clone()));
            state.broadcast(&room, Recipient::All, &update).await?;
        }
        None => state.auction.cancel_room(&departure.code),
    }
    Ok(())
}

/// Which error event a failed command is answered with.
///
/// Room creation, join and team selection each have their own error
/// event, as do auction and tournament commands. Everything else falls
/// back to `roomError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorScope {
    RoomCreation,
    RoomJoin,
    TeamSelection,
    Room,
    Auction,
    Tournament,
}

impl ErrorScope {
    fn of(event: &ClientEvent) -> Self {
        match event {
            ClientEvent::CreateRoom { .. } => Self::RoomCreation,
            ClientEvent::JoinRoom { .. } => Self::RoomJoin,
            ClientEvent::SelectIplTeam { .. } => Self::TeamSelection,
            ClientEvent::StartAuction { .. }
            | ClientEvent::AuctionNextPlayer { .. }
            | ClientEvent::AuctionPlaceBid { .. }
            | ClientEvent::AuctionPass { .. }
            | ClientEvent::AuctionPlayerSold { .. }
            | ClientEvent::AuctionPlayerUnsold { .. }
            | ClientEvent::AuctionComplete { .. } => Self::Auction,
            ClientEvent::GenerateTournamentFixtures { .. }
            | ClientEvent::TournamentResultsUpdate { .. }
            | ClientEvent::CompleteTournamentFixture(_)
            | ClientEvent::TournamentTeamUpdate { .. } => Self::Tournament,
            _ => Self::Room,
        }
    }

    fn event(self, message: String) -> ServerEvent {
        match self {
            Self::RoomCreation => ServerEvent::RoomCreationError { message },
            Self::RoomJoin => ServerEvent::RoomJoinError { message },
            Self::TeamSelection => ServerEvent::TeamSelectionError { message },
            Self::Room => ServerEvent::RoomError { message },
            Self::Auction => ServerEvent::AuctionError { message },
            Self::Tournament => ServerEvent::TournamentError { message },
        }
    }
}
