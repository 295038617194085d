//! Room lifecycle and the room-scoped commands that are plain writes.

use std::sync::Arc;

use crease_engine::{MatchState, Side, Team};
use crease_protocol::{Mode, PlayerInRoom, Room, RoomCode, SocketId, TournamentSnapshot};
use crease_store::{KeyValueStore, MemoryStore, SessionStore};
use crease_tournament::{FixtureResult, TournamentPhase, TournamentTeam, check_phase_advance};
use tracing::{debug, info, trace};

use crate::{CodeGenerator, RoomConfig, RoomError};

/// What happened when a socket left its room.
#[derive(Debug, Clone)]
pub struct Departure {
    pub code: RoomCode,
    pub player: PlayerInRoom,
    /// The room after the departure, or `None` if it was the last player
    /// and the room was deleted.
    pub room: Option<Room>,
    /// Whether the leaver was host and somebody else took over.
    pub host_changed: bool,
}

/// Creates, joins and leaves rooms, and applies the commands that simply
/// replace part of a room.
///
/// Share it behind an `Arc`; every method takes `&self`.
pub struct RoomCoordinator<S = MemoryStore> {
    store: Arc<SessionStore<S>>,
    codes: CodeGenerator,
    config: RoomConfig,
}

impl<S: KeyValueStore> RoomCoordinator<S> {
    pub fn new(store: Arc<SessionStore<S>>, config: RoomConfig) -> Self {
        Self::with_codes(store, config, CodeGenerator::from_os_rng())
    }

    /// Uses `codes` to draw room codes, e.g. a seeded generator in tests.
    pub fn with_codes(store: Arc<SessionStore<S>>, config: RoomConfig, codes: CodeGenerator) -> Self {
        Self {
            store,
            codes,
            config,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore<S>> {
        &self.store
    }

    // -- Lifecycle --------------------------------------------------------

    /// Opens a room with `socket` as host on side `A`.
    ///
    /// # Errors
    /// - `AlreadyInRoom` if the socket is still in another live room.
    /// - `CodeExhausted` if every drawn code was taken.
    pub async fn create_room(
        &self,
        socket: SocketId,
        name: &str,
        mode: Mode,
    ) -> Result<Room, RoomError> {
        self.ensure_unattached(socket, None).await?;

        for attempt in 1..=self.config.code_attempts {
            let code = self.codes.generate()?;
            let host = PlayerInRoom::new(socket, name, Side::ALL[0]);
            let room = Room::new(code.clone(), mode, host);
            if self.store.insert_room_if_absent(&room).await? {
                self.store.bind_socket(socket, &code).await?;
                info!(%code, %mode, %socket, "room created");
                return Ok(room);
            }
            debug!(%code, attempt, "room code taken, drawing again");
        }
        Err(RoomError::CodeExhausted(self.config.code_attempts))
    }

    /// Adds `socket` to the room `raw_code` names, on the first free side.
    ///
    /// Joining a room the socket is already in returns the room unchanged
    /// apart from its version.
    pub async fn join_room(
        &self,
        socket: SocketId,
        raw_code: &str,
        name: &str,
    ) -> Result<Room, RoomError> {
        let code = RoomCode::parse(raw_code)?;
        self.ensure_unattached(socket, Some(&code)).await?;

        let updated = self
            .store
            .update_room(&code, |room: &mut Room| -> Result<bool, RoomError> {
                if room.contains(socket) {
                    return Ok(false);
                }
                if room.is_full() {
                    return Err(RoomError::RoomFull(room.code.clone()));
                }
                let side = room
                    .next_free_side()
                    .ok_or_else(|| RoomError::SideUnavailable(room.code.clone()))?;
                room.players.push(PlayerInRoom::new(socket, name, side));
                Ok(true)
            })
            .await?;
        self.store.bind_socket(socket, &code).await?;

        let room = updated.room.ok_or_else(|| RoomError::NotFound(code.clone()))?;
        if updated.value {
            info!(%code, %socket, players = room.players.len(), "player joined");
        } else {
            debug!(%code, %socket, "repeat join");
        }
        Ok(room)
    }

    /// Removes `socket` from its room. Deletes the room if it empties,
    /// otherwise hands host to the first remaining participant if needed.
    ///
    /// A socket that is in no room is a silent no-op returning `None`.
    pub async fn leave_room(&self, socket: SocketId) -> Result<Option<Departure>, RoomError> {
        let Some(code) = self.store.socket_room(socket).await? else {
            trace!(%socket, "leave ignored, socket not in a room");
            return Ok(None);
        };

        let result = self
            .store
            .update_room(&code, |room: &mut Room| -> Result<(PlayerInRoom, bool), RoomError> {
                let was_host = room.host_id == socket;
                let player = room
                    .remove_player(socket)
                    .ok_or(RoomError::NotInRoom(socket))?;
                Ok((player, was_host))
            })
            .await;

        // The index is dropped only once the room no longer lists the socket.
        let updated = match result {
            Ok(updated) => updated,
            Err(RoomError::NotFound(_) | RoomError::NotInRoom(_)) => {
                self.store.unbind_socket(socket).await?;
                debug!(%code, %socket, "stale socket index dropped");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        self.store.unbind_socket(socket).await?;

        let (player, was_host) = updated.value;
        match &updated.room {
            Some(room) => info!(
                %code,
                %socket,
                players = room.players.len(),
                host = %room.host_id,
                "player left"
            ),
            None => info!(%code, %socket, "last player left, room closed"),
        }
        Ok(Some(Departure {
            code,
            player,
            host_changed: was_host && updated.room.is_some(),
            room: updated.room,
        }))
    }

    /// Cleanup for a closed connection. Same as [`leave_room`](Self::leave_room).
    pub async fn disconnect(&self, socket: SocketId) -> Result<Option<Departure>, RoomError> {
        let departure = self.leave_room(socket).await?;
        trace!(%socket, left_room = departure.is_some(), "disconnect handled");
        Ok(departure)
    }

    /// The room `socket` is in.
    pub async fn room_of(&self, socket: SocketId) -> Result<RoomCode, RoomError> {
        self.store
            .socket_room(socket)
            .await?
            .ok_or(RoomError::NotInRoom(socket))
    }

    /// The room `socket` is in, checked against the code its command named.
    ///
    /// Commands sent from inside a room may repeat the room code. The
    /// socket index decides which room is meant; a code naming any other
    /// room is refused. A missing or blank code is not checked.
    ///
    /// # Errors
    /// - `NotInRoom` if the socket has no room.
    /// - `InvalidCode` if `claimed` cannot be a room code.
    /// - `CodeMismatch` if it names a different room.
    pub async fn resolve_room(
        &self,
        socket: SocketId,
        claimed: Option<&str>,
    ) -> Result<RoomCode, RoomError> {
        let code = self.room_of(socket).await?;
        let Some(raw) = claimed.filter(|raw| !raw.trim().is_empty()) else {
            return Ok(code);
        };
        let claimed = RoomCode::parse(raw)?;
        if claimed != code {
            return Err(RoomError::CodeMismatch {
                claimed,
                actual: code,
            });
        }
        Ok(code)
    }

    /// The room, or `NotFound`.
    pub async fn ensure_room(&self, code: &RoomCode) -> Result<Room, RoomError> {
        self.store
            .room(code)
            .await?
            .ok_or_else(|| RoomError::NotFound(code.clone()))
    }

    /// Claims a franchise for `socket`, or releases its claim with `None`.
    pub async fn select_ipl_team(
        &self,
        socket: SocketId,
        code: &RoomCode,
        team_id: Option<String>,
    ) -> Result<Room, RoomError> {
        let updated = self
            .store
            .update_room(code, |room: &mut Room| -> Result<(), RoomError> {
                if let Some(id) = &team_id {
                    let taken = room
                        .players
                        .iter()
                        .any(|p| p.socket_id != socket && p.ipl_team_id.as_ref() == Some(id));
                    if taken {
                        return Err(RoomError::TeamAlreadyTaken(id.clone()));
                    }
                }
                let player = room.player_mut(socket).ok_or(RoomError::NotInRoom(socket))?;
                player.ipl_team_id = team_id;
                Ok(())
            })
            .await?;
        debug!(%code, %socket, "franchise selection updated");
        updated.room.ok_or_else(|| RoomError::NotFound(code.clone()))
    }

    // -- Squads and match state -------------------------------------------

    /// Replaces the squads that are given; an omitted side keeps its squad.
    pub async fn set_squads(
        &self,
        code: &RoomCode,
        team_a: Option<Team>,
        team_b: Option<Team>,
    ) -> Result<Room, RoomError> {
        self.write(code, |room| {
            if team_a.is_some() {
                room.team_a = team_a;
            }
            if team_b.is_some() {
                room.team_b = team_b;
            }
        })
        .await
    }

    pub async fn set_tournament_teams(
        &self,
        code: &RoomCode,
        teams: Vec<TournamentTeam>,
    ) -> Result<Room, RoomError> {
        self.write(code, |room| room.tournament_teams = teams).await
    }

    /// Stores a match snapshot unless it is not newer than the stored one.
    ///
    /// Returns `None` for a stale snapshot, which is dropped without a
    /// write.
    pub async fn store_match_state(
        &self,
        code: &RoomCode,
        state: MatchState,
    ) -> Result<Option<Room>, RoomError> {
        let result = self
            .store
            .update_room(code, |room: &mut Room| -> Result<(), RoomError> {
                if let Some(stored) = &room.match_state {
                    if state.seq <= stored.seq {
                        return Err(RoomError::StaleMatchState {
                            incoming: state.seq,
                            stored: stored.seq,
                        });
                    }
                }
                room.match_state = Some(state);
                Ok(())
            })
            .await;

        match result {
            Ok(updated) => Ok(updated.room),
            Err(RoomError::StaleMatchState { incoming, stored }) => {
                debug!(%code, incoming, stored, "stale match state dropped");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn clear_match_state(&self, code: &RoomCode) -> Result<Room, RoomError> {
        self.write(code, |room| room.match_state = None).await
    }

    // -- Tournament -------------------------------------------------------

    /// Schedules the league for the room's tournament teams, starting the
    /// table afresh.
    pub async fn generate_fixtures(&self, code: &RoomCode) -> Result<TournamentSnapshot, RoomError> {
        let updated = self
            .store
            .update_room(code, |room: &mut Room| -> Result<TournamentSnapshot, RoomError> {
                let fixtures = crease_tournament::generate_fixtures(&room.tournament_teams)?;
                room.tournament_teams = room
                    .tournament_teams
                    .iter()
                    .map(|t| TournamentTeam::new(&t.id, &t.name, t.owner))
                    .collect();
                room.fixtures = fixtures;
                room.tournament_phase = TournamentPhase::League;
                Ok(tournament_snapshot(room))
            })
            .await?;
        info!(%code, fixtures = updated.value.fixtures.len(), "fixtures generated");
        Ok(updated.value)
    }

    /// Replaces fixtures, table and phase wholesale.
    pub async fn replace_tournament(
        &self,
        code: &RoomCode,
        snapshot: TournamentSnapshot,
    ) -> Result<TournamentSnapshot, RoomError> {
        let room = self
            .write(code, |room| {
                room.fixtures = snapshot.fixtures;
                room.tournament_teams = snapshot.teams;
                room.tournament_phase = snapshot.phase;
            })
            .await?;
        Ok(tournament_snapshot(&room))
    }

    /// Records one result and advances the phase if the stage is done.
    pub async fn complete_fixture(
        &self,
        code: &RoomCode,
        result: FixtureResult,
    ) -> Result<TournamentSnapshot, RoomError> {
        let fixture_id = result.fixture_id;
        let updated = self
            .store
            .update_room(code, |room: &mut Room| -> Result<TournamentSnapshot, RoomError> {
                crease_tournament::complete_fixture(
                    &mut room.fixtures,
                    &mut room.tournament_teams,
                    result,
                )?;
                let advance =
                    check_phase_advance(&room.fixtures, &room.tournament_teams, room.tournament_phase);
                room.tournament_phase = advance.apply(room.tournament_phase, &mut room.fixtures);
                Ok(tournament_snapshot(room))
            })
            .await?;
        info!(%code, fixture_id, phase = ?updated.value.phase, "fixture completed");
        Ok(updated.value)
    }

    // -- Helpers ----------------------------------------------------------

    /// A mutation that cannot fail, returning the written room.
    async fn write<F>(&self, code: &RoomCode, mutate: F) -> Result<Room, RoomError>
    where
        F: FnOnce(&mut Room) + Send,
    {
        let updated = self
            .store
            .update_room(code, |room: &mut Room| -> Result<(), RoomError> {
                mutate(room);
                Ok(())
            })
            .await?;
        updated.room.ok_or_else(|| RoomError::NotFound(code.clone()))
    }

    /// Rejects a socket that is still in a live room other than `target`.
    /// An index entry pointing at an expired room is dropped.
    async fn ensure_unattached(
        &self,
        socket: SocketId,
        target: Option<&RoomCode>,
    ) -> Result<(), RoomError> {
        let Some(current) = self.store.socket_room(socket).await? else {
            return Ok(());
        };
        if Some(&current) == target {
            return Ok(());
        }
        if self.store.room_exists(&current).await? {
            return Err(RoomError::AlreadyInRoom(current));
        }
        self.store.unbind_socket(socket).await?;
        Ok(())
    }
}

fn tournament_snapshot(room: &Room) -> TournamentSnapshot {
    TournamentSnapshot {
        fixtures: room.fixtures.clone(),
        teams: room.tournament_teams.clone(),
        phase: room.tournament_phase,
    }
}

// =========================================================================
// Tests
// =========================================================================
