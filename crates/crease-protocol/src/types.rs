//! The room record and the identifiers that point into it.

use std::fmt;

use crease_auction::AuctionState;
use crease_engine::{MatchState, Side, Team};
use crease_tournament::{Fixture, TournamentPhase, TournamentTeam};
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// One WebSocket connection. Assigned by the server on accept and never
/// reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SocketId(pub u64);

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// A shareable five-character room code, always upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Characters a code is drawn from. No `I`, `O`, `0` or `1`.
    pub const ALPHABET: &'static [u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

    /// Code length.
    pub const LEN: usize = 5;

    /// Validates user input: trims, upper-cases and checks length and
    /// characters.
    pub fn parse(input: &str) -> Result<Self, ProtocolError> {
        let code = input.trim().to_ascii_uppercase();
        let valid = code.len() == Self::LEN
            && code.bytes().all(|b| Self::ALPHABET.contains(&b));
        if valid {
            Ok(Self(code))
        } else {
            Err(ProtocolError::InvalidRoomCode(input.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// What a room is for. Decides its capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    /// One head-to-head match.
    Quick,
    /// League plus knockouts.
    Tournament,
    /// Player auction, usually followed by a tournament.
    Auction,
}

impl Mode {
    /// Maximum participants in a room of this mode.
    pub fn max_players(self) -> usize {
        match self {
            Self::Quick => 2,
            Self::Tournament | Self::Auction => 10,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Quick => "quick",
            Self::Tournament => "tournament",
            Self::Auction => "auction",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who in a room receives a server event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// Every socket in the room.
    All,
    /// One socket.
    Socket(SocketId),
    /// Everyone but one socket, e.g. echoing a snapshot to the peers of the
    /// socket that sent it.
    AllExcept(SocketId),
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// One participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInRoom {
    pub socket_id: SocketId,
    pub name: String,
    /// Fixed for as long as the participant stays.
    pub side: Side,
    /// The franchise this participant plays as, unique within the room.
    #[serde(default, rename = "iplTeamId")]
    pub ipl_team_id: Option<String>,
}

impl PlayerInRoom {
    pub fn new(socket_id: SocketId, name: &str, side: Side) -> Self {
        Self {
            socket_id,
            name: name.to_string(),
            side,
            ipl_team_id: None,
        }
    }
}

/// A multiplayer session. The store's single source of truth.
///
/// While `players` is non-empty, `host_id` is one of their sockets. A room
/// whose last player leaves is deleted rather than stored empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub code: RoomCode,
    pub mode: Mode,
    pub players: Vec<PlayerInRoom>,
    pub host_id: SocketId,
    /// Bumped on every persisted write.
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub team_a: Option<Team>,
    #[serde(default)]
    pub team_b: Option<Team>,
    #[serde(default)]
    pub match_state: Option<MatchState>,
    #[serde(default)]
    pub auction_state: Option<AuctionState>,
    #[serde(default)]
    pub fixtures: Vec<Fixture>,
    #[serde(default)]
    pub tournament_teams: Vec<TournamentTeam>,
    #[serde(default)]
    pub tournament_phase: TournamentPhase,
}

impl Room {
    /// A room with `host` as its only participant.
    pub fn new(code: RoomCode, mode: Mode, host: PlayerInRoom) -> Self {
        Self {
            code,
            mode,
            host_id: host.socket_id,
            players: vec![host],
            version: 0,
            team_a: None,
            team_b: None,
            match_state: None,
            auction_state: None,
            fixtures: Vec::new(),
            tournament_teams: Vec::new(),
            tournament_phase: TournamentPhase::default(),
        }
    }

    pub fn player(&self, socket: SocketId) -> Option<&PlayerInRoom> {
        self.players.iter().find(|p| p.socket_id == socket)
    }

    pub fn player_mut(&mut self, socket: SocketId) -> Option<&mut PlayerInRoom> {
        self.players.iter_mut().find(|p| p.socket_id == socket)
    }

    pub fn contains(&self, socket: SocketId) -> bool {
        self.player(socket).is_some()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.mode.max_players()
    }

    /// The first side letter nobody holds.
    pub fn next_free_side(&self) -> Option<Side> {
        Side::ALL
            .into_iter()
            .find(|side| self.players.iter().all(|p| p.side != *side))
    }

    /// Removes a participant. If it was the host, the first remaining
    /// participant takes over.
    pub fn remove_player(&mut self, socket: SocketId) -> Option<PlayerInRoom> {
        let index = self.players.iter().position(|p| p.socket_id == socket)?;
        let removed = self.players.remove(index);
        if self.host_id == socket {
            if let Some(next) = self.players.first() {
                self.host_id = next.socket_id;
            }
        }
        Some(removed)
    }

    /// Franchise ids picked by participants, in seat order.
    pub fn franchises(&self) -> Vec<String> {
        self.players
            .iter()
            .filter_map(|p| p.ipl_team_id.clone())
            .collect()
    }

    /// Every socket in the room.
    pub fn socket_ids(&self) -> Vec<SocketId> {
        self.players.iter().map(|p| p.socket_id).collect()
    }

    /// Sockets selected by `recipient`.
    pub fn recipients(&self, recipient: &Recipient) -> Vec<SocketId> {
        match recipient {
            Recipient::All => self.socket_ids(),
            Recipient::Socket(id) => {
                if self.contains(*id) {
                    vec![*id]
                } else {
                    Vec::new()
                }
            }
            Recipient::AllExcept(id) => self
                .players
                .iter()
                .map(|p| p.socket_id)
                .filter(|s| s != id)
                .collect(),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
