//! Every event that crosses the WebSocket.
//!
//! Both enums are adjacently tagged: the variant name (camelCase) goes in
//! `"event"`, its payload in `"data"`. Only the bare unit variants
//! (`heartbeat`, and the server's acknowledgements) may omit `"data"`.
//!
//! ```text
//! {"event": "joinRoom", "data": {"code": "ABCDE", "name": "Asha"}}
//! {"event": "startOnlineMatch", "data": {"code": "ABCDE"}}
//! {"event": "heartbeat"}
//! ```
//!
//! # Room codes on commands
//!
//! Every command sent from inside a room accepts an optional `code`. The
//! server already knows the sender's room from its socket, so the field is
//! a cross-check rather than an address: a command whose `code` names a
//! different room is refused with the scoped error event, one without a
//! `code` runs against the sender's room.

use crease_auction::{AuctionState, Bidder};
use crease_engine::{MatchState, Player, Team};
use crease_tournament::{Fixture, FixtureResult, TournamentPhase, TournamentTeam};
use serde::{Deserialize, Serialize};

use crate::{Mode, Room, SocketId};

/// The whole tournament as the clients see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentSnapshot {
    pub fixtures: Vec<Fixture>,
    pub teams: Vec<TournamentTeam>,
    pub phase: TournamentPhase,
}

/// The two squads of a quick match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamsPayload {
    #[serde(default)]
    pub team_a: Option<Team>,
    #[serde(default)]
    pub team_b: Option<Team>,
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Commands a client can send.
///
/// `code` fields are raw user input, normalised by the server; see the
/// module docs for how they are checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Keeps an idle connection alive.
    Heartbeat,

    #[serde(rename_all = "camelCase")]
    CreateRoom { name: String, mode: Mode },

    /// Here `code` picks the room to join and is required.
    #[serde(rename_all = "camelCase")]
    JoinRoom { code: String, name: String },

    /// Leaves the current room but keeps the connection open.
    LeaveRoom {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },

    /// Claims a franchise, or releases it with `None`.
    #[serde(rename = "selectIPLTeam", rename_all = "camelCase")]
    SelectIplTeam {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        #[serde(default)]
        team_id: Option<String>,
    },

    NavigateToQuickSetup {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
    NavigateToAuctionSetup {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
    NavigateToTournamentSetup {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
    NavigateToTournamentHub {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },

    StartAuction {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    AuctionNextPlayer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        player: Player,
        base_price: u32,
    },

    #[serde(rename_all = "camelCase")]
    AuctionPlaceBid {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        team_id: String,
        team_name: String,
        amount: u32,
    },

    #[serde(rename_all = "camelCase")]
    AuctionPass {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        team_id: String,
        team_name: String,
    },

    AuctionPlayerSold {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
    AuctionPlayerUnsold {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
    /// Closes the auction once the pool is exhausted.
    AuctionComplete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },

    GenerateTournamentFixtures {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
    /// Replaces fixtures, table and phase wholesale. The table travels as
    /// `tournTeams`; `teams` is accepted too.
    #[serde(rename_all = "camelCase")]
    TournamentResultsUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        fixtures: Vec<Fixture>,
        #[serde(rename = "tournTeams", alias = "teams")]
        teams: Vec<TournamentTeam>,
        phase: TournamentPhase,
    },
    /// Records one result and lets the server advance the phase.
    CompleteTournamentFixture(FixtureResult),

    /// A snapshot from the peer that controls the ball.
    #[serde(rename_all = "camelCase")]
    MatchStateUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        match_state: Box<MatchState>,
    },

    StartOnlineMatch {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
    EndOnlineMatch {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },

    /// Either squad may be left out and keeps its stored value.
    #[serde(rename_all = "camelCase")]
    TeamUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        #[serde(default)]
        team_a: Option<Team>,
        #[serde(default)]
        team_b: Option<Team>,
    },
    #[serde(rename_all = "camelCase")]
    TournamentTeamUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        teams: Vec<TournamentTeam>,
    },
}

impl ClientEvent {
    /// The wire name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Heartbeat => "heartbeat",
            Self::CreateRoom { .. } => "createRoom",
            Self::JoinRoom { .. } => "joinRoom",
            Self::LeaveRoom { .. } => "leaveRoom",
            Self::SelectIplTeam { .. } => "selectIPLTeam",
            Self::NavigateToQuickSetup { .. } => "navigateToQuickSetup",
            Self::NavigateToAuctionSetup { .. } => "navigateToAuctionSetup",
            Self::NavigateToTournamentSetup { .. } => "navigateToTournamentSetup",
            Self::NavigateToTournamentHub { .. } => "navigateToTournamentHub",
            Self::StartAuction { .. } => "startAuction",
            Self::AuctionNextPlayer { .. } => "auctionNextPlayer",
            Self::AuctionPlaceBid { .. } => "auctionPlaceBid",
            Self::AuctionPass { .. } => "auctionPass",
            Self::AuctionPlayerSold { .. } => "auctionPlayerSold",
            Self::AuctionPlayerUnsold { .. } => "auctionPlayerUnsold",
            Self::AuctionComplete { .. } => "auctionComplete",
            Self::GenerateTournamentFixtures { .. } => "generateTournamentFixtures",
            Self::TournamentResultsUpdate { .. } => "tournamentResultsUpdate",
            Self::CompleteTournamentFixture(_) => "completeTournamentFixture",
            Self::MatchStateUpdate { .. } => "matchStateUpdate",
            Self::StartOnlineMatch { .. } => "startOnlineMatch",
            Self::EndOnlineMatch { .. } => "endOnlineMatch",
            Self::TeamUpdate { .. } => "teamUpdate",
            Self::TournamentTeamUpdate { .. } => "tournamentTeamUpdate",
        }
    }

    /// The room code the command names, if it carries one.
    ///
    /// `None` for commands that are not scoped to the sender's room
    /// (`heartbeat`, `createRoom`, `joinRoom`, `completeTournamentFixture`)
    /// and for room commands sent without a code.
    pub fn room_code(&self) -> Option<&str> {
        match self {
            Self::LeaveRoom { code }
            | Self::SelectIplTeam { code, .. }
            | Self::NavigateToQuickSetup { code }
            | Self::NavigateToAuctionSetup { code }
            | Self::NavigateToTournamentSetup { code }
            | Self::NavigateToTournamentHub { code }
            | Self::StartAuction { code }
            | Self::AuctionNextPlayer { code, .. }
            | Self::AuctionPlaceBid { code, .. }
            | Self::AuctionPass { code, .. }
            | Self::AuctionPlayerSold { code }
            | Self::AuctionPlayerUnsold { code }
            | Self::AuctionComplete { code }
            | Self::GenerateTournamentFixtures { code }
            | Self::TournamentResultsUpdate { code, .. }
            | Self::MatchStateUpdate { code, .. }
            | Self::StartOnlineMatch { code }
            | Self::EndOnlineMatch { code }
            | Self::TeamUpdate { code, .. }
            | Self::TournamentTeamUpdate { code, .. } => code.as_deref(),
            Self::Heartbeat
            | Self::CreateRoom { .. }
            | Self::JoinRoom { .. }
            | Self::CompleteTournamentFixture(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Events the server sends.
///
/// The `*Error` variants go only to the socket whose command failed; the
/// rest are broadcast to the room unless noted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// First frame on every connection.
    #[serde(rename_all = "camelCase")]
    Connected { socket_id: SocketId },
    HeartbeatAck,

    /// To the creator only.
    RoomCreated(Box<Room>),
    /// To the joiner only; the others get `RoomUpdate`.
    RoomJoined(Box<Room>),
    RoomUpdate(Box<Room>),

    NavigateToQuickSetup,
    NavigateToAuctionSetup,
    NavigateToTournamentSetup,
    NavigateToTournamentHub,

    StartAuction,
    AuctionStateUpdate(Box<AuctionState>),
    #[serde(rename_all = "camelCase")]
    AuctionTimerUpdate { timer: u32, round: u32 },
    #[serde(rename_all = "camelCase")]
    AuctionTimerExpired { round: u32 },
    /// Every franchise but the leader passed; resolve without the clock.
    #[serde(rename_all = "camelCase")]
    AuctionAllPassed { round: u32, leader: Option<Bidder> },

    TournamentFixturesGenerated(TournamentSnapshot),
    TournamentResultsUpdate(TournamentSnapshot),

    MatchStateUpdate(Box<MatchState>),
    StartOnlineMatch,
    EndOnlineMatch,

    TeamUpdate(TeamsPayload),
    #[serde(rename_all = "camelCase")]
    TournamentTeamUpdate { teams: Vec<TournamentTeam> },

    RoomCreationError { message: String },
    RoomJoinError { message: String },
    TeamSelectionError { message: String },
    RoomError { message: String },
    AuctionError { message: String },
    TournamentError { message: String },
}

impl ServerEvent {
    /// The wire name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::HeartbeatAck => "heartbeatAck",
            Self::RoomCreated(_) => "roomCreated",
            Self::RoomJoined(_) => "roomJoined",
            Self::RoomUpdate(_) => "roomUpdate",
            Self::NavigateToQuickSetup => "navigateToQuickSetup",
            Self::NavigateToAuctionSetup => "navigateToAuctionSetup",
            Self::NavigateToTournamentSetup => "navigateToTournamentSetup",
            Self::NavigateToTournamentHub => "navigateToTournamentHub",
            Self::StartAuction => "startAuction",
            Self::AuctionStateUpdate(_) => "auctionStateUpdate",
            Self::AuctionTimerUpdate { .. } => "auctionTimerUpdate",
            Self::AuctionTimerExpired { .. } => "auctionTimerExpired",
            Self::AuctionAllPassed { .. } => "auctionAllPassed",
            Self::TournamentFixturesGenerated(_) => "tournamentFixturesGenerated",
            Self::TournamentResultsUpdate(_) => "tournamentResultsUpdate",
            Self::MatchStateUpdate(_) => "matchStateUpdate",
            Self::StartOnlineMatch => "startOnlineMatch",
            Self::EndOnlineMatch => "endOnlineMatch",
            Self::TeamUpdate(_) => "teamUpdate",
            Self::TournamentTeamUpdate { .. } => "tournamentTeamUpdate",
            Self::RoomCreationError { .. } => "roomCreationError",
            Self::RoomJoinError { .. } => "roomJoinError",
            Self::TeamSelectionError { .. } => "teamSelectionError",
            Self::RoomError { .. } => "roomError",
            Self::AuctionError { .. } => "auctionError",
            Self::TournamentError { .. } => "tournamentError",
        }
    }

    /// The echo of a client navigation command, if `event` is one.
    pub fn navigation_echo(event: &ClientEvent) -> Option<Self> {
        match event {
            ClientEvent::NavigateToQuickSetup { .. } => Some(Self::NavigateToQuickSetup),
            ClientEvent::NavigateToAuctionSetup { .. } => Some(Self::NavigateToAuctionSetup),
            ClientEvent::NavigateToTournamentSetup { .. } => Some(Self::NavigateToTournamentSetup),
            ClientEvent::NavigateToTournamentHub { .. } => Some(Self::NavigateToTournamentHub),
            ClientEvent::StartOnlineMatch { .. } => Some(Self::StartOnlineMatch),
            _ => None,
        }
    }

    /// Whether this is one of the scoped error events.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::RoomCreationError { .. }
                | Self::RoomJoinError { .. }
                | Self::TeamSelectionError { .. }
                | Self::RoomError { .. }
                | Self::AuctionError { .. }
                | Self::TournamentError { .. }
        )
    }
}

// =========================================================================
// Tests
// =========================================================================
