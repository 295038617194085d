//! Players, squads and the side letters that identify who controls them.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A player's identifier within the player dataset.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The single-letter slot a connected participant occupies in a room.
///
/// Sides are handed out in order from `A` to `J`. They are independent of
/// the franchise a participant picks: side `B` may well play as any team.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Side(char);

impl Side {
    /// Every side letter, in assignment order.
    pub const ALL: [Side; 10] = [
        Side('A'),
        Side('B'),
        Side('C'),
        Side('D'),
        Side('E'),
        Side('F'),
        Side('G'),
        Side('H'),
        Side('I'),
        Side('J'),
    ];

    /// Returns the side for a letter, or `None` outside `A..=J`.
    pub fn from_letter(letter: char) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|side| side.0 == letter.to_ascii_uppercase())
    }

    /// The side's letter.
    pub fn letter(self) -> char {
        self.0
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A player's primary discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Batter,
    Bowler,
    AllRounder,
    WicketKeeper,
}

/// Bowling average used for players who have no bowling record.
const PART_TIME_BOWLING_AVERAGE: f64 = 45.0;
/// Economy rate used for players who have no bowling record.
const PART_TIME_ECONOMY: f64 = 9.5;

/// One cricketer and the ratings the simulation reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub role: Role,
    /// Career batting average (runs per dismissal).
    pub batting_average: f64,
    /// Career strike rate (runs per 100 balls).
    pub strike_rate: f64,
    /// Runs conceded per wicket. `None` for non-bowlers.
    #[serde(default)]
    pub bowling_average: Option<f64>,
    /// Runs conceded per over. `None` for non-bowlers.
    #[serde(default)]
    pub economy: Option<f64>,
}

impl Player {
    /// Batting strength: `avg/35 + sr/130`. Around 2.0 for a good batter.
    pub fn batting_factor(&self) -> f64 {
        self.batting_average.max(1.0) / 35.0 + self.strike_rate.max(1.0) / 130.0
    }

    /// Bowling strength: `30/avg + 9/econ`. Part-timers get fixed ratings.
    pub fn bowling_factor(&self) -> f64 {
        let average = self
            .bowling_average
            .unwrap_or(PART_TIME_BOWLING_AVERAGE)
            .max(1.0);
        let economy = self.economy.unwrap_or(PART_TIME_ECONOMY).max(1.0);
        30.0 / average + 9.0 / economy
    }
}

// ---------------------------------------------------------------------------
// Team
// ---------------------------------------------------------------------------

/// How many of a side's last players share the bowling.
pub(crate) const BOWLING_ROTATION: usize = 5;

/// A squad in batting order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    /// Franchise id (e.g. `"csk"`), also used in tournament tables.
    pub id: String,
    pub name: String,
    /// The room side that plays this team. `None` when nobody in the room
    /// owns it; the host then drives it.
    #[serde(default)]
    pub owner: Option<Side>,
    /// Batting order. The last five make up the bowling rotation.
    pub players: Vec<Player>,
}

impl Team {
    /// Looks up a player by id.
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Ids of the bowlers who share the overs, in rotation order.
    pub fn bowling_rotation(&self) -> Vec<PlayerId> {
        let start = self.players.len().saturating_sub(BOWLING_ROTATION);
        self.players[start..].iter().map(|p| p.id).collect()
    }
}

// ---------------------------------------------------------------------------
// PlayerPool
// ---------------------------------------------------------------------------

/// The ordered set of players available to an auction or squad builder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerPool {
    players: Vec<Player>,
}

impl PlayerPool {
    /// Creates a pool from players in the order they should be offered.
    pub fn new(players: Vec<Player>) -> Self {
        Self { players }
    }

    /// Looks up a player by id.
    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Iterates the pool in order.
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

impl From<Vec<Player>> for PlayerPool {
    fn from(players: Vec<Player>) -> Self {
        Self::new(players)
    }
}
