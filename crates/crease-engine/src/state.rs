//! The match snapshot shared between peers.
//!
//! A [`MatchState`] is complete on its own: it embeds both squads, so a peer
//! that receives one can render it (and, if it becomes the controller, keep
//! advancing it) without any other context.

use serde::{Deserialize, Serialize};

use crate::{PlayerId, Team};

/// What kind of match is being played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MatchMode {
    /// A one-off head-to-head match.
    Quick,
    /// A tournament fixture; the result feeds the points table.
    #[serde(rename_all = "camelCase")]
    Tournament { fixture_id: u32 },
}

/// Which innings is in progress. Exactly two are played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Innings {
    First,
    Second,
}

/// Per-batter scorecard line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatsmanStats {
    pub player_id: PlayerId,
    pub name: String,
    pub runs: u32,
    pub balls: u32,
    pub fours: u32,
    pub sixes: u32,
    pub out: bool,
    #[serde(default)]
    pub dismissal: Option<String>,
}

impl BatsmanStats {
    pub(crate) fn new(player_id: PlayerId, name: &str) -> Self {
        Self {
            player_id,
            name: name.to_string(),
            runs: 0,
            balls: 0,
            fours: 0,
            sixes: 0,
            out: false,
            dismissal: None,
        }
    }
}

/// Per-bowler scorecard line. `balls` counts legal deliveries only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BowlerStats {
    pub player_id: PlayerId,
    pub name: String,
    pub balls: u32,
    pub runs: u32,
    pub wickets: u32,
    pub wides: u32,
}

impl BowlerStats {
    pub(crate) fn new(player_id: PlayerId, name: &str) -> Self {
        Self {
            player_id,
            name: name.to_string(),
            balls: 0,
            runs: 0,
            wickets: 0,
            wides: 0,
        }
    }
}

/// The frozen record of a completed innings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InningsSummary {
    pub team_id: String,
    pub team_name: String,
    pub score: u32,
    pub wickets: u32,
    pub balls_bowled: u32,
    /// Legal balls the side was entitled to (`overs * 6`).
    pub allotted_balls: u32,
    pub all_out: bool,
    pub batsman_stats: Vec<BatsmanStats>,
    pub bowler_stats: Vec<BowlerStats>,
}

impl InningsSummary {
    /// Balls that count towards net run rate: the full allotment when the
    /// side was bowled out, otherwise the balls actually faced.
    pub fn balls_for_run_rate(&self) -> u32 {
        if self.all_out {
            self.allotted_balls
        } else {
            self.balls_bowled
        }
    }
}

/// How a finished match ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MatchResult {
    /// One side won.
    Team { id: String, name: String },
    /// Scores finished level.
    Tie,
}

/// Maximum number of glyphs kept in [`MatchState::recent_balls`].
pub(crate) const RECENT_BALLS_LIMIT: usize = 12;

/// Maximum number of commentary lines kept in [`MatchState::commentary`].
pub(crate) const COMMENTARY_LIMIT: usize = 120;

/// Full snapshot of a match in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchState {
    /// Incremented on every transition. Peers drop snapshots whose `seq`
    /// is not newer than the one they hold.
    pub seq: u64,
    pub mode: MatchMode,
    pub innings: Innings,
    pub batting_team: Team,
    pub bowling_team: Team,
    pub total_overs: u32,
    pub score: u32,
    pub wickets: u32,
    /// Legal deliveries in the current innings. Wides do not count.
    pub balls_bowled: u32,
    pub striker_id: PlayerId,
    pub non_striker_id: PlayerId,
    pub bowler_id: PlayerId,
    /// Score to beat in the second innings (the first innings total).
    #[serde(default)]
    pub target: Option<u32>,
    pub batsman_stats: Vec<BatsmanStats>,
    pub bowler_stats: Vec<BowlerStats>,
    pub commentary: Vec<String>,
    pub recent_balls: Vec<String>,
    /// First innings finished; the next step is the innings break.
    pub innings_over: bool,
    pub is_match_over: bool,
    #[serde(default)]
    pub winner: Option<MatchResult>,
    #[serde(default)]
    pub innings1: Option<InningsSummary>,
    #[serde(default)]
    pub innings2: Option<InningsSummary>,
}

impl MatchState {
    /// Legal balls available to each side.
    pub fn ball_limit(&self) -> u32 {
        self.total_overs * 6
    }

    /// Wickets that end the innings (all but one batter out).
    pub fn max_wickets(&self) -> u32 {
        self.batting_team.players.len().saturating_sub(1) as u32
    }

    /// Whether the batting side has lost all its wickets.
    pub fn is_all_out(&self) -> bool {
        self.wickets >= self.max_wickets()
    }

    /// Runs still needed to win the chase, if this is the second innings.
    pub fn runs_needed(&self) -> Option<u32> {
        self.target.map(|t| (t + 1).saturating_sub(self.score))
    }

    /// Current overs in cricket notation, e.g. `"12.3"`.
    pub fn overs(&self) -> String {
        format_overs(self.balls_bowled)
    }

    pub fn batsman(&self, id: PlayerId) -> Option<&BatsmanStats> {
        self.batsman_stats.iter().find(|s| s.player_id == id)
    }

    pub fn bowler(&self, id: PlayerId) -> Option<&BowlerStats> {
        self.bowler_stats.iter().find(|s| s.player_id == id)
    }

    /// Freezes the current innings into a summary.
    pub fn summary(&self) -> InningsSummary {
        InningsSummary {
            team_id: self.batting_team.id.clone(),
            team_name: self.batting_team.name.clone(),
            score: self.score,
            wickets: self.wickets,
            balls_bowled: self.balls_bowled,
            allotted_balls: self.ball_limit(),
            all_out: self.is_all_out(),
            batsman_stats: self.batsman_stats.clone(),
            bowler_stats: self.bowler_stats.clone(),
        }
    }

    pub(crate) fn batsman_mut(&mut self, id: PlayerId) -> Option<&mut BatsmanStats> {
        self.batsman_stats.iter_mut().find(|s| s.player_id == id)
    }

    pub(crate) fn bowler_mut(&mut self, id: PlayerId) -> Option<&mut BowlerStats> {
        self.bowler_stats.iter_mut().find(|s| s.player_id == id)
    }

    pub(crate) fn push_commentary(&mut self, line: String) {
        self.commentary.push(line);
        if self.commentary.len() > COMMENTARY_LIMIT {
            let excess = self.commentary.len() - COMMENTARY_LIMIT;
            self.commentary.drain(..excess);
        }
    }

    pub(crate) fn push_recent(&mut self, glyph: &str) {
        self.recent_balls.push(glyph.to_string());
        if self.recent_balls.len() > RECENT_BALLS_LIMIT {
            let excess = self.recent_balls.len() - RECENT_BALLS_LIMIT;
            self.recent_balls.drain(..excess);
        }
    }
}

/// Formats a ball count as overs: 27 balls → `"4.3"`.
pub fn format_overs(balls: u32) -> String {
    format!("{}.{}", balls / 6, balls % 6)
}
