//! Fixtures and league generation.

use crease_engine::InningsSummary;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{TournamentError, TournamentTeam};

/// Which part of the tournament a fixture belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    League,
    Semi,
    Final,
}

/// How a played fixture ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FixtureOutcome {
    /// The team with this id won.
    Team { id: String },
    Tie,
    NoResult,
}

/// One scheduled match between two tournament teams.
///
/// In knockout fixtures `t1` is always the higher seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    pub id: u32,
    pub t1: String,
    pub t2: String,
    #[serde(default)]
    pub winner: Option<FixtureOutcome>,
    pub played: bool,
    pub stage: Stage,
    #[serde(default)]
    pub innings1: Option<InningsSummary>,
    #[serde(default)]
    pub innings2: Option<InningsSummary>,
}

impl Fixture {
    pub(crate) fn new(id: u32, t1: &str, t2: &str, stage: Stage) -> Self {
        Self {
            id,
            t1: t1.to_string(),
            t2: t2.to_string(),
            winner: None,
            played: false,
            stage,
            innings1: None,
            innings2: None,
        }
    }

    /// Whether `team_id` is one of the two sides.
    pub fn involves(&self, team_id: &str) -> bool {
        self.t1 == team_id || self.t2 == team_id
    }

    /// The side that goes through from a played knockout fixture. A tie or
    /// no-result sends the higher seed (`t1`) through.
    pub fn advancing_team(&self) -> Option<&str> {
        match self.winner.as_ref()? {
            FixtureOutcome::Team { id } => Some(id.as_str()),
            FixtureOutcome::Tie | FixtureOutcome::NoResult => Some(self.t1.as_str()),
        }
    }
}

/// Everything needed to complete a fixture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureResult {
    pub fixture_id: u32,
    pub innings1: InningsSummary,
    pub innings2: InningsSummary,
    pub outcome: FixtureOutcome,
}

/// Builds the round-robin league: one fixture per unordered pair of teams,
/// in table order, with ids starting at 1.
pub fn generate_fixtures(teams: &[TournamentTeam]) -> Result<Vec<Fixture>, TournamentError> {
    if teams.len() < 2 {
        return Err(TournamentError::TooFewTeams(teams.len()));
    }

    let mut fixtures = Vec::with_capacity(teams.len() * (teams.len() - 1) / 2);
    for (i, home) in teams.iter().enumerate() {
        for away in &teams[i + 1..] {
            let id = fixtures.len() as u32 + 1;
            fixtures.push(Fixture::new(id, &home.id, &away.id, Stage::League));
        }
    }
    debug!(teams = teams.len(), fixtures = fixtures.len(), "league generated");
    Ok(fixtures)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn teams(n: usize) -> Vec<TournamentTeam> {
        (0..n)
            .map(|i| TournamentTeam::new(&format!("t{i}"), &format!("Team {i}"), None))
            .collect()
    }

    #[test]
    fn test_generate_fixtures_all_pairs() {
        let fixtures = generate_fixtures(&teams(4)).unwrap();
        assert_eq!(fixtures.len(), 6);
        let ids: Vec<u32> = fixtures.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!((fixtures[0].t1.as_str(), fixtures[0].t2.as_str()), ("t0", "t1"));
        assert_eq!((fixtures[5].t1.as_str(), fixtures[5].t2.as_str()), ("t2", "t3"));
        assert!(fixtures.iter().all(|f| f.stage == Stage::League && !f.played));
    }

    #[test]
    fn test_generate_fixtures_needs_two_teams() {
        assert_eq!(generate_fixtures(&teams(1)), Err(TournamentError::TooFewTeams(1)));
        assert_eq!(generate_fixtures(&teams(2)).unwrap().len(), 1);
    }

    #[test]
    fn test_advancing_team_tie_sends_higher_seed() {
        let mut f = Fixture::new(1, "top", "bottom", Stage::Semi);
        assert_eq!(f.advancing_team(), None);
        f.winner = Some(FixtureOutcome::Tie);
        assert_eq!(f.advancing_team(), Some("top"));
        f.winner = Some(FixtureOutcome::Team { id: "bottom".into() });
        assert_eq!(f.advancing_team(), Some("bottom"));
    }

    #[test]
    fn test_outcome_json_shape() {
        let json = serde_json::to_value(FixtureOutcome::NoResult).unwrap();
        assert_eq!(json["kind"], "noResult");
    }
}
