//! The points table.

use std::cmp::Ordering;

use crease_engine::{InningsSummary, Side};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Fixture, FixtureOutcome, FixtureResult, Stage, TournamentError};

const WIN_POINTS: u32 = 2;
const SHARED_POINTS: u32 = 1;

/// One row of the points table.
///
/// Overs are tracked as balls so run rates stay exact; see
/// [`overs_faced`](Self::overs_faced) for the decimal view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentTeam {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub owner: Option<Side>,
    pub played: u32,
    pub won: u32,
    pub lost: u32,
    pub tied: u32,
    pub pts: u32,
    pub nrr: f64,
    pub runs_scored: u32,
    pub balls_faced: u32,
    pub runs_conceded: u32,
    pub balls_bowled: u32,
}

impl TournamentTeam {
    pub fn new(id: &str, name: &str, owner: Option<Side>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            owner,
            played: 0,
            won: 0,
            lost: 0,
            tied: 0,
            pts: 0,
            nrr: 0.0,
            runs_scored: 0,
            balls_faced: 0,
            runs_conceded: 0,
            balls_bowled: 0,
        }
    }

    pub fn overs_faced(&self) -> f64 {
        f64::from(self.balls_faced) / 6.0
    }

    pub fn overs_bowled(&self) -> f64 {
        f64::from(self.balls_bowled) / 6.0
    }

    fn batted(&mut self, innings: &InningsSummary) {
        self.runs_scored += innings.score;
        self.balls_faced += innings.balls_for_run_rate();
    }

    fn bowled(&mut self, innings: &InningsSummary) {
        self.runs_conceded += innings.score;
        self.balls_bowled += innings.balls_for_run_rate();
    }

    fn refresh_nrr(&mut self) {
        let rate = |runs: u32, balls: u32| {
            if balls == 0 {
                0.0
            } else {
                f64::from(runs) * 6.0 / f64::from(balls)
            }
        };
        self.nrr = rate(self.runs_scored, self.balls_faced)
            - rate(self.runs_conceded, self.balls_bowled);
    }
}

/// Sorts the table by `(pts desc, nrr desc, won desc, id asc)`.
///
/// The id tie-break makes the order total, so seeding never depends on the
/// input order.
pub fn rank(teams: &[TournamentTeam]) -> Vec<TournamentTeam> {
    let mut ranked = teams.to_vec();
    ranked.sort_by(compare);
    ranked
}

fn compare(a: &TournamentTeam, b: &TournamentTeam) -> Ordering {
    b.pts
        .cmp(&a.pts)
        .then_with(|| b.nrr.total_cmp(&a.nrr))
        .then_with(|| b.won.cmp(&a.won))
        .then_with(|| a.id.cmp(&b.id))
}

/// Records the result of a fixture.
///
/// Marks it played and stores both innings. League fixtures also update the
/// table: runs and balls for both sides (an all-out innings counts its full
/// allotment), net run rate, and points (win 2, tie or no-result 1 each).
/// Knockout results leave the table alone.
///
/// Everything is validated before anything is written.
pub fn complete_fixture(
    fixtures: &mut [Fixture],
    teams: &mut [TournamentTeam],
    result: FixtureResult,
) -> Result<(), TournamentError> {
    let fixture_index = fixtures
        .iter()
        .position(|f| f.id == result.fixture_id)
        .ok_or(TournamentError::UnknownFixture(result.fixture_id))?;
    let fixture = &fixtures[fixture_index];
    if fixture.played {
        return Err(TournamentError::AlreadyPlayed(fixture.id));
    }

    let not_in_fixture = |team: &str| TournamentError::NotInFixture {
        fixture: result.fixture_id,
        team: team.to_string(),
    };
    for team in [&result.innings1.team_id, &result.innings2.team_id] {
        if !fixture.involves(team) {
            return Err(not_in_fixture(team));
        }
    }
    if result.innings1.team_id == result.innings2.team_id {
        return Err(not_in_fixture(&result.innings2.team_id));
    }
    if let FixtureOutcome::Team { id } = &result.outcome {
        if !fixture.involves(id) {
            return Err(not_in_fixture(id));
        }
    }

    let index_of = |id: &str| {
        teams
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| TournamentError::UnknownTeam(id.to_string()))
    };
    let i1 = index_of(&fixture.t1)?;
    let i2 = index_of(&fixture.t2)?;
    let stage = fixture.stage;

    if stage == Stage::League {
        let first = index_of(&result.innings1.team_id)?;
        let second = if first == i1 { i2 } else { i1 };

        teams[first].batted(&result.innings1);
        teams[second].bowled(&result.innings1);
        teams[second].batted(&result.innings2);
        teams[first].bowled(&result.innings2);

        for i in [i1, i2] {
            let team = &mut teams[i];
            team.played += 1;
            match &result.outcome {
                FixtureOutcome::Team { id } if *id == team.id => {
                    team.won += 1;
                    team.pts += WIN_POINTS;
                }
                FixtureOutcome::Team { .. } => team.lost += 1,
                FixtureOutcome::Tie => {
                    team.tied += 1;
                    team.pts += SHARED_POINTS;
                }
                FixtureOutcome::NoResult => team.pts += SHARED_POINTS,
            }
            team.refresh_nrr();
        }
    }

    let fixture = &mut fixtures[fixture_index];
    debug!(fixture = fixture.id, stage = ?stage, outcome = ?result.outcome, "fixture completed");
    fixture.played = true;
    fixture.winner = Some(result.outcome);
    fixture.innings1 = Some(result.innings1);
    fixture.innings2 = Some(result.innings2);
    Ok(())
}
