//! League → knockout progression.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Fixture, FixtureOutcome, Stage, TournamentTeam, rank};

/// Where the tournament is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TournamentPhase {
    #[default]
    League,
    Semis,
    Final,
    Complete,
}

/// What [`check_phase_advance`] decided.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseAdvance {
    /// The current phase still has fixtures to play.
    Stay,
    /// Move to `phase`, appending `fixtures` to the schedule.
    Advance {
        phase: TournamentPhase,
        fixtures: Vec<Fixture>,
    },
}

impl PhaseAdvance {
    /// Applies the decision to a schedule, returning the new phase.
    pub fn apply(self, current: TournamentPhase, schedule: &mut Vec<Fixture>) -> TournamentPhase {
        match self {
            Self::Stay => current,
            Self::Advance { phase, fixtures } => {
                schedule.extend(fixtures);
                phase
            }
        }
    }
}

/// Decides whether the tournament moves on.
///
/// - League finished: up to four teams go straight to a final between the
///   top two; more than four play semis 1 v 4 and 2 v 3.
/// - Both semis played: final between the two sides that went through.
/// - Final played: complete.
///
/// New fixtures get ids after the highest existing one. Deterministic for
/// identical input.
pub fn check_phase_advance(
    fixtures: &[Fixture],
    teams: &[TournamentTeam],
    phase: TournamentPhase,
) -> PhaseAdvance {
    let stage_done = |stage: Stage| {
        let mut in_stage = fixtures.iter().filter(|f| f.stage == stage).peekable();
        in_stage.peek().is_some() && in_stage.all(|f| f.played)
    };
    let next_id = fixtures.iter().map(|f| f.id).max().unwrap_or(0) + 1;

    match phase {
        TournamentPhase::League => {
            if !stage_done(Stage::League) || teams.len() < 2 {
                return PhaseAdvance::Stay;
            }
            let seeds = rank(teams);
            if seeds.len() <= 4 {
                debug!(first = %seeds[0].id, second = %seeds[1].id, "league done, straight to final");
                PhaseAdvance::Advance {
                    phase: TournamentPhase::Final,
                    fixtures: vec![Fixture::new(next_id, &seeds[0].id, &seeds[1].id, Stage::Final)],
                }
            } else {
                debug!(
                    first = %seeds[0].id,
                    second = %seeds[1].id,
                    third = %seeds[2].id,
                    fourth = %seeds[3].id,
                    "league done, semis seeded"
                );
                PhaseAdvance::Advance {
                    phase: TournamentPhase::Semis,
                    fixtures: vec![
                        Fixture::new(next_id, &seeds[0].id, &seeds[3].id, Stage::Semi),
                        Fixture::new(next_id + 1, &seeds[1].id, &seeds[2].id, Stage::Semi),
                    ],
                }
            }
        }
        TournamentPhase::Semis => {
            if !stage_done(Stage::Semi) {
                return PhaseAdvance::Stay;
            }
            let mut semis: Vec<&Fixture> =
                fixtures.iter().filter(|f| f.stage == Stage::Semi).collect();
            semis.sort_by_key(|f| f.id);
            let finalists: Vec<&str> =
                semis.iter().filter_map(|f| f.advancing_team()).collect();
            let [first, second] = finalists.as_slice() else {
                return PhaseAdvance::Stay;
            };
            debug!(first, second, "semis done, final set");
            PhaseAdvance::Advance {
                phase: TournamentPhase::Final,
                fixtures: vec![Fixture::new(next_id, first, second, Stage::Final)],
            }
        }
        TournamentPhase::Final => {
            if !stage_done(Stage::Final) {
                return PhaseAdvance::Stay;
            }
            debug!("final played, tournament complete");
            PhaseAdvance::Advance {
                phase: TournamentPhase::Complete,
                fixtures: Vec::new(),
            }
        }
        TournamentPhase::Complete => PhaseAdvance::Stay,
    }
}

/// The tournament winner once the final has been played. A tied or
/// abandoned final goes to the higher seed.
pub fn champion(fixtures: &[Fixture]) -> Option<&str> {
    fixtures
        .iter()
        .find(|f| f.stage == Stage::Final && f.played)
        .and_then(|f| match f.winner.as_ref()? {
            FixtureOutcome::Team { id } => Some(id.as_str()),
            FixtureOutcome::Tie | FixtureOutcome::NoResult => Some(f.t1.as_str()),
        })
}
