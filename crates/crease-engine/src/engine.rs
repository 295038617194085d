//! Ball-by-ball simulation.
//!
//! The engine is a state transition function: it never mutates the snapshot
//! it is given. [`MatchEngine::advance`] clones, bowls one delivery on the
//! clone and hands it back with `seq` bumped, so a caller holding the old
//! snapshot (e.g. mid-broadcast) is never surprised.
//!
//! Randomness comes from the engine's own `R: Rng`. Seed it and the whole
//! match replays identically.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, trace};

use crate::state::{BatsmanStats, BowlerStats};
use crate::{
    EngineError, Innings, MatchMode, MatchResult, MatchState, PlayerId, Team,
};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What happened on one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BallOutcome {
    Dot,
    One,
    Two,
    Three,
    Four,
    Six,
    Wicket,
    Wide,
}

impl BallOutcome {
    /// Outcomes in the order used by [`outcome_weights`].
    pub const ALL: [BallOutcome; 8] = [
        BallOutcome::Dot,
        BallOutcome::One,
        BallOutcome::Two,
        BallOutcome::Three,
        BallOutcome::Four,
        BallOutcome::Six,
        BallOutcome::Wicket,
        BallOutcome::Wide,
    ];

    /// Runs off the bat. Zero for dots, wickets and wides.
    pub fn runs(self) -> u32 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
            Self::Four => 4,
            Self::Six => 6,
            Self::Dot | Self::Wicket | Self::Wide => 0,
        }
    }

    /// Whether the delivery counts towards the over.
    pub fn is_legal(self) -> bool {
        !matches!(self, Self::Wide)
    }

    /// The short glyph shown in the recent-balls strip.
    pub fn glyph(self) -> &'static str {
        match self {
            Self::Dot => "0",
            Self::One => "1",
            Self::Two => "2",
            Self::Three => "3",
            Self::Four => "4",
            Self::Six => "6",
            Self::Wicket => "W",
            Self::Wide => "Wd",
        }
    }
}

const DOT: usize = 0;
const ONE: usize = 1;
const FOUR: usize = 4;
const SIX: usize = 5;
const WICKET: usize = 6;

/// Base weights over `{0,1,2,3,4,6,W,Wd}`.
const BASE_WEIGHTS: [f64; 8] = [30.0, 28.0, 6.0, 1.0, 12.0, 6.0, 4.0, 3.0];

/// Difficulty above which the bowler is on top.
const BOWLER_EDGE: f64 = 1.1;
/// Difficulty below which the batter is on top.
const BATTER_EDGE: f64 = 0.9;

/// No outcome is ever made impossible by skewing.
const MIN_WEIGHT: f64 = 0.5;

/// Outcome weights for a bowler-vs-batter difficulty ratio.
///
/// `difficulty = bowling_factor / batting_factor`. Above 1.1 weight moves
/// from boundaries and singles to dots and wickets; below 0.9 it moves from
/// dots and wickets to fours and sixes. The size of the shift grows with
/// the distance from 1.0 and is capped.
pub fn outcome_weights(difficulty: f64) -> [f64; 8] {
    let mut w = BASE_WEIGHTS;
    if difficulty > BOWLER_EDGE {
        let s = (difficulty - 1.0).min(1.0);
        w[DOT] += 12.0 * s;
        w[WICKET] += 4.0 * s;
        w[ONE] -= 4.0 * s;
        w[FOUR] -= 5.0 * s;
        w[SIX] -= 3.0 * s;
    } else if difficulty < BATTER_EDGE {
        let s = (1.0 - difficulty).min(0.6);
        w[FOUR] += 10.0 * s;
        w[SIX] += 8.0 * s;
        w[DOT] -= 10.0 * s;
        w[WICKET] -= 2.0 * s;
    }
    for weight in &mut w {
        *weight = weight.max(MIN_WEIGHT);
    }
    w
}

fn sample_outcome<R: Rng>(rng: &mut R, difficulty: f64) -> BallOutcome {
    let weights = outcome_weights(difficulty);
    let total: f64 = weights.iter().sum();
    let mut roll = rng.random_range(0.0..total);
    for (outcome, weight) in BallOutcome::ALL.iter().zip(weights) {
        if roll < weight {
            return *outcome;
        }
        roll -= weight;
    }
    BallOutcome::Dot
}

// ---------------------------------------------------------------------------
// Match setup
// ---------------------------------------------------------------------------

/// Builds the opening state of a match.
///
/// The first two in `batting`'s order open; the last player of `bowling`
/// takes the first over.
pub fn start_match(
    batting: Team,
    bowling: Team,
    total_overs: u32,
    mode: MatchMode,
) -> Result<MatchState, EngineError> {
    if total_overs == 0 {
        return Err(EngineError::NoOvers);
    }
    let state = opening_state(batting, bowling, total_overs, mode, Innings::First)?;
    debug!(
        batting = %state.batting_team.name,
        bowling = %state.bowling_team.name,
        total_overs,
        "match started"
    );
    Ok(state)
}

fn opening_state(
    batting: Team,
    bowling: Team,
    total_overs: u32,
    mode: MatchMode,
    innings: Innings,
) -> Result<MatchState, EngineError> {
    for team in [&batting, &bowling] {
        if team.players.len() < 2 {
            return Err(EngineError::TeamTooSmall(team.name.clone()));
        }
    }

    let striker = &batting.players[0];
    let non_striker = &batting.players[1];
    let bowler_id = *bowling
        .bowling_rotation()
        .last()
        .ok_or_else(|| EngineError::TeamTooSmall(bowling.name.clone()))?;
    let bowler = bowling
        .player(bowler_id)
        .ok_or(EngineError::StalePlayer(bowler_id))?;

    let batsman_stats = vec![
        BatsmanStats::new(striker.id, &striker.name),
        BatsmanStats::new(non_striker.id, &non_striker.name),
    ];
    let bowler_stats = vec![BowlerStats::new(bowler.id, &bowler.name)];
    let striker_id = striker.id;
    let non_striker_id = non_striker.id;

    Ok(MatchState {
        seq: 0,
        mode,
        innings,
        total_overs,
        score: 0,
        wickets: 0,
        balls_bowled: 0,
        striker_id,
        non_striker_id,
        bowler_id,
        target: None,
        batsman_stats,
        bowler_stats,
        commentary: Vec::new(),
        recent_balls: Vec::new(),
        innings_over: false,
        is_match_over: false,
        winner: None,
        innings1: None,
        innings2: None,
        batting_team: batting,
        bowling_team: bowling,
    })
}

/// Moves from the end of the first innings to the start of the second.
///
/// Swaps the sides, records the first-innings summary, sets the target to
/// the first-innings score and re-seeds openers and bowler exactly as at
/// the start of the match. Deterministic, so every peer computes the same
/// second-innings opening state locally.
pub fn handle_innings_break(state: &MatchState) -> Result<MatchState, EngineError> {
    if state.is_match_over {
        return Err(EngineError::MatchOver);
    }
    if state.innings != Innings::First || !state.innings_over {
        return Err(EngineError::NotAtInningsBreak);
    }

    let summary = state.summary();
    let mut next = opening_state(
        state.bowling_team.clone(),
        state.batting_team.clone(),
        state.total_overs,
        state.mode,
        Innings::Second,
    )?;
    next.seq = state.seq + 1;
    next.target = Some(summary.score);
    next.push_commentary(format!(
        "Innings break: {} need {} runs from {} overs",
        next.batting_team.name,
        summary.score + 1,
        next.total_overs
    ));
    debug!(target_score = summary.score, "innings break");
    next.innings1 = Some(summary);
    Ok(next)
}

// ---------------------------------------------------------------------------
// MatchEngine
// ---------------------------------------------------------------------------

/// Advances matches one delivery at a time.
pub struct MatchEngine<R: Rng> {
    rng: R,
}

impl MatchEngine<StdRng> {
    /// An engine whose outcomes are fully determined by `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    /// An engine seeded from the operating system.
    pub fn from_os_rng() -> Self {
        Self::new(StdRng::from_os_rng())
    }
}

impl<R: Rng> MatchEngine<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Bowls one delivery and returns the resulting state.
    ///
    /// # Errors
    /// - [`EngineError::MatchOver`] / [`EngineError::InningsOver`] when
    ///   there is no ball left to bowl in this innings.
    /// - [`EngineError::StalePlayer`] when the striker or bowler id does not
    ///   belong to the teams in the snapshot.
    pub fn advance(&mut self, state: &MatchState) -> Result<MatchState, EngineError> {
        if state.is_match_over {
            return Err(EngineError::MatchOver);
        }
        if state.innings_over {
            return Err(EngineError::InningsOver);
        }

        let striker = state
            .batting_team
            .player(state.striker_id)
            .ok_or(EngineError::StalePlayer(state.striker_id))?;
        let bowler = state
            .bowling_team
            .player(state.bowler_id)
            .ok_or(EngineError::StalePlayer(state.bowler_id))?;
        if state.batting_team.player(state.non_striker_id).is_none() {
            return Err(EngineError::StalePlayer(state.non_striker_id));
        }

        let difficulty = bowler.bowling_factor() / striker.batting_factor();
        let outcome = sample_outcome(&mut self.rng, difficulty);

        let mut next = state.clone();
        apply_outcome(&mut next, outcome)?;
        Ok(next)
    }

    /// Bowls up to `n` deliveries, stopping early at the end of an innings.
    pub fn advance_many(
        &mut self,
        state: &MatchState,
        n: usize,
    ) -> Result<MatchState, EngineError> {
        let mut current = state.clone();
        for _ in 0..n {
            if current.innings_over || current.is_match_over {
                break;
            }
            current = self.advance(&current)?;
        }
        Ok(current)
    }
}

// ---------------------------------------------------------------------------
// Applying a delivery
// ---------------------------------------------------------------------------

/// Applies one outcome to `state` in place and bumps `seq`.
pub(crate) fn apply_outcome(
    state: &mut MatchState,
    outcome: BallOutcome,
) -> Result<(), EngineError> {
    let batter_name = state
        .batting_team
        .player(state.striker_id)
        .map(|p| p.name.clone())
        .ok_or(EngineError::StalePlayer(state.striker_id))?;
    let bowler_name = state
        .bowling_team
        .player(state.bowler_id)
        .map(|p| p.name.clone())
        .ok_or(EngineError::StalePlayer(state.bowler_id))?;

    let ball_label = format!(
        "{}.{}",
        state.balls_bowled / 6,
        state.balls_bowled % 6 + 1
    );
    let striker_id = state.striker_id;
    let bowler_id = state.bowler_id;

    state.seq += 1;
    ensure_batsman(state, striker_id, &batter_name);
    ensure_bowler(state, bowler_id, &bowler_name);

    let line = match outcome {
        BallOutcome::Wide => {
            state.score += 1;
            if let Some(b) = state.bowler_mut(bowler_id) {
                b.runs += 1;
                b.wides += 1;
            }
            format!("{ball_label} {bowler_name} to {batter_name}, wide")
        }
        BallOutcome::Wicket => {
            state.balls_bowled += 1;
            state.wickets += 1;
            if let Some(b) = state.batsman_mut(striker_id) {
                b.balls += 1;
                b.out = true;
                b.dismissal = Some(format!("b {bowler_name}"));
            }
            if let Some(b) = state.bowler_mut(bowler_id) {
                b.balls += 1;
                b.wickets += 1;
            }
            let line = format!(
                "{ball_label} {bowler_name} to {batter_name}, OUT! {batter_name} b {bowler_name}"
            );
            bring_in_next_batter(state);
            line
        }
        runs_outcome => {
            let runs = runs_outcome.runs();
            state.balls_bowled += 1;
            state.score += runs;
            if let Some(b) = state.batsman_mut(striker_id) {
                b.runs += runs;
                b.balls += 1;
                match runs_outcome {
                    BallOutcome::Four => b.fours += 1,
                    BallOutcome::Six => b.sixes += 1,
                    _ => {}
                }
            }
            if let Some(b) = state.bowler_mut(bowler_id) {
                b.balls += 1;
                b.runs += runs;
            }
            if runs % 2 == 1 {
                std::mem::swap(&mut state.striker_id, &mut state.non_striker_id);
            }
            let call = match runs_outcome {
                BallOutcome::Dot => "no run".to_string(),
                BallOutcome::One => "1 run".to_string(),
                BallOutcome::Four => "FOUR!".to_string(),
                BallOutcome::Six => "SIX!".to_string(),
                _ => format!("{runs} runs"),
            };
            format!("{ball_label} {bowler_name} to {batter_name}, {call}")
        }
    };

    trace!(outcome = outcome.glyph(), score = state.score, wickets = state.wickets, "ball");
    state.push_commentary(line);
    state.push_recent(outcome.glyph());

    if resolve_innings_end(state) {
        return Ok(());
    }

    if outcome.is_legal() && state.balls_bowled % 6 == 0 {
        end_over(state)?;
    }
    Ok(())
}

/// Sends the next batter in the order out to replace the dismissed striker.
/// Leaves the striker in place when nobody is left (all out).
fn bring_in_next_batter(state: &mut MatchState) {
    let next = state
        .batting_team
        .players
        .iter()
        .find(|p| {
            p.id != state.striker_id
                && p.id != state.non_striker_id
                && !state.batsman(p.id).is_some_and(|s| s.out)
        })
        .map(|p| (p.id, p.name.clone()));

    if let Some((id, name)) = next {
        state.striker_id = id;
        ensure_batsman(state, id, &name);
    }
}

/// Checks whether the delivery just bowled ended the innings or the match.
/// Returns `true` if play cannot continue.
fn resolve_innings_end(state: &mut MatchState) -> bool {
    let balls_done = state.balls_bowled >= state.ball_limit();
    let all_out = state.is_all_out();

    match state.innings {
        Innings::First => {
            if balls_done || all_out {
                state.innings_over = true;
                state.push_commentary(format!(
                    "End of innings: {} {}/{} ({} overs)",
                    state.batting_team.name,
                    state.score,
                    state.wickets,
                    state.overs()
                ));
                debug!(score = state.score, wickets = state.wickets, "first innings over");
                return true;
            }
            false
        }
        Innings::Second => {
            let Some(target) = state.target else {
                return false;
            };
            let result = if state.score > target {
                Some(MatchResult::Team {
                    id: state.batting_team.id.clone(),
                    name: state.batting_team.name.clone(),
                })
            } else if balls_done || all_out {
                if state.score == target {
                    Some(MatchResult::Tie)
                } else {
                    Some(MatchResult::Team {
                        id: state.bowling_team.id.clone(),
                        name: state.bowling_team.name.clone(),
                    })
                }
            } else {
                None
            };

            let Some(result) = result else {
                return false;
            };
            let line = match &result {
                MatchResult::Team { name, .. } => format!("{name} win!"),
                MatchResult::Tie => "Match tied!".to_string(),
            };
            state.push_commentary(line);
            state.innings_over = true;
            state.is_match_over = true;
            state.innings2 = Some(state.summary());
            debug!(?result, "match over");
            state.winner = Some(result);
            true
        }
    }
}

/// Changes ends and hands the ball to the next bowler in the rotation.
fn end_over(state: &mut MatchState) -> Result<(), EngineError> {
    std::mem::swap(&mut state.striker_id, &mut state.non_striker_id);

    let rotation = state.bowling_team.bowling_rotation();
    let next_bowler = match rotation.iter().position(|id| *id == state.bowler_id) {
        Some(i) => rotation[(i + 1) % rotation.len()],
        None => *rotation
            .first()
            .ok_or_else(|| EngineError::TeamTooSmall(state.bowling_team.name.clone()))?,
    };
    let name = state
        .bowling_team
        .player(next_bowler)
        .map(|p| p.name.clone())
        .ok_or(EngineError::StalePlayer(next_bowler))?;
    state.bowler_id = next_bowler;
    ensure_bowler(state, next_bowler, &name);

    state.push_commentary(format!(
        "End of over {}: {} {}/{}",
        state.balls_bowled / 6,
        state.batting_team.name,
        state.score,
        state.wickets
    ));
    Ok(())
}

fn ensure_batsman(state: &mut MatchState, id: PlayerId, name: &str) {
    if state.batsman(id).is_none() {
        state.batsman_stats.push(BatsmanStats::new(id, name));
    }
}

fn ensure_bowler(state: &mut MatchState, id: PlayerId, name: &str) {
    if state.bowler(id).is_none() {
        state.bowler_stats.push(BowlerStats::new(id, name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Player, Role};

    fn player(id: u32, avg: f64, sr: f64) -> Player {
        Player {
            id: PlayerId(id),
            name: format!("P{id}"),
            role: Role::AllRounder,
            batting_average: avg,
            strike_rate: sr,
            bowling_average: Some(28.0),
            economy: Some(8.0),
        }
    }

    fn team(id: &str, first_id: u32, size: u32) -> Team {
        Team {
            id: id.to_string(),
            name: id.to_uppercase(),
            owner: None,
            players: (first_id..first_id + size)
                .map(|i| player(i, 30.0, 125.0))
                .collect(),
        }
    }

    fn new_match(overs: u32) -> MatchState {
        start_match(team("a", 1, 11), team("b", 101, 11), overs, MatchMode::Quick)
            .unwrap()
    }

    // =====================================================================
    // Outcome weights
    // =====================================================================

    #[test]
    fn test_outcome_weights_neutral_is_base() {
        assert_eq!(outcome_weights(1.0), BASE_WEIGHTS);
    }

    #[test]
    fn test_outcome_weights_hard_favours_dots_and_wickets() {
        let w = outcome_weights(1.6);
        assert!(w[DOT] > BASE_WEIGHTS[DOT]);
        assert!(w[WICKET] > BASE_WEIGHTS[WICKET]);
        assert!(w[FOUR] < BASE_WEIGHTS[FOUR]);
    }

    #[test]
    fn test_outcome_weights_easy_favours_boundaries() {
        let w = outcome_weights(0.5);
        assert!(w[FOUR] > BASE_WEIGHTS[FOUR]);
        assert!(w[SIX] > BASE_WEIGHTS[SIX]);
        assert!(w[DOT] < BASE_WEIGHTS[DOT]);
        assert!(w.iter().all(|x| *x >= MIN_WEIGHT));
    }

    // =====================================================================
    // Match setup
    // =====================================================================

    #[test]
    fn test_start_match_seeds_openers_and_last_bowler() {
        let s = new_match(20);
        assert_eq!(s.striker_id, PlayerId(1));
        assert_eq!(s.non_striker_id, PlayerId(2));
        assert_eq!(s.bowler_id, PlayerId(111));
        assert_eq!(s.batsman_stats.len(), 2);
        assert_eq!(s.seq, 0);
    }

    #[test]
    fn test_start_match_rejects_tiny_team() {
        let err = start_match(team("a", 1, 1), team("b", 101, 11), 5, MatchMode::Quick)
            .unwrap_err();
        assert_eq!(err, EngineError::TeamTooSmall("A".into()));
    }

    #[test]
    fn test_start_match_rejects_zero_overs() {
        let err = start_match(team("a", 1, 11), team("b", 101, 11), 0, MatchMode::Quick)
            .unwrap_err();
        assert_eq!(err, EngineError::NoOvers);
    }

    // =====================================================================
    // Applying outcomes
    // =====================================================================

    #[test]
    fn test_single_rotates_strike() {
        let mut s = new_match(20);
        apply_outcome(&mut s, BallOutcome::One).unwrap();
        assert_eq!(s.striker_id, PlayerId(2));
        assert_eq!(s.non_striker_id, PlayerId(1));
        assert_eq!(s.batsman(PlayerId(1)).unwrap().runs, 1);
    }

    #[test]
    fn test_boundary_keeps_strike_and_counts_four() {
        let mut s = new_match(20);
        apply_outcome(&mut s, BallOutcome::Four).unwrap();
        assert_eq!(s.striker_id, PlayerId(1));
        assert_eq!(s.score, 4);
        assert_eq!(s.batsman(PlayerId(1)).unwrap().fours, 1);
        assert_eq!(s.bowler(PlayerId(111)).unwrap().runs, 4);
    }

    #[test]
    fn test_wide_adds_run_without_legal_ball() {
        let mut s = new_match(20);
        apply_outcome(&mut s, BallOutcome::Wide).unwrap();
        assert_eq!(s.score, 1);
        assert_eq!(s.balls_bowled, 0);
        assert_eq!(s.striker_id, PlayerId(1));
        let bowler = s.bowler(PlayerId(111)).unwrap();
        assert_eq!((bowler.runs, bowler.wides, bowler.balls), (1, 1, 0));
        assert_eq!(s.recent_balls, vec!["Wd"]);
    }

    #[test]
    fn test_wicket_brings_in_next_batter_on_strike() {
        let mut s = new_match(20);
        apply_outcome(&mut s, BallOutcome::Wicket).unwrap();
        assert_eq!(s.wickets, 1);
        assert!(s.batsman(PlayerId(1)).unwrap().out);
        assert_eq!(s.striker_id, PlayerId(3));
        assert_eq!(s.non_striker_id, PlayerId(2));
        assert_eq!(s.bowler(PlayerId(111)).unwrap().wickets, 1);
    }

    #[test]
    fn test_over_end_swaps_strike_and_rotates_bowler() {
        let mut s = new_match(20);
        for _ in 0..6 {
            apply_outcome(&mut s, BallOutcome::Dot).unwrap();
        }
        assert_eq!(s.balls_bowled, 6);
        assert_eq!(s.striker_id, PlayerId(2));
        // Rotation pool is 107..=111; after 111 it wraps to 107.
        assert_eq!(s.bowler_id, PlayerId(107));

        for _ in 0..6 {
            apply_outcome(&mut s, BallOutcome::Dot).unwrap();
        }
        assert_eq!(s.bowler_id, PlayerId(108));
    }

    #[test]
    fn test_wide_on_sixth_ball_does_not_end_over() {
        let mut s = new_match(20);
        for _ in 0..5 {
            apply_outcome(&mut s, BallOutcome::Dot).unwrap();
        }
        apply_outcome(&mut s, BallOutcome::Wide).unwrap();
        assert_eq!(s.bowler_id, PlayerId(111));
        apply_outcome(&mut s, BallOutcome::Dot).unwrap();
        assert_eq!(s.bowler_id, PlayerId(107));
    }

    #[test]
    fn test_all_out_ends_first_innings_before_overs() {
        let mut s = new_match(20);
        for _ in 0..10 {
            apply_outcome(&mut s, BallOutcome::Wicket).unwrap();
        }
        assert_eq!(s.wickets, 10);
        assert!(s.innings_over);
        assert!(!s.is_match_over);
        assert_eq!(s.max_wickets(), 10);
    }

    #[test]
    fn test_recent_balls_window_is_capped() {
        let mut s = new_match(20);
        for _ in 0..20 {
            apply_outcome(&mut s, BallOutcome::Dot).unwrap();
        }
        assert_eq!(s.recent_balls.len(), 12);
    }

    #[test]
    fn test_apply_outcome_bumps_seq() {
        let mut s = new_match(20);
        apply_outcome(&mut s, BallOutcome::Wide).unwrap();
        apply_outcome(&mut s, BallOutcome::Dot).unwrap();
        assert_eq!(s.seq, 2);
    }

    // =====================================================================
    // Innings break
    // =====================================================================

    #[test]
    fn test_innings_break_after_full_quota_with_three_down() {
        // 117 dots and 3 wickets: 20 overs, 3 down.
        let mut s = new_match(20);
        for ball in 0..120 {
            let outcome = if ball % 40 == 39 {
                BallOutcome::Wicket
            } else if ball % 10 == 0 {
                BallOutcome::Four
            } else {
                BallOutcome::Dot
            };
            apply_outcome(&mut s, outcome).unwrap();
        }
        assert_eq!(s.balls_bowled, 120);
        assert_eq!(s.wickets, 3);
        assert!(s.innings_over);
        let first_score = s.score;

        let second = handle_innings_break(&s).unwrap();
        assert_eq!(second.innings, Innings::Second);
        assert_eq!(second.target, Some(first_score));
        assert_eq!(second.balls_bowled, 0);
        assert_eq!(second.score, 0);
        assert_eq!(second.wickets, 0);
        assert_eq!(second.batting_team.id, "b");
        assert_eq!(second.striker_id, PlayerId(101));
        assert_eq!(second.bowler_id, PlayerId(11));
        assert_eq!(second.seq, s.seq + 1);
        assert_eq!(second.innings1.as_ref().unwrap().score, first_score);
    }

    #[test]
    fn test_innings_break_mid_innings_is_rejected() {
        let s = new_match(20);
        assert_eq!(handle_innings_break(&s), Err(EngineError::NotAtInningsBreak));
    }

    // =====================================================================
    // Chase resolution
    // =====================================================================

    fn chase(target: u32) -> MatchState {
        let mut s = new_match(1);
        s.innings_over = true;
        let mut second = handle_innings_break(&s).unwrap();
        second.target = Some(target);
        second
    }

    #[test]
    fn test_chase_won_when_score_passes_target() {
        let mut s = chase(5);
        apply_outcome(&mut s, BallOutcome::Six).unwrap();
        assert!(s.is_match_over);
        assert_eq!(
            s.winner,
            Some(MatchResult::Team { id: "b".into(), name: "B".into() })
        );
        assert!(s.innings2.is_some());
    }

    #[test]
    fn test_chase_level_at_end_is_tie() {
        let mut s = chase(4);
        apply_outcome(&mut s, BallOutcome::Four).unwrap();
        assert!(!s.is_match_over, "level scores mid-innings is not a result");
        for _ in 0..5 {
            apply_outcome(&mut s, BallOutcome::Dot).unwrap();
        }
        assert!(s.is_match_over);
        assert_eq!(s.winner, Some(MatchResult::Tie));
    }

    #[test]
    fn test_chase_short_at_end_bowling_side_wins() {
        let mut s = chase(30);
        for _ in 0..6 {
            apply_outcome(&mut s, BallOutcome::Dot).unwrap();
        }
        assert!(s.is_match_over);
        assert_eq!(
            s.winner,
            Some(MatchResult::Team { id: "a".into(), name: "A".into() })
        );
    }

    // =====================================================================
    // MatchEngine
    // =====================================================================

    #[test]
    fn test_advance_does_not_mutate_input() {
        let s = new_match(20);
        let before = s.clone();
        let mut engine = MatchEngine::seeded(7);
        let next = engine.advance(&s).unwrap();
        assert_eq!(s, before);
        assert_eq!(next.seq, 1);
    }

    #[test]
    fn test_advance_is_deterministic_for_seed() {
        let s = new_match(20);
        let a = MatchEngine::seeded(42).advance_many(&s, 60).unwrap();
        let b = MatchEngine::seeded(42).advance_many(&s, 60).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_advance_after_match_over_is_error() {
        let mut s = chase(0);
        apply_outcome(&mut s, BallOutcome::One).unwrap();
        assert!(s.is_match_over);
        let mut engine = MatchEngine::seeded(1);
        assert_eq!(engine.advance(&s), Err(EngineError::MatchOver));
    }

    #[test]
    fn test_advance_unknown_striker_is_stale() {
        let mut s = new_match(20);
        s.striker_id = PlayerId(999);
        let mut engine = MatchEngine::seeded(1);
        assert_eq!(engine.advance(&s), Err(EngineError::StalePlayer(PlayerId(999))));
    }

    #[test]
    fn test_invariants_hold_over_many_seeds() {
        for seed in 0..200 {
            let mut engine = MatchEngine::seeded(seed);
            let mut s = new_match(5);
            let mut last_balls = 0;
            while !s.innings_over {
                s = engine.advance(&s).unwrap();
                assert!(s.wickets <= s.max_wickets());
                assert!(s.balls_bowled >= last_balls);
                assert!(s.balls_bowled <= s.ball_limit());
                assert_ne!(s.striker_id, s.non_striker_id);
                assert!(s.batting_team.player(s.striker_id).is_some());
                last_balls = s.balls_bowled;
            }

            s = handle_innings_break(&s).unwrap();
            while !s.is_match_over {
                s = engine.advance(&s).unwrap();
                assert!(s.wickets <= s.max_wickets());
            }
            // Exactly one result once the chase ends.
            let target = s.target.unwrap();
            match s.winner.as_ref().unwrap() {
                MatchResult::Tie => assert_eq!(s.score, target),
                MatchResult::Team { id, .. } if id == "b" => assert!(s.score > target),
                MatchResult::Team { .. } => assert!(s.score < target),
            }
        }
    }
}
