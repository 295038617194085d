//! Tournament progression for Crease.
//!
//! A tournament is a round-robin league followed by knockouts. All functions
//! here are pure: given the same fixtures, table and phase they always
//! produce the same result, so every peer and the server agree on seeding.
//!
//! ```text
//! league (all pairs) ──all played──▶ ≤4 teams: final (1 v 2)
//!                                    >4 teams: semis (1 v 4, 2 v 3) ──▶ final
//! final played ──▶ complete
//! ```

mod error;
mod fixture;
mod phase;
mod standings;

pub use error::TournamentError;
pub use fixture::{Fixture, FixtureOutcome, FixtureResult, Stage, generate_fixtures};
pub use phase::{PhaseAdvance, TournamentPhase, champion, check_phase_advance};
pub use standings::{TournamentTeam, complete_fixture, rank};
