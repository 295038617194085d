//! Error types for the tournament scheduler.

/// Rejected tournament operations. Fixtures and table are unchanged when one
/// is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TournamentError {
    /// Fixtures need at least two teams.
    #[error("a tournament needs at least 2 teams, got {0}")]
    TooFewTeams(usize),

    #[error("fixture {0} not found")]
    UnknownFixture(u32),

    /// A played fixture is immutable.
    #[error("fixture {0} has already been played")]
    AlreadyPlayed(u32),

    #[error("team {0} is not in the tournament")]
    UnknownTeam(String),

    /// The winner or an innings names a team that is not in the fixture.
    #[error("team {team} did not play in fixture {fixture}")]
    NotInFixture { fixture: u32, team: String },
}
