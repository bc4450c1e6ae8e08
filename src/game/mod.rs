//! Game rules and match management

pub mod battle;
pub mod catalog;
pub mod combat;
pub mod initiative;
pub mod r#match;
pub mod registry;
pub mod snapshot;
pub mod unit;
pub mod victory;

pub use catalog::{Board, Cell, Side, UnitKind};
pub use r#match::{GameMatch, LeaveOutcome, LobbyError, MatchId, MatchRules, ReadyOutcome};
pub use registry::{MatchHandle, MatchRegistry};
pub use unit::UnitId;

use combat::CommandError;

/// Any rejection or failure a match command can produce
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Match {0} not found")]
    MatchNotFound(MatchId),

    #[error(transparent)]
    Lobby(#[from] LobbyError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl GameError {
    /// Stable machine-readable code for the wire
    pub fn code(&self) -> &'static str {
        match self {
            GameError::MatchNotFound(_) => "match_not_found",
            GameError::Lobby(e) => e.code(),
            GameError::Command(e) => e.code(),
            GameError::Internal(_) => "internal_error",
        }
    }
}
