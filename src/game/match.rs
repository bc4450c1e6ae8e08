//! Match lifecycle coordinator: lobby, squad setup, battle, end

use tracing::{info, warn};
use uuid::Uuid;

use super::battle::BattleState;
use super::catalog::{parse_squad, Board, CatalogError, Cell, Side, UnitKind, DEFAULT_SQUAD_SIZE};
use super::combat::{AttackOutcome, CommandError, MoveOutcome};
use super::initiative::Initiative;
use super::snapshot::BattleSnapshot;
use super::unit::UnitId;
use super::victory::Victory;
use super::GameError;

pub type MatchId = Uuid;

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// Zero or one side seated
    Lobby,
    /// Both sides seated, picking squads
    Setup,
    /// Units on the board
    Battle,
    /// Winner decided or a side left mid-battle
    Ended,
}

/// Rules fixed for every match in the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchRules {
    pub board: Board,
    pub squad_size: usize,
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            board: Board::default(),
            squad_size: DEFAULT_SQUAD_SIZE,
        }
    }
}

/// Lifecycle rejection
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    #[error("Match is full")]
    MatchFull,

    #[error("Match already started")]
    AlreadyStarted,

    #[error("Must select exactly {expected} units (got {got})")]
    WrongSquadSize { expected: usize, got: usize },

    #[error(transparent)]
    InvalidSquad(#[from] CatalogError),

    #[error("Side {0} is not seated in this match")]
    NotSeated(Side),

    #[error("Battle has not started")]
    BattleNotStarted,
}

impl LobbyError {
    pub fn code(&self) -> &'static str {
        match self {
            LobbyError::MatchFull => "match_full",
            LobbyError::AlreadyStarted => "already_started",
            LobbyError::WrongSquadSize { .. } => "wrong_squad_size",
            LobbyError::InvalidSquad(_) => "invalid_squad",
            LobbyError::NotSeated(_) => "not_seated",
            LobbyError::BattleNotStarted => "battle_not_started",
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Seat {
    ready: bool,
    squad: Vec<UnitKind>,
}

/// Result of a readiness declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadyOutcome {
    /// Recorded; still waiting on the other side
    Waiting,
    /// Both sides ready, battle is live
    BattleStarted(Box<BattleSnapshot>),
}

/// Result of a side leaving
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// Left before the battle; the remaining side must confirm readiness again
    BackToLobby { remaining: Side },
    /// Left mid-battle; the remaining side wins
    Forfeit(Victory),
    /// Nobody left, or the match was already over
    Closed,
}

/// Accepted battle command: the fresh snapshot plus anything the caller should hear about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReport<T> {
    pub outcome: T,
    pub snapshot: BattleSnapshot,
    pub game_over: Option<Victory>,
}

/// One match. Owns the only mutable copy of the battle state.
#[derive(Debug)]
pub struct GameMatch {
    id: MatchId,
    name: String,
    phase: MatchPhase,
    rules: MatchRules,
    seed: u64,
    seats: [Option<Seat>; 2],
    battle: Option<BattleState>,
}

impl GameMatch {
    /// Create a match with its creator seated as north
    pub fn new(id: MatchId, name: impl Into<String>, rules: MatchRules, seed: u64) -> (Self, Side) {
        let name = name.into();
        let name = if name.trim().is_empty() {
            format!("Match {}", &id.to_string()[..8])
        } else {
            name
        };

        let game = Self {
            id,
            name,
            phase: MatchPhase::Lobby,
            rules,
            seed,
            seats: [Some(Seat::default()), None],
            battle: None,
        };
        info!(match_id = %id, name = %game.name, "Match created");
        (game, Side::North)
    }

    pub fn id(&self) -> MatchId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn seated_count(&self) -> usize {
        self.seats.iter().flatten().count()
    }

    pub fn is_seated(&self, side: Side) -> bool {
        self.seats[side.index()].is_some()
    }

    pub fn is_ready(&self, side: Side) -> bool {
        self.seats[side.index()].as_ref().is_some_and(|s| s.ready)
    }

    /// Listed in the lobby: waiting for a second side
    pub fn is_open(&self) -> bool {
        self.phase == MatchPhase::Lobby && self.seated_count() < 2
    }

    /// Nothing more can happen; the registry should drop it
    pub fn is_finished(&self) -> bool {
        self.phase == MatchPhase::Ended || self.seated_count() == 0
    }

    pub fn snapshot(&self) -> Option<BattleSnapshot> {
        self.battle.as_ref().map(BattleSnapshot::capture)
    }

    /// Seat a second side
    pub fn join(&mut self) -> Result<Side, LobbyError> {
        if matches!(self.phase, MatchPhase::Battle | MatchPhase::Ended) {
            return Err(LobbyError::AlreadyStarted);
        }
        let side = Side::BOTH
            .into_iter()
            .find(|side| !self.is_seated(*side))
            .ok_or(LobbyError::MatchFull)?;

        self.seats[side.index()] = Some(Seat::default());
        if self.seated_count() == 2 {
            self.phase = MatchPhase::Setup;
        }
        info!(match_id = %self.id, %side, phase = ?self.phase, "Side joined match");
        Ok(side)
    }

    /// Lock in a squad. Starts the battle once both sides are ready.
    pub fn declare_ready<S: AsRef<str>>(
        &mut self,
        side: Side,
        squad: &[S],
    ) -> Result<ReadyOutcome, LobbyError> {
        if matches!(self.phase, MatchPhase::Battle | MatchPhase::Ended) {
            return Err(LobbyError::AlreadyStarted);
        }
        if !self.is_seated(side) {
            return Err(LobbyError::NotSeated(side));
        }
        if squad.len() != self.rules.squad_size {
            return Err(LobbyError::WrongSquadSize {
                expected: self.rules.squad_size,
                got: squad.len(),
            });
        }
        let kinds = parse_squad(squad)?;

        self.seats[side.index()] = Some(Seat {
            ready: true,
            squad: kinds,
        });
        info!(match_id = %self.id, %side, "Side ready");

        match &self.seats {
            [Some(north), Some(south)] if north.ready && south.ready => {
                let battle = BattleState::from_squads(
                    self.rules.board,
                    &north.squad,
                    &south.squad,
                    Initiative::new(self.seed),
                );
                let snapshot = BattleSnapshot::capture(&battle);
                self.battle = Some(battle);
                self.phase = MatchPhase::Battle;
                info!(match_id = %self.id, seed = self.seed, "Both sides ready, battle started");
                Ok(ReadyOutcome::BattleStarted(Box::new(snapshot)))
            }
            _ => Ok(ReadyOutcome::Waiting),
        }
    }

    pub fn move_unit(
        &mut self,
        side: Side,
        unit_id: &UnitId,
        target: Cell,
    ) -> Result<CommandReport<MoveOutcome>, GameError> {
        self.command(side, |battle| battle.move_unit(side, unit_id, target))
    }

    pub fn attack(
        &mut self,
        side: Side,
        attacker_id: &UnitId,
        target_id: &UnitId,
    ) -> Result<CommandReport<AttackOutcome>, GameError> {
        self.command(side, |battle| battle.attack(side, attacker_id, target_id))
    }

    pub fn finish_activation(
        &mut self,
        side: Side,
        unit_id: &UnitId,
    ) -> Result<CommandReport<()>, GameError> {
        self.command(side, |battle| battle.finish_activation(side, unit_id))
    }

    /// A side leaves (explicitly or by disconnecting)
    pub fn leave(&mut self, side: Side) -> Result<LeaveOutcome, LobbyError> {
        if self.seats[side.index()].take().is_none() {
            return Err(LobbyError::NotSeated(side));
        }
        info!(match_id = %self.id, %side, phase = ?self.phase, "Side left match");

        let remaining = side.opponent();
        let outcome = match self.phase {
            MatchPhase::Lobby | MatchPhase::Setup => {
                if let Some(seat) = self.seats[remaining.index()].as_mut() {
                    seat.ready = false;
                    self.phase = MatchPhase::Lobby;
                    LeaveOutcome::BackToLobby { remaining }
                } else {
                    LeaveOutcome::Closed
                }
            }
            MatchPhase::Battle => {
                let victory = Victory::forfeit(remaining);
                if let Some(battle) = self.battle.as_mut() {
                    battle.forfeit(remaining);
                } else {
                    warn!(match_id = %self.id, "Battle phase without battle state");
                }
                self.phase = MatchPhase::Ended;
                LeaveOutcome::Forfeit(victory)
            }
            MatchPhase::Ended => LeaveOutcome::Closed,
        };
        Ok(outcome)
    }

    /// Run a battle command and package the result
    fn command<T>(
        &mut self,
        side: Side,
        apply: impl FnOnce(&mut BattleState) -> Result<T, CommandError>,
    ) -> Result<CommandReport<T>, GameError> {
        match self.phase {
            MatchPhase::Battle => {}
            MatchPhase::Ended => return Err(CommandError::MatchEnded.into()),
            MatchPhase::Lobby | MatchPhase::Setup => return Err(LobbyError::BattleNotStarted.into()),
        }
        if !self.is_seated(side) {
            return Err(LobbyError::NotSeated(side).into());
        }
        let battle = self
            .battle
            .as_mut()
            .ok_or_else(|| GameError::Internal("battle state missing".to_string()))?;

        let outcome = apply(battle)?;
        let game_over = battle.victory().copied();
        let snapshot = BattleSnapshot::capture(battle);
        if let Some(victory) = game_over {
            self.phase = MatchPhase::Ended;
            info!(match_id = %self.id, winner = %victory.winner, reason = %victory.reason, "Match ended");
        }

        Ok(CommandReport {
            outcome,
            snapshot,
            game_over,
        })
    }
}
