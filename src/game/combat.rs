//! Combat rules: move, attack and finish commands, plus legal-action enumeration

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::battle::BattleState;
use super::catalog::{Cell, Side};
use super::unit::{Unit, UnitId};
use super::victory::{self, Victory};

/// Rejected battle command. Never mutates state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Match already ended")]
    MatchEnded,

    #[error("It is not {0}'s turn")]
    NotActiveUnit(UnitId),

    #[error("You cannot command the opponent's unit {0}")]
    NotYourUnit(UnitId),

    #[error("Unit has already moved this activation")]
    AlreadyMoved,

    #[error("Unit has already attacked this activation")]
    AlreadyAttacked,

    #[error("Target {0} is outside the board")]
    OutOfBounds(Cell),

    #[error("Target {cell} is occupied by {occupant}")]
    CellOccupied { cell: Cell, occupant: UnitId },

    #[error("Unit must move to a different cell")]
    ZeroDistance,

    #[error("Target is too far ({distance} > {speed})")]
    TooFar { distance: u32, speed: u32 },

    #[error("Target unit {0} not found")]
    TargetNotFound(UnitId),

    #[error("Target {0} is already destroyed")]
    TargetDestroyed(UnitId),

    #[error("Cannot attack your own unit {0}")]
    FriendlyTarget(UnitId),

    #[error("Bases cannot attack")]
    BaseCannotAttack,

    #[error("Target is out of range ({distance} > {range})")]
    OutOfRange { distance: u32, range: u32 },

    #[error("{0} cannot attack adjacent targets")]
    AdjacentTarget(UnitId),
}

impl CommandError {
    pub fn code(&self) -> &'static str {
        match self {
            CommandError::MatchEnded => "match_ended",
            CommandError::NotActiveUnit(_) => "not_active_unit",
            CommandError::NotYourUnit(_) => "not_your_unit",
            CommandError::AlreadyMoved => "already_moved",
            CommandError::AlreadyAttacked => "already_attacked",
            CommandError::OutOfBounds(_) => "out_of_bounds",
            CommandError::CellOccupied { .. } => "cell_occupied",
            CommandError::ZeroDistance => "zero_distance",
            CommandError::TooFar { .. } => "too_far",
            CommandError::TargetNotFound(_) => "target_not_found",
            CommandError::TargetDestroyed(_) => "target_destroyed",
            CommandError::FriendlyTarget(_) => "friendly_target",
            CommandError::BaseCannotAttack => "base_cannot_attack",
            CommandError::OutOfRange { .. } => "out_of_range",
            CommandError::AdjacentTarget(_) => "adjacent_target",
        }
    }
}

/// Result of an accepted move
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    pub unit_id: UnitId,
    pub from: Cell,
    pub to: Cell,
    /// No enemy was in range after the move, so the activation ended
    pub activation_ended: bool,
}

/// Result of an accepted attack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackOutcome {
    pub attacker_id: UnitId,
    pub target_id: UnitId,
    pub target_hit_points: u32,
    pub destroyed: bool,
    pub victory: Option<Victory>,
}

/// Legal options for the active unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalActions {
    pub unit_id: UnitId,
    /// Empty cells reachable this activation; empty once the unit has moved
    pub moves: Vec<Cell>,
    /// Enemies that can be attacked right now; empty once the unit has attacked
    pub targets: Vec<UnitId>,
}

/// Whether `attacker` may hit `target` from where both stand.
/// Shared by attack validation and target enumeration.
pub fn check_target(attacker: &Unit, target: &Unit) -> Result<(), CommandError> {
    if !target.is_alive() {
        return Err(CommandError::TargetDestroyed(target.id.clone()));
    }
    if target.owner == attacker.owner {
        return Err(CommandError::FriendlyTarget(target.id.clone()));
    }
    if attacker.is_base() {
        return Err(CommandError::BaseCannotAttack);
    }
    let distance = attacker.position.distance(target.position);
    if distance > attacker.stats.attack_range {
        return Err(CommandError::OutOfRange {
            distance,
            range: attacker.stats.attack_range,
        });
    }
    if attacker.stats.cannot_attack_adjacent && distance <= 1 {
        return Err(CommandError::AdjacentTarget(attacker.id.clone()));
    }
    Ok(())
}

impl BattleState {
    /// Move the active unit to `target`
    pub fn move_unit(
        &mut self,
        side: Side,
        unit_id: &UnitId,
        target: Cell,
    ) -> Result<MoveOutcome, CommandError> {
        let idx = self.acting_unit(side, unit_id)?;
        let activation = self.initiative.activation().unwrap_or_default();
        if activation.has_attacked {
            return Err(CommandError::AlreadyAttacked);
        }
        if activation.has_moved {
            return Err(CommandError::AlreadyMoved);
        }

        let unit = &self.units[idx];
        if !self.board.contains(target) {
            return Err(CommandError::OutOfBounds(target));
        }
        if target == unit.position {
            return Err(CommandError::ZeroDistance);
        }
        if let Some(occupant) = self.occupant(target) {
            return Err(CommandError::CellOccupied {
                cell: target,
                occupant: occupant.id.clone(),
            });
        }
        let distance = unit.position.distance(target);
        if distance > unit.stats.speed {
            return Err(CommandError::TooFar {
                distance,
                speed: unit.stats.speed,
            });
        }

        let from = unit.position;
        self.units[idx].position = target;
        self.initiative.mark_moved();
        debug!(unit_id = %unit_id, %from, to = %target, "Unit moved");

        let activation_ended = self.targets_for(&self.units[idx]).is_empty();
        if activation_ended {
            debug!(unit_id = %unit_id, "No enemy in range after move, ending activation");
            self.initiative.advance(&self.units);
        }

        Ok(MoveOutcome {
            unit_id: unit_id.clone(),
            from,
            to: target,
            activation_ended,
        })
    }

    /// Attack `target_id` with the active unit. Always ends the activation.
    pub fn attack(
        &mut self,
        side: Side,
        attacker_id: &UnitId,
        target_id: &UnitId,
    ) -> Result<AttackOutcome, CommandError> {
        let attacker_idx = self.acting_unit(side, attacker_id)?;
        if self.initiative.activation().unwrap_or_default().has_attacked {
            return Err(CommandError::AlreadyAttacked);
        }
        let target_idx = self
            .unit_index(target_id)
            .ok_or_else(|| CommandError::TargetNotFound(target_id.clone()))?;
        check_target(&self.units[attacker_idx], &self.units[target_idx])?;

        self.initiative.mark_attacked();
        let target_hit_points = self.units[target_idx].take_hit();
        let destroyed = target_hit_points == 0;
        debug!(
            attacker_id = %attacker_id,
            target_id = %target_id,
            target_hit_points,
            destroyed,
            "Attack resolved"
        );

        self.initiative.advance(&self.units);

        let victory = victory::evaluate(&self.units);
        if let Some(result) = victory {
            self.conclude(result);
        }

        Ok(AttackOutcome {
            attacker_id: attacker_id.clone(),
            target_id: target_id.clone(),
            target_hit_points,
            destroyed,
            victory,
        })
    }

    /// Voluntarily end the active unit's activation
    pub fn finish_activation(&mut self, side: Side, unit_id: &UnitId) -> Result<(), CommandError> {
        self.acting_unit(side, unit_id)?;
        if self.initiative.activation().unwrap_or_default().has_attacked {
            return Err(CommandError::AlreadyAttacked);
        }
        debug!(unit_id = %unit_id, "Activation finished by request");
        self.initiative.advance(&self.units);
        Ok(())
    }

    /// Enemies `unit` could attack from its current cell
    pub fn targets_for(&self, unit: &Unit) -> Vec<UnitId> {
        self.units
            .iter()
            .filter(|target| check_target(unit, target).is_ok())
            .map(|target| target.id.clone())
            .collect()
    }

    /// Empty cells `unit` could move to, ignoring what it already did this activation
    pub fn reachable_cells(&self, unit: &Unit) -> Vec<Cell> {
        let speed = unit.stats.speed as i32;
        let origin = unit.position;
        let mut cells = Vec::new();
        for dc in -speed..=speed {
            let spread = speed - dc.abs();
            for dr in -spread..=spread {
                let cell = Cell::new(origin.col + dc, origin.row + dr);
                if cell != origin && self.board.contains(cell) && self.occupant(cell).is_none() {
                    cells.push(cell);
                }
            }
        }
        cells
    }

    /// Everything the active unit may still do this activation
    pub fn legal_actions(&self) -> Option<LegalActions> {
        if self.is_over() {
            return None;
        }
        let unit = self.active_unit()?;
        let activation = self.initiative.activation().unwrap_or_default();

        let moves = if activation.has_moved || activation.has_attacked {
            Vec::new()
        } else {
            self.reachable_cells(unit)
        };
        let targets = if activation.has_attacked {
            Vec::new()
        } else {
            self.targets_for(unit)
        };

        Some(LegalActions {
            unit_id: unit.id.clone(),
            moves,
            targets,
        })
    }

    /// Shared precondition: match running, unit is active, caller owns it
    fn acting_unit(&self, side: Side, unit_id: &UnitId) -> Result<usize, CommandError> {
        if self.is_over() {
            return Err(CommandError::MatchEnded);
        }
        if !self.initiative.is_active(unit_id) {
            return Err(CommandError::NotActiveUnit(unit_id.clone()));
        }
        let idx = self
            .unit_index(unit_id)
            .ok_or_else(|| CommandError::NotActiveUnit(unit_id.clone()))?;
        if self.units[idx].owner != side {
            return Err(CommandError::NotYourUnit(unit_id.clone()));
        }
        Ok(idx)
    }
}
