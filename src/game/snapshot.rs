//! Broadcastable battle snapshots

use serde::{Deserialize, Serialize};

use super::battle::BattleState;
use super::catalog::{Cell, Side, UnitKind};
use super::combat::LegalActions;
use super::initiative::ActivationState;
use super::unit::{Unit, UnitId};

/// Unit as seen by clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    pub id: UnitId,
    pub kind: UnitKind,
    pub owner: Side,
    pub position: Cell,
    pub hit_points: u32,
    pub max_hit_points: u32,
    pub speed: u32,
    pub attack_range: u32,
}

impl From<&Unit> for UnitSnapshot {
    fn from(unit: &Unit) -> Self {
        Self {
            id: unit.id.clone(),
            kind: unit.kind,
            owner: unit.owner,
            position: unit.position,
            hit_points: unit.hit_points,
            max_hit_points: unit.stats.max_hit_points,
            speed: unit.stats.speed,
            attack_range: unit.stats.attack_range,
        }
    }
}

/// Owned copy of the battle state. Nothing in here aliases engine state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleSnapshot {
    pub board_cols: i32,
    pub board_rows: i32,
    /// Living units plus both bases, whatever their hit points
    pub units: Vec<UnitSnapshot>,
    pub round: u32,
    pub initiative_order: Vec<UnitId>,
    /// Position in `initiative_order` currently resolving
    pub initiative_index: Option<usize>,
    pub active_unit_id: Option<UnitId>,
    pub activation: Option<ActivationState>,
    /// Moves and targets available to the active unit
    pub legal_actions: Option<LegalActions>,
    pub winner: Option<Side>,
}

impl BattleSnapshot {
    pub fn capture(battle: &BattleState) -> Self {
        let board = battle.board();
        let initiative = battle.initiative();
        Self {
            board_cols: board.cols,
            board_rows: board.rows,
            units: battle
                .units()
                .iter()
                .filter(|u| u.is_alive() || u.is_base())
                .map(UnitSnapshot::from)
                .collect(),
            round: initiative.round(),
            initiative_order: initiative.order().to_vec(),
            initiative_index: initiative.cursor(),
            active_unit_id: initiative.active().cloned(),
            activation: battle.activation(),
            legal_actions: battle.legal_actions(),
            winner: battle.winner(),
        }
    }
}
