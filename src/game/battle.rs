//! Authoritative battle state for one match

use tracing::info;

use super::catalog::{Board, Cell, Side, UnitKind};
use super::initiative::{ActivationState, Initiative};
use super::unit::{Unit, UnitId};
use super::victory::Victory;

/// Everything the rules engine, scheduler and win evaluator share.
/// Owned exclusively by the match coordinator.
#[derive(Debug, Clone)]
pub struct BattleState {
    pub(super) board: Board,
    /// Bases first, then squads in slot order. Never shrinks.
    pub(super) units: Vec<Unit>,
    pub(super) initiative: Initiative,
    pub(super) victory: Option<Victory>,
}

impl BattleState {
    /// Place the roster and activate the first unit of round one
    pub fn start(board: Board, units: Vec<Unit>, initiative: Initiative) -> Self {
        let mut battle = Self {
            board,
            units,
            initiative,
            victory: None,
        };
        battle.initiative.start_round(&battle.units);
        battle.initiative.advance(&battle.units);

        info!(
            units = battle.units.len(),
            active = ?battle.initiative.active(),
            "Battle started"
        );
        battle
    }

    /// Build the reference layout: both bases plus each side's squad on its starting row
    pub fn from_squads(
        board: Board,
        north: &[UnitKind],
        south: &[UnitKind],
        initiative: Initiative,
    ) -> Self {
        let mut units = vec![
            Unit::base(Side::North, board.base_cell(Side::North)),
            Unit::base(Side::South, board.base_cell(Side::South)),
        ];
        for (side, squad) in [(Side::North, north), (Side::South, south)] {
            units.extend(squad.iter().enumerate().map(|(slot, kind)| {
                Unit::new(
                    UnitId::squad(side, slot),
                    *kind,
                    side,
                    board.squad_cell(side, slot, squad.len()),
                )
            }));
        }
        Self::start(board, units, initiative)
    }

    pub fn board(&self) -> Board {
        self.board
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn unit(&self, id: &UnitId) -> Option<&Unit> {
        self.units.iter().find(|u| &u.id == id)
    }

    pub(super) fn unit_index(&self, id: &UnitId) -> Option<usize> {
        self.units.iter().position(|u| &u.id == id)
    }

    /// Living unit standing on `cell`, bases included
    pub fn occupant(&self, cell: Cell) -> Option<&Unit> {
        self.units
            .iter()
            .find(|u| u.is_alive() && u.position == cell)
    }

    pub fn initiative(&self) -> &Initiative {
        &self.initiative
    }

    pub fn active_unit(&self) -> Option<&Unit> {
        self.initiative.active().and_then(|id| self.unit(id))
    }

    pub fn activation(&self) -> Option<ActivationState> {
        self.initiative.activation()
    }

    pub fn victory(&self) -> Option<&Victory> {
        self.victory.as_ref()
    }

    pub fn winner(&self) -> Option<Side> {
        self.victory.as_ref().map(|v| v.winner)
    }

    pub fn is_over(&self) -> bool {
        self.victory.is_some()
    }

    /// Record the result. The first result sticks; later calls are ignored.
    pub(super) fn conclude(&mut self, victory: Victory) {
        if self.victory.is_none() {
            info!(winner = %victory.winner, reason = %victory.reason, "Battle concluded");
            self.initiative.halt();
            self.victory = Some(victory);
        }
    }

    /// End the match in favour of `winner` because the other side left
    pub fn forfeit(&mut self, winner: Side) {
        self.conclude(Victory::forfeit(winner));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_layout_places_squads_around_center() {
        let squad = [UnitKind::Tanker; 5];
        let battle = BattleState::from_squads(Board::default(), &squad, &squad, Initiative::new(1));

        assert_eq!(battle.units().len(), 12);
        let north_cols: Vec<i32> = battle
            .units()
            .iter()
            .filter(|u| u.owner == Side::North && !u.is_base())
            .map(|u| u.position.col)
            .collect();
        assert_eq!(north_cols, vec![3, 4, 5, 6, 7]);
        assert!(battle
            .units()
            .iter()
            .filter(|u| u.owner == Side::South && !u.is_base())
            .all(|u| u.position.row == 9));
    }

    #[test]
    fn first_unit_is_active_after_start() {
        let battle = BattleState::from_squads(
            Board::default(),
            &[UnitKind::Tanker, UnitKind::Assassin],
            &[UnitKind::Ranger, UnitKind::Tanker],
            Initiative::new(9),
        );

        assert_eq!(battle.initiative().round(), 1);
        assert_eq!(battle.initiative().cursor(), Some(0));
        assert_eq!(battle.active_unit().map(|u| u.kind), Some(UnitKind::Assassin));
        assert_eq!(battle.activation(), Some(ActivationState::default()));
    }

    #[test]
    fn forfeit_is_final() {
        let squad = [UnitKind::Ranger];
        let mut battle = BattleState::from_squads(Board::default(), &squad, &squad, Initiative::new(2));
        battle.forfeit(Side::South);
        battle.forfeit(Side::North);

        assert_eq!(battle.winner(), Some(Side::South));
        assert!(battle.active_unit().is_none());
    }
}
