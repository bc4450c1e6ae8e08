//! Win evaluation

use std::fmt;

use serde::{Deserialize, Serialize};

use super::catalog::Side;
use super::unit::Unit;

/// Why a match ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VictoryReason {
    /// The loser's base reached zero hit points
    BaseDestroyed,
    /// Every non-base unit of the loser is destroyed
    SquadEliminated,
    /// The loser left mid-battle
    Forfeit,
}

impl fmt::Display for VictoryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VictoryReason::BaseDestroyed => f.write_str("base destroyed"),
            VictoryReason::SquadEliminated => f.write_str("squad eliminated"),
            VictoryReason::Forfeit => f.write_str("opponent left the match"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Victory {
    pub winner: Side,
    pub reason: VictoryReason,
}

impl Victory {
    pub fn forfeit(winner: Side) -> Self {
        Self {
            winner,
            reason: VictoryReason::Forfeit,
        }
    }

    /// Human readable summary sent with the game-over event
    pub fn describe(&self) -> String {
        let loser = self.winner.opponent();
        match self.reason {
            VictoryReason::BaseDestroyed => format!("The {loser} base was destroyed. {} wins.", self.winner),
            VictoryReason::SquadEliminated => format!("The {loser} squad was eliminated. {} wins.", self.winner),
            VictoryReason::Forfeit => format!("{loser} left the match. {} wins by forfeit.", self.winner),
        }
    }
}

/// Check the roster for a winner.
///
/// Base destruction is checked for both sides before any squad check, so it wins
/// over a simultaneous wipe. A side that never fielded a squad unit cannot lose by
/// elimination.
pub fn evaluate(units: &[Unit]) -> Option<Victory> {
    for side in Side::BOTH {
        let base_destroyed = units
            .iter()
            .any(|u| u.is_base() && u.owner == side && !u.is_alive());
        if base_destroyed {
            return Some(Victory {
                winner: side.opponent(),
                reason: VictoryReason::BaseDestroyed,
            });
        }
    }

    for side in Side::BOTH {
        let mut squad = units.iter().filter(|u| u.owner == side && !u.is_base()).peekable();
        if squad.peek().is_none() {
            continue;
        }
        if !squad.any(Unit::is_alive) {
            return Some(Victory {
                winner: side.opponent(),
                reason: VictoryReason::SquadEliminated,
            });
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::catalog::{Cell, UnitKind};
    use crate::game::unit::UnitId;

    fn roster() -> Vec<Unit> {
        vec![
            Unit::base(Side::North, Cell::new(5, 0)),
            Unit::base(Side::South, Cell::new(5, 10)),
            Unit::new(UnitId::squad(Side::North, 0), UnitKind::Tanker, Side::North, Cell::new(5, 1)),
            Unit::new(UnitId::squad(Side::South, 0), UnitKind::Tanker, Side::South, Cell::new(5, 9)),
        ]
    }

    #[test]
    fn no_winner_while_everything_stands() {
        assert_eq!(evaluate(&roster()), None);
    }

    #[test]
    fn destroyed_base_loses() {
        let mut units = roster();
        units[1].hit_points = 0;
        assert_eq!(
            evaluate(&units),
            Some(Victory { winner: Side::North, reason: VictoryReason::BaseDestroyed })
        );
    }

    #[test]
    fn base_destruction_beats_simultaneous_wipe() {
        let mut units = roster();
        units[0].hit_points = 0;
        units[3].hit_points = 0;
        assert_eq!(
            evaluate(&units),
            Some(Victory { winner: Side::South, reason: VictoryReason::BaseDestroyed })
        );
    }

    #[test]
    fn wiped_squad_loses() {
        let mut units = roster();
        units[2].hit_points = 0;
        assert_eq!(
            evaluate(&units),
            Some(Victory { winner: Side::South, reason: VictoryReason::SquadEliminated })
        );
    }

    #[test]
    fn side_without_squad_cannot_be_eliminated() {
        let units: Vec<Unit> = roster().into_iter().filter(|u| u.owner == Side::North || u.is_base()).collect();
        assert_eq!(evaluate(&units), None);
    }

    #[test]
    fn describe_names_both_sides() {
        let text = Victory { winner: Side::North, reason: VictoryReason::BaseDestroyed }.describe();
        assert_eq!(text, "The south base was destroyed. north wins.");
    }
}
