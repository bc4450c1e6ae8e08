//! Units on the board

use std::fmt;

use serde::{Deserialize, Serialize};

use super::catalog::{Cell, Side, UnitKind, UnitStats};

/// Stable unit identifier (`base-<side>` or `unit-<side>-<slot>`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    pub fn base(side: Side) -> Self {
        Self(format!("base-{}", side.index()))
    }

    pub fn squad(side: Side, slot: usize) -> Self {
        Self(format!("unit-{}-{}", side.index(), slot))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UnitId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authoritative unit state. Units are never removed; zero hit points means destroyed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub id: UnitId,
    pub kind: UnitKind,
    pub owner: Side,
    pub position: Cell,
    pub hit_points: u32,
    pub stats: UnitStats,
}

impl Unit {
    pub fn new(id: UnitId, kind: UnitKind, owner: Side, position: Cell) -> Self {
        let stats = UnitStats::for_kind(kind);
        Self {
            id,
            kind,
            owner,
            position,
            hit_points: stats.max_hit_points,
            stats,
        }
    }

    pub fn base(owner: Side, position: Cell) -> Self {
        Self::new(UnitId::base(owner), UnitKind::Base, owner, position)
    }

    pub fn is_alive(&self) -> bool {
        self.hit_points > 0
    }

    pub fn is_base(&self) -> bool {
        self.kind == UnitKind::Base
    }

    /// Living, non-base: eligible for initiative
    pub fn can_act(&self) -> bool {
        self.is_alive() && !self.is_base()
    }

    /// Apply one point of damage, returns remaining hit points
    pub fn take_hit(&mut self) -> u32 {
        self.hit_points = self.hit_points.saturating_sub(1);
        self.hit_points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_follow_side_index() {
        assert_eq!(UnitId::base(Side::North).as_str(), "base-0");
        assert_eq!(UnitId::squad(Side::South, 3).as_str(), "unit-1-3");
    }

    #[test]
    fn hits_clamp_at_zero() {
        let mut ranger = Unit::new(
            UnitId::squad(Side::North, 0),
            UnitKind::Ranger,
            Side::North,
            Cell::new(0, 0),
        );
        assert_eq!(ranger.take_hit(), 1);
        assert_eq!(ranger.take_hit(), 0);
        assert_eq!(ranger.take_hit(), 0);
        assert!(!ranger.is_alive());
        assert!(!ranger.can_act());
    }

    #[test]
    fn bases_never_act() {
        let base = Unit::base(Side::South, Cell::new(5, 10));
        assert!(base.is_alive());
        assert!(!base.can_act());
        assert_eq!(base.hit_points, 5);
    }
}
