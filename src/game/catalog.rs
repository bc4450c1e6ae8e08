//! Board geometry and the unit archetype table

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Reference board width
pub const DEFAULT_BOARD_COLS: i32 = 11;
/// Reference board height
pub const DEFAULT_BOARD_ROWS: i32 = 11;
/// Reference squad size
pub const DEFAULT_SQUAD_SIZE: usize = 5;

/// One of the two sides of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Base on row 0, always the match creator
    North,
    /// Base on the last row
    South,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::North, Side::South];

    pub fn opponent(self) -> Self {
        match self {
            Side::North => Side::South,
            Side::South => Side::North,
        }
    }

    /// Stable numeric index, used in unit ids
    pub fn index(self) -> usize {
        match self {
            Side::North => 0,
            Side::South => 1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::North => f.write_str("north"),
            Side::South => f.write_str("south"),
        }
    }
}

/// A board coordinate. Signed so that off-board requests can be represented and rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub col: i32,
    pub row: i32,
}

impl Cell {
    pub const fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    /// Manhattan distance, the only metric used for movement and range
    pub fn distance(self, other: Cell) -> u32 {
        self.col.abs_diff(other.col) + self.row.abs_diff(other.row)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

/// Fixed rectangular board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub cols: i32,
    pub rows: i32,
}

impl Board {
    pub const fn new(cols: i32, rows: i32) -> Self {
        Self { cols, rows }
    }

    pub fn contains(&self, cell: Cell) -> bool {
        (0..self.cols).contains(&cell.col) && (0..self.rows).contains(&cell.row)
    }

    /// Base cell for a side: centered column, first or last row
    pub fn base_cell(&self, side: Side) -> Cell {
        let row = match side {
            Side::North => 0,
            Side::South => self.rows - 1,
        };
        Cell::new(self.cols / 2, row)
    }

    /// Starting cell for squad slot `slot` of a squad of `squad_size` units
    pub fn squad_cell(&self, side: Side, slot: usize, squad_size: usize) -> Cell {
        let row = match side {
            Side::North => 1,
            Side::South => self.rows - 2,
        };
        let start_col = (self.cols - squad_size as i32) / 2;
        Cell::new(start_col + slot as i32, row)
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new(DEFAULT_BOARD_COLS, DEFAULT_BOARD_ROWS)
    }
}

/// Unit archetypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// Slow and sturdy melee
    Tanker,
    /// Long range, fragile, cannot hit adjacent cells
    Ranger,
    /// Fast melee
    Assassin,
    /// Immobile objective, never acts
    Base,
}

impl UnitKind {
    /// Whether the archetype may be picked for a squad
    pub fn is_selectable(self) -> bool {
        !matches!(self, UnitKind::Base)
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnitKind::Tanker => "Tanker",
            UnitKind::Ranger => "Ranger",
            UnitKind::Assassin => "Assassin",
            UnitKind::Base => "Base",
        };
        f.write_str(name)
    }
}

impl FromStr for UnitKind {
    type Err = CatalogError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "tanker" => Ok(UnitKind::Tanker),
            "ranger" => Ok(UnitKind::Ranger),
            "assassin" => Ok(UnitKind::Assassin),
            "base" => Ok(UnitKind::Base),
            _ => Err(CatalogError::UnknownArchetype(name.to_string())),
        }
    }
}

/// Per-archetype stats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitStats {
    /// Movement budget per activation
    pub speed: u32,
    pub max_hit_points: u32,
    /// Manhattan attack radius
    pub attack_range: u32,
    /// Targets at distance <= 1 are illegal
    pub cannot_attack_adjacent: bool,
}

impl UnitStats {
    pub fn for_kind(kind: UnitKind) -> Self {
        match kind {
            UnitKind::Tanker => Self {
                speed: 1,
                max_hit_points: 5,
                attack_range: 1,
                cannot_attack_adjacent: false,
            },
            UnitKind::Ranger => Self {
                speed: 3,
                max_hit_points: 2,
                attack_range: 4,
                cannot_attack_adjacent: true,
            },
            UnitKind::Assassin => Self {
                speed: 4,
                max_hit_points: 3,
                attack_range: 1,
                cannot_attack_adjacent: false,
            },
            UnitKind::Base => Self {
                speed: 0,
                max_hit_points: 5,
                attack_range: 0,
                cannot_attack_adjacent: false,
            },
        }
    }
}

/// Resolve a list of squad archetype names, failing on the first unknown or unselectable one
pub fn parse_squad<S: AsRef<str>>(names: &[S]) -> Result<Vec<UnitKind>, CatalogError> {
    names
        .iter()
        .map(|name| {
            let kind: UnitKind = name.as_ref().parse()?;
            if kind.is_selectable() {
                Ok(kind)
            } else {
                Err(CatalogError::NotSelectable(kind))
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("Unknown unit archetype: {0}")]
    UnknownArchetype(String),

    #[error("{0} cannot be selected for a squad")]
    NotSelectable(UnitKind),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archetype_names_are_case_insensitive() {
        assert_eq!("TANKER".parse::<UnitKind>(), Ok(UnitKind::Tanker));
        assert_eq!(" ranger ".parse::<UnitKind>(), Ok(UnitKind::Ranger));
        assert_eq!("Assassin".parse::<UnitKind>(), Ok(UnitKind::Assassin));
    }

    #[test]
    fn unknown_archetype_fails_fast() {
        let err = parse_squad(&["Tanker", "Wizard", "Ranger"]).unwrap_err();
        assert_eq!(err, CatalogError::UnknownArchetype("Wizard".to_string()));
    }

    #[test]
    fn base_is_not_selectable() {
        let err = parse_squad(&["base"]).unwrap_err();
        assert_eq!(err, CatalogError::NotSelectable(UnitKind::Base));
    }

    #[test]
    fn manhattan_distance() {
        assert_eq!(Cell::new(0, 0).distance(Cell::new(3, 4)), 7);
        assert_eq!(Cell::new(5, 5).distance(Cell::new(5, 5)), 0);
        assert_eq!(Cell::new(2, 7).distance(Cell::new(1, 9)), 3);
    }

    #[test]
    fn board_bounds() {
        let board = Board::default();
        assert!(board.contains(Cell::new(0, 0)));
        assert!(board.contains(Cell::new(10, 10)));
        assert!(!board.contains(Cell::new(11, 3)));
        assert!(!board.contains(Cell::new(-1, 3)));
    }

    #[test]
    fn reference_placement() {
        let board = Board::default();
        assert_eq!(board.base_cell(Side::North), Cell::new(5, 0));
        assert_eq!(board.base_cell(Side::South), Cell::new(5, 10));
        assert_eq!(board.squad_cell(Side::North, 0, 5), Cell::new(3, 1));
        assert_eq!(board.squad_cell(Side::South, 4, 5), Cell::new(7, 9));
    }
}
