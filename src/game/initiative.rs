//! Initiative scheduler: round ordering and the single active unit

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::unit::{Unit, UnitId};

/// What the active unit has done during the current activation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationState {
    pub has_moved: bool,
    pub has_attacked: bool,
}

/// Per-match turn scheduler.
///
/// The order is fixed when a round starts: living non-base units sorted by speed,
/// highest first, with ties broken by a seeded shuffle. Units that die before their
/// slot comes up are skipped, never removed from the order.
#[derive(Debug, Clone)]
pub struct Initiative {
    round: u32,
    order: Vec<UnitId>,
    /// Position in `order` of the unit currently resolving, `None` before the first
    cursor: Option<usize>,
    active: Option<UnitId>,
    activation: ActivationState,
    rng: ChaCha8Rng,
}

impl Initiative {
    pub fn new(seed: u64) -> Self {
        Self::with_rng(ChaCha8Rng::seed_from_u64(seed))
    }

    pub fn with_rng(rng: ChaCha8Rng) -> Self {
        Self {
            round: 0,
            order: Vec::new(),
            cursor: None,
            active: None,
            activation: ActivationState::default(),
            rng,
        }
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn order(&self) -> &[UnitId] {
        &self.order
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn active(&self) -> Option<&UnitId> {
        self.active.as_ref()
    }

    pub fn activation(&self) -> Option<ActivationState> {
        self.active.as_ref().map(|_| self.activation)
    }

    pub fn is_active(&self, unit_id: &UnitId) -> bool {
        self.active.as_ref() == Some(unit_id)
    }

    pub fn mark_moved(&mut self) {
        self.activation.has_moved = true;
    }

    pub fn mark_attacked(&mut self) {
        self.activation.has_attacked = true;
    }

    /// Compute a fresh round from the current roster. The round counter always
    /// increments, even when nobody is eligible.
    pub fn start_round(&mut self, units: &[Unit]) {
        self.round += 1;

        let mut eligible: Vec<&Unit> = units.iter().filter(|u| u.can_act()).collect();
        // Random tiebreaker, then a stable sort keeps the shuffled order within equal speeds
        eligible.shuffle(&mut self.rng);
        eligible.sort_by(|a, b| b.stats.speed.cmp(&a.stats.speed));

        self.order = eligible.into_iter().map(|u| u.id.clone()).collect();
        self.cursor = None;
        self.active = None;
        self.activation = ActivationState::default();

        if self.order.is_empty() {
            info!(round = self.round, "No eligible units, scheduler idle");
        } else {
            info!(round = self.round, order = ?self.order, "Round started");
        }
    }

    /// End the current activation (if any) and activate the next living unit,
    /// rolling into a new round when the current one is exhausted.
    ///
    /// Returns the newly active unit, or `None` if nobody is eligible.
    pub fn advance(&mut self, units: &[Unit]) -> Option<&UnitId> {
        if let Some(previous) = self.active.take() {
            debug!(unit_id = %previous, "Activation finished");
        }
        self.activation = ActivationState::default();

        if !self.activate_from_cursor(units) {
            self.start_round(units);
            self.activate_from_cursor(units);
        }

        self.active.as_ref()
    }

    /// Deactivate without advancing, used once the match has a winner
    pub fn halt(&mut self) {
        self.active = None;
        self.activation = ActivationState::default();
    }

    /// Walk forward from the cursor to the next living unit. Bounded by the order length.
    fn activate_from_cursor(&mut self, units: &[Unit]) -> bool {
        let start = self.cursor.map_or(0, |c| c + 1);
        for idx in start..self.order.len() {
            self.cursor = Some(idx);
            let id = &self.order[idx];
            let alive = units.iter().any(|u| &u.id == id && u.can_act());
            if alive {
                debug!(round = self.round, unit_id = %id, "Unit activated");
                self.active = Some(id.clone());
                return true;
            }
            debug!(round = self.round, unit_id = %id, "Skipping destroyed unit");
        }
        false
    }
}
