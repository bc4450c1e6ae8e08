//! Registry of live matches

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

use crate::ws::protocol::{MatchInfo, ServerMsg};

use super::catalog::Side;
use super::r#match::{GameMatch, MatchId, MatchRules};
use super::GameError;

/// Handle to a live match
#[derive(Debug, Clone)]
pub struct MatchHandle {
    pub id: MatchId,
    pub game: Arc<Mutex<GameMatch>>,
    /// Messages for both participants
    pub events_tx: broadcast::Sender<ServerMsg>,
}

impl MatchHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.events_tx.subscribe()
    }

    /// Send to both participants. Nobody listening is fine.
    pub fn broadcast(&self, msg: ServerMsg) {
        let _ = self.events_tx.send(msg);
    }
}

/// Registry of all live matches. Each match is locked independently.
pub struct MatchRegistry {
    matches: DashMap<MatchId, MatchHandle>,
    rules: MatchRules,
    /// Same initiative seed for every match when set
    fixed_seed: Option<u64>,
}

impl MatchRegistry {
    pub fn new(rules: MatchRules, fixed_seed: Option<u64>) -> Self {
        Self {
            matches: DashMap::new(),
            rules,
            fixed_seed,
        }
    }

    pub fn rules(&self) -> MatchRules {
        self.rules
    }

    /// Create a match and seat the caller
    pub fn create(&self, name: &str) -> (MatchHandle, Side) {
        let id = Uuid::new_v4();
        let seed = self.fixed_seed.unwrap_or_else(rand::random::<u64>);
        let (game, side) = GameMatch::new(id, name, self.rules, seed);
        let (events_tx, _) = broadcast::channel(64);

        let handle = MatchHandle {
            id,
            game: Arc::new(Mutex::new(game)),
            events_tx,
        };
        self.matches.insert(id, handle.clone());
        (handle, side)
    }

    pub fn get(&self, id: &MatchId) -> Option<MatchHandle> {
        self.matches.get(id).map(|m| m.value().clone())
    }

    pub fn remove(&self, id: &MatchId) -> Option<MatchHandle> {
        let removed = self.matches.remove(id).map(|(_, h)| h);
        if removed.is_some() {
            info!(match_id = %id, "Match removed from registry");
        }
        removed
    }

    /// Lock one match and run `f` against it. A match that `f` leaves finished is retired.
    pub fn with_match<T>(
        &self,
        id: &MatchId,
        f: impl FnOnce(&mut GameMatch) -> Result<T, GameError>,
    ) -> Result<(MatchHandle, T), GameError> {
        let handle = self.get(id).ok_or(GameError::MatchNotFound(*id))?;
        let (result, finished) = {
            let mut game = handle.game.lock();
            let result = f(&mut *game);
            (result, game.is_finished())
        };
        if finished {
            self.remove(id);
        }
        result.map(|value| (handle, value))
    }

    pub fn active_matches(&self) -> usize {
        self.matches.len()
    }

    /// Matches waiting for a second side
    pub fn open_matches(&self) -> Vec<MatchInfo> {
        let mut open: Vec<MatchInfo> = self
            .matches
            .iter()
            .filter_map(|entry| {
                let game = entry.value().game.lock();
                game.is_open().then(|| MatchInfo {
                    match_id: game.id(),
                    name: game.name().to_string(),
                    player_count: game.seated_count(),
                })
            })
            .collect();
        open.sort_by(|a, b| a.name.cmp(&b.name).then(a.match_id.cmp(&b.match_id)));
        open
    }
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self::new(MatchRules::default(), None)
    }
}
