//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::MatchRegistry;
use crate::lobby::LobbyService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub lobby: Arc<LobbyService>,
    pub match_registry: Arc<MatchRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Initialize match registry
        let match_registry = Arc::new(MatchRegistry::new(config.match_rules(), config.match_seed));

        // Lobby service fronts the registry for every session
        let lobby = Arc::new(LobbyService::new(match_registry.clone()));

        Self {
            config,
            lobby,
            match_registry,
        }
    }
}
