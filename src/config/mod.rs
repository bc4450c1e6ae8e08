//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::game::catalog::{DEFAULT_BOARD_COLS, DEFAULT_BOARD_ROWS, DEFAULT_SQUAD_SIZE};
use crate::game::{Board, MatchRules};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS, comma-separated; `*` allows any
    pub client_origin: String,

    pub board_cols: i32,
    pub board_rows: i32,
    /// Units each side must bring
    pub squad_size: usize,
    /// Fixed initiative seed for every match (testing)
    pub match_seed: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // Render-style PORT wins over SERVER_ADDR
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port.trim()),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        };

        let config = Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress(server_addr.clone()))?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            client_origin: lookup("CLIENT_ORIGIN").unwrap_or_else(|| "*".to_string()),
            board_cols: parse_or(&lookup, "BOARD_COLS", DEFAULT_BOARD_COLS)?,
            board_rows: parse_or(&lookup, "BOARD_ROWS", DEFAULT_BOARD_ROWS)?,
            squad_size: parse_or(&lookup, "SQUAD_SIZE", DEFAULT_SQUAD_SIZE)?,
            match_seed: lookup("MATCH_SEED")
                .map(|raw| parse_value("MATCH_SEED", &raw))
                .transpose()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// The board must hold a base row and a squad row per side with the squad fitting in a row
    fn validate(&self) -> Result<(), ConfigError> {
        if self.board_rows < 4 {
            return Err(ConfigError::Invalid {
                key: "BOARD_ROWS",
                reason: "at least 4 rows are needed".to_string(),
            });
        }
        if self.board_cols < 1 {
            return Err(ConfigError::Invalid {
                key: "BOARD_COLS",
                reason: "at least 1 column is needed".to_string(),
            });
        }
        if self.squad_size == 0 || self.squad_size > self.board_cols as usize {
            return Err(ConfigError::Invalid {
                key: "SQUAD_SIZE",
                reason: format!("must be between 1 and {}", self.board_cols),
            });
        }
        Ok(())
    }

    pub fn match_rules(&self) -> MatchRules {
        MatchRules {
            board: Board {
                cols: self.board_cols,
                rows: self.board_rows,
            },
            squad_size: self.squad_size,
        }
    }

    /// Parsed CORS origins; `None` means any origin
    pub fn allowed_origins(&self) -> Option<Vec<String>> {
        let origins: Vec<String> = self
            .client_origin
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            None
        } else {
            Some(origins)
        }
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        reason: format!("cannot parse {raw:?}"),
    })
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address format: {0}")]
    InvalidAddress(String),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
