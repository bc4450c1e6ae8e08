//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::snapshot::BattleSnapshot;
use crate::game::victory::VictoryReason;
use crate::game::{Cell, Side, UnitId};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Request the open match list
    ListMatches,

    /// Open a new match; the creator is seated as north
    CreateMatch {
        #[serde(default)]
        name: String,
    },

    /// Take the free seat of an open match
    JoinMatch { match_id: Uuid },

    /// Lock in a squad (archetype names, exact squad size)
    Ready { match_id: Uuid, units: Vec<String> },

    /// Move the active unit
    Move {
        match_id: Uuid,
        unit_id: UnitId,
        target: Cell,
    },

    /// Attack with the active unit
    Attack {
        match_id: Uuid,
        attacker_id: UnitId,
        target_id: UnitId,
    },

    /// End the active unit's activation early
    FinishActivation { match_id: Uuid, unit_id: UnitId },

    /// Leave current match
    LeaveMatch { match_id: Uuid },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome { session_id: Uuid, server_time: u64 },

    /// Matches waiting for an opponent
    MatchList { matches: Vec<MatchInfo> },

    /// Confirmation of match creation
    MatchCreated {
        match_id: Uuid,
        side: Side,
        name: String,
    },

    /// Confirmation of match join
    MatchJoined {
        match_id: Uuid,
        side: Side,
        name: String,
    },

    /// A side took a seat
    PlayerJoined { side: Side },

    /// Both seats taken, squad selection open
    SetupStarted { match_id: Uuid },

    /// A side locked in (or lost) readiness
    ReadyUpdate { side: Side, ready: bool },

    /// The opponent left before the battle; readiness must be confirmed again
    OpponentLeftSetup { match_id: Uuid, remaining: Side },

    /// Units placed, first round computed
    BattleStart { state: BattleSnapshot },

    /// Sent after every accepted battle command
    StateUpdate { state: BattleSnapshot },

    /// Outcome of the caller's own attack
    AttackResult {
        attacker_id: UnitId,
        target_id: UnitId,
        target_hit_points: u32,
        destroyed: bool,
    },

    /// Match is over
    GameOver {
        winner: Side,
        reason: VictoryReason,
        message: String,
    },

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

impl ServerMsg {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Lobby listing entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchInfo {
    pub match_id: Uuid,
    pub name: String,
    pub player_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_move_command() {
        let json = r#"{"type":"move","match_id":"5f0c6d4e-8a57-4c3e-9b1e-2f6f3c1b2a10","unit_id":"unit-0-2","target":{"col":4,"row":3}}"#;
        let msg: ClientMsg = serde_json::from_str(json).unwrap();
        match msg {
            ClientMsg::Move { unit_id, target, .. } => {
                assert_eq!(unit_id.as_str(), "unit-0-2");
                assert_eq!(target, Cell::new(4, 3));
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn create_match_name_is_optional() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"create_match"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::CreateMatch { name } if name.is_empty()));
    }

    #[test]
    fn error_is_tagged() {
        let json = serde_json::to_value(ServerMsg::error("match_full", "Match is full")).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["code"], "match_full");
    }

    #[test]
    fn game_over_carries_reason() {
        let json = serde_json::to_value(ServerMsg::GameOver {
            winner: Side::South,
            reason: VictoryReason::Forfeit,
            message: "north left the match. south wins by forfeit.".to_string(),
        })
        .unwrap();
        assert_eq!(json["winner"], "south");
        assert_eq!(json["reason"], "forfeit");
    }
}
