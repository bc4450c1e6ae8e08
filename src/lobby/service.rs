//! Lobby service - routes session commands to matches and fans out the results

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use crate::game::r#match::CommandReport;
use crate::game::victory::Victory;
use crate::game::{
    Cell, GameError, LeaveOutcome, MatchHandle, MatchRegistry, ReadyOutcome, Side, UnitId,
};
use crate::ws::protocol::ServerMsg;

/// Where a session sits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seat {
    pub match_id: Uuid,
    pub side: Side,
}

/// A freshly taken seat: the confirmation for the caller and the match feed to listen on
#[derive(Debug)]
pub struct SeatGrant {
    pub seat: Seat,
    pub reply: ServerMsg,
    pub events: broadcast::Receiver<ServerMsg>,
}

/// Lobby service
pub struct LobbyService {
    registry: Arc<MatchRegistry>,
    /// Match list updates for every connected session
    lobby_tx: broadcast::Sender<ServerMsg>,
}

impl LobbyService {
    pub fn new(registry: Arc<MatchRegistry>) -> Self {
        let (lobby_tx, _) = broadcast::channel(64);
        Self { registry, lobby_tx }
    }

    pub fn registry(&self) -> &MatchRegistry {
        &self.registry
    }

    /// Whether the match is still in the registry
    pub fn is_live(&self, match_id: &Uuid) -> bool {
        self.registry.get(match_id).is_some()
    }

    pub fn subscribe_lobby(&self) -> broadcast::Receiver<ServerMsg> {
        self.lobby_tx.subscribe()
    }

    pub fn match_list(&self) -> ServerMsg {
        ServerMsg::MatchList {
            matches: self.registry.open_matches(),
        }
    }

    fn publish_match_list(&self) {
        let _ = self.lobby_tx.send(self.match_list());
    }

    pub fn create_match(&self, name: &str) -> SeatGrant {
        let (handle, side) = self.registry.create(name);
        let name = handle.game.lock().name().to_string();
        let events = handle.subscribe();

        info!(match_id = %handle.id, %side, "Match opened in lobby");
        self.publish_match_list();

        SeatGrant {
            seat: Seat {
                match_id: handle.id,
                side,
            },
            reply: ServerMsg::MatchCreated {
                match_id: handle.id,
                side,
                name,
            },
            events,
        }
    }

    pub fn join_match(&self, match_id: Uuid) -> Result<SeatGrant, GameError> {
        let (handle, (side, name, full)) = self.registry.with_match(&match_id, |game| {
            let side = game.join()?;
            Ok((side, game.name().to_string(), game.seated_count() == 2))
        })?;
        let events = handle.subscribe();

        handle.broadcast(ServerMsg::PlayerJoined { side });
        if full {
            handle.broadcast(ServerMsg::SetupStarted { match_id });
        }
        self.publish_match_list();

        Ok(SeatGrant {
            seat: Seat { match_id, side },
            reply: ServerMsg::MatchJoined {
                match_id,
                side,
                name,
            },
            events,
        })
    }

    pub fn declare_ready(&self, seat: Seat, units: &[String]) -> Result<(), GameError> {
        let (handle, outcome) = self
            .registry
            .with_match(&seat.match_id, |game| Ok(game.declare_ready(seat.side, units)?))?;

        handle.broadcast(ServerMsg::ReadyUpdate {
            side: seat.side,
            ready: true,
        });
        if let ReadyOutcome::BattleStarted(snapshot) = outcome {
            handle.broadcast(ServerMsg::BattleStart { state: *snapshot });
        }
        Ok(())
    }

    pub fn move_unit(&self, seat: Seat, unit_id: &UnitId, target: Cell) -> Result<(), GameError> {
        let (handle, report) = self
            .registry
            .with_match(&seat.match_id, |game| game.move_unit(seat.side, unit_id, target))?;
        debug!(
            match_id = %seat.match_id,
            unit_id = %unit_id,
            activation_ended = report.outcome.activation_ended,
            "Move accepted"
        );
        Self::publish_report(&handle, report);
        Ok(())
    }

    /// Returns the attack result meant for the attacker only
    pub fn attack(
        &self,
        seat: Seat,
        attacker_id: &UnitId,
        target_id: &UnitId,
    ) -> Result<ServerMsg, GameError> {
        let (handle, report) = self.registry.with_match(&seat.match_id, |game| {
            game.attack(seat.side, attacker_id, target_id)
        })?;
        let reply = ServerMsg::AttackResult {
            attacker_id: report.outcome.attacker_id.clone(),
            target_id: report.outcome.target_id.clone(),
            target_hit_points: report.outcome.target_hit_points,
            destroyed: report.outcome.destroyed,
        };
        Self::publish_report(&handle, report);
        Ok(reply)
    }

    pub fn finish_activation(&self, seat: Seat, unit_id: &UnitId) -> Result<(), GameError> {
        let (handle, report) = self
            .registry
            .with_match(&seat.match_id, |game| game.finish_activation(seat.side, unit_id))?;
        Self::publish_report(&handle, report);
        Ok(())
    }

    pub fn leave(&self, seat: Seat) -> Result<(), GameError> {
        let (handle, outcome) = self
            .registry
            .with_match(&seat.match_id, |game| Ok(game.leave(seat.side)?))?;

        match outcome {
            LeaveOutcome::BackToLobby { remaining } => {
                handle.broadcast(ServerMsg::OpponentLeftSetup {
                    match_id: seat.match_id,
                    remaining,
                });
            }
            LeaveOutcome::Forfeit(victory) => handle.broadcast(game_over(&victory)),
            LeaveOutcome::Closed => {}
        }
        self.publish_match_list();
        Ok(())
    }

    fn publish_report<T>(handle: &MatchHandle, report: CommandReport<T>) {
        handle.broadcast(ServerMsg::StateUpdate {
            state: report.snapshot,
        });
        if let Some(victory) = report.game_over {
            handle.broadcast(game_over(&victory));
        }
    }
}

fn game_over(victory: &Victory) -> ServerMsg {
    ServerMsg::GameOver {
        winner: victory.winner,
        reason: victory.reason,
        message: victory.describe(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::victory::VictoryReason;
    use crate::game::{Board, MatchRules};
    use tokio_test::{assert_err, assert_ok};

    fn service() -> LobbyService {
        let rules = MatchRules {
            board: Board::default(),
            squad_size: 1,
        };
        LobbyService::new(Arc::new(MatchRegistry::new(rules, Some(8))))
    }

    fn drain(rx: &mut broadcast::Receiver<ServerMsg>) -> Vec<ServerMsg> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    /// Two seated sessions with ready squads: north assassin vs south tanker
    fn battle(service: &LobbyService) -> (SeatGrant, SeatGrant) {
        let north = service.create_match("arena");
        let south = assert_ok!(service.join_match(north.seat.match_id));
        assert_ok!(service.declare_ready(north.seat, &["assassin".to_string()]));
        assert_ok!(service.declare_ready(south.seat, &["tanker".to_string()]));
        (north, south)
    }

    #[test]
    fn create_and_join_update_the_lobby() {
        let service = service();
        let mut lobby = service.subscribe_lobby();

        let north = service.create_match("arena");
        assert!(matches!(north.reply, ServerMsg::MatchCreated { side: Side::North, .. }));
        let listed = drain(&mut lobby);
        assert!(matches!(listed.last(), Some(ServerMsg::MatchList { matches }) if matches.len() == 1));

        let mut north_events = north.events;
        let south = assert_ok!(service.join_match(north.seat.match_id));
        assert_eq!(south.seat.side, Side::South);
        assert_eq!(
            drain(&mut north_events),
            vec![
                ServerMsg::PlayerJoined { side: Side::South },
                ServerMsg::SetupStarted { match_id: north.seat.match_id },
            ]
        );
        let listed = drain(&mut lobby);
        assert!(matches!(listed.last(), Some(ServerMsg::MatchList { matches }) if matches.is_empty()));
    }

    #[test]
    fn joining_a_full_match_is_rejected() {
        let service = service();
        let north = service.create_match("arena");
        assert_ok!(service.join_match(north.seat.match_id));
        let err = assert_err!(service.join_match(north.seat.match_id));
        assert_eq!(err.code(), "match_full");
    }

    #[test]
    fn battle_start_is_broadcast_to_both_sides() {
        let service = service();
        let (north, south) = battle(&service);
        let (mut north_events, mut south_events) = (north.events, south.events);

        for events in [drain(&mut north_events), drain(&mut south_events)] {
            assert!(events
                .iter()
                .any(|msg| matches!(msg, ServerMsg::BattleStart { state } if state.round == 1)));
        }
    }

    #[test]
    fn rejections_are_not_broadcast() {
        let service = service();
        let (north, south) = battle(&service);
        let mut south_events = south.events;
        drain(&mut south_events);

        let assassin = UnitId::squad(Side::North, 0);
        let err = assert_err!(service.move_unit(south.seat, &assassin, Cell::new(4, 4)));
        assert_eq!(err.code(), "not_your_unit");
        assert!(drain(&mut south_events).is_empty());

        assert_ok!(service.move_unit(north.seat, &assassin, Cell::new(5, 4)));
        assert!(matches!(
            drain(&mut south_events).as_slice(),
            [ServerMsg::StateUpdate { .. }]
        ));
    }

    #[test]
    fn attack_reply_goes_to_the_attacker_and_game_over_to_everyone() {
        let service = service();
        let (north, south) = battle(&service);
        let assassin = UnitId::squad(Side::North, 0);
        let tanker = UnitId::squad(Side::South, 0);

        // Assassin (5,1) runs to (5,8), next to the tanker on (5,9)
        assert_ok!(service.move_unit(north.seat, &assassin, Cell::new(5, 5)));
        assert_ok!(service.finish_activation(south.seat, &tanker));
        assert_ok!(service.move_unit(north.seat, &assassin, Cell::new(5, 8)));

        let reply = assert_ok!(service.attack(north.seat, &assassin, &tanker));
        assert_eq!(
            reply,
            ServerMsg::AttackResult {
                attacker_id: assassin.clone(),
                target_id: tanker.clone(),
                target_hit_points: 4,
                destroyed: false,
            }
        );

        let mut north_events = north.events;
        drain(&mut north_events);
        assert_ok!(service.leave(south.seat));
        let events = drain(&mut north_events);
        assert!(events.iter().any(|msg| matches!(
            msg,
            ServerMsg::GameOver { winner: Side::North, reason: VictoryReason::Forfeit, .. }
        )));
        assert!(service.registry().get(&north.seat.match_id).is_none());
    }

    #[test]
    fn leaving_setup_notifies_the_remaining_side() {
        let service = service();
        let north = service.create_match("arena");
        let south = assert_ok!(service.join_match(north.seat.match_id));
        let mut south_events = south.events;
        drain(&mut south_events);

        assert_ok!(service.leave(north.seat));
        assert_eq!(
            drain(&mut south_events),
            vec![ServerMsg::OpponentLeftSetup {
                match_id: north.seat.match_id,
                remaining: Side::South,
            }]
        );
        assert_eq!(service.registry().open_matches().len(), 1);
    }
}
