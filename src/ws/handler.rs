//! WebSocket upgrade handler

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::GameError;
use crate::lobby::{LobbyService, Seat, SeatGrant};
use crate::util::rate_limit::SessionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Outbound queue per session
const OUTBOUND_BUFFER: usize = 64;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let session_id = Uuid::new_v4();
    info!(%session_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    let welcome = ServerMsg::Welcome {
        session_id,
        server_time: unix_millis(),
    };
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(%session_id, error = %e, "Failed to send welcome");
        return;
    }

    // Everything for this client funnels through one queue into the writer task
    let (out_tx, out_rx) = mpsc::channel::<ServerMsg>(OUTBOUND_BUFFER);
    let writer_handle = tokio::spawn(write_loop(session_id, ws_sink, out_rx));
    let lobby_handle = tokio::spawn(forward_events(
        session_id,
        state.lobby.subscribe_lobby(),
        out_tx.clone(),
    ));

    let mut session = Session::new(session_id, state.lobby.clone(), out_tx);
    session.reply(state.lobby.match_list()).await;

    run_session(&mut session, ws_stream).await;

    // Socket gone: whatever seat the session held is given up
    session.disconnect();
    lobby_handle.abort();
    writer_handle.abort();

    info!(%session_id, "WebSocket connection closed");
}

/// Reader loop: WebSocket -> session
async fn run_session(session: &mut Session, mut ws_stream: SplitStream<WebSocket>) {
    let session_id = session.id;

    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !session.rate_limiter.check_message() {
                    warn!(%session_id, "Rate limited inbound message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(client_msg) => session.handle(client_msg).await,
                    Err(e) => {
                        warn!(%session_id, error = %e, "Failed to parse client message");
                        session
                            .reply(ServerMsg::error("bad_request", format!("Malformed message: {e}")))
                            .await;
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(%session_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(%session_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(%session_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(%session_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(%session_id, error = %e, "WebSocket error");
                break;
            }
        }
    }
}

/// Rejections produced by the session itself, before a match is touched
#[derive(Debug, thiserror::Error)]
enum SessionError {
    #[error("Not seated in match {0}")]
    NotInMatch(Uuid),

    #[error("Already seated in match {0}; leave it first")]
    AlreadySeated(Uuid),

    #[error("Too many lobby requests, slow down")]
    RateLimited,

    #[error(transparent)]
    Game(#[from] GameError),
}

impl SessionError {
    fn code(&self) -> &'static str {
        match self {
            SessionError::NotInMatch(_) => "not_in_match",
            SessionError::AlreadySeated(_) => "already_seated",
            SessionError::RateLimited => "rate_limited",
            SessionError::Game(e) => e.code(),
        }
    }
}

/// One connected client. Owns the seat it holds; side is never taken from the payload.
struct Session {
    id: Uuid,
    lobby: Arc<LobbyService>,
    out_tx: mpsc::Sender<ServerMsg>,
    seat: Option<Seat>,
    /// Forwards the seated match's broadcasts into `out_tx`
    match_feed: Option<JoinHandle<()>>,
    rate_limiter: SessionRateLimiter,
}

impl Session {
    fn new(id: Uuid, lobby: Arc<LobbyService>, out_tx: mpsc::Sender<ServerMsg>) -> Self {
        Self {
            id,
            lobby,
            out_tx,
            seat: None,
            match_feed: None,
            rate_limiter: SessionRateLimiter::new(),
        }
    }

    async fn reply(&self, msg: ServerMsg) {
        if self.out_tx.send(msg).await.is_err() {
            debug!(session_id = %self.id, "Outbound channel closed");
        }
    }

    async fn handle(&mut self, msg: ClientMsg) {
        if let Err(e) = self.dispatch(msg).await {
            warn!(session_id = %self.id, code = e.code(), error = %e, "Command rejected");
            self.reply(ServerMsg::error(e.code(), e.to_string())).await;
        }
    }

    async fn dispatch(&mut self, msg: ClientMsg) -> Result<(), SessionError> {
        match msg {
            ClientMsg::ListMatches => {
                self.reply(self.lobby.match_list()).await;
            }
            ClientMsg::CreateMatch { name } => {
                self.ensure_unseated()?;
                self.check_lobby_rate()?;
                let grant = self.lobby.create_match(&name);
                self.take_seat(grant).await;
            }
            ClientMsg::JoinMatch { match_id } => {
                self.ensure_unseated()?;
                self.check_lobby_rate()?;
                let grant = self.lobby.join_match(match_id)?;
                self.take_seat(grant).await;
            }
            ClientMsg::Ready { match_id, units } => {
                let seat = self.seat_for(match_id)?;
                self.lobby.declare_ready(seat, &units)?;
            }
            ClientMsg::Move {
                match_id,
                unit_id,
                target,
            } => {
                let seat = self.seat_for(match_id)?;
                self.lobby.move_unit(seat, &unit_id, target)?;
            }
            ClientMsg::Attack {
                match_id,
                attacker_id,
                target_id,
            } => {
                let seat = self.seat_for(match_id)?;
                let result = self.lobby.attack(seat, &attacker_id, &target_id)?;
                self.reply(result).await;
            }
            ClientMsg::FinishActivation { match_id, unit_id } => {
                let seat = self.seat_for(match_id)?;
                self.lobby.finish_activation(seat, &unit_id)?;
            }
            ClientMsg::LeaveMatch { match_id } => {
                let seat = self.seat_for(match_id)?;
                self.release_seat();
                self.lobby.leave(seat)?;
            }
            ClientMsg::Ping { t } => {
                self.reply(ServerMsg::Pong { t }).await;
            }
        }
        Ok(())
    }

    fn check_lobby_rate(&self) -> Result<(), SessionError> {
        if self.rate_limiter.check_lobby() {
            Ok(())
        } else {
            Err(SessionError::RateLimited)
        }
    }

    async fn take_seat(&mut self, grant: SeatGrant) {
        info!(
            session_id = %self.id,
            match_id = %grant.seat.match_id,
            side = %grant.seat.side,
            "Session seated"
        );
        self.seat = Some(grant.seat);
        self.match_feed = Some(tokio::spawn(forward_events(
            self.id,
            grant.events,
            self.out_tx.clone(),
        )));
        self.reply(grant.reply).await;
    }

    fn release_seat(&mut self) {
        self.seat = None;
        if let Some(feed) = self.match_feed.take() {
            feed.abort();
        }
    }

    /// The held seat, forgetting it once its match has been retired
    fn current_seat(&mut self) -> Option<Seat> {
        if let Some(seat) = self.seat {
            if !self.lobby.is_live(&seat.match_id) {
                debug!(session_id = %self.id, match_id = %seat.match_id, "Dropping seat of retired match");
                self.seat = None;
                // The feed drains the last broadcasts and ends on its own
                self.match_feed = None;
            }
        }
        self.seat
    }

    fn ensure_unseated(&mut self) -> Result<(), SessionError> {
        match self.current_seat() {
            Some(seat) => Err(SessionError::AlreadySeated(seat.match_id)),
            None => Ok(()),
        }
    }

    fn seat_for(&mut self, match_id: Uuid) -> Result<Seat, SessionError> {
        match self.current_seat() {
            Some(seat) if seat.match_id == match_id => Ok(seat),
            _ => Err(SessionError::NotInMatch(match_id)),
        }
    }

    fn disconnect(&mut self) {
        let Some(seat) = self.current_seat() else {
            return;
        };
        self.release_seat();
        match self.lobby.leave(seat) {
            Ok(()) => info!(session_id = %self.id, match_id = %seat.match_id, "Seat released on disconnect"),
            Err(e) => debug!(session_id = %self.id, error = %e, "Leave on disconnect failed"),
        }
    }
}

/// Writer task: outbound queue -> WebSocket
async fn write_loop(
    session_id: Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut out_rx: mpsc::Receiver<ServerMsg>,
) {
    while let Some(msg) = out_rx.recv().await {
        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
            debug!(%session_id, error = %e, "WebSocket send failed");
            break;
        }
    }
}

/// Pump a broadcast feed into the session's outbound queue
async fn forward_events(
    session_id: Uuid,
    mut events: broadcast::Receiver<ServerMsg>,
    out_tx: mpsc::Sender<ServerMsg>,
) {
    loop {
        match events.recv().await {
            Ok(msg) => {
                if out_tx.send(msg).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(%session_id, lagged_count = n, "Client lagged, skipping {} events", n);
                // Continue - don't disconnect for lag
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!(%session_id, "Event channel closed");
                break;
            }
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::game::victory::VictoryReason;
    use crate::game::{Board, MatchRegistry, MatchRules, Side, UnitId};

    fn lobby() -> Arc<LobbyService> {
        let rules = MatchRules {
            board: Board::default(),
            squad_size: 1,
        };
        Arc::new(LobbyService::new(Arc::new(MatchRegistry::new(rules, Some(3)))))
    }

    fn session(lobby: &Arc<LobbyService>) -> (Session, mpsc::Receiver<ServerMsg>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        (Session::new(Uuid::new_v4(), lobby.clone(), tx), rx)
    }

    /// Next outbound message matching `pred`, skipping the rest
    async fn expect(
        rx: &mut mpsc::Receiver<ServerMsg>,
        pred: impl Fn(&ServerMsg) -> bool,
    ) -> ServerMsg {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .expect("timed out waiting for message")
                .expect("outbound channel closed");
            if pred(&msg) {
                return msg;
            }
        }
    }

    async fn seated_pair(
        lobby: &Arc<LobbyService>,
    ) -> ((Session, mpsc::Receiver<ServerMsg>), (Session, mpsc::Receiver<ServerMsg>), Uuid) {
        let (mut north, mut north_rx) = session(lobby);
        let (mut south, south_rx) = session(lobby);

        north.handle(ClientMsg::CreateMatch { name: "duel".into() }).await;
        let match_id = match expect(&mut north_rx, |m| matches!(m, ServerMsg::MatchCreated { .. })).await {
            ServerMsg::MatchCreated { match_id, .. } => match_id,
            other => panic!("unexpected {other:?}"),
        };
        south.handle(ClientMsg::JoinMatch { match_id }).await;
        ((north, north_rx), (south, south_rx), match_id)
    }

    #[tokio::test]
    async fn ping_is_answered() {
        let lobby = lobby();
        let (mut session, mut rx) = session(&lobby);
        session.handle(ClientMsg::Ping { t: 77 }).await;
        assert_eq!(rx.recv().await, Some(ServerMsg::Pong { t: 77 }));
    }

    #[tokio::test]
    async fn commands_for_foreign_matches_are_rejected() {
        let lobby = lobby();
        let (mut session, mut rx) = session(&lobby);
        let match_id = Uuid::new_v4();

        session
            .handle(ClientMsg::Ready {
                match_id,
                units: vec!["tanker".into()],
            })
            .await;
        let msg = expect(&mut rx, |m| matches!(m, ServerMsg::Error { .. })).await;
        assert!(matches!(msg, ServerMsg::Error { code, .. } if code == "not_in_match"));
    }

    #[tokio::test]
    async fn second_seat_is_refused() {
        let lobby = lobby();
        let ((mut north, mut north_rx), _, _) = seated_pair(&lobby).await;

        north.handle(ClientMsg::CreateMatch { name: String::new() }).await;
        let msg = expect(&mut north_rx, |m| matches!(m, ServerMsg::Error { .. })).await;
        assert!(matches!(msg, ServerMsg::Error { code, .. } if code == "already_seated"));
        assert_eq!(lobby.registry().active_matches(), 1);
    }

    #[tokio::test]
    async fn side_comes_from_the_seat() {
        let lobby = lobby();
        let ((mut north, _), (mut south, mut south_rx), match_id) = seated_pair(&lobby).await;

        north
            .handle(ClientMsg::Ready { match_id, units: vec!["assassin".into()] })
            .await;
        south
            .handle(ClientMsg::Ready { match_id, units: vec!["ranger".into()] })
            .await;
        expect(&mut south_rx, |m| matches!(m, ServerMsg::BattleStart { .. })).await;

        // The assassin moves first; south cannot drive it
        south
            .handle(ClientMsg::Move {
                match_id,
                unit_id: UnitId::squad(Side::North, 0),
                target: crate::game::Cell::new(5, 3),
            })
            .await;
        let msg = expect(&mut south_rx, |m| matches!(m, ServerMsg::Error { .. })).await;
        assert!(matches!(msg, ServerMsg::Error { code, .. } if code == "not_your_unit"));
    }

    #[tokio::test]
    async fn disconnect_in_battle_forfeits() {
        let lobby = lobby();
        let ((mut north, mut north_rx), (mut south, _), match_id) = seated_pair(&lobby).await;

        north
            .handle(ClientMsg::Ready { match_id, units: vec!["tanker".into()] })
            .await;
        south
            .handle(ClientMsg::Ready { match_id, units: vec!["tanker".into()] })
            .await;
        expect(&mut north_rx, |m| matches!(m, ServerMsg::BattleStart { .. })).await;

        south.disconnect();
        let msg = expect(&mut north_rx, |m| matches!(m, ServerMsg::GameOver { .. })).await;
        assert_eq!(
            msg,
            ServerMsg::GameOver {
                winner: Side::North,
                reason: VictoryReason::Forfeit,
                message: "south left the match. north wins by forfeit.".to_string(),
            }
        );
        assert!(!lobby.is_live(&match_id));

        // The retired seat no longer blocks a new match
        north.handle(ClientMsg::CreateMatch { name: "rematch".into() }).await;
        expect(&mut north_rx, |m| matches!(m, ServerMsg::MatchCreated { .. })).await;
    }
}
