//! One running match.
//!
//! A `GameSession` is driven by a single tokio task and is the only writer of
//! its `GameState`. Connection tasks never touch the simulation directly: they
//! overwrite the seat's `InputCell` or queue a `SessionCommand`, and the
//! session picks both up at the next tick boundary.

use crate::config::ServerConfig;
use crate::connection::{Connection, ConnectionId};
use crate::game::{GameEvent, GameState};
use crate::player::{InputCell, Player};
use crate::reconnection::{PlayerId, ReconnectionManager};
use crate::recorder::MatchRecorder;
use crate::settings::SessionSettings;
use log::{debug, info, warn};
use rand::Rng;
use shared::{Direction, EndReason, GameSetup, MatchResult, RunningState, ServerMessage, Side};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};

const SIDES: [Side; 2] = [Side::Left, Side::Right];

/// Events queued for the session task.
#[derive(Debug)]
pub enum SessionCommand {
    /// Binds a connection to a seat, either for the first time or as a reconnect.
    Attach { side: Side, connection: Connection },
    /// The connection's reader ended. Ignored unless it is still the seat's connection.
    Detach {
        side: Side,
        connection_id: ConnectionId,
    },
    GraceExpired { side: Side },
    Pause { side: Side },
    Resume { side: Side },
    Quit { side: Side },
    Shutdown,
}

/// Cheap, cloneable access to a running session from other tasks.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: String,
    commands: mpsc::UnboundedSender<SessionCommand>,
    inputs: [Arc<InputCell>; 2],
    aliases: [String; 2],
}

impl SessionHandle {
    pub fn side_of(&self, alias: &str) -> Option<Side> {
        SIDES
            .into_iter()
            .find(|side| self.aliases[side.index()] == alias)
    }

    pub fn input(&self, side: Side) -> Arc<InputCell> {
        Arc::clone(&self.inputs[side.index()])
    }

    pub fn commands(&self) -> mpsc::UnboundedSender<SessionCommand> {
        self.commands.clone()
    }

    /// Queues a command. Returns false once the session task has ended.
    pub fn send(&self, command: SessionCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

#[derive(Debug, Default)]
struct Seat {
    connection: Option<Connection>,
    input: Arc<InputCell>,
}

pub struct GameSession {
    id: String,
    settings: SessionSettings,
    setup: GameSetup,
    state: GameState,
    seats: [Seat; 2],
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    reconnection: Arc<ReconnectionManager>,
    recorder: Arc<dyn MatchRecorder>,
    tick_duration: Duration,
    dt: f32,
    join_timeout_ticks: u64,
    waiting_ticks: u64,
    explicit_pause: bool,
}

impl GameSession {
    pub fn new(
        id: String,
        settings: SessionSettings,
        config: &ServerConfig,
        reconnection: Arc<ReconnectionManager>,
        recorder: Arc<dyn MatchRecorder>,
    ) -> (Self, SessionHandle) {
        let game_config = config.game_config(settings.target_score);
        let setup = settings.resolve_setup(game_config.target_score, &mut rand::thread_rng());
        let [left, right] = SIDES.map(|side| {
            Player::new(
                side,
                settings.player(side).alias.clone(),
                settings.character(side),
            )
        });

        let (command_tx, commands) = mpsc::unbounded_channel();
        let seats = [Seat::default(), Seat::default()];
        let handle = SessionHandle {
            id: id.clone(),
            commands: command_tx.clone(),
            inputs: [Arc::clone(&seats[0].input), Arc::clone(&seats[1].input)],
            aliases: SIDES.map(|side| settings.player(side).alias.clone()),
        };

        let session = GameSession {
            id,
            settings,
            setup,
            state: GameState::new(game_config, left, right),
            seats,
            commands,
            command_tx,
            reconnection,
            recorder,
            tick_duration: config.tick_duration(),
            dt: config.tick_dt(),
            join_timeout_ticks: config.ticks_for(config.join_timeout),
            waiting_ticks: 0,
            explicit_pause: false,
        };
        (session, handle)
    }

    /// Runs the fixed-tick loop until the match is finished, then tears the
    /// session down and returns the result.
    pub async fn run(mut self) -> Option<MatchResult> {
        let mut ticker = interval(self.tick_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Session {} created ({:?}), waiting for {} and {}",
            self.id,
            self.settings.mode,
            self.alias(Side::Left),
            self.alias(Side::Right)
        );

        while !self.state.is_finished() {
            ticker.tick().await;
            self.drain_commands();

            match self.state.running {
                RunningState::Playing => self.step(),
                RunningState::Waiting => {
                    self.discard_power_ups();
                    self.check_join_timeout();
                }
                RunningState::Paused => self.discard_power_ups(),
                RunningState::Finished => {}
            }
        }

        self.teardown()
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            self.handle_command(command);
            if self.state.is_finished() {
                break;
            }
        }
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Attach { side, connection } => self.attach(side, connection),
            SessionCommand::Detach {
                side,
                connection_id,
            } => {
                let current = self.seats[side.index()].connection.as_ref().map(|c| c.id);
                if current == Some(connection_id) {
                    self.disconnect(side);
                } else {
                    debug!(
                        "Ignoring stale detach of connection {} in session {}",
                        connection_id, self.id
                    );
                }
            }
            SessionCommand::GraceExpired { side } => {
                // A reconnect processed earlier wins over a late expiry
                if self.seats[side.index()].connection.is_none() && !self.state.is_finished() {
                    info!(
                        "{} did not return to session {} in time",
                        self.alias(side),
                        self.id
                    );
                    self.state.forfeit(side);
                }
            }
            SessionCommand::Pause { side } => {
                if matches!(
                    self.state.running,
                    RunningState::Playing | RunningState::Paused
                ) {
                    info!("{} paused session {}", self.alias(side), self.id);
                    self.explicit_pause = true;
                    self.state.pause();
                    self.broadcast_state();
                }
            }
            SessionCommand::Resume { side } => {
                if self.explicit_pause {
                    info!("{} resumed session {}", self.alias(side), self.id);
                    self.explicit_pause = false;
                    self.try_resume();
                }
            }
            SessionCommand::Quit { side } => match self.state.running {
                RunningState::Waiting => {
                    info!("{} left session {} before it started", self.alias(side), self.id);
                    self.state.abort(EndReason::Abandoned);
                }
                RunningState::Playing | RunningState::Paused => {
                    info!("{} quit session {}", self.alias(side), self.id);
                    self.state.forfeit(side);
                }
                RunningState::Finished => {}
            },
            SessionCommand::Shutdown => {
                if !self.state.is_finished() {
                    info!("Session {} shutting down", self.id);
                    self.state.abort(EndReason::Aborted);
                }
            }
        }
    }

    fn attach(&mut self, side: Side, connection: Connection) {
        if self.state.is_finished() {
            let _ = connection.send(&ServerMessage::Error {
                message: format!("session {} is over", self.id),
            });
            connection.close();
            return;
        }

        self.reconnection.clear_timeout(&self.player_id(side));

        let (connection_id, addr) = (connection.id, connection.addr);
        if let Some(previous) = self.seats[side.index()].connection.replace(connection) {
            if previous.id != connection_id {
                info!(
                    "Connection {} from {} replaces {} for {} in session {}",
                    connection_id,
                    addr,
                    previous.id,
                    self.alias(side),
                    self.id
                );
                previous.close();
            }
        }

        match self.state.running {
            RunningState::Waiting => {
                info!(
                    "{} joined session {} as {:?}",
                    self.alias(side),
                    self.id,
                    side
                );
                if self.seats.iter().all(|seat| seat.connection.is_some()) {
                    self.start();
                }
            }
            RunningState::Playing | RunningState::Paused => {
                info!("{} reconnected to session {}", self.alias(side), self.id);
                let setup = ServerMessage::GameSetup(self.setup.clone());
                self.send_to(side, &setup);
                self.try_resume();
                if self.state.running == RunningState::Paused {
                    let snapshot = ServerMessage::State(self.state.snapshot());
                    self.send_to(side, &snapshot);
                }
            }
            RunningState::Finished => {}
        }
    }

    fn start(&mut self) {
        let first_serve = if rand::thread_rng().gen_bool(0.5) {
            Side::Left
        } else {
            Side::Right
        };
        self.state.start(first_serve);
        info!(
            "Session {} started: {} vs {}",
            self.id,
            self.alias(Side::Left),
            self.alias(Side::Right)
        );

        let setup = ServerMessage::GameSetup(self.setup.clone());
        self.broadcast(&setup);
        self.broadcast(&ServerMessage::GameStart);
        self.broadcast_state();
    }

    fn disconnect(&mut self, side: Side) {
        let seat = &mut self.seats[side.index()];
        let connection = match seat.connection.take() {
            Some(connection) => connection,
            None => return,
        };
        connection.close();
        seat.input.reset();

        match self.state.running {
            RunningState::Waiting => {
                info!(
                    "{} disconnected from session {} before it started",
                    self.alias(side),
                    self.id
                );
            }
            RunningState::Playing | RunningState::Paused => {
                self.state.set_input(side, Direction::Stop);
                self.state.pause();

                let commands = self.command_tx.clone();
                self.reconnection
                    .mark_disconnected(self.player_id(side), move || {
                        let _ = commands.send(SessionCommand::GraceExpired { side });
                    });
                self.broadcast_state();
            }
            RunningState::Finished => {}
        }
    }

    fn try_resume(&mut self) {
        if self.state.running != RunningState::Paused || self.explicit_pause {
            return;
        }
        if self.seats.iter().any(|seat| seat.connection.is_none()) {
            return;
        }
        self.state.resume();
        info!("Session {} resumed", self.id);
        self.broadcast_state();
    }

    fn step(&mut self) {
        for side in SIDES {
            let input = &self.seats[side.index()].input;
            self.state.set_input(side, input.direction());
            if input.take_power_up() && self.state.trigger_power_up(side) {
                debug!("{} used a power-up in session {}", self.alias(side), self.id);
            }
        }

        for event in self.state.tick(self.dt) {
            self.log_event(event);
        }
        self.broadcast_state();
    }

    // Power-up requests outside of play are no-ops
    fn discard_power_ups(&self) {
        for seat in &self.seats {
            seat.input.take_power_up();
        }
    }

    fn check_join_timeout(&mut self) {
        self.waiting_ticks += 1;
        if self.waiting_ticks >= self.join_timeout_ticks {
            warn!(
                "Session {} abandoned: players did not join in time",
                self.id
            );
            self.state.abort(EndReason::Abandoned);
        }
    }

    fn log_event(&self, event: GameEvent) {
        match event {
            GameEvent::Goal { scorer } => debug!(
                "Session {} tick {}: goal for {}",
                self.id,
                self.state.tick,
                self.alias(scorer)
            ),
            GameEvent::MatchWon { winner } => {
                info!("{} won session {}", self.alias(winner), self.id)
            }
            other => debug!("Session {} tick {}: {:?}", self.id, self.state.tick, other),
        }
    }

    fn broadcast_state(&mut self) {
        let snapshot = ServerMessage::State(self.state.snapshot());
        self.broadcast(&snapshot);
    }

    /// Serializes once and queues the frame for every bound seat. A seat whose
    /// connection rejects the frame is handled as disconnected.
    fn broadcast(&mut self, message: &ServerMessage) {
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode message for session {}: {}", self.id, e);
                return;
            }
        };

        let mut failed = Vec::new();
        for side in SIDES {
            if let Some(connection) = &self.seats[side.index()].connection {
                if connection.send_text(text.clone()).is_err() {
                    failed.push(side);
                }
            }
        }
        for side in failed {
            warn!(
                "Lost connection to {} in session {}",
                self.alias(side),
                self.id
            );
            self.disconnect(side);
        }
    }

    fn send_to(&mut self, side: Side, message: &ServerMessage) {
        let failed = match &self.seats[side.index()].connection {
            Some(connection) => connection.send(message).is_err(),
            None => false,
        };
        if failed {
            warn!(
                "Lost connection to {} in session {}",
                self.alias(side),
                self.id
            );
            self.disconnect(side);
        }
    }

    fn teardown(mut self) -> Option<MatchResult> {
        let result = self.state.result();

        if let Some(result) = &result {
            let message = ServerMessage::MatchResult(result.clone());
            for seat in &mut self.seats {
                if let Some(connection) = seat.connection.take() {
                    let _ = connection.send(&message);
                    connection.close();
                }
            }
            self.recorder.record(
                &self.id,
                [self.alias(Side::Left), self.alias(Side::Right)],
                result,
            );
        }

        // Late joins queued behind the final command
        self.commands.close();
        while let Ok(command) = self.commands.try_recv() {
            if let SessionCommand::Attach { connection, .. } = command {
                connection.close();
            }
        }

        for side in SIDES {
            self.reconnection.clear_timeout(&self.player_id(side));
        }
        info!("Session {} closed", self.id);
        result
    }

    fn alias(&self, side: Side) -> &str {
        &self.settings.player(side).alias
    }

    fn player_id(&self, side: Side) -> PlayerId {
        PlayerId::new(self.id.clone(), side)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Outbound;
    use crate::recorder::MemoryRecorder;
    use shared::{CreateGameRequest, PlayerSettings};
    use tokio::task::JoinHandle;
    use tokio::time::sleep;

    struct Harness {
        handle: SessionHandle,
        task: JoinHandle<Option<MatchResult>>,
        reconnection: Arc<ReconnectionManager>,
        recorder: Arc<MemoryRecorder>,
    }

    fn test_config() -> ServerConfig {
        ServerConfig {
            grace_period: Duration::from_secs(5),
            join_timeout: Duration::from_secs(10),
            serve_delay: Duration::ZERO,
            ..ServerConfig::default()
        }
    }

    fn start_session() -> Harness {
        let config = test_config();
        let settings = SessionSettings::from_request(CreateGameRequest {
            mode: "CLASSIC".to_string(),
            player1: Some(PlayerSettings {
                alias: "alice".to_string(),
                character: None,
                paddle_color: None,
            }),
            player2: Some(PlayerSettings {
                alias: "bob".to_string(),
                character: None,
                paddle_color: None,
            }),
            target_score: None,
        })
        .unwrap();

        let reconnection = Arc::new(ReconnectionManager::new(config.grace_period));
        let recorder = Arc::new(MemoryRecorder::new());
        let (session, handle) = GameSession::new(
            "s1".to_string(),
            settings,
            &config,
            Arc::clone(&reconnection),
            recorder.clone(),
        );
        Harness {
            handle,
            task: tokio::spawn(session.run()),
            reconnection,
            recorder,
        }
    }

    fn connection(id: ConnectionId) -> (Connection, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Connection::new(id, "127.0.0.1:9000".parse().unwrap(), tx), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> (Vec<ServerMessage>, bool) {
        let mut messages = Vec::new();
        let mut closed = false;
        while let Ok(frame) = rx.try_recv() {
            match frame {
                Outbound::Text(text) => messages.push(serde_json::from_str(&text).unwrap()),
                Outbound::Close => closed = true,
            }
        }
        (messages, closed)
    }

    fn last_state(messages: &[ServerMessage]) -> RunningState {
        messages
            .iter()
            .rev()
            .find_map(|m| match m {
                ServerMessage::State(snapshot) => Some(snapshot.running_state),
                _ => None,
            })
            .unwrap()
    }

    async fn join_both(
        harness: &Harness,
    ) -> (
        mpsc::UnboundedReceiver<Outbound>,
        mpsc::UnboundedReceiver<Outbound>,
    ) {
        let (left, left_rx) = connection(1);
        let (right, right_rx) = connection(2);
        harness.handle.send(SessionCommand::Attach {
            side: Side::Left,
            connection: left,
        });
        harness.handle.send(SessionCommand::Attach {
            side: Side::Right,
            connection: right,
        });
        sleep(Duration::from_millis(100)).await;
        (left_rx, right_rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_match_starts_when_both_seats_bound() {
        let harness = start_session();
        let (mut left_rx, mut right_rx) = join_both(&harness).await;

        for rx in [&mut left_rx, &mut right_rx] {
            let (messages, closed) = drain(rx);
            assert!(!closed);
            assert!(matches!(messages[0], ServerMessage::GameSetup(_)));
            assert_eq!(messages[1], ServerMessage::GameStart);
            assert!(messages.len() > 3);
            assert!(messages[2..]
                .iter()
                .all(|m| matches!(m, ServerMessage::State(_))));
            assert_eq!(last_state(&messages), RunningState::Playing);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_resolves_aliases() {
        let harness = start_session();
        assert_eq!(harness.handle.side_of("alice"), Some(Side::Left));
        assert_eq!(harness.handle.side_of("bob"), Some(Side::Right));
        assert_eq!(harness.handle.side_of("carol"), None);
        assert!(!harness.handle.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_quit_forfeits_and_tears_down() {
        let harness = start_session();
        let (mut left_rx, mut right_rx) = join_both(&harness).await;
        drain(&mut left_rx);
        drain(&mut right_rx);

        harness.handle.send(SessionCommand::Quit { side: Side::Left });
        let result = harness.task.await.unwrap().unwrap();
        assert_eq!(result.winner, Some(Side::Right));
        assert_eq!(result.reason, EndReason::Forfeit);

        for rx in [&mut left_rx, &mut right_rx] {
            let (messages, closed) = drain(rx);
            assert_eq!(messages, vec![ServerMessage::MatchResult(result.clone())]);
            assert!(closed);
        }
        assert_eq!(harness.recorder.results().len(), 1);
        assert!(harness.handle.is_closed());
        assert!(!harness.handle.send(SessionCommand::Shutdown));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_pauses_and_reconnect_resumes() {
        let harness = start_session();
        let (mut left_rx, mut right_rx) = join_both(&harness).await;
        drain(&mut left_rx);
        drain(&mut right_rx);

        harness.handle.send(SessionCommand::Detach {
            side: Side::Left,
            connection_id: 1,
        });
        sleep(Duration::from_millis(100)).await;

        let (_, closed) = drain(&mut left_rx);
        assert!(closed);
        let (messages, _) = drain(&mut right_rx);
        assert_eq!(last_state(&messages), RunningState::Paused);
        let left_id = PlayerId::new("s1", Side::Left);
        assert!(harness.reconnection.is_in_grace_period(&left_id));

        let (again, mut again_rx) = connection(3);
        harness.handle.send(SessionCommand::Attach {
            side: Side::Left,
            connection: again,
        });
        sleep(Duration::from_millis(100)).await;

        assert!(!harness.reconnection.is_in_grace_period(&left_id));
        let (messages, _) = drain(&mut again_rx);
        assert!(matches!(messages[0], ServerMessage::GameSetup(_)));
        assert_eq!(last_state(&messages), RunningState::Playing);

        // Nothing fires after the window would have closed
        sleep(Duration::from_secs(6)).await;
        assert!(!harness.handle.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_detach_is_ignored() {
        let harness = start_session();
        let (_left_rx, mut right_rx) = join_both(&harness).await;
        drain(&mut right_rx);

        harness.handle.send(SessionCommand::Detach {
            side: Side::Left,
            connection_id: 99,
        });
        sleep(Duration::from_millis(100)).await;

        let (messages, _) = drain(&mut right_rx);
        assert_eq!(last_state(&messages), RunningState::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_expiry_forfeits() {
        let harness = start_session();
        let (_left_rx, mut right_rx) = join_both(&harness).await;

        harness.handle.send(SessionCommand::Detach {
            side: Side::Left,
            connection_id: 1,
        });
        sleep(Duration::from_secs(6)).await;

        let result = harness.task.await.unwrap().unwrap();
        assert_eq!(result.winner, Some(Side::Right));
        assert_eq!(result.reason, EndReason::Forfeit);

        let (messages, closed) = drain(&mut right_rx);
        assert_eq!(
            messages.last(),
            Some(&ServerMessage::MatchResult(result.clone()))
        );
        assert!(closed);
        assert!(harness.reconnection.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_failure_counts_as_disconnect() {
        let harness = start_session();
        let (mut left_rx, right_rx) = join_both(&harness).await;
        drop(right_rx);
        sleep(Duration::from_millis(100)).await;

        let (messages, _) = drain(&mut left_rx);
        assert_eq!(last_state(&messages), RunningState::Paused);
        assert!(harness
            .reconnection
            .is_in_grace_period(&PlayerId::new("s1", Side::Right)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_pause_needs_resume() {
        let harness = start_session();
        let (mut left_rx, _right_rx) = join_both(&harness).await;

        harness.handle.send(SessionCommand::Pause { side: Side::Left });
        sleep(Duration::from_millis(100)).await;
        let (messages, _) = drain(&mut left_rx);
        assert_eq!(last_state(&messages), RunningState::Paused);

        harness.handle.send(SessionCommand::Resume { side: Side::Right });
        sleep(Duration::from_millis(100)).await;
        let (messages, _) = drain(&mut left_rx);
        assert_eq!(last_state(&messages), RunningState::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unfilled_session_is_abandoned() {
        let harness = start_session();
        let (left, mut left_rx) = connection(1);
        harness.handle.send(SessionCommand::Attach {
            side: Side::Left,
            connection: left,
        });

        sleep(Duration::from_secs(11)).await;
        let result = harness.task.await.unwrap().unwrap();
        assert_eq!(result.winner, None);
        assert_eq!(result.reason, EndReason::Abandoned);

        let (messages, closed) = drain(&mut left_rx);
        assert_eq!(messages, vec![ServerMessage::MatchResult(result)]);
        assert!(closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_aborts_without_winner() {
        let harness = start_session();
        let _receivers = join_both(&harness).await;

        harness.handle.send(SessionCommand::Shutdown);
        let result = harness.task.await.unwrap().unwrap();
        assert_eq!(result.winner, None);
        assert_eq!(result.reason, EndReason::Aborted);
        assert_eq!(harness.recorder.results()[0].0, "s1");
    }
}
