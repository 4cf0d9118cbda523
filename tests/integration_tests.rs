//! Integration tests for the session server
//!
//! These tests run the real WebSocket front end on a loopback port and drive
//! matches the way a browser client would.

use futures_util::{SinkExt, StreamExt};
use server::config::ServerConfig;
use server::network::Server;
use server::recorder::MemoryRecorder;
use server::registry::SessionRegistry;
use shared::{
    ClientMessage, CreateGameRequest, Direction, EndReason, PlayerSettings, RunningState,
    ServerMessage, Side, PADDLE_HEIGHT, CANVAS_HEIGHT,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

fn test_config() -> ServerConfig {
    ServerConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        grace_period: Duration::from_secs(2),
        serve_delay: Duration::ZERO,
        ..ServerConfig::default()
    }
}

async fn start_server(config: ServerConfig) -> (SocketAddr, Arc<SessionRegistry>, Arc<MemoryRecorder>) {
    let recorder = Arc::new(MemoryRecorder::new());
    let registry = SessionRegistry::new(config, recorder.clone());
    let server = Server::bind(Arc::clone(&registry)).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    (addr, registry, recorder)
}

async fn connect(addr: SocketAddr) -> Ws {
    let (ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    ws
}

async fn send(ws: &mut Ws, message: &ClientMessage) {
    let text = serde_json::to_string(message).unwrap();
    ws.send(Message::Text(text)).await.unwrap();
}

/// Next server message, or `None` once the server closed the socket.
async fn recv(ws: &mut Ws) -> Option<ServerMessage> {
    loop {
        let frame = timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for the server");
        match frame {
            Some(Ok(Message::Text(text))) => return Some(serde_json::from_str(&text).unwrap()),
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
            Some(Ok(_)) => continue,
        }
    }
}

async fn recv_until<F>(ws: &mut Ws, mut matches: F) -> ServerMessage
where
    F: FnMut(&ServerMessage) -> bool,
{
    loop {
        match recv(ws).await {
            Some(message) if matches(&message) => return message,
            Some(_) => continue,
            None => panic!("connection closed before the expected message"),
        }
    }
}

fn is_state(running: RunningState) -> impl FnMut(&ServerMessage) -> bool {
    move |message| matches!(message, ServerMessage::State(s) if s.running_state == running)
}

fn classic_request(target_score: u32) -> ClientMessage {
    let player = |alias: &str| PlayerSettings {
        alias: alias.to_string(),
        character: None,
        paddle_color: None,
    };
    ClientMessage::CreateGame(CreateGameRequest {
        mode: "CLASSIC".to_string(),
        player1: Some(player("alice")),
        player2: Some(player("bob")),
        target_score: Some(target_score),
    })
}

async fn create_session(addr: SocketAddr, target_score: u32) -> String {
    let mut host = connect(addr).await;
    send(&mut host, &classic_request(target_score)).await;
    match recv(&mut host).await {
        Some(ServerMessage::GameCreated { session_id }) => session_id,
        other => panic!("expected game_created, got {:?}", other),
    }
}

async fn join(addr: SocketAddr, session_id: &str, alias: &str) -> Ws {
    let mut ws = connect(addr).await;
    send(
        &mut ws,
        &ClientMessage::JoinGame {
            session_id: session_id.to_string(),
            alias: alias.to_string(),
        },
    )
    .await;
    ws
}

async fn start_match(addr: SocketAddr, target_score: u32) -> (String, Ws, Ws) {
    let session_id = create_session(addr, target_score).await;
    let mut alice = join(addr, &session_id, "alice").await;
    let mut bob = join(addr, &session_id, "bob").await;

    for ws in [&mut alice, &mut bob] {
        assert!(matches!(recv(ws).await, Some(ServerMessage::GameSetup(_))));
        assert_eq!(recv(ws).await, Some(ServerMessage::GameStart));
        recv_until(ws, is_state(RunningState::Playing)).await;
    }
    (session_id, alice, bob)
}

/// PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// Tests that ping keeps working after malformed input
    #[tokio::test]
    async fn malformed_messages_do_not_close_connection() {
        let (addr, _, _) = start_server(test_config()).await;
        let mut ws = connect(addr).await;

        ws.send(Message::Text("not json".to_string())).await.unwrap();
        ws.send(Message::Text(r#"{"type":"warp"}"#.to_string()))
            .await
            .unwrap();
        send(&mut ws, &ClientMessage::Ping).await;

        assert_eq!(recv(&mut ws).await, Some(ServerMessage::Pong));
    }

    /// Tests that bad creation settings are reported and create nothing
    #[tokio::test]
    async fn invalid_settings_are_rejected() {
        let (addr, registry, _) = start_server(test_config()).await;
        let mut ws = connect(addr).await;

        let mut request = classic_request(3);
        if let ClientMessage::CreateGame(settings) = &mut request {
            settings.player2 = None;
        }
        send(&mut ws, &request).await;
        assert!(matches!(
            recv(&mut ws).await,
            Some(ServerMessage::Error { .. })
        ));

        let mut request = classic_request(3);
        if let ClientMessage::CreateGame(settings) = &mut request {
            settings.mode = "CRAZY".to_string();
            for player in [&mut settings.player1, &mut settings.player2].into_iter().flatten() {
                player.character = Some("wizard".to_string());
            }
        }
        send(&mut ws, &request).await;
        assert!(matches!(
            recv(&mut ws).await,
            Some(ServerMessage::Error { message }) if message.contains("wizard")
        ));

        let raw = r#"{"type":"create_game","mode":"CLASSIC","target_score":"ten",
            "player1":{"alias":"alice"},"player2":{"alias":"bob"}}"#;
        ws.send(Message::Text(raw.to_string())).await.unwrap();
        assert!(matches!(
            recv(&mut ws).await,
            Some(ServerMessage::Error { .. })
        ));

        assert!(registry.is_empty().await);
    }

    /// Tests that joining an unknown session fails cleanly
    #[tokio::test]
    async fn unknown_session_is_rejected() {
        let (addr, _, _) = start_server(test_config()).await;
        let mut ws = join(addr, "missing", "alice").await;
        assert!(matches!(
            recv(&mut ws).await,
            Some(ServerMessage::Error { .. })
        ));
    }

    /// Tests that a silent connection is dropped
    #[tokio::test]
    async fn idle_connection_is_closed() {
        let config = ServerConfig {
            idle_timeout: Duration::from_millis(300),
            ..test_config()
        };
        let (addr, _, _) = start_server(config).await;
        let mut ws = connect(addr).await;
        assert_eq!(recv(&mut ws).await, None);
    }
}

/// MATCH FLOW TESTS
mod match_tests {
    use super::*;

    /// Tests a complete match from creation to result
    #[tokio::test]
    async fn match_runs_to_target_score() {
        let (addr, registry, recorder) = start_server(test_config()).await;
        let (session_id, mut alice, mut bob) = start_match(addr, 1).await;

        let mut results = Vec::new();
        for ws in [&mut alice, &mut bob] {
            let message = recv_until(ws, |m| matches!(m, ServerMessage::MatchResult(_))).await;
            if let ServerMessage::MatchResult(result) = message {
                results.push(result);
            }
            assert_eq!(recv(ws).await, None);
        }

        assert_eq!(results[0], results[1]);
        let result = &results[0];
        assert_eq!(result.reason, EndReason::ScoreReached);
        assert_eq!(result.scores.left + result.scores.right, 1);
        assert!(result.winner.is_some());

        assert!(registry.wait_idle(WAIT).await);
        let recorded = recorder.results();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, session_id);
    }

    /// Tests that movement input reaches the authoritative paddle
    #[tokio::test]
    async fn movement_moves_paddle() {
        let (addr, _, _) = start_server(test_config()).await;
        let (_, _alice, mut bob) = start_match(addr, 11).await;

        send(
            &mut bob,
            &ClientMessage::Movement {
                direction: Direction::Up,
            },
        )
        .await;

        let start_y = (CANVAS_HEIGHT - PADDLE_HEIGHT) / 2.0;
        recv_until(&mut bob, |m| {
            matches!(m, ServerMessage::State(s) if s.paddles.right.y < start_y - 20.0)
        })
        .await;
    }

    /// Tests that quitting forfeits the match to the opponent
    #[tokio::test]
    async fn quit_forfeits() {
        let (addr, _, _) = start_server(test_config()).await;
        let (_, mut alice, mut bob) = start_match(addr, 11).await;

        send(&mut alice, &ClientMessage::Quit).await;

        let message = recv_until(&mut bob, |m| matches!(m, ServerMessage::MatchResult(_))).await;
        match message {
            ServerMessage::MatchResult(result) => {
                assert_eq!(result.winner, Some(Side::Right));
                assert_eq!(result.reason, EndReason::Forfeit);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }
}

/// RECONNECTION TESTS
mod reconnection_tests {
    use super::*;

    /// Tests that a dropped player can come back within the grace period
    #[tokio::test]
    async fn reconnect_within_grace_resumes() {
        let (addr, registry, _) = start_server(test_config()).await;
        let (session_id, alice, mut bob) = start_match(addr, 11).await;

        drop(alice);
        recv_until(&mut bob, is_state(RunningState::Paused)).await;

        let mut alice = join(addr, &session_id, "alice").await;
        assert!(matches!(
            recv(&mut alice).await,
            Some(ServerMessage::GameSetup(_))
        ));
        recv_until(&mut alice, is_state(RunningState::Playing)).await;
        recv_until(&mut bob, is_state(RunningState::Playing)).await;

        assert!(registry.reconnection().is_empty());
    }

    /// Tests that staying away past the grace period forfeits
    #[tokio::test]
    async fn grace_expiry_forfeits() {
        let config = ServerConfig {
            grace_period: Duration::from_millis(300),
            ..test_config()
        };
        let (addr, _, recorder) = start_server(config).await;
        let (_, alice, mut bob) = start_match(addr, 11).await;

        drop(alice);
        let message = recv_until(&mut bob, |m| matches!(m, ServerMessage::MatchResult(_))).await;
        match message {
            ServerMessage::MatchResult(result) => {
                assert_eq!(result.winner, Some(Side::Right));
                assert_eq!(result.reason, EndReason::Forfeit);
            }
            other => panic!("unexpected message {:?}", other),
        }
        assert_eq!(recv(&mut bob).await, None);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(recorder.results().len(), 1);
    }
}
