//! WebSocket front end: accepts connections and routes player messages.
//!
//! Every connection gets a reader (the task running `handle_connection`) and a
//! writer task that owns the sink half of the socket. The reader never touches
//! game state; it writes the seat's `InputCell` or queues a `SessionCommand`.

use crate::connection::{Connection, ConnectionId, Outbound};
use crate::error::ServerError;
use crate::registry::{Binding, SessionRegistry};
use crate::session::SessionCommand;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{ClientMessage, ServerMessage};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message};

pub struct Server {
    listener: TcpListener,
    registry: Arc<SessionRegistry>,
}

impl Server {
    pub async fn bind(registry: Arc<SessionRegistry>) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&registry.config().bind_addr)
            .await
            .map_err(ServerError::Bind)?;
        info!("Server listening on {}", listener.local_addr()?);
        Ok(Server { listener, registry })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until the task is dropped.
    pub async fn run(self) -> Result<(), ServerError> {
        let mut next_id: ConnectionId = 0;

        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    continue;
                }
            };

            next_id += 1;
            let id = next_id;
            let registry = Arc::clone(&self.registry);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, id, registry).await {
                    warn!("Connection {} from {} failed: {}", id, addr, e);
                }
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    id: ConnectionId,
    registry: Arc<SessionRegistry>,
) -> Result<(), ServerError> {
    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();
    let connection = Connection::new(id, addr, tx);
    info!("Connection {} opened from {}", id, addr);

    // Single writer for the socket
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let result = match frame {
                Outbound::Text(text) => ws_sender.send(Message::Text(text)).await,
                Outbound::Close => {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }
            };
            if let Err(e) = result {
                debug!("Write to connection {} failed: {}", id, e);
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    let idle_timeout = registry.config().idle_timeout;
    let mut binding: Option<Binding> = None;

    loop {
        let frame = match timeout(idle_timeout, ws_receiver.next()).await {
            Ok(frame) => frame,
            Err(_) => {
                info!(
                    "Connection {} silent for {:?}, dropping it",
                    id, idle_timeout
                );
                break;
            }
        };

        match frame {
            Some(Ok(Message::Text(text))) => {
                handle_message(&text, &connection, &registry, &mut binding).await;
            }
            Some(Ok(Message::Close(_))) | None => {
                debug!("Connection {} closed by peer", id);
                break;
            }
            // Protocol pings are answered by tungstenite itself
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
            Some(Ok(_)) => debug!("Ignoring non-text frame from connection {}", id),
            Some(Err(e)) => {
                debug!("Read from connection {} failed: {}", id, e);
                break;
            }
        }
    }

    if let Some(binding) = &binding {
        binding.send(SessionCommand::Detach {
            side: binding.side,
            connection_id: id,
        });
    }
    connection.close();
    info!("Connection {} from {} ended", id, addr);
    Ok(())
}

/// Handles one text frame. Malformed input is logged and dropped; the
/// connection stays open.
pub(crate) async fn handle_message(
    text: &str,
    connection: &Connection,
    registry: &Arc<SessionRegistry>,
    binding: &mut Option<Binding>,
) {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) if is_create_game(text) => {
            warn!("Rejected malformed create_game from connection {}: {}", connection.id, e);
            send_error(connection, format!("invalid create_game request: {}", e));
            return;
        }
        Err(e) => {
            warn!("Dropping malformed message on connection {}: {}", connection.id, e);
            return;
        }
    };

    match message {
        ClientMessage::Ping => {
            let _ = connection.send(&ServerMessage::Pong);
        }
        ClientMessage::CreateGame(request) => match registry.create_session(request).await {
            Ok(session_id) => {
                let _ = connection.send(&ServerMessage::GameCreated { session_id });
            }
            Err(e) => {
                warn!("Rejected session settings from connection {}: {}", connection.id, e);
                send_error(connection, e.to_string());
            }
        },
        ClientMessage::JoinGame { session_id, alias } => {
            if binding.is_some() {
                send_error(connection, "already bound to a session".to_string());
                return;
            }
            match registry.join(&session_id, &alias, connection.clone()).await {
                Ok(bound) => *binding = Some(bound),
                Err(e) => {
                    warn!("Join from connection {} refused: {}", connection.id, e);
                    send_error(connection, e.to_string());
                }
            }
        }
        other => match binding {
            Some(binding) => route_input(other, binding),
            None => debug!(
                "Ignoring {:?} from connection {} outside a session",
                other, connection.id
            ),
        },
    }
}

fn route_input(message: ClientMessage, binding: &Binding) {
    let side = binding.side;
    match message {
        ClientMessage::Movement { direction } => binding.input.set_direction(direction),
        ClientMessage::PowerUp => binding.input.request_power_up(),
        ClientMessage::Pause => {
            binding.send(SessionCommand::Pause { side });
        }
        ClientMessage::Resume => {
            binding.send(SessionCommand::Resume { side });
        }
        ClientMessage::Quit => {
            binding.send(SessionCommand::Quit { side });
        }
        ClientMessage::Ping | ClientMessage::CreateGame(_) | ClientMessage::JoinGame { .. } => {}
    }
}

/// A creator whose settings fail to parse still gets an `error` reply.
fn is_create_game(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|value| value.get("type")?.as_str().map(|kind| kind == "create_game"))
        .unwrap_or(false)
}

fn send_error(connection: &Connection, message: String) {
    let _ = connection.send(&ServerMessage::Error { message });
}
