use log::warn;
use shared::ServerMessage;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

pub type ConnectionId = u64;

/// Frames handed to a connection's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendError;

/// Outbound side of one player connection.
///
/// All frames go through a channel drained by a single writer task, so writes
/// to the socket never interleave. Sending never waits on the network. A failed
/// send means the writer is gone and the connection should be treated as
/// disconnected.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub addr: SocketAddr,
    sender: mpsc::UnboundedSender<Outbound>,
    closed: Arc<AtomicBool>,
}

impl Connection {
    pub fn new(id: ConnectionId, addr: SocketAddr, sender: mpsc::UnboundedSender<Outbound>) -> Self {
        Connection {
            id,
            addr,
            sender,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn send_text(&self, text: String) -> Result<(), SendError> {
        if self.is_closed() {
            return Err(SendError);
        }
        self.sender.send(Outbound::Text(text)).map_err(|_| SendError)
    }

    pub fn send(&self, message: &ServerMessage) -> Result<(), SendError> {
        match serde_json::to_string(message) {
            Ok(text) => self.send_text(text),
            Err(e) => {
                warn!("Failed to encode message for connection {}: {}", self.id, e);
                Err(SendError)
            }
        }
    }

    /// Asks the writer to close the socket. Only the first call on any clone
    /// has an effect.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.sender.send(Outbound::Close);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.sender.is_closed()
    }
}
