use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::error::{JoinError, SettingsError};
use crate::player::InputCell;
use crate::reconnection::ReconnectionManager;
use crate::recorder::MatchRecorder;
use crate::session::{GameSession, SessionCommand, SessionHandle};
use crate::settings::SessionSettings;
use log::{debug, info};
use rand::distributions::Alphanumeric;
use rand::Rng;
use shared::{CreateGameRequest, Side};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;

const SESSION_ID_LEN: usize = 12;

/// What a connection needs after `join_game` succeeded.
#[derive(Debug, Clone)]
pub struct Binding {
    pub session_id: String,
    pub side: Side,
    pub input: Arc<InputCell>,
    pub commands: mpsc::UnboundedSender<SessionCommand>,
}

impl Binding {
    /// Queues a command for the bound session. Returns false once it has ended.
    pub fn send(&self, command: SessionCommand) -> bool {
        self.commands.send(command).is_ok()
    }
}

/// Process-wide map of live sessions.
///
/// Each session runs in its own task and is removed from the map when that
/// task finishes, whatever the reason.
pub struct SessionRegistry {
    config: ServerConfig,
    reconnection: Arc<ReconnectionManager>,
    recorder: Arc<dyn MatchRecorder>,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new(config: ServerConfig, recorder: Arc<dyn MatchRecorder>) -> Arc<Self> {
        let reconnection = Arc::new(ReconnectionManager::new(config.grace_period));
        Arc::new(SessionRegistry {
            config,
            reconnection,
            recorder,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn reconnection(&self) -> &ReconnectionManager {
        &self.reconnection
    }

    /// Validates the request and spawns a new session waiting for its players.
    pub async fn create_session(
        self: &Arc<Self>,
        request: CreateGameRequest,
    ) -> Result<String, SettingsError> {
        let settings = SessionSettings::from_request(request)?;

        let mut sessions = self.sessions.write().await;
        let id = loop {
            let candidate = new_session_id();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        let (session, handle) = GameSession::new(
            id.clone(),
            settings,
            &self.config,
            Arc::clone(&self.reconnection),
            Arc::clone(&self.recorder),
        );
        sessions.insert(id.clone(), handle);
        drop(sessions);

        let registry = Arc::clone(self);
        let session_id = id.clone();
        tokio::spawn(async move {
            session.run().await;
            registry.remove(&session_id).await;
        });

        Ok(id)
    }

    /// Binds `connection` to the seat of `alias` in the given session.
    pub async fn join(
        &self,
        session_id: &str,
        alias: &str,
        connection: Connection,
    ) -> Result<Binding, JoinError> {
        let handle = self
            .get(session_id)
            .await
            .ok_or_else(|| JoinError::UnknownSession(session_id.to_string()))?;
        let side = handle
            .side_of(alias)
            .ok_or_else(|| JoinError::UnknownAlias {
                session_id: session_id.to_string(),
                alias: alias.to_string(),
            })?;

        if !handle.send(SessionCommand::Attach { side, connection }) {
            return Err(JoinError::SessionClosed(session_id.to_string()));
        }
        debug!("Connection bound to {}/{:?}", session_id, side);

        Ok(Binding {
            session_id: session_id.to_string(),
            side,
            input: handle.input(side),
            commands: handle.commands(),
        })
    }

    pub async fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Asks every live session to finish as aborted.
    pub async fn shutdown_all(&self) {
        let sessions = self.sessions.read().await;
        info!("Shutting down {} session(s)", sessions.len());
        for handle in sessions.values() {
            handle.send(SessionCommand::Shutdown);
        }
    }

    /// Waits until every session has been removed. Returns false on timeout.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_empty().await {
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(self.config.tick_duration()).await;
        }
        true
    }

    async fn remove(&self, session_id: &str) {
        if self.sessions.write().await.remove(session_id).is_some() {
            debug!("Session {} removed from registry", session_id);
        }
    }
}

fn new_session_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect()
}
