use thiserror::Error;

/// Rejected session creation request. No session exists when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("unknown game mode `{0}`")]
    UnknownMode(String),

    #[error("missing settings for {0}")]
    MissingPlayer(&'static str),

    #[error("alias must not be empty")]
    EmptyAlias,

    #[error("both players use the alias `{0}`")]
    DuplicateAlias(String),

    #[error("player `{0}` must pick a character in CRAZY mode")]
    MissingCharacter(String),

    #[error("unknown character `{0}`")]
    UnknownCharacter(String),

    #[error("target score must be at least 1")]
    InvalidTargetScore,
}

/// Failure to bind a connection to a session seat.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("no session with id `{0}`")]
    UnknownSession(String),

    #[error("no player `{alias}` in session `{session_id}`")]
    UnknownAlias { session_id: String, alias: String },

    #[error("session `{0}` is no longer accepting players")]
    SessionClosed(String),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind: {0}")]
    Bind(#[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}
