//! Wire protocol and game constants shared between the session server and its clients.
//!
//! Every message is a JSON object tagged by a `type` field. Inbound messages are
//! [`ClientMessage`], outbound ones are [`ServerMessage`].

use serde::{Deserialize, Serialize};

pub const CANVAS_WIDTH: f32 = 800.0;
pub const CANVAS_HEIGHT: f32 = 600.0;

pub const PADDLE_WIDTH: f32 = 12.0;
pub const PADDLE_HEIGHT: f32 = 100.0;
/// Distance between a paddle and its side wall.
pub const PADDLE_MARGIN: f32 = 20.0;

pub const BALL_RADIUS: f32 = 8.0;

/// Paddle speed and ball serve speed, in pixels per second.
pub const BASE_SPEED: f32 = 400.0;
/// Ceiling for the ball speed outside of a ball-burst power-up.
pub const MAX_SPEED: f32 = std::f32::consts::SQRT_2 * BASE_SPEED;

pub const DEFAULT_TARGET_SCORE: u32 = 11;

/// Which half of the court a player defends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    #[default]
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunningState {
    Waiting,
    Playing,
    Paused,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameMode {
    Classic,
    Crazy,
}

/// Playable characters in CRAZY mode. Each one owns exactly one power-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Character {
    Titan,
    Mirage,
    Hex,
    Comet,
}

impl Character {
    /// Looks a character up by its wire name, ignoring case.
    pub fn from_name(name: &str) -> Option<Character> {
        match name.to_ascii_lowercase().as_str() {
            "titan" => Some(Character::Titan),
            "mirage" => Some(Character::Mirage),
            "hex" => Some(Character::Hex),
            "comet" => Some(Character::Comet),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    Idle,
    Active,
    Cooldown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    ScoreReached,
    Forfeit,
    Abandoned,
    Aborted,
}

/// Per-player settings as handed over by the collaborator that creates the match.
/// `character` stays text for the same reason as `CreateGameRequest::mode`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSettings {
    pub alias: String,
    #[serde(default)]
    pub character: Option<String>,
    #[serde(default)]
    pub paddle_color: Option<String>,
}

/// Raw session creation request. `mode` stays a string so an unknown mode can be
/// reported as a settings error rather than a malformed message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateGameRequest {
    pub mode: String,
    #[serde(default)]
    pub player1: Option<PlayerSettings>,
    #[serde(default)]
    pub player2: Option<PlayerSettings>,
    #[serde(default)]
    pub target_score: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateGame(CreateGameRequest),
    JoinGame { session_id: String, alias: String },
    Movement { direction: Direction },
    PowerUp,
    Ping,
    Pause,
    Resume,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaddleView {
    pub y: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    pub left: u32,
    pub right: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Paddles {
    pub left: PaddleView,
    pub right: PaddleView,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Powers {
    pub left: Option<PowerState>,
    pub right: Option<PowerState>,
}

/// Per-tick view of a match pushed to both players.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub ball: Point,
    pub decoys: Vec<Point>,
    pub paddles: Paddles,
    pub scores: Scores,
    pub powers: Powers,
    pub running_state: RunningState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlayerStats {
    pub powers_used: u32,
    pub paddle_hits: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideStats {
    pub left: PlayerStats,
    pub right: PlayerStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub winner: Option<Side>,
    pub reason: EndReason,
    pub scores: Scores,
    pub stats: SideStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupPlayer {
    pub alias: String,
    pub side: Side,
    pub character: Option<Character>,
    pub paddle_color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSetup {
    pub mode: GameMode,
    pub background: String,
    pub canvas_width: f32,
    pub canvas_height: f32,
    pub target_score: u32,
    pub players: Vec<SetupPlayer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    GameCreated { session_id: String },
    GameSetup(GameSetup),
    GameStart,
    State(Snapshot),
    MatchResult(MatchResult),
    Pong,
    Error { message: String },
}
