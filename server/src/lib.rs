//! # Pong Session Server Library
//!
//! This library provides the authoritative server for real-time Pong matches.
//! Each match runs as its own session: the server owns the simulation, applies
//! player input on a fixed tick, and pushes a snapshot of the court to both
//! players after every step.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Paddles, ball, goals and power-ups are simulated only here. Clients send
//! intentions (`up`, `down`, `stop`, `power_up`) and render whatever the server
//! reports back.
//!
//! ### Session Lifecycle
//! A session is created from validated settings, waits for both players to
//! bind, plays until someone reaches the target score, and then tears itself
//! down: one `match_result` message, both connections closed once, timers
//! cancelled, the result handed to a `MatchRecorder`.
//!
//! ### Disconnect Resilience
//! A dropped connection pauses the match and opens a grace window. If the
//! player comes back in time the match resumes; otherwise the opponent wins
//! by forfeit.
//!
//! ## Architecture Design
//!
//! ### One Task Per Session
//! Every session is a tokio task and the only writer of its game state. There
//! is no lock around the simulation. Connection tasks communicate with it in
//! two ways:
//! - **Input cells** hold each seat's latest direction and a pending power-up
//!   request. Newer input overwrites older input; the tick loop reads the cell
//!   once per tick.
//! - **Session commands** (attach, detach, pause, resume, quit, grace expiry,
//!   shutdown) are queued on a channel and drained at the next tick boundary.
//!
//! ### Fixed Time Step
//! The simulation always advances by `1 / tick_rate` seconds, whatever the
//! wall-clock jitter of the tick timer. Given the same inputs a match replays
//! bit for bit.
//!
//! ### One Writer Per Socket
//! Outbound frames go through a channel drained by a dedicated writer task, so
//! a slow client never blocks the tick and frames never interleave. A failed
//! send is treated as a disconnect.
//!
//! ## Module Organization
//!
//! ### Physics Module (`physics`)
//! Paddle and ball state plus the collision rules: wall bounces, paddle
//! deflection by contact point, goal detection.
//!
//! ### Attack Module (`attack`)
//! The CRAZY mode power-ups. Each character maps to one effect with a
//! magnitude, a duration and a cooldown; effects are re-applied with absolute
//! values every tick and reverted exactly on expiry.
//!
//! ### Game Module (`game`)
//! The match state machine and the per-tick pipeline. Pure and synchronous.
//!
//! ### Session, Registry and Network Modules
//! `session` drives one match, `registry` keeps the live sessions and routes
//! joins, `network` speaks JSON over WebSockets.
//!
//! ### Reconnection Module (`reconnection`)
//! Grace-period timers keyed by session and side.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//! use server::recorder::LogRecorder;
//! use server::registry::SessionRegistry;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = SessionRegistry::new(ServerConfig::default(), Arc::new(LogRecorder));
//!     let server = Server::bind(registry).await?;
//!
//!     // Accepts WebSocket connections until the process exits:
//!     // - `create_game` validates settings and spawns a session
//!     // - `join_game` binds the connection to a seat
//!     // - movement and power-ups feed the seat's input cell
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod attack;
pub mod config;
pub mod connection;
pub mod error;
pub mod game;
pub mod network;
pub mod physics;
pub mod player;
pub mod reconnection;
pub mod recorder;
pub mod registry;
pub mod session;
pub mod settings;
