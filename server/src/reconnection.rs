//! Grace-period timers for disconnected players.
//!
//! The manager only knows about timing: the caller decides what counts as a
//! disconnect and what happens when a grace period runs out. Each live timer is
//! a tokio task; an entry exists in the map exactly while that task may still
//! fire, and the map lock decides the race between expiry and cancellation, so
//! a callback runs at most once and never after `clear_timeout` returned.

use log::{debug, info};
use shared::Side;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Identifies a player across reconnects: the session plus the seat.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlayerId {
    pub session_id: String,
    pub side: Side,
}

impl PlayerId {
    pub fn new(session_id: impl Into<String>, side: Side) -> Self {
        PlayerId {
            session_id: session_id.into(),
            side,
        }
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:?}", self.session_id, self.side)
    }
}

struct GraceTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Timers {
    next_generation: u64,
    live: HashMap<PlayerId, GraceTimer>,
}

pub struct ReconnectionManager {
    grace_period: Duration,
    timers: Arc<Mutex<Timers>>,
}

impl ReconnectionManager {
    pub fn new(grace_period: Duration) -> Self {
        Self {
            grace_period,
            timers: Arc::new(Mutex::new(Timers::default())),
        }
    }

    /// Starts a grace timer for `player` unless one is already running.
    ///
    /// When the timer expires the entry is removed and `on_timeout` runs once.
    /// Must be called from within a tokio runtime.
    pub fn mark_disconnected<F>(&self, player: PlayerId, on_timeout: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut timers = lock(&self.timers);
        if timers.live.contains_key(&player) {
            debug!("Grace timer for {} already running", player);
            return;
        }

        let generation = timers.next_generation;
        timers.next_generation += 1;

        let shared = Arc::clone(&self.timers);
        let grace_period = self.grace_period;
        let key = player.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(grace_period).await;

            let expired = {
                let mut timers = lock(&shared);
                match timers.live.get(&key) {
                    Some(timer) if timer.generation == generation => {
                        timers.live.remove(&key);
                        true
                    }
                    _ => false,
                }
            };

            if expired {
                info!("Grace period for {} expired", key);
                on_timeout();
            }
        });

        info!(
            "Player {} disconnected, grace period {:?} started",
            player, grace_period
        );
        timers.live.insert(player, GraceTimer { generation, handle });
    }

    pub fn is_in_grace_period(&self, player: &PlayerId) -> bool {
        lock(&self.timers).live.contains_key(player)
    }

    /// Cancels the player's grace timer, if any.
    pub fn clear_timeout(&self, player: &PlayerId) {
        if let Some(timer) = lock(&self.timers).live.remove(player) {
            timer.handle.abort();
            debug!("Grace timer for {} cleared", player);
        }
    }

    /// Number of players currently inside a grace window.
    pub fn len(&self) -> usize {
        lock(&self.timers).live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ReconnectionManager {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_PERIOD)
    }
}

// A panic while holding the lock cannot leave the map half-updated
fn lock(timers: &Mutex<Timers>) -> MutexGuard<'_, Timers> {
    timers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
