use crate::game::GameConfig;
use crate::reconnection::DEFAULT_GRACE_PERIOD;
use shared::DEFAULT_TARGET_SCORE;
use std::time::Duration;

/// Runtime settings of the server, usually built from command-line flags.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Simulation updates per second.
    pub tick_rate: u32,
    /// How long a disconnected player may take to come back.
    pub grace_period: Duration,
    /// A connection that sends nothing (not even a ping) for this long is dropped.
    pub idle_timeout: Duration,
    /// A session still missing a player after this long is abandoned.
    pub join_timeout: Duration,
    pub default_target_score: u32,
    /// Pause between a goal (or the start) and the next serve.
    pub serve_delay: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            tick_rate: 60,
            grace_period: DEFAULT_GRACE_PERIOD,
            idle_timeout: Duration::from_secs(15),
            join_timeout: Duration::from_secs(120),
            default_target_score: DEFAULT_TARGET_SCORE,
            serve_delay: Duration::from_secs(1),
        }
    }
}

impl ServerConfig {
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }

    /// Fixed simulation step in seconds.
    pub fn tick_dt(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }

    /// Converts a duration to a whole number of ticks, rounding up.
    pub fn ticks_for(&self, duration: Duration) -> u64 {
        (duration.as_secs_f64() * self.tick_rate.max(1) as f64).ceil() as u64
    }

    pub fn game_config(&self, target_score: Option<u32>) -> GameConfig {
        GameConfig {
            target_score: target_score.unwrap_or(self.default_target_score),
            serve_delay_ticks: self.ticks_for(self.serve_delay) as u32,
        }
    }
}
