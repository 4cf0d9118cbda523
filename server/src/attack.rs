//! Character power-ups.
//!
//! Every [`Character`] maps to one [`EffectKind`], and every kind maps to a fixed
//! [`EffectConfig`]. An [`Attack`] walks `idle → active → cooldown → idle`. While
//! active its effect is re-applied each tick with absolute values, and on expiry
//! it is reverted to the constants (or the baseline captured at trigger time), so
//! nothing drifts across activations.

use crate::physics::{Ball, Paddle};
use log::debug;
use shared::{Character, PlayerStats, PowerState, Side, BASE_SPEED, MAX_SPEED, PADDLE_HEIGHT};

/// Angle between a decoy and the real ball, per decoy pair.
const DECOY_SPREAD: f32 = 0.35;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    /// Grows the owner's paddle and makes it faster.
    PaddleBuff,
    /// Spawns balls that move like the real one but never score.
    Decoys,
    /// Shrinks the opponent's paddle.
    ShrinkOpponent,
    /// Temporarily pushes the ball beyond its normal speed ceiling.
    BallBurst,
}

/// Fixed tuning of one effect kind. Durations are in seconds of simulated time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectConfig {
    pub magnitude: f32,
    pub duration: f32,
    pub cooldown: f32,
}

impl EffectKind {
    pub fn for_character(character: Character) -> EffectKind {
        match character {
            Character::Titan => EffectKind::PaddleBuff,
            Character::Mirage => EffectKind::Decoys,
            Character::Hex => EffectKind::ShrinkOpponent,
            Character::Comet => EffectKind::BallBurst,
        }
    }

    pub fn config(self) -> EffectConfig {
        match self {
            // height and speed factor
            EffectKind::PaddleBuff => EffectConfig {
                magnitude: 1.5,
                duration: 5.0,
                cooldown: 12.0,
            },
            // number of decoys
            EffectKind::Decoys => EffectConfig {
                magnitude: 2.0,
                duration: 4.0,
                cooldown: 12.0,
            },
            // enemy height factor
            EffectKind::ShrinkOpponent => EffectConfig {
                magnitude: 0.5,
                duration: 5.0,
                cooldown: 12.0,
            },
            // ball speed factor
            EffectKind::BallBurst => EffectConfig {
                magnitude: 1.6,
                duration: 3.0,
                cooldown: 10.0,
            },
        }
    }
}

/// A ball that only exists to distract; it bounces off every wall and never scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decoy {
    pub owner: Side,
    pub ball: Ball,
}

/// Everything an effect may touch, seen from the attack owner's side.
pub struct EffectTargets<'a> {
    pub own: &'a mut Paddle,
    pub enemy: &'a mut Paddle,
    pub ball: &'a mut Ball,
    pub decoys: &'a mut Vec<Decoy>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttackState {
    Idle,
    Active { elapsed: f32 },
    Cooldown { elapsed: f32 },
}

/// Result of advancing an attack by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackTransition {
    Expired,
    Ready,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attack {
    pub kind: EffectKind,
    pub side: Side,
    pub state: AttackState,
    /// Ball speed at trigger time, restored when a burst ends.
    baseline_speed: f32,
}

impl Attack {
    pub fn new(kind: EffectKind, side: Side) -> Self {
        Attack {
            kind,
            side,
            state: AttackState::Idle,
            baseline_speed: BASE_SPEED,
        }
    }

    pub fn power_state(&self) -> PowerState {
        match self.state {
            AttackState::Idle => PowerState::Idle,
            AttackState::Active { .. } => PowerState::Active,
            AttackState::Cooldown { .. } => PowerState::Cooldown,
        }
    }

    /// Activates the effect if the attack is idle.
    ///
    /// Returns false and changes nothing when the attack is active or cooling
    /// down. A successful trigger counts exactly once in `stats.powers_used`.
    pub fn trigger(&mut self, targets: &mut EffectTargets<'_>, stats: &mut PlayerStats) -> bool {
        if self.state != AttackState::Idle {
            return false;
        }

        self.baseline_speed = if targets.ball.is_moving() {
            targets.ball.speed()
        } else {
            BASE_SPEED
        };
        if self.kind == EffectKind::Decoys {
            self.spawn_decoys(targets);
        }
        self.state = AttackState::Active { elapsed: 0.0 };
        stats.powers_used += 1;
        debug!("{:?} triggered {:?}", self.side, self.kind);
        true
    }

    /// Applies the effect while active and advances the state timers by `dt`.
    pub fn update(&mut self, dt: f32, targets: &mut EffectTargets<'_>) -> Option<AttackTransition> {
        let config = self.kind.config();
        match self.state {
            AttackState::Idle => None,
            AttackState::Active { elapsed } => {
                self.apply(targets);
                let elapsed = elapsed + dt;
                if elapsed >= config.duration {
                    self.revert(targets);
                    self.state = AttackState::Cooldown { elapsed: 0.0 };
                    Some(AttackTransition::Expired)
                } else {
                    self.state = AttackState::Active { elapsed };
                    None
                }
            }
            AttackState::Cooldown { elapsed } => {
                let elapsed = elapsed + dt;
                if elapsed >= config.cooldown {
                    self.state = AttackState::Idle;
                    Some(AttackTransition::Ready)
                } else {
                    self.state = AttackState::Cooldown { elapsed };
                    None
                }
            }
        }
    }

    /// Ends an active effect early and starts the cooldown. Used when a point is scored.
    pub fn cancel(&mut self, targets: &mut EffectTargets<'_>) {
        if let AttackState::Active { .. } = self.state {
            self.revert(targets);
            self.state = AttackState::Cooldown { elapsed: 0.0 };
        }
    }

    fn apply(&self, targets: &mut EffectTargets<'_>) {
        let magnitude = self.kind.config().magnitude;
        match self.kind {
            EffectKind::PaddleBuff => {
                targets.own.resize(PADDLE_HEIGHT * magnitude);
                targets.own.speed_modifier = magnitude;
            }
            EffectKind::ShrinkOpponent => {
                targets.enemy.resize(PADDLE_HEIGHT * magnitude);
            }
            EffectKind::BallBurst => {
                if targets.ball.is_moving() {
                    targets.ball.set_speed(self.baseline_speed * magnitude);
                }
            }
            // Decoys move with the rest of the simulation
            EffectKind::Decoys => {}
        }
    }

    fn revert(&self, targets: &mut EffectTargets<'_>) {
        match self.kind {
            EffectKind::PaddleBuff => {
                targets.own.resize(PADDLE_HEIGHT);
                targets.own.speed_modifier = 1.0;
            }
            EffectKind::ShrinkOpponent => {
                targets.enemy.resize(PADDLE_HEIGHT);
            }
            EffectKind::BallBurst => {
                if targets.ball.is_moving() {
                    targets.ball.set_speed(self.baseline_speed.min(MAX_SPEED));
                }
            }
            EffectKind::Decoys => {
                let owner = self.side;
                targets.decoys.retain(|decoy| decoy.owner != owner);
            }
        }
    }

    fn spawn_decoys(&self, targets: &mut EffectTargets<'_>) {
        let count = self.kind.config().magnitude as usize;
        let ball = *targets.ball;
        // Head for the opponent when the ball is waiting to be served
        let (speed, heading) = if ball.is_moving() {
            (ball.speed(), ball.speed_y.atan2(ball.speed_x))
        } else {
            let heading = match self.side {
                Side::Left => 0.0,
                Side::Right => std::f32::consts::PI,
            };
            (BASE_SPEED, heading)
        };

        for i in 0..count {
            let pair = (i / 2 + 1) as f32;
            let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
            let angle = heading + sign * pair * DECOY_SPREAD;
            let mut decoy = ball;
            decoy.speed_x = speed * angle.cos();
            decoy.speed_y = speed * angle.sin();
            targets.decoys.push(Decoy {
                owner: self.side,
                ball: decoy,
            });
        }
    }
}
