use crate::attack::{AttackTransition, Decoy, EffectTargets};
use crate::physics::{bounce_off_paddle, bounce_off_side_walls, bounce_off_walls, scoring_side, Ball};
use crate::player::Player;
use log::info;
use shared::{
    Direction, EndReason, MatchResult, PaddleView, Paddles, Powers, RunningState, Scores, Side,
    SideStats, Snapshot, DEFAULT_TARGET_SCORE, MAX_SPEED,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameConfig {
    pub target_score: u32,
    /// Ticks the ball rests at the centre before each serve.
    pub serve_delay_ticks: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            target_score: DEFAULT_TARGET_SCORE,
            serve_delay_ticks: 60,
        }
    }
}

/// Things that happened during a tick, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    Served { toward: Side },
    WallBounce,
    PaddleHit { side: Side },
    Goal { scorer: Side },
    PowerExpired { side: Side },
    PowerReady { side: Side },
    MatchWon { winner: Side },
}

/// Authoritative state of one match.
///
/// Only the owning session task mutates it. `tick` is a pure function of the
/// current state, the stored inputs and `dt`, so a run is reproducible bit for
/// bit.
#[derive(Debug, Clone)]
pub struct GameState {
    pub tick: u64,
    pub running: RunningState,
    pub ball: Ball,
    pub decoys: Vec<Decoy>,
    left: Player,
    right: Player,
    config: GameConfig,
    /// Remaining ticks before the next serve; `None` while the ball is in play.
    serve_countdown: Option<u32>,
    serve_toward: Side,
    serves: u32,
    winner: Option<Side>,
    end_reason: Option<EndReason>,
}

impl GameState {
    pub fn new(config: GameConfig, left: Player, right: Player) -> Self {
        Self {
            tick: 0,
            running: RunningState::Waiting,
            ball: Ball::centred(),
            decoys: Vec::new(),
            left,
            right,
            config,
            serve_countdown: None,
            serve_toward: Side::Left,
            serves: 0,
            winner: None,
            end_reason: None,
        }
    }

    pub fn player(&self, side: Side) -> &Player {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.running == RunningState::Finished
    }

    /// Leaves `waiting` and schedules the opening serve toward `first_serve`.
    pub fn start(&mut self, first_serve: Side) {
        if self.running != RunningState::Waiting {
            return;
        }
        self.running = RunningState::Playing;
        self.serve_toward = first_serve;
        self.serve_countdown = Some(self.config.serve_delay_ticks);
        info!("Match started, first serve toward {:?}", first_serve);
    }

    pub fn pause(&mut self) {
        if self.running == RunningState::Playing {
            self.running = RunningState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.running == RunningState::Paused {
            self.running = RunningState::Playing;
        }
    }

    pub fn set_input(&mut self, side: Side, direction: Direction) {
        if self.is_finished() {
            return;
        }
        self.player_mut(side).input = direction;
    }

    /// Triggers the side's power-up. Only honoured while playing and when the
    /// attack is idle.
    pub fn trigger_power_up(&mut self, side: Side) -> bool {
        if self.running != RunningState::Playing {
            return false;
        }
        let (own, enemy) = match side {
            Side::Left => (&mut self.left, &mut self.right),
            Side::Right => (&mut self.right, &mut self.left),
        };
        match own.attack.as_mut() {
            Some(attack) => {
                let mut targets = EffectTargets {
                    own: &mut own.paddle,
                    enemy: &mut enemy.paddle,
                    ball: &mut self.ball,
                    decoys: &mut self.decoys,
                };
                attack.trigger(&mut targets, &mut own.stats)
            }
            None => false,
        }
    }

    /// Advances the simulation by one fixed step. Does nothing unless playing.
    pub fn tick(&mut self, dt: f32) -> Vec<GameEvent> {
        let mut events = Vec::new();
        if self.running != RunningState::Playing {
            return events;
        }
        self.tick += 1;

        for player in [&mut self.left, &mut self.right] {
            player.paddle.steer(player.input);
            player.paddle.integrate(dt);
        }

        match self.serve_countdown {
            Some(0) => {
                let vertical_sign = if self.serves % 2 == 0 { 1.0 } else { -1.0 };
                self.ball.serve(self.serve_toward, vertical_sign);
                self.serves += 1;
                self.serve_countdown = None;
                events.push(GameEvent::Served {
                    toward: self.serve_toward,
                });
            }
            Some(remaining) => self.serve_countdown = Some(remaining - 1),
            None => self.ball.integrate(dt),
        }

        for decoy in &mut self.decoys {
            decoy.ball.integrate(dt);
            bounce_off_walls(&mut decoy.ball);
            bounce_off_side_walls(&mut decoy.ball);
        }

        if bounce_off_walls(&mut self.ball) {
            events.push(GameEvent::WallBounce);
        }
        for player in [&mut self.left, &mut self.right] {
            if bounce_off_paddle(&mut self.ball, &player.paddle, MAX_SPEED) {
                player.stats.paddle_hits += 1;
                events.push(GameEvent::PaddleHit { side: player.side });
            }
        }
        if let Some(scorer) = scoring_side(&self.ball) {
            self.score_goal(scorer, &mut events);
            if self.is_finished() {
                return events;
            }
        }

        self.update_attacks(dt, &mut events);
        events
    }

    /// Ends the match in favour of the side opposite `loser`.
    pub fn forfeit(&mut self, loser: Side) {
        self.finish(Some(loser.opponent()), EndReason::Forfeit);
    }

    /// Ends the match without a winner.
    pub fn abort(&mut self, reason: EndReason) {
        self.finish(None, reason);
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tick: self.tick,
            ball: self.ball.position(),
            decoys: self.decoys.iter().map(|d| d.ball.position()).collect(),
            paddles: Paddles {
                left: paddle_view(&self.left),
                right: paddle_view(&self.right),
            },
            scores: self.scores(),
            powers: Powers {
                left: self.left.attack.as_ref().map(|a| a.power_state()),
                right: self.right.attack.as_ref().map(|a| a.power_state()),
            },
            running_state: self.running,
        }
    }

    /// Final result, available once the match is finished.
    pub fn result(&self) -> Option<MatchResult> {
        let reason = self.end_reason?;
        Some(MatchResult {
            winner: self.winner,
            reason,
            scores: self.scores(),
            stats: SideStats {
                left: self.left.stats,
                right: self.right.stats,
            },
        })
    }

    fn player_mut(&mut self, side: Side) -> &mut Player {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    fn scores(&self) -> Scores {
        Scores {
            left: self.left.score,
            right: self.right.score,
        }
    }

    fn score_goal(&mut self, scorer: Side, events: &mut Vec<GameEvent>) {
        self.player_mut(scorer).score += 1;
        events.push(GameEvent::Goal { scorer });
        info!(
            "{:?} scored, {}-{}",
            scorer, self.left.score, self.right.score
        );

        self.ball.reset();
        self.cancel_attacks();
        self.decoys.clear();
        self.left.reset_round();
        self.right.reset_round();

        if self.player(scorer).score >= self.config.target_score {
            events.push(GameEvent::MatchWon { winner: scorer });
            self.finish(Some(scorer), EndReason::ScoreReached);
            return;
        }

        // The conceding side receives the next serve
        self.serve_toward = scorer.opponent();
        self.serve_countdown = Some(self.config.serve_delay_ticks);
    }

    fn cancel_attacks(&mut self) {
        for side in [Side::Left, Side::Right] {
            let (own, enemy) = match side {
                Side::Left => (&mut self.left, &mut self.right),
                Side::Right => (&mut self.right, &mut self.left),
            };
            if let Some(attack) = own.attack.as_mut() {
                let mut targets = EffectTargets {
                    own: &mut own.paddle,
                    enemy: &mut enemy.paddle,
                    ball: &mut self.ball,
                    decoys: &mut self.decoys,
                };
                attack.cancel(&mut targets);
            }
        }
    }

    fn update_attacks(&mut self, dt: f32, events: &mut Vec<GameEvent>) {
        for side in [Side::Left, Side::Right] {
            let (own, enemy) = match side {
                Side::Left => (&mut self.left, &mut self.right),
                Side::Right => (&mut self.right, &mut self.left),
            };
            if let Some(attack) = own.attack.as_mut() {
                let mut targets = EffectTargets {
                    own: &mut own.paddle,
                    enemy: &mut enemy.paddle,
                    ball: &mut self.ball,
                    decoys: &mut self.decoys,
                };
                match attack.update(dt, &mut targets) {
                    Some(AttackTransition::Expired) => events.push(GameEvent::PowerExpired { side }),
                    Some(AttackTransition::Ready) => events.push(GameEvent::PowerReady { side }),
                    None => {}
                }
            }
        }
    }

    fn finish(&mut self, winner: Option<Side>, reason: EndReason) {
        if self.is_finished() {
            return;
        }
        self.running = RunningState::Finished;
        self.winner = winner;
        self.end_reason = Some(reason);
        info!("Match finished ({:?}), winner {:?}", reason, winner);
    }
}

fn paddle_view(player: &Player) -> PaddleView {
    PaddleView {
        y: player.paddle.y,
        height: player.paddle.height,
    }
}
