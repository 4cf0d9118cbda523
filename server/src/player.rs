use crate::attack::{Attack, EffectKind};
use crate::physics::Paddle;
use shared::{Character, Direction, PlayerStats, Side};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

// One participant in a match, as seen by the simulation
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub side: Side,
    pub alias: String,
    pub paddle: Paddle,
    pub attack: Option<Attack>,
    pub score: u32,
    pub input: Direction,
    pub stats: PlayerStats,
}

impl Player {
    pub fn new(side: Side, alias: impl Into<String>, character: Option<Character>) -> Self {
        Player {
            side,
            alias: alias.into(),
            paddle: Paddle::new(side),
            attack: character.map(|c| Attack::new(EffectKind::for_character(c), side)),
            score: 0,
            input: Direction::Stop,
            stats: PlayerStats::default(),
        }
    }

    // Back to the start of a round; score and stats are kept
    pub fn reset_round(&mut self) {
        self.paddle.reset();
        self.input = Direction::Stop;
    }
}

const STOP: u8 = 0;
const UP: u8 = 1;
const DOWN: u8 = 2;

/// Latest input of one seat.
///
/// The connection task writes it whenever a message arrives and the tick loop
/// reads it once per tick. Newer movement simply overwrites older movement, and
/// a power-up request stays pending until the tick loop takes it.
#[derive(Debug, Default)]
pub struct InputCell {
    direction: AtomicU8,
    power_up: AtomicBool,
}

impl InputCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_direction(&self, direction: Direction) {
        let raw = match direction {
            Direction::Stop => STOP,
            Direction::Up => UP,
            Direction::Down => DOWN,
        };
        self.direction.store(raw, Ordering::Release);
    }

    pub fn direction(&self) -> Direction {
        match self.direction.load(Ordering::Acquire) {
            UP => Direction::Up,
            DOWN => Direction::Down,
            _ => Direction::Stop,
        }
    }

    pub fn request_power_up(&self) {
        self.power_up.store(true, Ordering::Release);
    }

    // Returns the pending request and clears it
    pub fn take_power_up(&self) -> bool {
        self.power_up.swap(false, Ordering::AcqRel)
    }

    pub fn reset(&self) {
        self.set_direction(Direction::Stop);
        self.power_up.store(false, Ordering::Release);
    }
}
