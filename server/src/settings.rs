use crate::error::SettingsError;
use rand::seq::SliceRandom;
use rand::Rng;
use shared::{
    Character, CreateGameRequest, GameMode, GameSetup, PlayerSettings, SetupPlayer, Side,
    CANVAS_HEIGHT, CANVAS_WIDTH,
};

const CLASSIC_BACKGROUND: &str = "classic";
const CRAZY_BACKGROUNDS: [&str; 4] = ["nebula", "arcade", "neon_grid", "sunset"];
const CLASSIC_PADDLE_COLOR: &str = "#ffffff";
const DEFAULT_PADDLE_COLORS: [&str; 2] = ["#4fc3f7", "#ff8a65"];

/// Creation settings that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub mode: GameMode,
    pub players: [PlayerSettings; 2],
    pub characters: [Option<Character>; 2],
    pub target_score: Option<u32>,
}

impl SessionSettings {
    /// Validates a raw creation request. Nothing is created on error.
    pub fn from_request(request: CreateGameRequest) -> Result<Self, SettingsError> {
        let mode = match request.mode.to_ascii_uppercase().as_str() {
            "CLASSIC" => GameMode::Classic,
            "CRAZY" => GameMode::Crazy,
            _ => return Err(SettingsError::UnknownMode(request.mode)),
        };
        let left = request
            .player1
            .ok_or(SettingsError::MissingPlayer("player1"))?;
        let right = request
            .player2
            .ok_or(SettingsError::MissingPlayer("player2"))?;

        let mut characters = [None; 2];
        for (slot, player) in characters.iter_mut().zip([&left, &right]) {
            if player.alias.trim().is_empty() {
                return Err(SettingsError::EmptyAlias);
            }
            if mode == GameMode::Crazy {
                *slot = Some(resolve_character(player)?);
            }
        }
        if left.alias == right.alias {
            return Err(SettingsError::DuplicateAlias(left.alias));
        }
        if request.target_score == Some(0) {
            return Err(SettingsError::InvalidTargetScore);
        }

        Ok(SessionSettings {
            mode,
            players: [left, right],
            characters,
            target_score: request.target_score,
        })
    }

    pub fn player(&self, side: Side) -> &PlayerSettings {
        &self.players[side.index()]
    }

    /// Always `None` in CLASSIC mode, whatever the request carried.
    pub fn character(&self, side: Side) -> Option<Character> {
        self.characters[side.index()]
    }

    /// Resolves the cosmetic choices sent to both players before the match.
    pub fn resolve_setup<R: Rng + ?Sized>(&self, target_score: u32, rng: &mut R) -> GameSetup {
        let background = match self.mode {
            GameMode::Classic => CLASSIC_BACKGROUND,
            GameMode::Crazy => CRAZY_BACKGROUNDS
                .choose(rng)
                .copied()
                .unwrap_or(CLASSIC_BACKGROUND),
        };

        let players = [Side::Left, Side::Right]
            .into_iter()
            .map(|side| {
                let settings = self.player(side);
                let paddle_color = match self.mode {
                    GameMode::Classic => CLASSIC_PADDLE_COLOR.to_string(),
                    GameMode::Crazy => settings
                        .paddle_color
                        .clone()
                        .unwrap_or_else(|| DEFAULT_PADDLE_COLORS[side.index()].to_string()),
                };
                SetupPlayer {
                    alias: settings.alias.clone(),
                    side,
                    character: self.character(side),
                    paddle_color,
                }
            })
            .collect();

        GameSetup {
            mode: self.mode,
            background: background.to_string(),
            canvas_width: CANVAS_WIDTH,
            canvas_height: CANVAS_HEIGHT,
            target_score,
            players,
        }
    }
}

fn resolve_character(player: &PlayerSettings) -> Result<Character, SettingsError> {
    let name = player
        .character
        .as_deref()
        .ok_or_else(|| SettingsError::MissingCharacter(player.alias.clone()))?;
    Character::from_name(name).ok_or_else(|| SettingsError::UnknownCharacter(name.to_string()))
}
