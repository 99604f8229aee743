use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;

use crate::game::difficulty::BaseSettings;
use crate::game::round::RoundOptions;
use crate::game::world::Arena;

/// Central-bank precious-metals endpoint
pub const DEFAULT_GOLD_FEED_URL: &str = "https://www.cbr.ru/scripts/xml_metall.asp";

const GAME_SPEED_RANGE: RangeInclusive<u32> = 1..=10;
const MAX_INSECTS_RANGE: RangeInclusive<u32> = 1..=50;
const BONUS_INTERVAL_RANGE: RangeInclusive<u32> = 1..=30;
const ROUND_DURATION_RANGE: RangeInclusive<u32> = 10..=300;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be in {min}..={max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
    #[error("Arena size {width}x{height} is not usable")]
    InvalidArena { width: f32, height: f32 },
    #[error("Gold feed URL cannot be empty")]
    EmptyFeedUrl,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Base game speed (1-10)
    pub game_speed: u32,
    /// Base insect cap (1-50)
    pub max_insects: u32,
    /// Bonus interval in seconds, informational
    pub bonus_interval: u32,
    /// Base round length in seconds (10-300)
    pub round_duration: u32,
    /// Difficulty of the demo player (clamped to 1-10)
    pub player_difficulty: i32,
    pub arena_width: f32,
    pub arena_height: f32,
    /// JSON score file; in-memory store when unset
    pub score_store_path: Option<PathBuf>,
    pub gold_feed_url: String,
    /// Bonuses and orientation control
    pub tilt_enabled: bool,
    /// Golden insects
    pub gold_rate_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let base = BaseSettings::default();
        Self {
            game_speed: base.game_speed,
            max_insects: base.max_insects,
            bonus_interval: base.bonus_interval,
            round_duration: base.round_duration,
            player_difficulty: 1,
            arena_width: 1080.0,
            arena_height: 1920.0,
            score_store_path: None,
            gold_feed_url: DEFAULT_GOLD_FEED_URL.to_string(),
            tilt_enabled: true,
            gold_rate_enabled: true,
        }
    }
}

fn parse_into<T: FromStr>(target: &mut T, name: &str, raw: &str, accept: impl Fn(&T) -> bool) {
    match raw.trim().parse::<T>() {
        Ok(parsed) if accept(&parsed) => *target = parsed,
        Ok(_) => tracing::warn!("{} out of range ('{}'), using default", name, raw),
        Err(_) => tracing::warn!("Invalid {} '{}', using default", name, raw),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl EngineConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        Self::load_from(|name| std::env::var(name).ok())
    }

    /// Load config through `lookup`, falling back to defaults per value
    pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup("GAME_SPEED") {
            parse_into(&mut config.game_speed, "GAME_SPEED", &raw, |v| GAME_SPEED_RANGE.contains(v));
        }
        if let Some(raw) = lookup("MAX_INSECTS") {
            parse_into(&mut config.max_insects, "MAX_INSECTS", &raw, |v| MAX_INSECTS_RANGE.contains(v));
        }
        if let Some(raw) = lookup("BONUS_INTERVAL") {
            parse_into(&mut config.bonus_interval, "BONUS_INTERVAL", &raw, |v| {
                BONUS_INTERVAL_RANGE.contains(v)
            });
        }
        if let Some(raw) = lookup("ROUND_DURATION") {
            parse_into(&mut config.round_duration, "ROUND_DURATION", &raw, |v| {
                ROUND_DURATION_RANGE.contains(v)
            });
        }
        if let Some(raw) = lookup("PLAYER_DIFFICULTY") {
            parse_into(&mut config.player_difficulty, "PLAYER_DIFFICULTY", &raw, |_| true);
            config.player_difficulty = config.player_difficulty.clamp(1, 10);
        }
        if let Some(raw) = lookup("ARENA_WIDTH") {
            parse_into(&mut config.arena_width, "ARENA_WIDTH", &raw, |v| v.is_finite() && *v > 0.0);
        }
        if let Some(raw) = lookup("ARENA_HEIGHT") {
            parse_into(&mut config.arena_height, "ARENA_HEIGHT", &raw, |v| v.is_finite() && *v > 0.0);
        }

        if let Some(path) = lookup("SCORE_STORE_PATH").filter(|p| !p.trim().is_empty()) {
            config.score_store_path = Some(PathBuf::from(path));
        }
        if let Some(url) = lookup("GOLD_FEED_URL").filter(|u| !u.trim().is_empty()) {
            config.gold_feed_url = url;
        }

        for (name, flag) in [
            ("TILT_ENABLED", &mut config.tilt_enabled),
            ("GOLD_RATE_ENABLED", &mut config.gold_rate_enabled),
        ] {
            if let Some(raw) = lookup(name) {
                match parse_flag(&raw) {
                    Some(value) => *flag = value,
                    None => tracing::warn!("Invalid {} '{}', using default", name, raw),
                }
            }
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("game_speed", self.game_speed, &GAME_SPEED_RANGE)?;
        check_range("max_insects", self.max_insects, &MAX_INSECTS_RANGE)?;
        check_range("bonus_interval", self.bonus_interval, &BONUS_INTERVAL_RANGE)?;
        check_range("round_duration", self.round_duration, &ROUND_DURATION_RANGE)?;

        if self.arena().max_corner(crate::game::constants::entity::GOLDEN_SIZE).is_none() {
            return Err(ConfigError::InvalidArena {
                width: self.arena_width,
                height: self.arena_height,
            });
        }
        if self.gold_feed_url.trim().is_empty() {
            return Err(ConfigError::EmptyFeedUrl);
        }
        Ok(())
    }

    pub fn base_settings(&self) -> BaseSettings {
        BaseSettings {
            game_speed: self.game_speed,
            max_insects: self.max_insects,
            bonus_interval: self.bonus_interval,
            round_duration: self.round_duration,
        }
    }

    pub fn arena(&self) -> Arena {
        Arena::new(self.arena_width, self.arena_height)
    }

    pub fn round_options(&self) -> RoundOptions {
        RoundOptions {
            base: self.base_settings(),
            arena: self.arena(),
            tilt_enabled: self.tilt_enabled,
            gold_rate_enabled: self.gold_rate_enabled,
        }
    }
}

fn check_range(name: &'static str, value: u32, range: &RangeInclusive<u32>) -> Result<(), ConfigError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value: i64::from(value),
            min: i64::from(*range.start()),
            max: i64::from(*range.end()),
        })
    }
}
