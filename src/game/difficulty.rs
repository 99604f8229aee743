//! Difficulty resolution
//!
//! Maps the base settings chosen by the player plus their registered
//! difficulty onto the parameters one round actually runs with.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::game::constants::{difficulty, round, spawn};

/// Settings as configured, before difficulty scaling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseSettings {
    /// Game speed (1-10)
    pub game_speed: u32,
    /// Maximum live insects (1-50)
    pub max_insects: u32,
    /// Bonus interval in seconds, kept for the settings screen
    pub bonus_interval: u32,
    /// Round length in seconds
    pub round_duration: u32,
}

impl Default for BaseSettings {
    fn default() -> Self {
        Self {
            game_speed: 1,
            max_insects: 10,
            bonus_interval: 5,
            round_duration: 60,
        }
    }
}

/// Per-round parameters after difficulty scaling. Immutable for the round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectiveSettings {
    pub speed: u32,
    pub spawn_interval: Duration,
    pub max_live_insects: usize,
    pub round_duration: Duration,
    pub insect_base_speed: f32,
}

/// Resolve effective round parameters. Pure; out-of-range difficulty is clamped.
pub fn resolve(base: &BaseSettings, player_difficulty: i32) -> EffectiveSettings {
    let normalized =
        f64::from(player_difficulty.clamp(difficulty::MIN, difficulty::MAX)) / difficulty::MAX as f64;

    let speed = scaled(base.game_speed, 1.0 + normalized).max(1);
    let max_insects = scaled(base.max_insects, 1.0 + normalized).max(1);
    let round_secs = (scaled(
        base.round_duration,
        1.0 - normalized * difficulty::DURATION_SHRINK,
    ) as u64)
        .max(round::MIN_DURATION_SECS);

    let spawn_interval = Duration::from_millis(spawn::BASE_INSECT_INTERVAL_MS / u64::from(speed))
        .max(spawn::MIN_INSECT_INTERVAL);

    EffectiveSettings {
        speed,
        spawn_interval,
        max_live_insects: max_insects as usize,
        round_duration: Duration::from_secs(round_secs),
        insect_base_speed: 3.0 + speed as f32 * 2.0,
    }
}

fn scaled(value: u32, factor: f64) -> u32 {
    (f64::from(value) * factor).round() as u32
}
