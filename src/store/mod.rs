//! Player and score persistence
//!
//! The round engine only needs a handful of operations from storage: save a
//! player, insert a score, look up a player's best score and list the board.
//! Two backends are provided: in-memory and a JSON file.

mod json;
mod memory;

pub use json::JsonScoreStore;
pub use memory::MemoryScoreStore;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use tracing::info;
use uuid::Uuid;

use crate::game::events::RoundSummary;

/// Unique player identifier
pub type PlayerId = Uuid;

/// How many entries the score board shows
pub const TOP_SCORES: usize = 3;

/// A registered player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub full_name: String,
    pub gender: String,
    pub course: String,
    pub birth_date: NaiveDate,
    pub zodiac_sign: String,
    /// Registered difficulty (1-10)
    pub difficulty: i32,
}

impl PlayerRecord {
    pub fn new(
        full_name: impl Into<String>,
        gender: impl Into<String>,
        course: impl Into<String>,
        birth_date: NaiveDate,
        difficulty: i32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            full_name: full_name.into(),
            gender: gender.into(),
            course: course.into(),
            birth_date,
            zodiac_sign: zodiac_sign(birth_date).to_string(),
            difficulty: difficulty.clamp(1, 10),
        }
    }
}

/// One recorded round result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub id: Uuid,
    pub player_id: PlayerId,
    pub score: i64,
    pub misses: u32,
    pub difficulty: i32,
    pub timestamp: DateTime<Utc>,
}

impl ScoreRecord {
    pub fn new(player_id: PlayerId, score: i64, misses: u32, difficulty: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            player_id,
            score,
            misses,
            difficulty,
            timestamp: Utc::now(),
        }
    }
}

/// Score joined with its player, for the board
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreWithPlayer {
    pub score: ScoreRecord,
    pub player: PlayerRecord,
}

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed score file: {0}")]
    Format(#[from] serde_json::Error),
    #[error("Score file too large ({size} bytes > {limit} limit)")]
    TooLarge { size: u64, limit: u64 },
    #[error("Unknown player {0}")]
    UnknownPlayer(PlayerId),
}

/// Persistence operations the round engine depends on
pub trait ScoreStore: Send + Sync {
    /// Insert or replace a player
    fn save_player(&self, player: PlayerRecord) -> Result<(), StoreError>;
    /// Append a score. The player must exist.
    fn insert_score(&self, score: ScoreRecord) -> Result<(), StoreError>;
    /// Highest score recorded for the player
    fn best_score(&self, player_id: PlayerId) -> Result<Option<i64>, StoreError>;
    /// Top scores by score desc, then most recent first
    fn top_scores(&self) -> Result<Vec<ScoreWithPlayer>, StoreError>;
    /// All players ordered by name
    fn all_players(&self) -> Result<Vec<PlayerRecord>, StoreError>;
}

/// Record a finished round if it beats the player's best.
/// Returns whether a score was written.
pub fn record_if_best(
    store: &dyn ScoreStore,
    player: &PlayerRecord,
    summary: &RoundSummary,
) -> Result<bool, StoreError> {
    let best = store.best_score(player.id)?;
    if best.is_some_and(|best| summary.score <= best) {
        return Ok(false);
    }

    store.insert_score(ScoreRecord::new(
        player.id,
        summary.score,
        summary.misses,
        player.difficulty,
    ))?;
    info!(
        "New best for {}: {} (previous {:?})",
        player.full_name, summary.score, best
    );
    Ok(true)
}

/// Plain data shared by the store backends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ScoreBook {
    /// Version for format compatibility
    version: u32,
    players: Vec<PlayerRecord>,
    scores: Vec<ScoreRecord>,
}

impl ScoreBook {
    pub(crate) fn new() -> Self {
        Self {
            version: 1,
            players: Vec::new(),
            scores: Vec::new(),
        }
    }

    pub(crate) fn save_player(&mut self, player: PlayerRecord) {
        match self.players.iter_mut().find(|p| p.id == player.id) {
            Some(existing) => *existing = player,
            None => self.players.push(player),
        }
    }

    pub(crate) fn insert_score(&mut self, score: ScoreRecord) -> Result<(), StoreError> {
        if !self.players.iter().any(|p| p.id == score.player_id) {
            return Err(StoreError::UnknownPlayer(score.player_id));
        }
        self.scores.push(score);
        Ok(())
    }

    pub(crate) fn best_score(&self, player_id: PlayerId) -> Option<i64> {
        self.scores
            .iter()
            .filter(|s| s.player_id == player_id)
            .map(|s| s.score)
            .max()
    }

    pub(crate) fn top_scores(&self) -> Vec<ScoreWithPlayer> {
        let mut scores: Vec<&ScoreRecord> = self.scores.iter().collect();
        scores.sort_by_key(|s| (Reverse(s.score), Reverse(s.timestamp)));

        scores
            .into_iter()
            .filter_map(|s| {
                let player = self.players.iter().find(|p| p.id == s.player_id)?;
                Some(ScoreWithPlayer {
                    score: s.clone(),
                    player: player.clone(),
                })
            })
            .take(TOP_SCORES)
            .collect()
    }

    pub(crate) fn all_players(&self) -> Vec<PlayerRecord> {
        let mut players = self.players.clone();
        players.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        players
    }

    pub(crate) fn len(&self) -> usize {
        self.scores.len()
    }
}

/// Western zodiac sign for a birth date
pub fn zodiac_sign(date: NaiveDate) -> &'static str {
    match date.month() * 100 + date.day() {
        120..=218 => "Aquarius",
        219..=320 => "Pisces",
        321..=419 => "Aries",
        420..=520 => "Taurus",
        521..=620 => "Gemini",
        621..=722 => "Cancer",
        723..=822 => "Leo",
        823..=922 => "Virgo",
        923..=1022 => "Libra",
        1023..=1121 => "Scorpio",
        1122..=1221 => "Sagittarius",
        _ => "Capricorn",
    }
}
