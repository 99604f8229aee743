use parking_lot::RwLock;

use super::{PlayerId, PlayerRecord, ScoreBook, ScoreRecord, ScoreStore, ScoreWithPlayer, StoreError};

/// Score store kept in memory for the life of the process
#[derive(Debug)]
pub struct MemoryScoreStore {
    book: RwLock<ScoreBook>,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self {
            book: RwLock::new(ScoreBook::new()),
        }
    }
}

impl Default for MemoryScoreStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreStore for MemoryScoreStore {
    fn save_player(&self, player: PlayerRecord) -> Result<(), StoreError> {
        self.book.write().save_player(player);
        Ok(())
    }

    fn insert_score(&self, score: ScoreRecord) -> Result<(), StoreError> {
        self.book.write().insert_score(score)
    }

    fn best_score(&self, player_id: PlayerId) -> Result<Option<i64>, StoreError> {
        Ok(self.book.read().best_score(player_id))
    }

    fn top_scores(&self) -> Result<Vec<ScoreWithPlayer>, StoreError> {
        Ok(self.book.read().top_scores())
    }

    fn all_players(&self) -> Result<Vec<PlayerRecord>, StoreError> {
        Ok(self.book.read().all_players())
    }
}
