//! JSON file score store
//!
//! The whole book is rewritten on every change. Files larger than 10MB are
//! refused on load.

use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{PlayerId, PlayerRecord, ScoreBook, ScoreRecord, ScoreStore, ScoreWithPlayer, StoreError};

const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Score store persisted to a single JSON file
#[derive(Debug)]
pub struct JsonScoreStore {
    path: PathBuf,
    book: RwLock<ScoreBook>,
}

impl JsonScoreStore {
    /// Open a store, loading existing data if the file is present
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let book = load(&path)?;
        Ok(Self {
            path,
            book: RwLock::new(book),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, book: &ScoreBook) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let contents = serde_json::to_string_pretty(book)?;
        fs::write(&self.path, contents)?;
        debug!("Saved {} scores to {}", book.len(), self.path.display());
        Ok(())
    }
}

fn load(path: &Path) -> Result<ScoreBook, StoreError> {
    if !path.exists() {
        debug!("No existing score file at {}", path.display());
        return Ok(ScoreBook::new());
    }

    let size = fs::metadata(path)?.len();
    if size > MAX_FILE_SIZE {
        return Err(StoreError::TooLarge {
            size,
            limit: MAX_FILE_SIZE,
        });
    }

    let contents = fs::read_to_string(path)?;
    let book: ScoreBook = serde_json::from_str(&contents)?;
    info!("Loaded {} scores from {}", book.len(), path.display());
    Ok(book)
}

impl ScoreStore for JsonScoreStore {
    fn save_player(&self, player: PlayerRecord) -> Result<(), StoreError> {
        let mut book = self.book.write();
        let previous = book.clone();
        book.save_player(player);
        if let Err(e) = self.persist(&book) {
            *book = previous;
            return Err(e);
        }
        Ok(())
    }

    fn insert_score(&self, score: ScoreRecord) -> Result<(), StoreError> {
        let mut book = self.book.write();
        let previous = book.clone();
        book.insert_score(score)?;
        if let Err(e) = self.persist(&book) {
            *book = previous;
            return Err(e);
        }
        Ok(())
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;
    use tokio_test::assert_ok;

    fn player() -> PlayerRecord {
        PlayerRecord::new(
            "Test Player",
            "M",
            "3",
            NaiveDate::from_ymd_opt(2001, 8, 1).unwrap(),
            7,
        )
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let dir = tempdir().unwrap();
        let store = JsonScoreStore::open(dir.path().join("scores.json")).unwrap();
        assert!(store.all_players().unwrap().is_empty());
        assert!(store.top_scores().unwrap().is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("scores.json");
        let p = player();

        {
            let store = assert_ok!(JsonScoreStore::open(&path));
            assert_ok!(store.save_player(p.clone()));
            assert_ok!(store.insert_score(ScoreRecord::new(p.id, 42, 1, 7)));
        }

        let store = JsonScoreStore::open(&path).unwrap();
        assert_eq!(store.all_players().unwrap(), vec![p.clone()]);
        assert_eq!(store.best_score(p.id).unwrap(), Some(42));
        let top = store.top_scores().unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].player.id, p.id);
    }

    #[test]
    fn test_unknown_player_not_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scores.json");
        let store = JsonScoreStore::open(&path).unwrap();

        let result = store.insert_score(ScoreRecord::new(PlayerId::new_v4(), 1, 0, 1));
        assert!(matches!(result, Err(StoreError::UnknownPlayer(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scores.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            JsonScoreStore::open(&path),
            Err(StoreError::Format(_))
        ));
    }
}
