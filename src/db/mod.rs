mod schema;
pub mod games;
pub mod sqlite;

use chrono::Local;
use std::path::Path;

pub use games::{AdditionalNote, AdditionalPhoto, Game, NewGame};
pub use schema::{MIGRATIONS, SCHEMA};

use crate::error::Result;

/// The single durable collection of game records.
///
/// Merge logic does not live here: `replace` overwrites a whole row with an
/// already merged record, see [`crate::catalog::Catalog::apply_update`].
pub struct Database {
    inner: sqlite::SqliteDb,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let db = sqlite::SqliteDb::open(path)?;
        Ok(Self { inner: db })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self { inner: sqlite::SqliteDb::open_in_memory()? })
    }

    pub fn initialize(&self) -> Result<()> {
        self.inner.initialize()
    }

    // ========================================================================
    // Game operations
    // ========================================================================

    /// Insert a game, stamping today's date. Returns the new id.
    pub fn create(&self, new: NewGame) -> Result<i64> {
        self.inner.insert_game(new, Local::now().date_naive())
    }

    pub fn get(&self, id: i64) -> Result<Option<Game>> {
        self.inner.get_game(id)
    }

    pub fn list(&self) -> Result<Vec<Game>> {
        self.inner.list_games()
    }

    pub fn replace(&self, game: &Game) -> Result<usize> {
        self.inner.replace_game(game)
    }

    pub fn delete(&self, id: i64) -> Result<usize> {
        self.inner.delete_game(id)
    }

    pub fn clear_all(&self) -> Result<usize> {
        self.inner.clear_games()
    }
}
