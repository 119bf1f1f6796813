//! SQLite backend implementation.

use chrono::NaiveDate;
use rusqlite::types::{FromSql, Type};
use rusqlite::{Connection, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::games::{AdditionalNote, AdditionalPhoto, Game, NewGame};
use super::schema::{MIGRATIONS, SCHEMA};
use crate::error::{CatalogError, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteDb {
    conn: Mutex<Connection>,
}

impl SqliteDb {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // Statements are atomic; a poisoned lock still holds a usable connection.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn initialize(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(SCHEMA)?;
        for migration in MIGRATIONS {
            if let Err(e) = conn.execute(migration, []) {
                tracing::trace!(error = %e, migration, "Skipping applied migration");
            }
        }
        Ok(())
    }

    // ========================================================================
    // Game operations
    // ========================================================================

    pub fn insert_game(&self, new: NewGame, date_added: NaiveDate) -> Result<i64> {
        if new.title.trim().is_empty() {
            return Err(CatalogError::validation("title is required"));
        }

        let game = new.into_game(0, date_added);
        let photos_json = serde_json::to_string(&game.additional_photos)?;
        let notes_json = serde_json::to_string(&game.additional_notes)?;

        let conn = self.conn();
        conn.execute(
            r#"
            INSERT INTO games (
                title, link, rating, finished, checked, platform, strikes, notes,
                cover_art_path, gameplay_image_path, date_added,
                additional_photos, additional_notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            rusqlite::params![
                game.title,
                game.link,
                game.rating,
                game.finished,
                game.checked,
                game.platform,
                game.strikes,
                game.notes,
                game.cover_art_path,
                game.gameplay_image_path,
                game.date_added.format(DATE_FORMAT).to_string(),
                photos_json,
                notes_json,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_game(&self, id: i64) -> Result<Option<Game>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT * FROM games WHERE id = ?")?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(game_from_row(row)?)),
            None => Ok(None),
        }
    }

    pub fn list_games(&self) -> Result<Vec<Game>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT * FROM games")?;
        let games = stmt
            .query_map([], game_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(games)
    }

    /// Overwrite every updatable column of `game.id` with the given values.
    pub fn replace_game(&self, game: &Game) -> Result<usize> {
        let photos_json = serde_json::to_string(&game.additional_photos)?;
        let notes_json = serde_json::to_string(&game.additional_notes)?;

        let changed = self.conn().execute(
            r#"
            UPDATE games
            SET title = ?1, link = ?2, rating = ?3, finished = ?4, checked = ?5,
                platform = ?6, strikes = ?7, notes = ?8,
                cover_art_path = ?9, gameplay_image_path = ?10,
                additional_photos = ?11, additional_notes = ?12
            WHERE id = ?13
            "#,
            rusqlite::params![
                game.title,
                game.link,
                game.rating,
                game.finished,
                game.checked,
                game.platform,
                game.strikes,
                game.notes,
                game.cover_art_path,
                game.gameplay_image_path,
                photos_json,
                notes_json,
                game.id,
            ],
        )?;
        Ok(changed)
    }

    pub fn delete_game(&self, id: i64) -> Result<usize> {
        let changed = self.conn().execute("DELETE FROM games WHERE id = ?", [id])?;
        Ok(changed)
    }

    pub fn clear_games(&self) -> Result<usize> {
        let changed = self.conn().execute("DELETE FROM games", [])?;
        Ok(changed)
    }
}

/// Read a column by name, treating a column the table does not have yet the
/// same as NULL.
fn column<T: FromSql>(row: &Row<'_>, name: &str) -> rusqlite::Result<Option<T>> {
    match row.get::<_, Option<T>>(name) {
        Ok(value) => Ok(value),
        Err(rusqlite::Error::InvalidColumnName(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, name: &str) -> rusqlite::Result<Vec<T>> {
    let raw: Option<String> = column(row, name)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(Vec::new()),
        Some(text) => serde_json::from_str(text).map_err(|e| {
            let index = row.as_ref().column_index(name).unwrap_or(0);
            rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))
        }),
    }
}

fn date_column(row: &Row<'_>, name: &str) -> rusqlite::Result<NaiveDate> {
    let raw: Option<String> = column(row, name)?;
    let Some(text) = raw else {
        return Ok(NaiveDate::default());
    };
    // Older rows may carry a full timestamp; only the date part matters.
    let date_part = text.get(..10).unwrap_or(&text);
    NaiveDate::parse_from_str(date_part, DATE_FORMAT).map_err(|e| {
        let index = row.as_ref().column_index(name).unwrap_or(0);
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))
    })
}

fn game_from_row(row: &Row<'_>) -> rusqlite::Result<Game> {
    Ok(Game {
        id: row.get("id")?,
        title: row.get("title")?,
        link: column(row, "link")?,
        rating: column(row, "rating")?.unwrap_or(0),
        finished: column::<i64>(row, "finished")?.unwrap_or(0) != 0,
        checked: column::<i64>(row, "checked")?.unwrap_or(0) != 0,
        platform: column(row, "platform")?.unwrap_or_default(),
        strikes: column(row, "strikes")?.unwrap_or(0),
        notes: column(row, "notes")?.unwrap_or_default(),
        cover_art_path: column(row, "cover_art_path")?,
        gameplay_image_path: column(row, "gameplay_image_path")?,
        date_added: date_column(row, "date_added")?,
        additional_photos: json_column::<AdditionalPhoto>(row, "additional_photos")?,
        additional_notes: json_column::<AdditionalNote>(row, "additional_notes")?,
    })
}
