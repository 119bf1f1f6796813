//! The game catalog: record store and asset folders kept in step.
//!
//! Every operation that changes a game runs under that game's lock, loads
//! the stored record, builds the complete new record, moves files as needed
//! and only then writes the row back. If anything fails before the write,
//! the row is left as it was and file moves are undone.

mod locks;
mod patch;

use chrono::{SecondsFormat, Utc};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

pub use locks::{AllItemsGuard, CreateGuard, ItemGuard, ItemLocks};
pub use patch::GamePatch;

use crate::assets::{
    sanitize, AssetRole, AssetStore, CleanupReport, MigrationOutcome, StoredAsset, Upload,
};
use crate::config::Config;
use crate::db::{AdditionalNote, AdditionalPhoto, Database, Game, NewGame};
use crate::error::{CatalogError, Result};

/// Cover and gameplay files uploaded together with a create or update.
#[derive(Debug, Clone, Default)]
pub struct NewAssets {
    pub cover: Option<Upload>,
    pub gameplay: Option<Upload>,
}

impl NewAssets {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.cover.is_none() && self.gameplay.is_none()
    }
}

pub struct Catalog {
    db: Database,
    assets: AssetStore,
    locks: ItemLocks,
}

impl Catalog {
    pub fn new(db: Database, assets: AssetStore) -> Self {
        Self {
            db,
            assets,
            locks: ItemLocks::new(),
        }
    }

    /// Open the database and asset root named in the config.
    pub fn open(config: &Config) -> Result<Self> {
        let db = Database::open(&config.db_path)?;
        db.initialize()?;
        Ok(Self::new(db, AssetStore::from_config(&config.assets)))
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn get(&self, id: i64) -> Result<Game> {
        self.db.get(id)?.ok_or(CatalogError::NotFound(id))
    }

    pub fn list(&self) -> Result<Vec<Game>> {
        self.db.list()
    }

    /// Resolve, and create if needed, the folder uploads for `id` go to.
    /// Unknown ids are rejected before any upload is accepted.
    pub fn upload_dir(&self, id: i64) -> Result<PathBuf> {
        let game = self.get(id)?;
        self.assets.ensure_directory(&game.title)
    }

    // ========================================================================
    // Create
    // ========================================================================

    pub fn create(&self, mut new: NewGame, uploads: NewAssets) -> Result<i64> {
        if new.title.trim().is_empty() {
            return Err(CatalogError::validation("title is required"));
        }

        let _creating = self.locks.lock_create();
        let title = new.title.clone();
        let mut placed = Vec::new();
        let stored = self.place_uploads(
            &title,
            uploads,
            &mut new.cover_art_path,
            &mut new.gameplay_image_path,
            &mut placed,
        );

        match stored.and_then(|_| self.db.create(new)) {
            Ok(id) => {
                tracing::info!(id, title = %title, "Created game");
                Ok(id)
            }
            Err(e) => {
                tracing::error!(title = %title, error = %e, "Failed to create game");
                self.discard(&placed);
                Err(e)
            }
        }
    }

    // ========================================================================
    // Update
    // ========================================================================

    /// Merge `patch` into game `id`, migrating its asset folder if the title
    /// token changes and placing any uploaded cover or gameplay image.
    /// Returns the number of rows written (0 or 1).
    pub fn apply_update(&self, id: i64, patch: GamePatch, uploads: NewAssets) -> Result<usize> {
        let _guard = self.locks.lock(id);
        let current = self.get(id)?;

        if let Some(title) = &patch.title {
            if title.trim().is_empty() {
                return Err(CatalogError::validation("title cannot be empty"));
            }
        }

        let renamed = patch.title_change(&current).is_some();
        let old_title = current.title.clone();
        // Files an upload replaces are the stored ones, not whatever the patch names.
        let mut replaced = Vec::new();
        if uploads.cover.is_some() {
            replaced.extend(current.cover_art_path.clone());
        }
        if uploads.gameplay.is_some() {
            replaced.extend(current.gameplay_image_path.clone());
        }
        let mut merged = patch.apply(current);

        let mut migration = None;
        if renamed {
            let old_token = sanitize(&old_title);
            let new_token = sanitize(&merged.title);

            match self.assets.migrate(&old_title, &merged.title) {
                Ok(MigrationOutcome::Migrated(moved)) => migration = Some(moved),
                Ok(MigrationOutcome::Skipped) => {}
                Err(e) => {
                    tracing::error!(id, from = %old_title, to = %merged.title, error = %e, "Rename aborted");
                    return Err(e);
                }
            }
            if old_token != new_token {
                self.rewrite_paths(&mut merged, &old_token, &new_token);
                for url in &mut replaced {
                    *url = self.assets.rewrite_url(url, &old_token, &new_token);
                }
            }
        }

        let mut placed = Vec::new();
        let title = merged.title.clone();
        let stored = self.place_uploads(
            &title,
            uploads,
            &mut merged.cover_art_path,
            &mut merged.gameplay_image_path,
            &mut placed,
        );

        match stored.and_then(|_| self.db.replace(&merged)) {
            Ok(changed) => {
                for url in replaced {
                    if let Err(e) = self.assets.delete_file(&url) {
                        tracing::warn!(id, url = %url, error = %e, "Failed to delete replaced asset");
                    }
                }
                tracing::info!(id, changed, "Updated game");
                Ok(changed)
            }
            Err(e) => {
                tracing::error!(id, error = %e, "Update failed, undoing file changes");
                self.discard(&placed);
                if let Some(moved) = &migration {
                    self.assets.revert(moved);
                }
                Err(e)
            }
        }
    }

    // ========================================================================
    // Additional photos and notes
    // ========================================================================

    pub fn add_photo(&self, id: i64, upload: Upload) -> Result<AdditionalPhoto> {
        let _guard = self.locks.lock(id);
        let mut game = self.get(id)?;

        let stored = self.assets.store_upload(&game.title, AssetRole::Additional, &upload)?;
        let photo = AdditionalPhoto {
            path: stored.url.clone(),
            filename: upload.original_name,
            added_at: timestamp(),
        };
        game.additional_photos.push(photo.clone());

        if let Err(e) = self.db.replace(&game) {
            self.discard(std::slice::from_ref(&stored));
            return Err(e);
        }
        tracing::info!(id, path = %photo.path, "Added photo");
        Ok(photo)
    }

    pub fn remove_photo(&self, id: i64, index: usize) -> Result<AdditionalPhoto> {
        let _guard = self.locks.lock(id);
        let mut game = self.get(id)?;

        if index >= game.additional_photos.len() {
            return Err(CatalogError::validation(format!(
                "photo index {} out of range ({} photos)",
                index,
                game.additional_photos.len()
            )));
        }
        let photo = game.additional_photos.remove(index);
        self.db.replace(&game)?;

        if let Err(e) = self.assets.delete_file(&photo.path) {
            tracing::warn!(id, path = %photo.path, error = %e, "Failed to delete photo file");
        }
        Ok(photo)
    }

    pub fn add_note(&self, id: i64, content: &str) -> Result<AdditionalNote> {
        if content.trim().is_empty() {
            return Err(CatalogError::validation("note content cannot be empty"));
        }

        let _guard = self.locks.lock(id);
        let mut game = self.get(id)?;

        let note = AdditionalNote {
            content: content.to_string(),
            added_at: timestamp(),
        };
        game.additional_notes.push(note.clone());
        self.db.replace(&game)?;
        Ok(note)
    }

    pub fn remove_note(&self, id: i64, index: usize) -> Result<AdditionalNote> {
        let _guard = self.locks.lock(id);
        let mut game = self.get(id)?;

        if index >= game.additional_notes.len() {
            return Err(CatalogError::validation(format!(
                "note index {} out of range ({} notes)",
                index,
                game.additional_notes.len()
            )));
        }
        let note = game.additional_notes.remove(index);
        self.db.replace(&game)?;
        Ok(note)
    }

    // ========================================================================
    // Delete and housekeeping
    // ========================================================================

    /// Remove a game and the files it references.
    pub fn delete(&self, id: i64) -> Result<usize> {
        let _guard = self.locks.lock(id);
        let game = self.get(id)?;

        let changed = self.db.delete(id)?;
        for url in referenced_urls(&game) {
            if let Err(e) = self.assets.delete_file(url) {
                tracing::warn!(id, url = %url, error = %e, "Failed to delete asset of removed game");
            }
        }
        if let Err(e) = self.assets.remove_empty_directory(&game.title) {
            tracing::warn!(id, title = %game.title, error = %e, "Failed to remove asset folder");
        }

        tracing::info!(id, title = %game.title, "Deleted game");
        Ok(changed)
    }

    /// Remove every game and everything under the asset root.
    pub fn clear_all(&self) -> Result<usize> {
        let _all = self.locks.lock_all();
        let changed = self.db.clear_all()?;
        let removed = self.assets.clear()?;
        tracing::info!(games = changed, folders = removed, "Cleared catalog");
        Ok(changed)
    }

    /// Delete files under the asset root that no game references.
    pub fn cleanup_orphans(&self) -> Result<CleanupReport> {
        let _all = self.locks.lock_all();
        let referenced: HashSet<PathBuf> = self
            .db
            .list()?
            .iter()
            .flat_map(referenced_urls)
            .filter_map(|url| self.assets.local_path(url))
            .collect();
        self.assets.cleanup_orphans(&referenced)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Point every asset URL of `game` that lives in `old_token` at
    /// `new_token`.
    fn rewrite_paths(&self, game: &mut Game, old_token: &str, new_token: &str) {
        for path in [&mut game.cover_art_path, &mut game.gameplay_image_path]
            .into_iter()
            .flatten()
        {
            *path = self.assets.rewrite_url(path, old_token, new_token);
        }
        for photo in &mut game.additional_photos {
            photo.path = self.assets.rewrite_url(&photo.path, old_token, new_token);
        }
    }

    /// Move uploaded cover/gameplay files into the folder of `title` and set
    /// the matching fields to their URLs.
    fn place_uploads(
        &self,
        title: &str,
        uploads: NewAssets,
        cover: &mut Option<String>,
        gameplay: &mut Option<String>,
        placed: &mut Vec<StoredAsset>,
    ) -> Result<()> {
        let slots = [
            (AssetRole::Cover, uploads.cover, cover),
            (AssetRole::Gameplay, uploads.gameplay, gameplay),
        ];
        for (role, upload, field) in slots {
            let Some(upload) = upload else { continue };
            let stored = self.assets.store_upload(title, role, &upload)?;
            *field = Some(stored.url.clone());
            placed.push(stored);
        }
        Ok(())
    }

    /// Remove files placed by an operation that did not complete.
    fn discard(&self, placed: &[StoredAsset]) {
        for asset in placed {
            if let Err(e) = fs::remove_file(&asset.path) {
                tracing::warn!(path = ?asset.path, error = %e, "Failed to remove uploaded file");
            }
        }
    }
}

fn referenced_urls(game: &Game) -> impl Iterator<Item = &str> {
    game.cover_art_path
        .as_deref()
        .into_iter()
        .chain(game.gameplay_image_path.as_deref())
        .chain(game.additional_photos.iter().map(|photo| photo.path.as_str()))
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
