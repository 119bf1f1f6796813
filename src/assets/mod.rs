//! Per-game asset folders.
//!
//! Every game owns one directory under the asset root, named by the
//! sanitized title:
//! ```text
//! /uploads/
//! ├── chrono_trigger/
//! │   ├── cover_6f1c….png
//! │   ├── gameplay_09ab….jpg
//! │   └── additional_77e2….png
//! └── okami/
//! ```
//! Files are referenced from the database by absolute URL, see [`AssetUrl`].

mod sanitize;
mod url;

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

pub use sanitize::{sanitize, MAX_TOKEN_LEN};
pub use url::{AssetUrl, UPLOADS_SEGMENT};

use crate::config::AssetsConfig;
use crate::error::{CatalogError, Result};

/// What an uploaded file is used for; also the file name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetRole {
    Cover,
    Gameplay,
    Additional,
}

impl AssetRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetRole::Cover => "cover",
            AssetRole::Gameplay => "gameplay",
            AssetRole::Additional => "additional",
        }
    }
}

/// A file staged on disk by the request layer, waiting to be placed into a
/// game folder.
#[derive(Debug, Clone)]
pub struct Upload {
    pub source: PathBuf,
    /// File name as the client sent it; only its extension is kept
    pub original_name: String,
}

impl Upload {
    pub fn new(source: impl Into<PathBuf>, original_name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            original_name: original_name.into(),
        }
    }

    fn extension(&self) -> String {
        Path::new(&self.original_name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or_else(|| "bin".to_string())
    }
}

/// An upload after it was moved into a game folder.
#[derive(Debug, Clone)]
pub struct StoredAsset {
    pub path: PathBuf,
    pub url: String,
}

/// Files moved from one token folder to another by [`AssetStore::migrate`].
#[derive(Debug, Clone)]
pub struct Migration {
    pub old_token: String,
    pub new_token: String,
    pub files: Vec<OsString>,
}

#[derive(Debug, Clone)]
pub enum MigrationOutcome {
    Migrated(Migration),
    /// Same token before and after, or nothing on disk to move
    Skipped,
}

/// Result of an orphan cleanup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub files_deleted: usize,
    pub bytes_freed: u64,
    pub dirs_removed: usize,
}

pub struct AssetStore {
    root: PathBuf,
    base_url: String,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &AssetsConfig) -> Self {
        Self::new(&config.root, &config.base_url)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder for a title. An empty token maps to the asset root itself.
    pub fn dir_for(&self, title: &str) -> PathBuf {
        self.root.join(sanitize(title))
    }

    /// Create the folder for a title if it does not exist yet.
    pub fn ensure_directory(&self, title: &str) -> Result<PathBuf> {
        let dir = self.dir_for(title);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    // ========================================================================
    // URLs
    // ========================================================================

    pub fn url_for(&self, token: &str, filename: &str) -> String {
        AssetUrl::new(token, filename).to_url(&self.base_url)
    }

    pub fn parse_url(&self, url: &str) -> Option<AssetUrl> {
        AssetUrl::parse(url, &self.base_url)
    }

    /// Map a stored URL back to its file under the asset root.
    pub fn local_path(&self, url: &str) -> Option<PathBuf> {
        self.parse_url(url).map(|asset| asset.local_path(&self.root))
    }

    /// Point a URL at `new_token` if it currently points into `old_token`.
    /// URLs into other folders, or outside the asset root, are returned as-is.
    pub fn rewrite_url(&self, url: &str, old_token: &str, new_token: &str) -> String {
        match self.parse_url(url) {
            Some(asset) if asset.token == old_token => {
                asset.with_token(new_token).to_url(&self.base_url)
            }
            _ => url.to_string(),
        }
    }

    // ========================================================================
    // File operations
    // ========================================================================

    /// Move a staged upload into the folder of `title` as
    /// `{role}_{uuid}.{ext}` and return where it landed.
    pub fn store_upload(&self, title: &str, role: AssetRole, upload: &Upload) -> Result<StoredAsset> {
        let dir = self.ensure_directory(title)?;
        let filename = format!(
            "{}_{}.{}",
            role.as_str(),
            uuid::Uuid::new_v4().simple(),
            upload.extension()
        );
        let path = dir.join(&filename);
        move_file(&upload.source, &path)?;

        tracing::debug!(role = role.as_str(), path = ?path, "Stored upload");
        Ok(StoredAsset {
            url: self.url_for(&sanitize(title), &filename),
            path,
        })
    }

    /// Remove the file behind a stored URL. Missing files and URLs outside
    /// the asset root are not errors.
    pub fn delete_file(&self, url: &str) -> Result<()> {
        let Some(path) = self.local_path(url) else {
            tracing::debug!(url, "Not an asset URL, nothing to delete");
            return Ok(());
        };
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(path = ?path, "Deleted asset");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove the folder of a title if nothing is left in it. Returns whether
    /// it was removed; a missing folder is not an error.
    pub fn remove_empty_directory(&self, title: &str) -> Result<bool> {
        let token = sanitize(title);
        if token.is_empty() {
            // The empty token maps to the asset root itself.
            return Ok(false);
        }
        let dir = self.root.join(&token);
        match is_empty_dir(&dir) {
            Ok(true) => {
                fs::remove_dir(&dir)?;
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove everything under the asset root. Returns the number of
    /// top-level entries removed.
    pub fn clear(&self) -> Result<usize> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(entry.path())?;
            } else {
                fs::remove_file(entry.path())?;
            }
            removed += 1;
        }
        Ok(removed)
    }

    // ========================================================================
    // Migration
    // ========================================================================

    /// Move the files of `old_title`'s folder into `new_title`'s folder.
    ///
    /// Files are moved one by one so a destination that already holds files
    /// is merged into rather than replaced. If any move fails, the files
    /// already moved are put back and `FolderMigrationFailed` is returned.
    /// Failing to remove the emptied old folder is only logged.
    pub fn migrate(&self, old_title: &str, new_title: &str) -> Result<MigrationOutcome> {
        let old_token = sanitize(old_title);
        let new_token = sanitize(new_title);

        if old_token == new_token {
            return Ok(MigrationOutcome::Skipped);
        }

        let old_dir = self.root.join(&old_token);
        if !old_dir.is_dir() {
            return Ok(MigrationOutcome::Skipped);
        }
        let new_dir = self.root.join(&new_token);

        let fail = |e: io::Error| CatalogError::FolderMigrationFailed {
            from: old_token.clone(),
            to: new_token.clone(),
            message: e.to_string(),
        };

        fs::create_dir_all(&new_dir).map_err(&fail)?;

        let mut moved = Vec::new();
        if let Err(e) = move_files(&old_dir, &new_dir, &mut moved) {
            tracing::error!(
                from = %old_token,
                to = %new_token,
                error = %e,
                "Asset folder migration failed, restoring moved files"
            );
            restore_files(&new_dir, &old_dir, &moved);
            return Err(fail(e));
        }

        if !old_token.is_empty() {
            if let Err(e) = fs::remove_dir(&old_dir) {
                tracing::warn!(dir = ?old_dir, error = %e, "Failed to remove old asset folder");
            }
        }

        tracing::info!(from = %old_token, to = %new_token, files = moved.len(), "Migrated asset folder");
        Ok(MigrationOutcome::Migrated(Migration {
            old_token,
            new_token,
            files: moved,
        }))
    }

    /// Move the files of a completed migration back where they came from.
    /// Best effort: failures are logged, not returned.
    pub fn revert(&self, migration: &Migration) {
        let old_dir = self.root.join(&migration.old_token);
        let new_dir = self.root.join(&migration.new_token);

        if let Err(e) = fs::create_dir_all(&old_dir) {
            tracing::error!(dir = ?old_dir, error = %e, "Cannot recreate asset folder for revert");
            return;
        }
        restore_files(&new_dir, &old_dir, &migration.files);

        if !migration.new_token.is_empty() {
            // Only succeeds when the folder held nothing but the moved files.
            let _ = fs::remove_dir(&new_dir);
        }
        tracing::info!(
            from = %migration.new_token,
            to = %migration.old_token,
            "Reverted asset folder migration"
        );
    }

    // ========================================================================
    // Housekeeping
    // ========================================================================

    /// Delete every file under the root that is not in `referenced`, then
    /// every folder left empty.
    pub fn cleanup_orphans(&self, referenced: &HashSet<PathBuf>) -> Result<CleanupReport> {
        let mut report = CleanupReport::default();
        if !self.root.is_dir() {
            return Ok(report);
        }

        for entry in WalkDir::new(&self.root).min_depth(1).contents_first(true) {
            let entry = entry.map_err(io::Error::from)?;
            let path = entry.path();

            if entry.file_type().is_file() {
                if referenced.contains(path) {
                    continue;
                }
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                fs::remove_file(path)?;
                tracing::debug!(path = ?path, "Removed orphaned asset");
                report.files_deleted += 1;
                report.bytes_freed += size;
            } else if entry.file_type().is_dir() && is_empty_dir(path)? {
                fs::remove_dir(path)?;
                report.dirs_removed += 1;
            }
        }

        tracing::info!(
            files = report.files_deleted,
            bytes = report.bytes_freed,
            dirs = report.dirs_removed,
            "Orphaned asset cleanup finished"
        );
        Ok(report)
    }
}

/// Rename, falling back to copy + delete across filesystems.
fn move_file(source: &Path, destination: &Path) -> io::Result<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(_) if destination.is_dir() => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("destination is a directory: {}", destination.display()),
        )),
        Err(_) => copy_and_remove(source, destination),
    }
}

/// Copy then delete the source. A copy whose source cannot be removed is
/// deleted again, so the file only ever exists in one place.
fn copy_and_remove(source: &Path, destination: &Path) -> io::Result<()> {
    fs::copy(source, destination)?;
    if let Err(e) = fs::remove_file(source) {
        let _ = fs::remove_file(destination);
        return Err(e);
    }
    Ok(())
}

fn move_files(from: &Path, to: &Path, moved: &mut Vec<OsString>) -> io::Result<()> {
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        move_file(&entry.path(), &to.join(&name))?;
        moved.push(name);
    }
    Ok(())
}

fn restore_files(from: &Path, to: &Path, names: &[OsString]) {
    for name in names {
        if let Err(e) = move_file(&from.join(name), &to.join(name)) {
            tracing::error!(file = ?name, error = %e, "Failed to move asset back");
        }
    }
}

fn is_empty_dir(path: &Path) -> io::Result<bool> {
    Ok(fs::read_dir(path)?.next().is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const BASE: &str = "http://localhost:3000";

    fn store(root: &Path) -> AssetStore {
        AssetStore::new(root.join("uploads"), BASE)
    }

    fn touch(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_ensure_directory_is_idempotent() {
        let dir = tempdir().unwrap();
        let assets = store(dir.path());

        let first = assets.ensure_directory("Chrono Trigger").unwrap();
        let second = assets.ensure_directory("Chrono Trigger").unwrap();
        assert_eq!(first, second);
        assert_eq!(first, dir.path().join("uploads/chrono_trigger"));
        assert!(first.is_dir());
    }

    #[test]
    fn test_migrate_same_token_is_skipped() {
        let dir = tempdir().unwrap();
        let assets = store(dir.path());
        touch(&assets.root().join("doom/cover_1.png"), "x");

        let outcome = assets.migrate("Doom", "DOOM!").unwrap();
        assert!(matches!(outcome, MigrationOutcome::Skipped));
        assert!(assets.root().join("doom/cover_1.png").exists());
    }

    #[test]
    fn test_migrate_without_old_folder_is_skipped() {
        let dir = tempdir().unwrap();
        let assets = store(dir.path());

        let outcome = assets.migrate("Fresh", "Renamed").unwrap();
        assert!(matches!(outcome, MigrationOutcome::Skipped));
        assert!(!assets.root().join("renamed").exists());
    }

    #[test]
    fn test_migrate_moves_files() {
        let dir = tempdir().unwrap();
        let assets = store(dir.path());
        touch(&assets.root().join("old_token/cover_x.png"), "cover");
        touch(&assets.root().join("old_token/gameplay_y.jpg"), "gameplay");

        let outcome = assets.migrate("Old Token", "New Token").unwrap();
        let MigrationOutcome::Migrated(migration) = outcome else {
            panic!("expected a migration");
        };
        assert_eq!(migration.files.len(), 2);
        assert!(assets.root().join("new_token/cover_x.png").exists());
        assert!(assets.root().join("new_token/gameplay_y.jpg").exists());
        assert!(!assets.root().join("old_token").exists());
    }

    #[test]
    fn test_migrate_merges_into_existing_folder() {
        let dir = tempdir().unwrap();
        let assets = store(dir.path());
        touch(&assets.root().join("old/cover_x.png"), "cover");
        touch(&assets.root().join("new/unrelated.png"), "other");

        assets.migrate("old", "new").unwrap();
        assert!(assets.root().join("new/cover_x.png").exists());
        assert!(assets.root().join("new/unrelated.png").exists());
    }

    #[test]
    fn test_migrate_failure_restores_files() {
        let dir = tempdir().unwrap();
        let assets = store(dir.path());
        touch(&assets.root().join("old/a.png"), "a");
        touch(&assets.root().join("old/b.png"), "b");
        // A directory squatting on a destination name blocks that move.
        fs::create_dir_all(assets.root().join("new/b.png")).unwrap();

        let err = assets.migrate("old", "new").unwrap_err();
        assert!(matches!(err, CatalogError::FolderMigrationFailed { .. }));
        assert!(assets.root().join("old/a.png").is_file());
        assert!(assets.root().join("old/b.png").is_file());
        assert!(!assets.root().join("new/a.png").exists());
    }

    #[test]
    fn test_migrate_keeps_old_folder_it_cannot_remove() {
        let dir = tempdir().unwrap();
        let assets = store(dir.path());
        touch(&assets.root().join("old/cover_x.png"), "cover");
        touch(&assets.root().join("old/nested/keep.txt"), "keep");

        let outcome = assets.migrate("old", "new").unwrap();
        let MigrationOutcome::Migrated(migration) = outcome else {
            panic!("expected a migration");
        };
        assert_eq!(migration.files.len(), 1);
        assert!(assets.root().join("new/cover_x.png").is_file());
        assert!(assets.root().join("old").is_dir());
        assert!(assets.root().join("old/nested/keep.txt").is_file());
    }

    #[test]
    fn test_copy_and_remove_leaves_single_file() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.png");
        let destination = dir.path().join("b.png");
        fs::write(&source, "a").unwrap();

        copy_and_remove(&source, &destination).unwrap();
        assert!(!source.exists());
        assert_eq!(fs::read_to_string(&destination).unwrap(), "a");

        let missing = dir.path().join("missing.png");
        let target = dir.path().join("never.png");
        assert!(copy_and_remove(&missing, &target).is_err());
        assert!(!target.exists());
    }

    #[test]
    fn test_revert_moves_files_back() {
        let dir = tempdir().unwrap();
        let assets = store(dir.path());
        touch(&assets.root().join("before/cover_x.png"), "cover");

        let MigrationOutcome::Migrated(migration) = assets.migrate("before", "after").unwrap() else {
            panic!("expected a migration");
        };
        assets.revert(&migration);

        assert!(assets.root().join("before/cover_x.png").is_file());
        assert!(!assets.root().join("after").exists());
    }

    #[test]
    fn test_store_upload_names_file_by_role() {
        let dir = tempdir().unwrap();
        let assets = store(dir.path());
        let staged = dir.path().join("incoming.tmp");
        fs::write(&staged, "png bytes").unwrap();

        let stored = assets
            .store_upload("Okami", AssetRole::Cover, &Upload::new(&staged, "Box Art.PNG"))
            .unwrap();

        assert!(!staged.exists());
        assert!(stored.path.is_file());
        let filename = stored.path.file_name().unwrap().to_string_lossy().to_string();
        assert!(filename.starts_with("cover_"));
        assert!(filename.ends_with(".png"));
        assert_eq!(stored.url, format!("{}/uploads/okami/{}", BASE, filename));
        assert_eq!(assets.local_path(&stored.url), Some(stored.path.clone()));
    }

    #[test]
    fn test_upload_extension_fallback() {
        assert_eq!(Upload::new("x", "noext").extension(), "bin");
        assert_eq!(Upload::new("x", "weird.p n g").extension(), "bin");
        assert_eq!(Upload::new("x", "shot.JPEG").extension(), "jpeg");
    }

    #[test]
    fn test_delete_file_is_idempotent() {
        let dir = tempdir().unwrap();
        let assets = store(dir.path());
        let path = assets.root().join("okami/cover_1.png");
        touch(&path, "x");
        let url = assets.url_for("okami", "cover_1.png");

        assets.delete_file(&url).unwrap();
        assert!(!path.exists());
        assets.delete_file(&url).unwrap();
        assets.delete_file("https://example.com/elsewhere.png").unwrap();
    }

    #[test]
    fn test_rewrite_url() {
        let dir = tempdir().unwrap();
        let assets = store(dir.path());
        let url = assets.url_for("old_token", "cover_x.png");

        assert_eq!(
            assets.rewrite_url(&url, "old_token", "new_token"),
            assets.url_for("new_token", "cover_x.png")
        );
        assert_eq!(assets.rewrite_url(&url, "other", "new_token"), url);
        assert_eq!(
            assets.rewrite_url("https://example.com/a.png", "old_token", "new_token"),
            "https://example.com/a.png"
        );
    }

    #[test]
    fn test_remove_empty_directory() {
        let dir = tempdir().unwrap();
        let assets = store(dir.path());
        touch(&assets.root().join("okami/cover_1.png"), "x");

        assert!(!assets.remove_empty_directory("Okami").unwrap());
        assert!(assets.root().join("okami/cover_1.png").exists());

        fs::remove_file(assets.root().join("okami/cover_1.png")).unwrap();
        assert!(assets.remove_empty_directory("Okami").unwrap());
        assert!(!assets.root().join("okami").exists());
        assert!(!assets.remove_empty_directory("Okami").unwrap());
        assert!(!assets.remove_empty_directory("!!!").unwrap());
    }

    #[test]
    fn test_cleanup_orphans() {
        let dir = tempdir().unwrap();
        let assets = store(dir.path());
        let kept = assets.root().join("okami/cover_1.png");
        touch(&kept, "keep");
        touch(&assets.root().join("okami/cover_0.png"), "stale");
        touch(&assets.root().join("gone/gameplay_1.png"), "stale!");

        let referenced: HashSet<PathBuf> = [kept.clone()].into_iter().collect();
        let report = assets.cleanup_orphans(&referenced).unwrap();

        assert_eq!(report.files_deleted, 2);
        assert_eq!(report.bytes_freed, 11);
        assert_eq!(report.dirs_removed, 1);
        assert!(kept.exists());
        assert!(!assets.root().join("gone").exists());
    }

    #[test]
    fn test_clear() {
        let dir = tempdir().unwrap();
        let assets = store(dir.path());
        assert_eq!(assets.clear().unwrap(), 0);

        touch(&assets.root().join("a/cover.png"), "x");
        touch(&assets.root().join("b/cover.png"), "x");
        assert_eq!(assets.clear().unwrap(), 2);
        assert!(assets.root().is_dir());
        assert!(fs::read_dir(assets.root()).unwrap().next().is_none());
    }
}
