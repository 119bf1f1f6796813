//! Error types shared by the store, the asset folders and the catalog.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Game not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Failed to move assets from '{from}' to '{to}': {message}")]
    FolderMigrationFailed {
        from: String,
        to: String,
        message: String,
    },

    #[error("Database error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Asset(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CatalogError {
    pub fn validation(message: impl Into<String>) -> Self {
        CatalogError::Validation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
