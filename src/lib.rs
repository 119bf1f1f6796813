//! Personal game collection catalog.
//!
//! Games live in a single SQLite table ([`db`]); their cover, gameplay and
//! extra photos live in one folder per game under an asset root
//! ([`assets`]). [`catalog::Catalog`] keeps the two consistent, most notably
//! when a title change moves a game's folder.

pub mod assets;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;

pub use catalog::{Catalog, GamePatch, NewAssets};
pub use error::{CatalogError, Result};
