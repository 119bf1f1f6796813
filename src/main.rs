use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};

use gameshelf::assets::Upload;
use gameshelf::config::Config;
use gameshelf::db::NewGame;
use gameshelf::{logging, Catalog, GamePatch, NewAssets};

#[derive(Parser)]
#[command(name = "gameshelf", version, about = "Personal game collection catalog")]
struct Cli {
    /// Path to config file (default: $XDG_CONFIG_HOME/gameshelf/config.toml,
    /// or GAMESHELF_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add a game
    Add {
        title: String,
        #[arg(long)]
        link: Option<String>,
        #[arg(long)]
        rating: Option<i64>,
        #[arg(long)]
        platform: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        finished: bool,
        /// Cover image to copy into the game's folder
        #[arg(long)]
        cover: Option<PathBuf>,
        /// Gameplay image to copy into the game's folder
        #[arg(long)]
        gameplay: Option<PathBuf>,
    },
    /// List all games
    List,
    /// Show one game
    Show { id: i64 },
    /// Apply a partial update, e.g. --json '{"finished": true}'
    Update {
        id: i64,
        #[arg(long, default_value = "{}")]
        json: String,
        #[arg(long)]
        cover: Option<PathBuf>,
        #[arg(long)]
        gameplay: Option<PathBuf>,
    },
    /// Delete a game and its files
    Delete { id: i64 },
    /// Delete every game and every asset
    Clear {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },
    /// Attach a free-text note
    AddNote { id: i64, content: String },
    /// Remove a note by position (0-based)
    RemoveNote { id: i64, index: usize },
    /// Attach an extra photo
    AddPhoto { id: i64, file: PathBuf },
    /// Remove an extra photo by position (0-based)
    RemovePhoto { id: i64, index: usize },
    /// Print the folder uploads for a game go to
    UploadDir { id: i64 },
    /// Delete asset files no game references
    Cleanup,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _ = logging::init(Some(Config::config_dir().join("logs")));

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let catalog = Catalog::open(&config).context("Failed to open catalog")?;

    run(&catalog, cli.command)
}

fn run(catalog: &Catalog, command: Command) -> Result<()> {
    match command {
        Command::Add {
            title,
            link,
            rating,
            platform,
            notes,
            finished,
            cover,
            gameplay,
        } => {
            let new = NewGame {
                link,
                rating,
                platform,
                notes,
                finished: finished.then_some(true),
                ..NewGame::titled(title)
            };
            let uploads = NewAssets {
                cover: cover.as_deref().map(stage).transpose()?,
                gameplay: gameplay.as_deref().map(stage).transpose()?,
            };
            let id = catalog.create(new, uploads)?;
            print_json(&catalog.get(id)?)
        }
        Command::List => print_json(&catalog.list()?),
        Command::Show { id } => print_json(&catalog.get(id)?),
        Command::Update {
            id,
            json,
            cover,
            gameplay,
        } => {
            let patch: GamePatch = serde_json::from_str(&json).context("Invalid --json patch")?;
            let uploads = NewAssets {
                cover: cover.as_deref().map(stage).transpose()?,
                gameplay: gameplay.as_deref().map(stage).transpose()?,
            };
            if patch.is_empty() && uploads.is_empty() {
                bail!("Nothing to update");
            }
            let changed = catalog.apply_update(id, patch, uploads)?;
            println!("{} row(s) changed", changed);
            Ok(())
        }
        Command::Delete { id } => {
            let changed = catalog.delete(id)?;
            println!("{} row(s) deleted", changed);
            Ok(())
        }
        Command::Clear { yes } => {
            if !yes {
                bail!("Refusing to clear the catalog without --yes");
            }
            let changed = catalog.clear_all()?;
            println!("{} row(s) deleted", changed);
            Ok(())
        }
        Command::AddNote { id, content } => print_json(&catalog.add_note(id, &content)?),
        Command::RemoveNote { id, index } => print_json(&catalog.remove_note(id, index)?),
        Command::AddPhoto { id, file } => print_json(&catalog.add_photo(id, stage(&file)?)?),
        Command::RemovePhoto { id, index } => print_json(&catalog.remove_photo(id, index)?),
        Command::UploadDir { id } => {
            println!("{}", catalog.upload_dir(id)?.display());
            Ok(())
        }
        Command::Cleanup => {
            let report = catalog.cleanup_orphans()?;
            println!(
                "Removed {} file(s), {} bytes, {} empty folder(s)",
                report.files_deleted, report.bytes_freed, report.dirs_removed
            );
            Ok(())
        }
    }
}

/// Copy a user's file to a staging location, since placing an upload moves it.
fn stage(path: &Path) -> Result<Upload> {
    let original_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .with_context(|| format!("Not a file: {}", path.display()))?;

    let staged = std::env::temp_dir().join(format!("gameshelf-{}", uuid::Uuid::new_v4().simple()));
    std::fs::copy(path, &staged).with_context(|| format!("Failed to read {}", path.display()))?;

    Ok(Upload::new(staged, original_name))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
