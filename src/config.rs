use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub assets: AssetsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    /// Directory holding one folder per game
    #[serde(default = "default_assets_root")]
    pub root: PathBuf,

    /// Prefix of the absolute URLs stored for assets; files are served
    /// from `{base_url}/uploads/`
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gameshelf")
}

fn default_db_path() -> PathBuf {
    default_data_dir().join("gameshelf.db")
}

fn default_assets_root() -> PathBuf {
    default_data_dir().join("uploads")
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            root: default_assets_root(),
            base_url: default_base_url(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            assets: AssetsConfig::default(),
        }
    }
}

impl Config {
    /// Load from `GAMESHELF_CONFIG` if set, else the default location.
    pub fn load() -> Result<Self> {
        match std::env::var_os("GAMESHELF_CONFIG") {
            Some(path) => Self::load_from(Path::new(&path)),
            None => Self::load_from(&Self::config_path()),
        }
    }

    /// Load a config file, writing the defaults there if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Invalid config {}", path.display()))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gameshelf")
    }

    fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_config_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.assets.base_url, "http://localhost:3000");

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.db_path, config.db_path);
        assert_eq!(reloaded.assets.root, config.assets.root);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "db_path = \"/tmp/games.db\"\n\n[assets]\nbase_url = \"http://127.0.0.1:8080\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/games.db"));
        assert_eq!(config.assets.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.assets.root, default_assets_root());
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "db_path = [").unwrap();

        assert!(Config::load_from(&path).is_err());
    }
}
