//! Session configuration stored at `~/.config/gather/config.toml`.
//!
//! The file is optional: a missing or empty file yields `Config::default()`.
//! It holds the logged-in username (the stand-in for session state) and an
//! optional database path override, and is rewritten atomically whenever the
//! current user changes.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

/// On-disk session state.
///
/// All fields use `#[serde(default)]` so any subset of keys can be present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name of the logged-in user. Empty when nobody is logged in.
    pub current_user: String,

    /// Override for the SQLite database path. Defaults to
    /// `<config dir>/gather.db` when unset.
    pub db_path: Option<PathBuf>,
}

impl Config {
    /// Maximum config file size (1 MB). The file holds two keys; anything
    /// near this limit is corruption, not configuration.
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), user = %config.current_user, "Loaded configuration");
        Ok(config)
    }

    /// The logged-in username, or `None` when unset.
    pub fn current_user(&self) -> Option<&str> {
        if self.current_user.is_empty() {
            None
        } else {
            Some(self.current_user.as_str())
        }
    }

    /// Record `name` as the logged-in user and persist immediately.
    pub fn set_current_user(&mut self, name: &str, path: &Path) -> Result<(), ConfigError> {
        self.current_user = name.to_string();
        self.store(path)
    }

    /// Write the config atomically: serialize to a temp file in the same
    /// directory, sync, then rename over the destination so a crash never
    /// leaves a half-written file behind.
    pub fn store(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;

        // Randomized temp name so concurrent writers cannot collide on a
        // predictable path.
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let temp_path = path.with_extension(format!("tmp.{:016x}", nanos));

        let mut temp_file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)?;

        if let Err(e) = temp_file
            .write_all(content.as_bytes())
            .and_then(|_| temp_file.sync_all())
        {
            let _ = std::fs::remove_file(&temp_path);
            return Err(ConfigError::Io(e));
        }
        drop(temp_file);

        if let Err(e) = std::fs::rename(&temp_path, path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(ConfigError::Io(e));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.current_user, "");
        assert_eq!(config.current_user(), None);
        assert!(config.db_path.is_none());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.current_user(), None);
    }

    #[test]
    fn test_empty_file_returns_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.current_user(), None);
    }

    #[test]
    fn test_set_current_user_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.set_current_user("ann", &path).unwrap();

        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded.current_user(), Some("ann"));
    }

    #[test]
    fn test_store_overwrites_previous_user() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.set_current_user("ann", &path).unwrap();
        config.set_current_user("ben", &path).unwrap();

        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded.current_user(), Some("ben"));
    }

    #[test]
    fn test_db_path_preserved_across_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config {
            current_user: String::new(),
            db_path: Some(PathBuf::from("/tmp/custom.db")),
        };
        config.set_current_user("ann", &path).unwrap();

        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded.db_path.as_deref(), Some(Path::new("/tmp/custom.db")));
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is not [valid toml").unwrap();

        let result = Config::load(&path);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let result = Config::load(&path);
        assert!(matches!(result, Err(ConfigError::TooLarge(_))));
    }

    #[test]
    fn test_store_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.set_current_user("ann", &path).unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != "config.toml")
            .collect();
        assert!(leftovers.is_empty(), "temp files left behind: {:?}", leftovers);
    }
}
