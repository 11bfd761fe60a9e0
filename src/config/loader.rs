//! Configuration file loader.

use std::path::{Path, PathBuf};

use super::types::{MonitorConfig, APP_DIR_NAME};

/// Name of the per-directory override file.
const LOCAL_CONFIG: &str = ".logkeeper.toml";

/// Finds the config file and turns it into a [`MonitorConfig`].
///
/// Candidates are tried in order; the first one present on disk wins and the
/// rest are ignored. With none present the defaults apply.
#[derive(Debug)]
pub struct ConfigLoader {
    candidates: Vec<PathBuf>,
}

impl ConfigLoader {
    /// `./.logkeeper.toml`, then `<config dir>/logkeeper/config.toml`.
    #[must_use]
    pub fn new() -> Self {
        let user = dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join("config.toml"));
        Self {
            candidates: std::iter::once(PathBuf::from(LOCAL_CONFIG))
                .chain(user)
                .collect(),
        }
    }

    /// Only consult `path` (the CLI `--config` flag).
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            candidates: vec![path],
        }
    }

    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<MonitorConfig, ConfigError> {
        let Some(path) = self.candidates.iter().find(|p| p.exists()) else {
            tracing::debug!(
                candidates = self.candidates.len(),
                "No config file found, using defaults"
            );
            return Ok(MonitorConfig::default());
        };
        tracing::debug!(path = %path.display(), "Loading config file");
        parse(path)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse(path: &Path) -> Result<MonitorConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::ParseError {
        path: path.to_path_buf(),
        source,
    })
}

/// Errors that can occur while loading or saving configuration documents.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid settings document {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}
