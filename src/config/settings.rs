//! Persisted user settings.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::loader::ConfigError;

/// File name of the settings document inside the data directory.
pub const SETTINGS_FILE: &str = "settings.json";

/// Key-value settings document.
///
/// Keys this crate does not know about are kept and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory relative file names are resolved against. Empty when unset.
    #[serde(default)]
    pub default_log_directory: String,

    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl Settings {
    /// Default location of the settings document in `data_dir`.
    #[must_use]
    pub fn default_path(data_dir: &Path) -> PathBuf {
        data_dir.join(SETTINGS_FILE)
    }

    /// Load settings, returning defaults if the document does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the document exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Json {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Write settings to `path`, creating its directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_error = |e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(write_error)?;
            }
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Json {
            path: path.to_path_buf(),
            source: e,
        })?;
        fs::write(path, content).map_err(write_error)
    }

    /// The default log directory, if set.
    #[must_use]
    pub fn default_log_directory(&self) -> Option<&Path> {
        let dir = self.default_log_directory.trim();
        (!dir.is_empty()).then(|| Path::new(dir))
    }

    pub fn set_default_log_directory(&mut self, dir: &Path) {
        self.default_log_directory = dir.display().to_string();
    }

    /// Resolve a user-supplied file argument.
    ///
    /// Absolute paths and paths that exist relative to the working directory
    /// are returned as given; anything else is looked up in the default log
    /// directory.
    #[must_use]
    pub fn resolve(&self, file: &Path) -> PathBuf {
        if file.is_absolute() || file.exists() {
            return file.to_path_buf();
        }
        match self.default_log_directory() {
            Some(dir) => dir.join(file),
            None => file.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_is_default() {
        let settings = Settings::load(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(settings.default_log_directory().is_none());
    }

    #[test]
    fn test_save_and_load_keeps_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let path = Settings::default_path(dir.path());
        std::fs::write(
            &path,
            r#"{"default_log_directory": "", "theme": "light"}"#,
        )
        .unwrap();

        let mut settings = Settings::load(&path).unwrap();
        settings.set_default_log_directory(Path::new("/var/log"));
        settings.save(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["default_log_directory"], "/var/log");
        assert_eq!(raw["theme"], "light");
    }

    #[test]
    fn test_resolve_uses_default_directory() {
        let dir = TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.set_default_log_directory(dir.path());

        assert_eq!(
            settings.resolve(Path::new("app.log")),
            dir.path().join("app.log")
        );
        assert_eq!(
            settings.resolve(Path::new("/abs/app.log")),
            PathBuf::from("/abs/app.log")
        );
    }

    #[test]
    fn test_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = Settings::default_path(dir.path());
        std::fs::write(&path, "[]").unwrap();
        assert!(matches!(
            Settings::load(&path),
            Err(ConfigError::Json { .. })
        ));
    }
}
