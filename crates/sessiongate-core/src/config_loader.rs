//! Loading and saving the `SessionGate` configuration file.
//!
//! The file lives at `~/.sessiongate/config.toml` unless a different base
//! directory is given. A missing file yields [`Config::default`]; a present
//! but malformed file is an error.
//!
//! # Examples
//!
//! ```
//! use sessiongate_core::config_loader::ConfigLoader;
//!
//! let dir = tempfile::tempdir().expect("temp dir");
//! let loader = ConfigLoader::with_base_dir(dir.path().to_path_buf());
//!
//! assert!(!loader.exists());
//! loader.write_default().expect("write default");
//!
//! let config = loader.load().expect("load");
//! assert_eq!(config.registry.cache_capacity, 256);
//! ```

use crate::config::Config;
use crate::error::ConfigError;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "config.toml";

const BASE_DIR_NAME: &str = ".sessiongate";

/// Reads and writes the configuration file under a base directory.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a loader rooted at `~/.sessiongate`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoHomeDirectory`] if the home directory cannot be determined.
    pub fn new() -> Result<Self, ConfigError> {
        Ok(Self {
            base_dir: default_base_dir()?,
        })
    }

    /// Creates a loader rooted at `base_dir`.
    #[must_use]
    pub const fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Returns the path of the configuration file.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.base_dir.join(CONFIG_FILE_NAME)
    }

    /// Returns the base directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Returns `true` if the configuration file exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.config_path().exists()
    }

    /// Loads the configuration, falling back to defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseFailed`] for invalid TOML and
    /// [`ConfigError::Io`] if the file cannot be read.
    pub fn load(&self) -> Result<Config, ConfigError> {
        let path = self.config_path();
        if !path.exists() {
            return Ok(Config::default());
        }
        Self::load_from_path(&path)
    }

    /// Loads the configuration, failing if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileNotFound`] if the file does not exist, plus
    /// the errors of [`load`](Self::load).
    pub fn load_required(&self) -> Result<Config, ConfigError> {
        let path = self.config_path();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path.display().to_string()));
        }
        Self::load_from_path(&path)
    }

    /// Loads, validates and expands `~` in every path of the configuration.
    ///
    /// This is what hosts should use before opening the registry or audit log.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`load`](Self::load), any
    /// [`Config::validate`] failure, and [`ConfigError::NoHomeDirectory`] if
    /// a `~` path cannot be expanded.
    pub fn load_expanded(&self) -> Result<Config, ConfigError> {
        let config = self.load()?;
        config.validate()?;
        expand_config_paths(config)
    }

    /// Writes `config` to the file, creating the base directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseFailed`] if serialization fails and
    /// [`ConfigError::Io`] if the file cannot be written.
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        self.ensure_base_dir()?;
        let path = self.config_path();

        let toml_str = toml::to_string_pretty(config).map_err(|e| {
            ConfigError::parse_failed(format!("failed to serialize configuration: {e}"))
        })?;

        fs::write(&path, toml_str).map_err(|e| {
            ConfigError::io(
                format!("failed to write configuration to {}", path.display()),
                e,
            )
        })
    }

    /// Writes the commented default configuration from [`Config::default_toml`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be written.
    pub fn write_default(&self) -> Result<(), ConfigError> {
        self.ensure_base_dir()?;
        let path = self.config_path();

        fs::write(&path, Config::default_toml()).map_err(|e| {
            ConfigError::io(
                format!("failed to write default configuration to {}", path.display()),
                e,
            )
        })
    }

    fn ensure_base_dir(&self) -> Result<(), ConfigError> {
        if !self.base_dir.exists() {
            fs::create_dir_all(&self.base_dir).map_err(|e| {
                ConfigError::io(
                    format!("failed to create base directory {}", self.base_dir.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }

    fn load_from_path(path: &Path) -> Result<Config, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::io(format!("failed to read {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| {
            ConfigError::parse_failed(format!("invalid TOML in {}: {e}", path.display()))
        })
    }
}

/// Expands a leading `~` to the home directory.
///
/// A `~` anywhere else in the path is left alone.
///
/// # Errors
///
/// Returns [`ConfigError::NoHomeDirectory`] if the path starts with `~` and
/// the home directory cannot be determined.
///
/// # Examples
///
/// ```
/// use sessiongate_core::config_loader::expand_path;
///
/// let path = expand_path("/etc/sessiongate/config.toml").expect("absolute path");
/// assert_eq!(path.to_string_lossy(), "/etc/sessiongate/config.toml");
/// ```
pub fn expand_path(path: &str) -> Result<PathBuf, ConfigError> {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or_else(ConfigError::no_home_directory)?;
        Ok(home.join(rest))
    } else if path == "~" {
        dirs::home_dir().ok_or_else(ConfigError::no_home_directory)
    } else {
        Ok(PathBuf::from(path))
    }
}

/// Returns `~/.sessiongate`.
///
/// # Errors
///
/// Returns [`ConfigError::NoHomeDirectory`] if the home directory cannot be determined.
pub fn default_base_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or_else(ConfigError::no_home_directory)?;
    Ok(home.join(BASE_DIR_NAME))
}

/// Expands `registry.database_path` and `audit.directory` in place.
///
/// # Errors
///
/// Returns [`ConfigError::NoHomeDirectory`] if a `~` path cannot be expanded.
pub fn expand_config_paths(mut config: Config) -> Result<Config, ConfigError> {
    config.registry.database_path = expand_path(&config.registry.database_path)?
        .to_string_lossy()
        .into_owned();
    config.audit.directory = expand_path(&config.audit.directory)?
        .to_string_lossy()
        .into_owned();
    Ok(config)
}

/// Loads the configuration from `~/.sessiongate`, with defaults for a missing file.
///
/// # Errors
///
/// Returns the errors of [`ConfigLoader::new`] and [`ConfigLoader::load`].
pub fn load_config() -> Result<Config, ConfigError> {
    ConfigLoader::new()?.load()
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::needless_raw_string_hashes
    )]

    use super::*;
    use tempfile::TempDir;

    fn loader_in(temp_dir: &TempDir) -> ConfigLoader {
        ConfigLoader::with_base_dir(temp_dir.path().to_path_buf())
    }

    // -------------------------------------------------------------------------
    // Path expansion
    // -------------------------------------------------------------------------

    #[test]
    fn test_expand_path_with_tilde_prefix() {
        let path = expand_path("~/.sessiongate/sessions.db").expect("should expand");
        let home = dirs::home_dir().expect("home dir should exist");
        assert_eq!(path, home.join(".sessiongate/sessions.db"));
    }

    #[test]
    fn test_expand_path_leaves_other_paths() {
        assert_eq!(
            expand_path("/var/lib/sessions.db").unwrap(),
            PathBuf::from("/var/lib/sessions.db")
        );
        assert_eq!(
            expand_path("data/~/sessions.db").unwrap(),
            PathBuf::from("data/~/sessions.db")
        );
    }

    #[test]
    fn test_default_base_dir() {
        let home = dirs::home_dir().expect("home dir should exist");
        assert_eq!(default_base_dir().unwrap(), home.join(".sessiongate"));
    }

    #[test]
    fn test_expand_config_paths() {
        let config = expand_config_paths(Config::default()).unwrap();
        assert!(!config.registry.database_path.starts_with('~'));
        assert!(!config.audit.directory.starts_with('~'));
        assert!(config.registry.database_path.ends_with("sessions.db"));
    }

    // -------------------------------------------------------------------------
    // Loading
    // -------------------------------------------------------------------------

    #[test]
    fn test_config_path() {
        let loader = ConfigLoader::with_base_dir(PathBuf::from("/test/base"));
        assert_eq!(loader.config_path(), PathBuf::from("/test/base/config.toml"));
    }

    #[test]
    fn test_load_with_missing_file_returns_defaults() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let loader = loader_in(&temp_dir);

        assert!(!loader.exists());
        assert_eq!(loader.load().unwrap(), Config::default());
    }

    #[test]
    fn test_load_with_valid_toml() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        fs::write(
            temp_dir.path().join("config.toml"),
            r#"
[registry]
database_path = "/data/sessions.db"
cache_capacity = 8

[logging]
format = "json"
"#,
        )
        .unwrap();

        let config = loader_in(&temp_dir).load().unwrap();
        assert_eq!(config.registry.database_path, "/data/sessions.db");
        assert_eq!(config.registry.cache_capacity, 8);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_load_with_invalid_toml_returns_parse_error() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        fs::write(temp_dir.path().join("config.toml"), "not toml [[[").unwrap();

        let err = loader_in(&temp_dir).load().unwrap_err();
        assert!(matches!(err, ConfigError::ParseFailed { .. }));
    }

    #[test]
    fn test_load_required_with_missing_file_returns_error() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let err = loader_in(&temp_dir).load_required().unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_load_expanded_rejects_invalid_config() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        fs::write(
            temp_dir.path().join("config.toml"),
            "[registry]\ncache_capacity = 0\n",
        )
        .unwrap();

        let err = loader_in(&temp_dir).load_expanded().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_load_expanded_keeps_absolute_paths() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let db = temp_dir.path().join("sessions.db");
        let loader = loader_in(&temp_dir);
        loader
            .save(&Config::builder().database_path(db.to_string_lossy()).build())
            .unwrap();

        let config = loader.load_expanded().unwrap();
        assert_eq!(config.registry.database_path, db.to_string_lossy());
    }

    // -------------------------------------------------------------------------
    // Writing
    // -------------------------------------------------------------------------

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let loader = ConfigLoader::with_base_dir(temp_dir.path().join("nested/dir"));

        let original = Config::builder()
            .database_path("/tmp/a.db")
            .cache_capacity(32)
            .audit_enabled(false)
            .log_level("debug")
            .build();

        loader.save(&original).unwrap();
        assert!(loader.exists());
        assert_eq!(loader.load().unwrap(), original);
    }

    #[test]
    fn test_write_default_creates_loadable_config() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let loader = ConfigLoader::with_base_dir(temp_dir.path().join("sessiongate"));

        loader.write_default().unwrap();

        let content = fs::read_to_string(loader.config_path()).unwrap();
        assert!(content.contains("[registry]"));
        assert_eq!(loader.load_required().unwrap(), Config::default());
    }
}
