//! # Command Context
//!
//! Resolves the base directory, loads the configuration and opens the
//! registry and audit log that most commands share.
//!
//! Paths in the configuration may be absolute, start with `~`, or be relative.
//! Relative paths are resolved against the base directory, so an installation
//! created with `--home <DIR>` is self-contained.
//!
//! ## Usage
//!
//! ```no_run
//! use sessiongate::cli::CommandContext;
//!
//! let ctx = CommandContext::load(None).expect("not initialized");
//! let engine = ctx.open_engine().expect("registry");
//! ```

use std::path::{Path, PathBuf};

use sessiongate_core::config::Config;
use sessiongate_core::config_loader::{default_base_dir, ConfigLoader};
use sessiongate_core::error::{ConfigError, StoreError};
use sessiongate_policy::{SessionEngine, SqliteRegistry};

use crate::audit::{AuditError, AuditLogger};

/// Errors that can occur while setting up a command.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// No configuration file exists under the base directory.
    #[error("SessionGate is not initialized in {0}. Run 'sessiongate init' first.")]
    NotInitialized(PathBuf),

    /// The configuration could not be loaded or is invalid.
    #[error("Failed to load configuration: {0}")]
    Config(#[from] ConfigError),

    /// The policy registry could not be opened.
    #[error("Failed to open policy registry: {0}")]
    Store(#[from] StoreError),

    /// The audit log could not be opened.
    #[error("Failed to open audit log: {0}")]
    Audit(#[from] AuditError),
}

/// Returns `home`, or `~/.sessiongate` when it is `None`.
///
/// # Errors
///
/// Returns [`ConfigError::NoHomeDirectory`] if no home directory exists.
pub fn resolve_base_dir(home: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    match home {
        Some(dir) => Ok(dir),
        None => default_base_dir(),
    }
}

/// Loaded configuration for an initialized base directory.
#[derive(Debug, Clone)]
pub struct CommandContext {
    loader: ConfigLoader,
    config: Config,
}

impl CommandContext {
    /// Loads the context for `home` (or `~/.sessiongate`).
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::NotInitialized`] if there is no configuration
    /// file, or [`ContextError::Config`] if it cannot be parsed or validated.
    pub fn load(home: Option<PathBuf>) -> Result<Self, ContextError> {
        let loader = ConfigLoader::with_base_dir(resolve_base_dir(home)?);
        if !loader.exists() {
            return Err(ContextError::NotInitialized(loader.base_dir().to_path_buf()));
        }

        let config = loader.load_expanded()?;
        Ok(Self { loader, config })
    }

    /// The base directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        self.loader.base_dir()
    }

    /// Path of `config.toml`.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.loader.config_path()
    }

    /// The loaded configuration with `~` expanded.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Resolved path of the registry database.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.resolve(&self.config.registry.database_path)
    }

    /// Resolved audit directory, or `None` when auditing is disabled.
    #[must_use]
    pub fn audit_dir(&self) -> Option<PathBuf> {
        self.config
            .audit
            .enabled
            .then(|| self.resolve(&self.config.audit.directory))
    }

    /// Opens the `SQLite` registry and wraps it in an engine.
    ///
    /// The schema is created on first open.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Store`] if the database cannot be opened.
    pub fn open_engine(&self) -> Result<SessionEngine<SqliteRegistry>, ContextError> {
        let registry =
            SqliteRegistry::open(&self.database_path(), self.config.registry.cache_capacity)?;
        Ok(SessionEngine::new(registry))
    }

    /// Opens the audit log, creating its key on first use.
    ///
    /// Returns `Ok(None)` when auditing is disabled.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Audit`] if the key cannot be read or the
    /// existing chain does not verify.
    pub fn open_audit(&self) -> Result<Option<AuditLogger>, ContextError> {
        self.audit_dir()
            .map(|dir| AuditLogger::open(&dir))
            .transpose()
            .map_err(ContextError::from)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = PathBuf::from(path);
        if path.is_absolute() {
            path
        } else {
            self.base_dir().join(path)
        }
    }
}
