//! # Config Command
//!
//! Implementation of the `sessiongate config` command.
//!
//! ```text
//! sessiongate config           # Display current configuration
//! sessiongate config path      # Show the configuration file path
//! ```
//!
//! When no configuration file exists the defaults are shown, marked as such.

use std::fs;
use std::path::PathBuf;

use sessiongate_core::config::Config;
use sessiongate_core::config_loader::ConfigLoader;
use sessiongate_core::error::ConfigError;

use crate::cli::args::ConfigAction;
use crate::cli::context::resolve_base_dir;

/// Errors that can occur during config command execution.
#[derive(Debug, thiserror::Error)]
pub enum ConfigCommandError {
    /// The base directory could not be resolved.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The configuration file could not be read.
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// The `sessiongate config` command handler.
#[derive(Debug, Clone)]
pub struct ConfigCommand {
    /// What to show.
    pub action: Option<ConfigAction>,
}

impl ConfigCommand {
    /// Create a new `ConfigCommand`.
    #[must_use]
    pub const fn new(action: Option<ConfigAction>) -> Self {
        Self { action }
    }

    /// Produce the text to print.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined or the
    /// configuration file exists but cannot be read.
    pub fn execute(&self, home: Option<PathBuf>) -> Result<String, ConfigCommandError> {
        let loader = ConfigLoader::with_base_dir(resolve_base_dir(home)?);

        match self.action {
            Some(ConfigAction::Path) => Ok(loader.config_path().display().to_string()),
            None if loader.exists() => Ok(fs::read_to_string(loader.config_path())?),
            None => Ok(format!(
                "# No configuration at {}; showing defaults\n{}",
                loader.config_path().display(),
                Config::default_toml()
            )),
        }
    }

    /// Print the configuration or its path.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub fn run(&self, home: Option<PathBuf>) -> Result<(), ConfigCommandError> {
        println!("{}", self.execute(home)?.trim_end());
        Ok(())
    }
}
