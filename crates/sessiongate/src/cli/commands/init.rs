//! # Init Command
//!
//! Implementation of the `sessiongate init` command that creates the base
//! directory, writes the configuration, creates the policy registry and
//! generates the audit key.
//!
//! ## Directory Structure
//!
//! ```text
//! ~/.sessiongate/
//! ├── config.toml       (0600)
//! ├── sessions.db
//! └── audit/            (0700)
//!     └── audit.key     (0600)
//! ```
//!
//! `--force` rewrites `config.toml`. Existing policies and the audit chain
//! are kept.
//!
//! ## Usage
//!
//! ```no_run
//! use sessiongate::cli::commands::init::InitCommand;
//!
//! let cmd = InitCommand::new(false);
//! cmd.run(None).expect("initialization failed");
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use sessiongate_core::config::Config;
use sessiongate_core::config_loader::{default_base_dir, ConfigLoader};
use sessiongate_core::error::ConfigError;

use crate::audit::AUDIT_KEY_FILENAME;
use crate::cli::context::{resolve_base_dir, CommandContext, ContextError};

// ============================================================================
// Constants
// ============================================================================

/// Registry file name for installations outside the home directory.
const DATABASE_FILE_NAME: &str = "sessions.db";

/// Audit directory name for installations outside the home directory.
const AUDIT_DIR_NAME: &str = "audit";

// ============================================================================
// InitError
// ============================================================================

/// Errors that can occur during initialization.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    /// A configuration already exists and --force was not specified.
    #[error("SessionGate is already initialized. Use --force to reinitialize.")]
    AlreadyInitialized,

    /// Failed to create a directory.
    #[error("Failed to create directory: {0}")]
    DirectoryCreation(#[source] io::Error),

    /// The base directory could not be resolved or the config not written.
    #[error("Configuration error: {0}")]
    Config(#[source] ConfigError),

    /// Failed to create the registry or audit log.
    #[error(transparent)]
    Setup(#[from] ContextError),

    /// General I/O error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<ConfigError> for InitError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

// ============================================================================
// InitReport
// ============================================================================

/// What `init` created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    /// The base directory.
    pub base_dir: PathBuf,
    /// Path of `config.toml`.
    pub config_path: PathBuf,
    /// Path of the registry database.
    pub database_path: PathBuf,
    /// Path of the audit key, when auditing is enabled.
    pub audit_key_path: Option<PathBuf>,
}

// ============================================================================
// InitCommand
// ============================================================================

/// The `sessiongate init` command handler.
#[derive(Debug, Clone, Copy)]
pub struct InitCommand {
    /// Rewrite the configuration even if it exists.
    pub force: bool,
}

impl InitCommand {
    /// Create a new `InitCommand`.
    #[must_use]
    pub const fn new(force: bool) -> Self {
        Self { force }
    }

    /// Run the command and print the result.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub fn run(&self, home: Option<PathBuf>) -> Result<(), InitError> {
        let base_dir = resolve_base_dir(home)?;
        let report = self.execute(&base_dir)?;
        print_success_message(&report);
        Ok(())
    }

    /// Initialize `base_dir`.
    ///
    /// This method:
    /// 1. Checks if already initialized (unless --force)
    /// 2. Creates the base directory with mode 0700
    /// 3. Writes `config.toml` with mode 0600
    /// 4. Opens the registry, creating its schema
    /// 5. Creates the audit directory and key if auditing is enabled
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Already initialized and --force not specified
    /// - A directory or the config file cannot be written
    /// - The registry or audit log cannot be created
    pub fn execute(&self, base_dir: &Path) -> Result<InitReport, InitError> {
        let loader = ConfigLoader::with_base_dir(base_dir.to_path_buf());

        // 1. Check if already initialized (unless --force)
        if !self.force && loader.exists() {
            return Err(InitError::AlreadyInitialized);
        }

        // 2. Create the base directory
        create_private_dir(base_dir)?;

        // 3. Write config.toml
        write_config(&loader)?;

        // 4. Create the registry schema
        let ctx = CommandContext::load(Some(base_dir.to_path_buf()))?;
        ctx.open_engine()?;

        // 5. Create the audit directory and key
        let audit_key_path = match ctx.audit_dir() {
            Some(dir) => {
                create_private_dir(&dir)?;
                ctx.open_audit()?;
                Some(dir.join(AUDIT_KEY_FILENAME))
            }
            None => None,
        };

        tracing::info!(base_dir = %base_dir.display(), force = self.force, "Initialized");

        Ok(InitReport {
            base_dir: base_dir.to_path_buf(),
            config_path: ctx.config_path(),
            database_path: ctx.database_path(),
            audit_key_path,
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Create `dir` if needed and restrict it to the owner.
fn create_private_dir(dir: &Path) -> Result<(), InitError> {
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(InitError::DirectoryCreation)?;
    }

    #[cfg(unix)]
    {
        let mut perms = fs::metadata(dir)
            .map_err(InitError::DirectoryCreation)?
            .permissions();
        perms.set_mode(0o700);
        fs::set_permissions(dir, perms).map_err(InitError::DirectoryCreation)?;
    }

    Ok(())
}

/// Write the configuration file.
///
/// The default `~/.sessiongate` gets the commented default file. Any other
/// base directory gets paths relative to itself.
fn write_config(loader: &ConfigLoader) -> Result<(), InitError> {
    let is_default_home = default_base_dir().is_ok_and(|dir| dir == loader.base_dir());

    if is_default_home {
        loader.write_default()?;
    } else {
        let config = Config::builder()
            .database_path(DATABASE_FILE_NAME)
            .audit_directory(AUDIT_DIR_NAME)
            .build();
        loader.save(&config)?;
    }

    #[cfg(unix)]
    {
        let config_path = loader.config_path();
        let mut perms = fs::metadata(&config_path)?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(&config_path, perms)?;
    }

    Ok(())
}

/// Print the success message with next steps.
fn print_success_message(report: &InitReport) {
    println!();
    println!("SessionGate initialized successfully!");
    println!();
    println!("  Base directory: {}", report.base_dir.display());
    println!("  Configuration:  {}", report.config_path.display());
    println!("  Registry:       {}", report.database_path.display());
    match &report.audit_key_path {
        Some(path) => println!("  Audit key:      {}", path.display()),
        None => println!("  Audit log:      disabled"),
    }
    println!();
    println!("Next steps:");
    println!("  1. Derive a session key: sessiongate derive-key <SEED>");
    println!("  2. Grant it a policy:    sessiongate grant --account <ACCOUNT> --signer <KEY> ...");
    println!("  3. View status:          sessiongate status");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::indexing_slicing
    )]

    use super::*;
    use tempfile::TempDir;

    fn create_test_dir() -> TempDir {
        TempDir::new().expect("failed to create temp dir")
    }

    #[test]
    fn test_init_creates_structure() {
        let temp_dir = create_test_dir();
        let base_dir = temp_dir.path().join("sg");

        let report = InitCommand::new(false).execute(&base_dir).unwrap();

        assert_eq!(report.base_dir, base_dir);
        assert!(base_dir.join("config.toml").exists());
        assert!(base_dir.join(DATABASE_FILE_NAME).exists());
        assert_eq!(
            report.audit_key_path,
            Some(base_dir.join(AUDIT_DIR_NAME).join(AUDIT_KEY_FILENAME))
        );
        assert!(base_dir.join(AUDIT_DIR_NAME).join(AUDIT_KEY_FILENAME).exists());
    }

    #[test]
    fn test_init_writes_relative_paths() {
        let temp_dir = create_test_dir();
        let base_dir = temp_dir.path().join("sg");
        InitCommand::new(false).execute(&base_dir).unwrap();

        let config = ConfigLoader::with_base_dir(base_dir).load().unwrap();
        assert_eq!(config.registry.database_path, DATABASE_FILE_NAME);
        assert_eq!(config.audit.directory, AUDIT_DIR_NAME);
    }

    #[test]
    fn test_init_fails_if_already_initialized() {
        let temp_dir = create_test_dir();
        let base_dir = temp_dir.path().join("sg");

        InitCommand::new(false).execute(&base_dir).unwrap();
        let result = InitCommand::new(false).execute(&base_dir);
        assert!(matches!(result, Err(InitError::AlreadyInitialized)));
    }

    #[test]
    fn test_force_keeps_audit_key() {
        let temp_dir = create_test_dir();
        let base_dir = temp_dir.path().join("sg");
        let key_path = base_dir.join(AUDIT_DIR_NAME).join(AUDIT_KEY_FILENAME);

        InitCommand::new(false).execute(&base_dir).unwrap();
        let key_before = fs::read(&key_path).unwrap();

        InitCommand::new(true).execute(&base_dir).unwrap();
        assert_eq!(fs::read(&key_path).unwrap(), key_before);
    }

    #[cfg(unix)]
    #[test]
    fn test_permissions() {
        let temp_dir = create_test_dir();
        let base_dir = temp_dir.path().join("sg");
        InitCommand::new(false).execute(&base_dir).unwrap();

        let mode = |path: &Path| fs::metadata(path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&base_dir), 0o700);
        assert_eq!(mode(&base_dir.join("config.toml")), 0o600);
        assert_eq!(mode(&base_dir.join(AUDIT_DIR_NAME)), 0o700);
    }
}
