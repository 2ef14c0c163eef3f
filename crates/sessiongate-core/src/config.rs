//! Configuration types for the `SessionGate` host.
//!
//! Configuration is stored in TOML format at `~/.sessiongate/config.toml` and
//! covers where policies are persisted, where authorization decisions are
//! audited, and how the host logs.
//!
//! # Examples
//!
//! ```
//! use sessiongate_core::config::Config;
//!
//! let config = Config::default();
//! assert_eq!(config.registry.database_path, "~/.sessiongate/sessions.db");
//! assert_eq!(config.registry.cache_capacity, 256);
//! assert!(config.audit.enabled);
//! ```
//!
//! # Default TOML Output
//!
//! ```toml
//! [registry]
//! database_path = "~/.sessiongate/sessions.db"
//! cache_capacity = 256
//!
//! [audit]
//! enabled = true
//! directory = "~/.sessiongate/audit"
//!
//! [logging]
//! level = "warn"
//! format = "pretty"
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Top-level configuration for the `SessionGate` host.
///
/// # Examples
///
/// ```
/// use sessiongate_core::config::Config;
///
/// let toml_str = r#"
/// [registry]
/// database_path = "/var/lib/sessiongate/sessions.db"
///
/// [logging]
/// level = "debug"
/// "#;
///
/// let config: Config = toml::from_str(toml_str).expect("valid TOML");
/// assert_eq!(config.registry.database_path, "/var/lib/sessiongate/sessions.db");
/// assert_eq!(config.registry.cache_capacity, 256);
/// assert_eq!(config.logging.level, "debug");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Policy registry storage.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Audit log of authorization decisions.
    #[serde(default)]
    pub audit: AuditConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_database_path() -> String {
    "~/.sessiongate/sessions.db".to_string()
}

const fn default_cache_capacity() -> usize {
    256
}

/// Storage settings for the durable policy registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Path of the `SQLite` database holding session policies.
    ///
    /// Supports `~` expansion. Default: `~/.sessiongate/sessions.db`
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Number of policies kept in the read cache.
    ///
    /// Default: 256
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

const fn default_audit_enabled() -> bool {
    true
}

fn default_audit_dir() -> String {
    "~/.sessiongate/audit".to_string()
}

/// Audit log settings.
///
/// When enabled, every authorization decision made by the host is appended
/// to an HMAC-chained log in `directory`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditConfig {
    /// Whether decisions are audited. Default: `true`
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,

    /// Directory holding `audit.jsonl` and its key. Default: `~/.sessiongate/audit`
    #[serde(default = "default_audit_dir")]
    pub directory: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            directory: default_audit_dir(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

/// Log output settings.
///
/// Command-line verbosity flags take precedence over `level`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Minimum level: `trace`, `debug`, `info`, `warn` or `error`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: `pretty`, `json` or `compact`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 3] = ["pretty", "json", "compact"];

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if:
    /// - `registry.database_path` is empty
    /// - `registry.cache_capacity` is zero
    /// - `audit.directory` is empty while auditing is enabled
    /// - `logging.level` or `logging.format` is not recognized
    ///
    /// # Examples
    ///
    /// ```
    /// use sessiongate_core::config::Config;
    ///
    /// let mut config = Config::default();
    /// assert!(config.validate().is_ok());
    ///
    /// config.registry.cache_capacity = 0;
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.registry.database_path.is_empty() {
            return Err(ConfigError::invalid_value(
                "registry.database_path",
                "<empty>",
            ));
        }

        if self.registry.cache_capacity == 0 {
            return Err(ConfigError::invalid_value("registry.cache_capacity", "0"));
        }

        if self.audit.enabled && self.audit.directory.is_empty() {
            return Err(ConfigError::invalid_value("audit.directory", "<empty>"));
        }

        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::invalid_value(
                "logging.level",
                self.logging.level.clone(),
            ));
        }

        let format = self.logging.format.to_ascii_lowercase();
        if !LOG_FORMATS.contains(&format.as_str()) {
            return Err(ConfigError::invalid_value(
                "logging.format",
                self.logging.format.clone(),
            ));
        }

        Ok(())
    }

    /// Generates the default configuration as a commented TOML string.
    #[must_use]
    pub fn default_toml() -> String {
        r#"# SessionGate configuration

[registry]
# SQLite database holding session policies
database_path = "~/.sessiongate/sessions.db"
# Policies kept in the read cache
cache_capacity = 256

[audit]
enabled = true
directory = "~/.sessiongate/audit"

[logging]
# trace, debug, info, warn, error
level = "warn"
# pretty, json, compact
format = "pretty"
"#
        .to_string()
    }

    /// Creates a configuration builder for customizing values.
    ///
    /// # Examples
    ///
    /// ```
    /// use sessiongate_core::config::Config;
    ///
    /// let config = Config::builder()
    ///     .database_path("/tmp/sessions.db")
    ///     .audit_enabled(false)
    ///     .build();
    ///
    /// assert_eq!(config.registry.database_path, "/tmp/sessions.db");
    /// assert!(!config.audit.enabled);
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Builder for creating customized [`Config`] instances.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Creates a new configuration builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Sets the registry database path.
    #[must_use]
    pub fn database_path(mut self, path: impl Into<String>) -> Self {
        self.config.registry.database_path = path.into();
        self
    }

    /// Sets the registry cache capacity.
    #[must_use]
    pub const fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.registry.cache_capacity = capacity;
        self
    }

    /// Enables or disables the audit log.
    #[must_use]
    pub const fn audit_enabled(mut self, enabled: bool) -> Self {
        self.config.audit.enabled = enabled;
        self
    }

    /// Sets the audit directory.
    #[must_use]
    pub fn audit_directory(mut self, dir: impl Into<String>) -> Self {
        self.config.audit.directory = dir.into();
        self
    }

    /// Sets the log level.
    #[must_use]
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// Sets the log format.
    #[must_use]
    pub fn log_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    /// Builds the final configuration.
    #[must_use]
    pub fn build(self) -> Config {
        self.config
    }
}
