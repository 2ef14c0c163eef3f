//! # Logging Infrastructure
//!
//! Structured logging for the `sessiongate` host, built on `tracing`.
//!
//! Levels and formats come either from `-v` flags on the command line or from
//! the `[logging]` section of `config.toml`. An optional file sink rolls daily.
//!
//! ## Quick Start
//!
//! ```no_run
//! use sessiongate::logging::{init_logging, LogConfig, LogLevel};
//!
//! let config = LogConfig {
//!     level: LogLevel::Info,
//!     ..Default::default()
//! };
//! let _guard = init_logging(&config).expect("Failed to initialize logging");
//!
//! tracing::info!("Engine ready");
//! ```
//!
//! ## Security Events
//!
//! Grants, revocations and denials are additionally emitted on the
//! `sessiongate::security` target so they can be routed separately:
//!
//! ```text
//! RUST_LOG=warn,sessiongate::security=info
//! ```

use std::path::PathBuf;
use std::str::FromStr;

use sessiongate_core::config::LoggingConfig;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Target used by [`log_security_event`].
pub const SECURITY_TARGET: &str = "sessiongate::security";

/// Error type for logging initialization failures.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// Failed to create the log file or its directory.
    #[error("Failed to create log file: {0}")]
    FileCreation(String),

    /// Failed to install the global subscriber.
    #[error("Failed to initialize logging: {0}")]
    SubscriberInit(String),

    /// Invalid level, format or filter.
    #[error("Invalid log configuration: {0}")]
    InvalidConfig(String),
}

/// Minimum severity that will be logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// trace, debug, info, warn, error
    Trace,
    /// debug, info, warn, error
    Debug,
    /// info, warn, error
    Info,
    /// warn, error
    #[default]
    Warn,
    /// error only
    Error,
}

impl LogLevel {
    /// Convert to the `tracing` level.
    #[must_use]
    pub const fn as_tracing_level(self) -> Level {
        match self {
            Self::Trace => Level::TRACE,
            Self::Debug => Level::DEBUG,
            Self::Info => Level::INFO,
            Self::Warn => Level::WARN,
            Self::Error => Level::ERROR,
        }
    }

    /// Directive string for `EnvFilter`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(LogError::InvalidConfig(format!("unknown log level '{other}'"))),
        }
    }
}

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human-readable output.
    #[default]
    Pretty,
    /// One JSON object per line, for log aggregation.
    Json,
    /// Single-line human-readable output.
    Compact,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Json => write!(f, "json"),
            Self::Compact => write!(f, "compact"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(LogError::InvalidConfig(format!(
                "unknown log format '{other}'"
            ))),
        }
    }
}

/// Configuration for [`init_logging`].
///
/// # Example
///
/// ```
/// use sessiongate::logging::{LogConfig, LogFormat, LogLevel};
///
/// let config = LogConfig {
///     level: LogLevel::Debug,
///     format: LogFormat::Json,
///     ..Default::default()
/// };
/// assert!(config.file_path.is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Minimum severity.
    pub level: LogLevel,

    /// Output format.
    pub format: LogFormat,

    /// Optional daily-rolling log file, written in addition to stderr.
    pub file_path: Option<PathBuf>,

    /// Whether commands open a span carrying a correlation ID.
    pub correlation_ids: bool,
}

impl LogConfig {
    /// Builds a configuration from the `[logging]` config section.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidConfig`] for an unknown level or format.
    pub fn from_settings(settings: &LoggingConfig) -> Result<Self, LogError> {
        Ok(Self {
            level: settings.level.parse()?,
            format: settings.format.parse()?,
            file_path: None,
            correlation_ids: true,
        })
    }
}

/// Keeps the non-blocking file writer alive; logs flush when it drops.
pub struct LogGuard {
    guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

impl LogGuard {
    const fn new(guard: Option<tracing_appender::non_blocking::WorkerGuard>) -> Self {
        Self { guard }
    }
}

impl std::fmt::Debug for LogGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogGuard")
            .field("has_file_guard", &self.guard.is_some())
            .finish()
    }
}

/// Installs the global subscriber.
///
/// `RUST_LOG`, when set, overrides the configured level.
///
/// # Errors
///
/// Returns [`LogError`] if the log directory cannot be created, the filter
/// is invalid, or a subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<LogGuard, LogError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.level.as_str()))
        .map_err(|e| LogError::InvalidConfig(e.to_string()))?;

    let (file_writer, guard) = match config.file_path {
        Some(ref path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            std::fs::create_dir_all(dir)
                .map_err(|e| LogError::FileCreation(format!("{}: {e}", dir.display())))?;

            let filename = path
                .file_name()
                .and_then(|s| s.to_str())
                .ok_or_else(|| LogError::InvalidConfig("Invalid log file name".to_string()))?;

            let appender = tracing_appender::rolling::daily(dir, filename);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (Some(non_blocking), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Pretty => {
            let stderr_layer = fmt::layer()
                .pretty()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_span_events(FmtSpan::CLOSE);
            let file_layer = file_writer.map(|writer| {
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true)
            });
            registry.with(stderr_layer).with(file_layer).try_init()
        }
        LogFormat::Json => {
            let stderr_layer = fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_current_span(true);
            let file_layer =
                file_writer.map(|writer| fmt::layer().json().with_writer(writer).with_target(true));
            registry.with(stderr_layer).with(file_layer).try_init()
        }
        LogFormat::Compact => {
            let stderr_layer = fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_target(true);
            let file_layer = file_writer.map(|writer| {
                fmt::layer()
                    .compact()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true)
            });
            registry.with(stderr_layer).with(file_layer).try_init()
        }
    };
    result.map_err(|e| LogError::SubscriberInit(e.to_string()))?;

    Ok(LogGuard::new(guard))
}

/// Masks a secret for display, keeping the first and last four characters.
///
/// Values shorter than 12 characters are fully masked.
///
/// # Example
///
/// ```
/// use sessiongate::logging::redact_sensitive;
///
/// assert_eq!(redact_sensitive("0x4c0883a69102937d"), "0x4c***937d");
/// assert_eq!(redact_sensitive("secret"), "***");
/// ```
#[must_use]
pub fn redact_sensitive(value: &str) -> String {
    const MIN_LENGTH_FOR_PARTIAL: usize = 12;
    const VISIBLE_CHARS: usize = 4;

    let chars: Vec<char> = value.chars().collect();
    if chars.len() < MIN_LENGTH_FOR_PARTIAL {
        return "***".to_string();
    }

    let prefix: String = chars.iter().take(VISIBLE_CHARS).collect();
    let suffix: String = chars.iter().skip(chars.len() - VISIBLE_CHARS).collect();
    format!("{prefix}***{suffix}")
}

/// Generates a 32-character hex correlation ID.
///
/// # Example
///
/// ```
/// use sessiongate::logging::new_correlation_id;
///
/// let id = new_correlation_id();
/// assert_eq!(id.len(), 32);
/// assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
/// ```
#[must_use]
pub fn new_correlation_id() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

/// Opens an info span carrying a correlation ID.
///
/// ```ignore
/// let span = sessiongate::with_correlation_id!(id, "authorize", account = %account);
/// let _entered = span.enter();
/// ```
#[macro_export]
macro_rules! with_correlation_id {
    ($id:expr, $name:expr) => {
        tracing::info_span!($name, correlation_id = %$id)
    };
    ($id:expr, $name:expr, $($fields:tt)*) => {
        tracing::info_span!($name, correlation_id = %$id, $($fields)*)
    };
}

/// Maps `-v` counts to a level.
///
/// | Verbosity | Level |
/// |-----------|-------|
/// | 0         | Warn  |
/// | 1         | Info  |
/// | 2         | Debug |
/// | 3+        | Trace |
#[must_use]
pub const fn verbosity_to_level(verbosity: u8) -> LogLevel {
    match verbosity {
        0 => LogLevel::Warn,
        1 => LogLevel::Info,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    }
}

/// Emits a security event on [`SECURITY_TARGET`].
pub fn log_security_event(event: &str, details: &str) {
    tracing::info!(
        target: "sessiongate::security",
        event_type = "security",
        security_event = event,
        details = details,
        "Security event: {event}"
    );
}
