//! # `SessionGate` Library
//!
//! Host-side pieces of the `SessionGate` session-key spend engine: the
//! command-line interface, the HMAC-chained audit log, and logging setup.
//!
//! The engine itself lives in `sessiongate-policy`; shared types in
//! `sessiongate-core`; key handling in `sessiongate-crypto`.
//!
//! ## Modules
//!
//! - [`audit`] - Tamper-evident log of authorization decisions
//! - [`cli`] - Command-line interface definitions and handlers
//! - [`logging`] - Tracing subscriber setup and log helpers
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use sessiongate::cli::{Cli, Commands};
//!
//! let cli = Cli::parse();
//! println!("Verbose level: {}", cli.verbose);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod audit;
pub mod cli;
pub mod logging;

pub use audit::{AuditEntry, AuditError, AuditLogger, AuthorizationEvent, Verdict, VerifyResult};

// Re-export key logging types for convenience
pub use logging::{
    init_logging, log_security_event, new_correlation_id, redact_sensitive, verbosity_to_level,
    LogConfig, LogError, LogFormat, LogGuard, LogLevel,
};
