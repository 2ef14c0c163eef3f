//! # CLI Command Handlers
//!
//! This module contains the implementation of CLI command handlers.
//!
//! ## Module Structure
//!
//! - [`init`] - Initialize the base directory
//! - [`status`] - Display installation status and account policies
//! - [`config`] - Show the configuration
//! - [`grant`] - Grant and revoke session policies
//! - [`query`] - Read one session policy
//! - [`authorize`] - Validate and commit a transfer
//! - [`derive_key`] - Derive a session key from a seed
//! - [`audit`] - Verify the audit log
//! - [`exit_codes`] - Process exit codes
//!
//! ## Implementation Notes
//!
//! Each handler has an `execute` method that returns data, used by tests,
//! and a `run` method that prints it. Handlers that need the registry take
//! a [`CommandContext`](crate::cli::CommandContext).
//!
//! ## Error Handling
//!
//! Each handler has its own error enum. The main function converts them
//! into exit codes: a policy denial exits with
//! [`EXIT_POLICY_DENIED`](exit_codes::EXIT_POLICY_DENIED), everything else
//! with [`EXIT_ERROR`](exit_codes::EXIT_ERROR).

pub mod audit;
pub mod authorize;
pub mod config;
pub mod derive_key;
pub mod exit_codes;
pub mod grant;
pub mod init;
pub mod query;
pub mod status;

// Re-export command types for convenience
pub use audit::{AuditCommandError, VerifyCommand};
pub use authorize::{AuthorizeCommand, AuthorizeError, AuthorizeOutcome};
pub use config::{ConfigCommand, ConfigCommandError};
pub use derive_key::{DeriveKeyCommand, DerivedKey};
pub use exit_codes::{EXIT_ERROR, EXIT_POLICY_DENIED, EXIT_SUCCESS};
pub use grant::{GrantCommand, OwnerCommandError, RevokeCommand};
pub use init::{InitCommand, InitError, InitReport};
pub use query::{PolicyView, QueryCommand, QueryError};
pub use status::{AuditState, StatusCommand, StatusError, StatusReport};
