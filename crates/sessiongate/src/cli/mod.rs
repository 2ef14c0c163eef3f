//! # CLI Module
//!
//! Command-line interface for `sessiongate`.
//!
//! ## Module Structure
//!
//! - [`args`] - Argument parsing and CLI structure definitions
//! - [`context`] - Base directory, configuration and engine wiring shared by commands
//! - [`commands`] - Command handler implementations
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use sessiongate::cli::{Cli, Commands};
//!
//! let cli = Cli::parse();
//!
//! match cli.command {
//!     Commands::Init { force } => {
//!         // Handle init command
//!     }
//!     Commands::Authorize(args) => {
//!         // Handle authorize command
//!     }
//!     _ => {}
//! }
//! ```
//!
//! ## Commands
//!
//! - `sessiongate init [--force]` - Initialize the base directory
//! - `sessiongate status [--account ADDRESS] [--now SECONDS]` - Display status
//! - `sessiongate config [path]` - View configuration
//! - `sessiongate grant --account --signer [--asset] --valid-after --valid-until --limit [--refresh-interval]`
//! - `sessiongate revoke --account --signer [--asset]`
//! - `sessiongate query --account --signer [--asset] [--format text|json]`
//! - `sessiongate authorize --account (--signer | --signature --nonce) --recipient --amount [--now] [--format text|json]`
//! - `sessiongate derive-key <SEED> [--reveal]`
//! - `sessiongate audit verify`

pub mod args;
pub mod commands;
pub mod context;

pub use args::{
    AuditCommands, AuthorizeArgs, Cli, Commands, ConfigAction, GrantArgs, OutputFormat,
    PolicyKeyArgs, QueryArgs, RevokeArgs,
};
pub use context::CommandContext;
