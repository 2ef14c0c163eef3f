//! # `SessionGate`
//!
//! Delegated session-key spend authorization for smart-contract accounts.
//!
//! ## Usage
//!
//! ```bash
//! # Initialize configuration, registry and audit key
//! sessiongate init
//!
//! # Derive a session key and grant it 1 ETH per hour for a day
//! sessiongate derive-key "my session"
//! sessiongate grant --account 0x11.. --signer 0x22.. \
//!     --valid-after 1700000000 --valid-until 1700086400 \
//!     --limit 1000000000000000000 --refresh-interval 3600
//!
//! # Authorize a transfer (exit 0 authorized, 1 denied, 2 error)
//! sessiongate authorize --account 0x11.. --signer 0x22.. \
//!     --recipient 0x33.. --amount 250000000000000000
//!
//! # Verify the audit log
//! sessiongate audit verify
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

use std::path::PathBuf;

use clap::Parser;
use sessiongate::cli::commands::{
    AuthorizeCommand, ConfigCommand, DeriveKeyCommand, GrantCommand, InitCommand, QueryCommand,
    RevokeCommand, StatusCommand, VerifyCommand, EXIT_ERROR, EXIT_POLICY_DENIED,
};
use sessiongate::cli::{AuditCommands, Cli, CommandContext, Commands};
use sessiongate::logging::{init_logging, verbosity_to_level, LogConfig, LogError, LogGuard};
use sessiongate_core::config_loader::ConfigLoader;

/// Set up logging.
///
/// `-v` flags take precedence; otherwise the `[logging]` section of an
/// existing configuration is used, and the defaults when there is none.
///
/// # Errors
///
/// Returns [`LogError`] if the configured level or format is invalid or the
/// subscriber cannot be installed.
fn setup_logging(verbose: u8, home: Option<&PathBuf>) -> Result<LogGuard, LogError> {
    let settings = home
        .cloned()
        .map_or_else(ConfigLoader::new, |dir| Ok(ConfigLoader::with_base_dir(dir)))
        .and_then(|loader| loader.load())
        .map(|config| config.logging)
        .unwrap_or_default();

    let mut config = LogConfig::from_settings(&settings)?;
    if verbose > 0 {
        config.level = verbosity_to_level(verbose);
    }
    config.correlation_ids = true;
    init_logging(&config)
}

/// Main entry point for the `SessionGate` application.
fn main() {
    let cli = Cli::parse();

    let _guard = match setup_logging(cli.verbose, cli.home.as_ref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            std::process::exit(EXIT_ERROR);
        }
    };

    let home = cli.home;
    let result = match cli.command {
        Commands::Init { force } => InitCommand::new(force).run(home).map_err(|e| e.to_string()),
        Commands::Config { action } => ConfigCommand::new(action)
            .run(home)
            .map_err(|e| e.to_string()),
        Commands::DeriveKey { seed, reveal } => {
            DeriveKeyCommand::new(seed, reveal).run();
            Ok(())
        }
        command => run_with_context(home, command),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(EXIT_ERROR);
    }
}

/// Run a command that needs an initialized base directory.
///
/// # Exit Codes
///
/// This function calls `std::process::exit` directly for a policy denial:
/// - Exit code 1: Policy denied (authorize)
/// - Exit code 2: Any other authorize error
fn run_with_context(home: Option<PathBuf>, command: Commands) -> Result<(), String> {
    let ctx = CommandContext::load(home).map_err(|e| e.to_string())?;

    match command {
        Commands::Status { account, now } => StatusCommand::new(account, now)
            .run(&ctx)
            .map_err(|e| e.to_string()),
        Commands::Grant(args) => GrantCommand::from_args(&args)
            .run(&ctx)
            .map_err(|e| e.to_string()),
        Commands::Revoke(args) => RevokeCommand::from_args(&args)
            .run(&ctx)
            .map_err(|e| e.to_string()),
        Commands::Query(args) => QueryCommand::new(args.key.key(), args.now, args.format)
            .run(&ctx)
            .map_err(|e| e.to_string()),
        Commands::Authorize(args) => match AuthorizeCommand::new(args).run(&ctx) {
            Ok(()) => Ok(()),
            Err(e) if e.is_denied() => {
                eprintln!("{e}");
                std::process::exit(EXIT_POLICY_DENIED);
            }
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(EXIT_ERROR);
            }
        },
        Commands::Audit {
            command: AuditCommands::Verify,
        } => VerifyCommand::new().run(&ctx).map_err(|e| e.to_string()),
        Commands::Init { .. } | Commands::Config { .. } | Commands::DeriveKey { .. } => Ok(()),
    }
}
