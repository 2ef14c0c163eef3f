//! # CLI Argument Definitions
//!
//! The command-line structure of `sessiongate`, using clap derive macros.
//!
//! - `sessiongate init` - Create the base directory, config, registry and audit key
//! - `sessiongate status` - Show installation status, or an account's policies
//! - `sessiongate config [path]` - Show the configuration or its location
//! - `sessiongate grant` - Add or replace a session policy
//! - `sessiongate revoke` - Revoke a session policy
//! - `sessiongate query` - Read one session policy
//! - `sessiongate authorize` - Validate and commit a transfer
//! - `sessiongate derive-key <SEED>` - Derive a session key from a seed string
//! - `sessiongate audit verify` - Verify the audit log chain
//!
//! ## Global Options
//!
//! - `-v, --verbose` - Increase verbosity level
//! - `--home <DIR>` - Base directory (defaults to `~/.sessiongate`)

use std::path::PathBuf;

use alloy_primitives::{Address, U256};
use clap::{Args, Parser, Subcommand, ValueEnum};
use sessiongate_core::types::{Asset, PolicyKey, Timestamp};

/// Session-key spend authorization for smart-contract accounts.
#[derive(Debug, Parser)]
#[command(name = "sessiongate")]
#[command(author, version, about = "Session-key spend authorization")]
#[command(propagate_version = true)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    ///
    /// Overrides the `[logging]` level from the configuration file.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Base directory holding config.toml, the registry and the audit log
    #[arg(long, global = true, value_name = "DIR")]
    pub home: Option<PathBuf>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Initialize the base directory, configuration, registry and audit key
    Init {
        /// Overwrite an existing configuration with defaults
        #[arg(short, long)]
        force: bool,
    },

    /// Display installation status, or the policies of one account
    Status {
        /// List this account's policies with their current status
        #[arg(long, value_name = "ADDRESS")]
        account: Option<Address>,

        /// Evaluate status at this Unix time instead of the system clock
        #[arg(long, value_name = "SECONDS")]
        now: Option<Timestamp>,
    },

    /// View configuration
    ///
    /// Without a subcommand, prints the current configuration.
    Config {
        /// Configuration action to perform
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Add or replace a session policy (account owner only)
    Grant(GrantArgs),

    /// Revoke a session policy (account owner only)
    Revoke(RevokeArgs),

    /// Read a session policy
    Query(QueryArgs),

    /// Validate a transfer and commit it when admitted
    ///
    /// Exits with 0 when authorized, 1 when denied and 2 on error.
    Authorize(AuthorizeArgs),

    /// Derive a session key from a seed string
    DeriveKey {
        /// Seed string; the private key is keccak256 of its UTF-8 bytes
        #[arg(value_name = "SEED")]
        seed: String,

        /// Print the private key in full
        #[arg(long)]
        reveal: bool,
    },

    /// Audit log commands
    Audit {
        /// Audit command to execute
        #[command(subcommand)]
        command: AuditCommands,
    },
}

/// Configuration-related actions.
#[derive(Debug, Clone, Subcommand)]
pub enum ConfigAction {
    /// Show the configuration file path
    Path,
}

/// Audit log actions.
#[derive(Debug, Clone, Subcommand)]
pub enum AuditCommands {
    /// Verify the HMAC chain, rotated segments included
    Verify,
}

/// The `(account, signer, asset)` triple naming one policy.
#[derive(Debug, Clone, Args)]
pub struct PolicyKeyArgs {
    /// Account whose funds the policy governs
    #[arg(long, value_name = "ADDRESS")]
    pub account: Address,

    /// Session signer the policy delegates to
    #[arg(long, value_name = "ADDRESS")]
    pub signer: Address,

    /// `native` or a token contract address
    #[arg(long, default_value = "native", value_name = "ASSET")]
    pub asset: Asset,
}

impl PolicyKeyArgs {
    /// The policy key these arguments name.
    #[must_use]
    pub const fn key(&self) -> PolicyKey {
        PolicyKey::new(self.account, self.signer, self.asset)
    }
}

/// Arguments for `sessiongate grant`.
#[derive(Debug, Clone, Args)]
pub struct GrantArgs {
    /// Policy to create or replace
    #[command(flatten)]
    pub key: PolicyKeyArgs,

    /// Start of the validity window (Unix seconds, inclusive)
    #[arg(long, value_name = "SECONDS")]
    pub valid_after: Timestamp,

    /// End of the validity window (Unix seconds, exclusive)
    #[arg(long, value_name = "SECONDS")]
    pub valid_until: Timestamp,

    /// Spend ceiling per refresh period, in the asset's smallest unit
    #[arg(long, value_name = "AMOUNT")]
    pub limit: U256,

    /// Seconds after the last transfer at which the ceiling resets (0 = never)
    #[arg(long, default_value_t = 0, value_name = "SECONDS")]
    pub refresh_interval: u64,

    /// Address performing the write; defaults to the account itself
    #[arg(long, value_name = "ADDRESS")]
    pub caller: Option<Address>,
}

/// Arguments for `sessiongate revoke`.
#[derive(Debug, Clone, Args)]
pub struct RevokeArgs {
    /// Policy to revoke
    #[command(flatten)]
    pub key: PolicyKeyArgs,

    /// Address performing the write; defaults to the account itself
    #[arg(long, value_name = "ADDRESS")]
    pub caller: Option<Address>,
}

/// Arguments for `sessiongate query`.
#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    /// Policy to read
    #[command(flatten)]
    pub key: PolicyKeyArgs,

    /// Evaluate status at this Unix time instead of the system clock
    #[arg(long, value_name = "SECONDS")]
    pub now: Option<Timestamp>,

    /// Output format
    #[arg(short, long, default_value = "text", value_name = "FORMAT")]
    pub format: OutputFormat,
}

/// Arguments for `sessiongate authorize`.
///
/// The signer is either given directly with `--signer`, or recovered from
/// `--signature` over the operation `(account, asset, recipient, amount, nonce)`.
#[derive(Debug, Clone, Args)]
pub struct AuthorizeArgs {
    /// Account whose funds would move
    #[arg(long, value_name = "ADDRESS")]
    pub account: Address,

    /// Session signer requesting the transfer
    #[arg(
        long,
        value_name = "ADDRESS",
        required_unless_present = "signature",
        conflicts_with = "signature"
    )]
    pub signer: Option<Address>,

    /// `native` or a token contract address
    #[arg(long, default_value = "native", value_name = "ASSET")]
    pub asset: Asset,

    /// Transfer recipient
    #[arg(long, value_name = "ADDRESS")]
    pub recipient: Address,

    /// Amount in the asset's smallest unit (decimal or 0x-hex)
    #[arg(long, value_name = "AMOUNT")]
    pub amount: U256,

    /// 65-byte signature `r || s || v` over the operation, hex encoded
    #[arg(long, value_name = "HEX", requires = "nonce")]
    pub signature: Option<String>,

    /// Operation nonce covered by `--signature`
    #[arg(long, value_name = "NONCE")]
    pub nonce: Option<u64>,

    /// Authorize at this Unix time instead of the system clock
    #[arg(long, value_name = "SECONDS")]
    pub now: Option<Timestamp>,

    /// Output format
    #[arg(short, long, default_value = "text", value_name = "FORMAT")]
    pub format: OutputFormat,
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,

    /// JSON object
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::indexing_slicing
    )]

    use super::*;
    use clap::CommandFactory;

    const ACCOUNT: &str = "0x1111111111111111111111111111111111111111";
    const SIGNER: &str = "0x2222222222222222222222222222222222222222";
    const RECIPIENT: &str = "0x3333333333333333333333333333333333333333";

    #[test]
    fn test_cli_build() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_init() {
        let cli = Cli::try_parse_from(["sessiongate", "init", "--force"]).unwrap();
        assert!(matches!(cli.command, Commands::Init { force: true }));
    }

    #[test]
    fn test_parse_global_options() {
        let cli =
            Cli::try_parse_from(["sessiongate", "status", "-vv", "--home", "/tmp/sg"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.home, Some(PathBuf::from("/tmp/sg")));
        assert!(matches!(
            cli.command,
            Commands::Status {
                account: None,
                now: None
            }
        ));
    }

    #[test]
    fn test_parse_config_path() {
        let cli = Cli::try_parse_from(["sessiongate", "config", "path"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: Some(ConfigAction::Path)
            }
        ));
    }

    #[test]
    fn test_parse_grant() {
        let cli = Cli::try_parse_from([
            "sessiongate",
            "grant",
            "--account",
            ACCOUNT,
            "--signer",
            SIGNER,
            "--valid-after",
            "0",
            "--valid-until",
            "3600",
            "--limit",
            "1000000000000000000",
            "--refresh-interval",
            "86400",
        ])
        .unwrap();

        let Commands::Grant(args) = cli.command else {
            panic!("expected grant");
        };
        assert_eq!(args.key.asset, Asset::Native);
        assert_eq!(args.limit, U256::from(1_000_000_000_000_000_000u64));
        assert_eq!(args.refresh_interval, 86_400);
        assert!(args.caller.is_none());
    }

    #[test]
    fn test_parse_token_asset() {
        let cli = Cli::try_parse_from([
            "sessiongate",
            "query",
            "--account",
            ACCOUNT,
            "--signer",
            SIGNER,
            "--asset",
            RECIPIENT,
            "--format",
            "json",
        ])
        .unwrap();

        let Commands::Query(args) = cli.command else {
            panic!("expected query");
        };
        assert!(!args.key.asset.is_native());
        assert_eq!(args.format, OutputFormat::Json);
    }

    #[test]
    fn test_parse_authorize_with_signer() {
        let cli = Cli::try_parse_from([
            "sessiongate",
            "authorize",
            "--account",
            ACCOUNT,
            "--signer",
            SIGNER,
            "--recipient",
            RECIPIENT,
            "--amount",
            "0x10",
            "--now",
            "42",
        ])
        .unwrap();

        let Commands::Authorize(args) = cli.command else {
            panic!("expected authorize");
        };
        assert_eq!(args.amount, U256::from(16u64));
        assert_eq!(args.now, Some(42));
    }

    #[test]
    fn test_authorize_requires_signer_or_signature() {
        let result = Cli::try_parse_from([
            "sessiongate",
            "authorize",
            "--account",
            ACCOUNT,
            "--recipient",
            RECIPIENT,
            "--amount",
            "1",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_signature_requires_nonce() {
        let result = Cli::try_parse_from([
            "sessiongate",
            "authorize",
            "--account",
            ACCOUNT,
            "--recipient",
            RECIPIENT,
            "--amount",
            "1",
            "--signature",
            "0x00",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_derive_key_and_audit() {
        let cli = Cli::try_parse_from(["sessiongate", "derive-key", "my seed", "--reveal"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::DeriveKey { reveal: true, .. }
        ));

        let cli = Cli::try_parse_from(["sessiongate", "audit", "verify"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Audit {
                command: AuditCommands::Verify
            }
        ));
    }

    #[test]
    fn test_invalid_address_rejected() {
        let result = Cli::try_parse_from([
            "sessiongate",
            "revoke",
            "--account",
            "0xnothex",
            "--signer",
            SIGNER,
        ]);
        assert!(result.is_err());
    }
}
