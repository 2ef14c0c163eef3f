//! # Status Command
//!
//! Implementation of the `sessiongate status` command.
//!
//! Without `--account` it summarizes the installation. With `--account` it
//! lists every policy of that account with its status at `now`.
//!
//! ## Output Format
//!
//! ```text
//! SessionGate Status
//! ==================
//!
//! Installation:
//!   Base directory: ~/.sessiongate
//!   Configuration:  ~/.sessiongate/config.toml
//!
//! Registry:
//!   Database: ~/.sessiongate/sessions.db
//!   Policies: 3
//!
//! Audit Log:
//!   Directory: ~/.sessiongate/audit
//!   Entries:   42 (chain intact)
//! ```

use std::path::{Path, PathBuf};

use alloy_primitives::Address;
use sessiongate_core::clock::{SystemClock, TimeSource};
use sessiongate_core::error::{SessionGateError, StoreError};
use sessiongate_core::types::Timestamp;

use crate::audit::AuditError;
use crate::cli::commands::query::PolicyView;
use crate::cli::context::{CommandContext, ContextError};

// ============================================================================
// StatusError
// ============================================================================

/// Errors that can occur during status display.
#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    /// Setup failed.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// The registry could not be read.
    #[error("Registry error: {0}")]
    Store(#[from] StoreError),

    /// The engine failed.
    #[error("Engine error: {0}")]
    Engine(#[from] SessionGateError),

    /// The audit log could not be read.
    #[error("Audit error: {0}")]
    Audit(#[from] AuditError),
}

// ============================================================================
// StatusReport
// ============================================================================

/// State of the audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditState {
    /// Auditing is turned off in the configuration.
    Disabled,
    /// The chain verifies.
    Intact {
        /// Number of entries.
        entries: u64,
    },
    /// The chain does not verify.
    Broken {
        /// First entry that failed.
        seq: u64,
    },
}

/// Everything `status` displays.
#[derive(Debug, Clone)]
pub struct StatusReport {
    /// Base directory.
    pub base_dir: PathBuf,
    /// Path of `config.toml`.
    pub config_path: PathBuf,
    /// Path of the registry database.
    pub database_path: PathBuf,
    /// Number of stored policies.
    pub policy_count: usize,
    /// Audit directory, when enabled.
    pub audit_dir: Option<PathBuf>,
    /// Audit chain state.
    pub audit: AuditState,
    /// The requested account and its policies.
    pub account: Option<(Address, Vec<PolicyView>)>,
}

// ============================================================================
// StatusCommand
// ============================================================================

/// The `sessiongate status` command handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusCommand {
    /// List this account's policies.
    pub account: Option<Address>,
    /// Evaluation time for policy status; the system clock when `None`.
    pub now: Option<Timestamp>,
}

impl StatusCommand {
    /// Create a new `StatusCommand`.
    #[must_use]
    pub const fn new(account: Option<Address>, now: Option<Timestamp>) -> Self {
        Self { account, now }
    }

    /// Collect the status.
    ///
    /// A broken audit chain is reported, not returned as an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be opened or read, or the
    /// audit log cannot be read for a reason other than a broken chain.
    pub fn execute(&self, ctx: &CommandContext) -> Result<StatusReport, StatusError> {
        let engine = ctx.open_engine()?;
        let policy_count = engine.registry().count()?;

        let audit = match ctx.open_audit() {
            Ok(None) => AuditState::Disabled,
            Ok(Some(logger)) => {
                let result = logger.verify_chain()?;
                match result.first_invalid_seq {
                    Some(seq) => AuditState::Broken { seq },
                    None => AuditState::Intact {
                        entries: result.entries_checked,
                    },
                }
            }
            Err(ContextError::Audit(AuditError::ChainBroken { seq, .. })) => {
                AuditState::Broken { seq }
            }
            Err(e) => return Err(e.into()),
        };

        let account = match self.account {
            Some(account) => {
                let now = self.now.unwrap_or_else(|| SystemClock.now());
                let views = engine
                    .list_policies(account)?
                    .into_iter()
                    .map(|policy| PolicyView::at(policy, now))
                    .collect();
                Some((account, views))
            }
            None => None,
        };

        Ok(StatusReport {
            base_dir: ctx.base_dir().to_path_buf(),
            config_path: ctx.config_path(),
            database_path: ctx.database_path(),
            policy_count,
            audit_dir: ctx.audit_dir(),
            audit,
            account,
        })
    }

    /// Collect and print the status.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub fn run(&self, ctx: &CommandContext) -> Result<(), StatusError> {
        let report = self.execute(ctx)?;
        print_status(&report);
        Ok(())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Format a human-readable display path.
///
/// Replaces home directory with ~ for cleaner display.
fn format_display_path(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(relative) = path.strip_prefix(&home) {
            return format!("~/{}", relative.display());
        }
    }
    path.display().to_string()
}

/// Print the status output.
fn print_status(report: &StatusReport) {
    println!("SessionGate Status");
    println!("==================");
    println!();

    println!("Installation:");
    println!("  Base directory: {}", format_display_path(&report.base_dir));
    println!("  Configuration:  {}", format_display_path(&report.config_path));
    println!();

    println!("Registry:");
    println!("  Database: {}", format_display_path(&report.database_path));
    println!("  Policies: {}", report.policy_count);
    println!();

    println!("Audit Log:");
    if let Some(dir) = &report.audit_dir {
        println!("  Directory: {}", format_display_path(dir));
    }
    match &report.audit {
        AuditState::Disabled => println!("  Disabled"),
        AuditState::Intact { entries } => println!("  Entries:   {entries} (chain intact)"),
        AuditState::Broken { seq } => {
            println!("  Warning: chain broken at entry {seq}. Run 'sessiongate audit verify'.");
        }
    }

    if let Some((account, views)) = &report.account {
        println!();
        println!("Policies of {account}:");
        if views.is_empty() {
            println!("  (none)");
        }
        for view in views {
            println!(
                "  signer={} asset={} status={} used={}/{}",
                view.policy.signer,
                view.policy.asset,
                view.status.as_str(),
                view.policy.limit_used,
                view.policy.limit_amount,
            );
        }
    }
}
