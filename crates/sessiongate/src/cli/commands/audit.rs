//! # Audit Commands
//!
//! `sessiongate audit verify` walks the HMAC chain across the live log and
//! every rotated archive, and reports the first entry that fails.

use crate::audit::{AuditError, AuditLogger, VerifyResult};
use crate::cli::context::CommandContext;

/// Errors from the audit commands.
#[derive(Debug, thiserror::Error)]
pub enum AuditCommandError {
    /// Auditing is disabled in the configuration.
    #[error("The audit log is disabled in the configuration")]
    Disabled,

    /// The chain does not verify.
    #[error("Audit chain broken at entry {seq}: {message}")]
    ChainBroken {
        /// First entry that failed.
        seq: u64,
        /// What failed.
        message: String,
    },

    /// The log or key could not be read.
    #[error("Audit error: {0}")]
    Audit(#[from] AuditError),
}

/// The `sessiongate audit verify` command handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerifyCommand;

impl VerifyCommand {
    /// Create a new `VerifyCommand`.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Verify the chain.
    ///
    /// # Errors
    ///
    /// Returns [`AuditCommandError::ChainBroken`] if any entry fails,
    /// [`AuditCommandError::Disabled`] if auditing is off, and
    /// [`AuditCommandError::Audit`] if the key or log cannot be read.
    pub fn execute(&self, ctx: &CommandContext) -> Result<VerifyResult, AuditCommandError> {
        let dir = ctx.audit_dir().ok_or(AuditCommandError::Disabled)?;

        let result = match AuditLogger::open_existing(&dir) {
            Ok(logger) => logger.verify_chain()?,
            Err(AuditError::ChainBroken { seq, message }) => {
                return Err(AuditCommandError::ChainBroken { seq, message })
            }
            Err(e) => return Err(e.into()),
        };

        match (result.first_invalid_seq, &result.error_message) {
            (Some(seq), message) => Err(AuditCommandError::ChainBroken {
                seq,
                message: message.clone().unwrap_or_default(),
            }),
            (None, _) => Ok(result),
        }
    }

    /// Verify the chain and print the entry count.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub fn run(&self, ctx: &CommandContext) -> Result<(), AuditCommandError> {
        let result = self.execute(ctx)?;
        println!(
            "Audit chain intact: {} entries verified",
            result.entries_checked
        );
        Ok(())
    }
}
