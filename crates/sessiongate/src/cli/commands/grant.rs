//! # Grant and Revoke Commands
//!
//! Owner operations on session policies.
//!
//! - `sessiongate grant` adds a policy, or replaces the one under the same
//!   `(account, signer, asset)` key with fresh counters.
//! - `sessiongate revoke` zeroes the ceiling and usage of an existing policy.
//!   The record stays so its history can be queried.
//!
//! The caller defaults to the account itself. Passing a different
//! `--caller` is rejected by the engine's ownership check.

use alloy_primitives::Address;
use sessiongate_core::error::SessionGateError;
use sessiongate_core::types::{PolicyGrant, PolicyKey, SessionPolicy};

use crate::cli::args::{GrantArgs, RevokeArgs};
use crate::cli::context::{CommandContext, ContextError};
use crate::logging::log_security_event;

/// Errors from the owner commands.
#[derive(Debug, thiserror::Error)]
pub enum OwnerCommandError {
    /// Setup failed.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// The engine rejected the operation or the registry failed.
    #[error("{0}")]
    Engine(#[from] SessionGateError),
}

// ============================================================================
// GrantCommand
// ============================================================================

/// The `sessiongate grant` command handler.
#[derive(Debug, Clone)]
pub struct GrantCommand {
    /// Who is asking.
    pub caller: Address,
    /// The policy to install.
    pub grant: PolicyGrant,
}

impl GrantCommand {
    /// Builds the command from parsed arguments.
    #[must_use]
    pub fn from_args(args: &GrantArgs) -> Self {
        let key = args.key.key();
        Self {
            caller: args.caller.unwrap_or(key.account),
            grant: PolicyGrant::new(key.account, key.signer, key.asset)
                .with_window(args.valid_after, args.valid_until)
                .with_limit(args.limit)
                .with_refresh_interval(args.refresh_interval),
        }
    }

    /// Install the policy.
    ///
    /// # Errors
    ///
    /// Returns [`OwnerCommandError::Engine`] for a non-owner caller, an empty
    /// window, a zero-address token, or a registry failure.
    pub fn execute(&self, ctx: &CommandContext) -> Result<SessionPolicy, OwnerCommandError> {
        let engine = ctx.open_engine()?;
        let policy = engine.add_or_replace_policy(self.caller, self.grant.clone())?;
        log_security_event("policy_granted", &policy.key().to_string());
        Ok(policy)
    }

    /// Install the policy and print it.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub fn run(&self, ctx: &CommandContext) -> Result<(), OwnerCommandError> {
        let policy = self.execute(ctx)?;
        println!("Granted policy {}", policy.key());
        println!(
            "  Window: {} .. {}  Limit: {}  Refresh: {}s",
            policy.valid_after, policy.valid_until, policy.limit_amount, policy.refresh_interval
        );
        Ok(())
    }
}

// ============================================================================
// RevokeCommand
// ============================================================================

/// The `sessiongate revoke` command handler.
#[derive(Debug, Clone, Copy)]
pub struct RevokeCommand {
    /// Who is asking.
    pub caller: Address,
    /// The policy to revoke.
    pub key: PolicyKey,
}

impl RevokeCommand {
    /// Builds the command from parsed arguments.
    #[must_use]
    pub fn from_args(args: &RevokeArgs) -> Self {
        let key = args.key.key();
        Self {
            caller: args.caller.unwrap_or(key.account),
            key,
        }
    }

    /// Revoke the policy.
    ///
    /// # Errors
    ///
    /// Returns [`OwnerCommandError::Engine`] for a non-owner caller, a missing
    /// policy, or a registry failure.
    pub fn execute(&self, ctx: &CommandContext) -> Result<SessionPolicy, OwnerCommandError> {
        let engine = ctx.open_engine()?;
        let policy = engine.revoke_policy(self.caller, &self.key)?;
        log_security_event("policy_revoked", &self.key.to_string());
        Ok(policy)
    }

    /// Revoke the policy and confirm.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub fn run(&self, ctx: &CommandContext) -> Result<(), OwnerCommandError> {
        self.execute(ctx)?;
        println!("Revoked policy {}", self.key);
        Ok(())
    }
}
