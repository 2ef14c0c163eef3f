//! # Authorize Command
//!
//! Implementation of the `sessiongate authorize` command: validate a transfer
//! against the signer's policy and, if admitted, commit the spend.
//!
//! The signer is either given directly with `--signer`, or recovered from a
//! 65-byte `--signature` over the operation `(account, asset, recipient,
//! amount, nonce)`.
//!
//! Every decision is appended to the audit log when auditing is enabled. The
//! spend is already committed when the entry is written, so a failed append
//! is logged and reported in the outcome instead of failing the command.
//!
//! ## Exit Codes
//!
//! - 0: Authorized and committed, even if the audit append failed
//! - 1: Denied by policy
//! - 2: Error (invalid input, bad signature, storage failure)
//!
//! ## Output Format
//!
//! ```text
//! Authorized
//!   Correlation ID: 4f3c…
//!   Signer:         0x2222…2222
//!   Amount:         500
//! ```

use alloy_primitives::Address;
use serde::Serialize;
use sessiongate_core::clock::{SystemClock, TimeSource};
use sessiongate_core::error::{SessionGateError, SignError};
use sessiongate_core::signing::{Operation, SignedOperation};
use sessiongate_core::types::{AuthorizationResult, DenialReason, Timestamp, TransferRequest};
use sessiongate_crypto::Secp256k1Recovery;
use sessiongate_policy::{SessionEngine, SqliteRegistry};

use crate::audit::{AuditLogger, AuthorizationEvent};
use crate::cli::args::{AuthorizeArgs, OutputFormat};
use crate::cli::context::{CommandContext, ContextError};
use crate::logging::new_correlation_id;

// ============================================================================
// AuthorizeError
// ============================================================================

/// Errors that can occur during authorization.
#[derive(Debug, thiserror::Error)]
pub enum AuthorizeError {
    /// The policy denied the transfer.
    #[error("Policy denied: {rule} - {reason}")]
    Denied {
        /// The rule that denied the transfer.
        rule: String,
        /// Human-readable reason.
        reason: String,
    },

    /// Neither `--signer` nor `--signature` with `--nonce` was given.
    #[error("Either --signer or --signature with --nonce is required")]
    MissingSigner,

    /// The signature is not valid hex.
    #[error("Invalid signature hex: {0}")]
    InvalidSignatureHex(String),

    /// The signer could not be recovered.
    #[error("Signature recovery failed: {0}")]
    Recovery(#[from] SignError),

    /// Setup failed.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// The engine failed.
    #[error("Authorization failed: {0}")]
    Engine(#[from] SessionGateError),

    /// JSON output could not be produced.
    #[error("Failed to serialize output: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AuthorizeError {
    /// Returns `true` if this is a policy denial rather than a failure.
    #[must_use]
    pub const fn is_denied(&self) -> bool {
        matches!(self, Self::Denied { .. })
    }
}

// ============================================================================
// AuthorizeOutcome
// ============================================================================

/// The result of one `authorize` invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizeOutcome {
    /// Correlation ID shared by logs and the audit entry.
    pub correlation_id: String,

    /// The evaluated request.
    #[serde(flatten)]
    pub request: TransferRequest,

    /// The `now` the decision was made at.
    pub decision_time: Timestamp,

    /// Whether the transfer was admitted.
    pub authorized: bool,

    /// The denying rule, if denied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,

    /// The denial reason, if denied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Sequence number of the audit entry, if audited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_seq: Option<u64>,

    /// Why the decision is missing from the audit log, if the append failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_error: Option<String>,
}

impl AuthorizeOutcome {
    fn new(
        correlation_id: String,
        request: TransferRequest,
        decision_time: Timestamp,
        result: &AuthorizationResult,
        audit: Result<Option<u64>, String>,
    ) -> Self {
        let (audit_seq, audit_error) = match audit {
            Ok(seq) => (seq, None),
            Err(message) => (None, Some(message)),
        };
        let denial = result.denial();
        Self {
            correlation_id,
            request,
            decision_time,
            authorized: result.is_authorized(),
            rule: denial.map(|d| d.rule_name().to_string()),
            reason: denial.map(DenialReason::reason),
            audit_seq,
            audit_error,
        }
    }

    /// Converts a denial into [`AuthorizeError::Denied`].
    ///
    /// # Errors
    ///
    /// Returns [`AuthorizeError::Denied`] if the transfer was not admitted.
    pub fn into_result(self) -> Result<Self, AuthorizeError> {
        if self.authorized {
            return Ok(self);
        }
        Err(AuthorizeError::Denied {
            rule: self.rule.unwrap_or_default(),
            reason: self.reason.unwrap_or_default(),
        })
    }

    fn to_text(&self) -> String {
        let mut lines = vec![
            if self.authorized {
                "Authorized".to_string()
            } else {
                "Denied".to_string()
            },
            format!("  Correlation ID: {}", self.correlation_id),
            format!("  Account:        {}", self.request.account),
            format!("  Signer:         {}", self.request.signer),
            format!("  Asset:          {}", self.request.asset),
            format!("  Recipient:      {}", self.request.recipient),
            format!("  Amount:         {}", self.request.amount),
        ];
        if let (Some(rule), Some(reason)) = (&self.rule, &self.reason) {
            lines.push(format!("  Rule:           {rule}"));
            lines.push(format!("  Reason:         {reason}"));
        }
        if let Some(seq) = self.audit_seq {
            lines.push(format!("  Audit entry:    {seq}"));
        }
        if let Some(error) = &self.audit_error {
            lines.push(format!("  Audit failed:   {error}"));
        }
        lines.join("\n")
    }
}

// ============================================================================
// AuthorizeCommand
// ============================================================================

/// The `sessiongate authorize` command handler.
#[derive(Debug, Clone)]
pub struct AuthorizeCommand {
    args: AuthorizeArgs,
}

impl AuthorizeCommand {
    /// Create a new `AuthorizeCommand`.
    #[must_use]
    pub const fn new(args: AuthorizeArgs) -> Self {
        Self { args }
    }

    /// Resolve the signer from `--signer` or by recovering `--signature`.
    ///
    /// # Errors
    ///
    /// Returns an error if neither source is given, the hex is malformed, or
    /// recovery fails.
    pub fn resolve_signer(&self) -> Result<Address, AuthorizeError> {
        if let Some(signer) = self.args.signer {
            return Ok(signer);
        }

        let (Some(signature), Some(nonce)) = (&self.args.signature, self.args.nonce) else {
            return Err(AuthorizeError::MissingSigner);
        };

        let bytes = hex::decode(signature.trim_start_matches("0x"))
            .map_err(|e| AuthorizeError::InvalidSignatureHex(e.to_string()))?;
        let operation = Operation {
            account: self.args.account,
            asset: self.args.asset,
            recipient: self.args.recipient,
            amount: self.args.amount,
            nonce,
        };
        let signed = SignedOperation::from_slice(operation, &bytes)?;
        Ok(signed.recover_signer(&Secp256k1Recovery)?)
    }

    /// Evaluate and, if admitted, commit the transfer.
    ///
    /// A denial is returned as an outcome with `authorized == false`, not as
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the signer cannot be resolved, the registry or the
    /// audit log cannot be opened, or the registry fails. A failed audit
    /// append is reported in [`AuthorizeOutcome::audit_error`].
    pub fn execute(&self, ctx: &CommandContext) -> Result<AuthorizeOutcome, AuthorizeError> {
        let correlation_id = new_correlation_id();
        let span = crate::with_correlation_id!(
            correlation_id,
            "authorize",
            account = %self.args.account
        );
        let _entered = span.enter();

        let request = TransferRequest {
            account: self.args.account,
            signer: self.resolve_signer()?,
            asset: self.args.asset,
            recipient: self.args.recipient,
            amount: self.args.amount,
        };
        let now = self.args.now.unwrap_or_else(|| SystemClock.now());

        let engine = ctx.open_engine()?;
        let audit = ctx.open_audit()?;
        decide_and_record(&engine, audit.as_ref(), correlation_id, request, now)
    }

    /// Authorize, print the outcome, and map a denial to an error.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorizeError::Denied`] after printing a denial, plus the
    /// errors of [`execute`](Self::execute).
    pub fn run(&self, ctx: &CommandContext) -> Result<(), AuthorizeError> {
        let outcome = self.execute(ctx)?;
        match self.args.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
            OutputFormat::Text => println!("{}", outcome.to_text()),
        }
        outcome.into_result().map(|_| ())
    }
}

/// Runs the engine, then appends the decision to `audit` if present.
fn decide_and_record(
    engine: &SessionEngine<SqliteRegistry>,
    audit: Option<&AuditLogger>,
    correlation_id: String,
    request: TransferRequest,
    now: Timestamp,
) -> Result<AuthorizeOutcome, AuthorizeError> {
    let result = engine.authorize_transfer(&request, now)?;

    let audited = match audit {
        Some(logger) => logger
            .log_authorization(AuthorizationEvent::new(
                correlation_id.clone(),
                &request,
                now,
                &result,
            ))
            .map(|entry| Some(entry.seq))
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    authorized = result.is_authorized(),
                    "Decision stands but was not audited"
                );
                e.to_string()
            }),
        None => Ok(None),
    };

    Ok(AuthorizeOutcome::new(
        correlation_id,
        request,
        now,
        &result,
        audited,
    ))
}
