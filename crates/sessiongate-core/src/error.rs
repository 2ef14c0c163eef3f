//! Error types for the `SessionGate` policy engine.
//!
//! This module provides error types for every failure mode of the engine,
//! organized by domain:
//!
//! - [`PolicyError`] - Invalid grants and registry invariant violations
//! - [`StoreError`] - Registry storage failures
//! - [`SignError`] - Signature recovery and key failures
//! - [`ConfigError`] - Configuration failures
//! - [`SessionGateError`] - Top-level error that wraps all error types
//!
//! Note that a denied authorization is *not* an error: denials are returned
//! as [`DenialReason`](crate::types::DenialReason) values inside an
//! [`AuthorizationResult`](crate::types::AuthorizationResult). Errors are
//! reserved for invalid requests and infrastructure failures.
//!
//! # Example
//!
//! ```rust
//! use sessiongate_core::error::{PolicyError, SessionGateError};
//!
//! fn grant(valid_after: u64, valid_until: u64) -> Result<(), SessionGateError> {
//!     if valid_after >= valid_until {
//!         return Err(PolicyError::invalid_window(valid_after, valid_until).into());
//!     }
//!     Ok(())
//! }
//!
//! assert!(grant(10, 5).is_err());
//! ```

use crate::types::{PolicyKey, Timestamp};
use alloy_primitives::{Address, U256};

/// Convenience result alias using [`SessionGateError`].
pub type Result<T, E = SessionGateError> = std::result::Result<T, E>;

/// Top-level error type for the `SessionGate` engine.
///
/// This enum wraps all domain-specific error types and provides
/// automatic conversion via the `#[from]` attribute.
#[derive(Debug, thiserror::Error)]
pub enum SessionGateError {
    /// Policy denied the transfer.
    #[error("Policy denied: {rule} - {reason}")]
    Denied {
        /// The rule that denied the request.
        rule: String,
        /// Human-readable reason for denial.
        reason: String,
    },

    /// The grant or counter update violates a policy invariant.
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    /// Registry storage failed.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Signature recovery or key handling failed.
    #[error("Signing error: {0}")]
    Sign(#[from] SignError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SessionGateError {
    /// Create a denied error.
    #[must_use]
    pub fn denied(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Denied {
            rule: rule.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error is a policy denial.
    #[must_use]
    pub const fn is_denied(&self) -> bool {
        matches!(self, Self::Denied { .. })
    }

    /// Returns `true` if this error reports a missing policy record.
    #[must_use]
    pub const fn is_policy_not_found(&self) -> bool {
        matches!(self, Self::Policy(PolicyError::PolicyNotFound { .. }))
    }

    /// Returns `true` if a counter write lost a race with another writer.
    #[must_use]
    pub const fn is_concurrent_update(&self) -> bool {
        matches!(self, Self::Policy(PolicyError::ConcurrentUpdate { .. }))
    }
}

// ============================================================================
// PolicyError
// ============================================================================

/// Errors raised by registry writes and owner operations.
///
/// These are request or invariant failures, not denials. A registry
/// rejects the write before anything is stored.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// The validity window is empty (`valid_after >= valid_until`).
    #[error("invalid window: valid_after={valid_after} must be before valid_until={valid_until}")]
    InvalidWindow {
        /// Start of the rejected window.
        valid_after: Timestamp,
        /// End of the rejected window.
        valid_until: Timestamp,
    },

    /// A token asset was given with the zero address, which is reserved
    /// for native currency.
    #[error("invalid asset: the zero address is reserved for native currency")]
    InvalidAsset,

    /// A grant was given a zero ceiling. Zero is the revoked state.
    #[error("invalid limit: a grant must allow a non-zero amount")]
    ZeroLimit,

    /// No policy exists at the key.
    #[error("policy not found: {key}")]
    PolicyNotFound {
        /// The key that was looked up.
        key: PolicyKey,
    },

    /// The caller is not the owner of the account the policy governs.
    #[error("caller {caller} is not the owner of account {account}")]
    NotAccountOwner {
        /// The address that attempted the write.
        caller: Address,
        /// The account the policy belongs to.
        account: Address,
    },

    /// A counter update would push `limit_used` above `limit_amount`.
    #[error("ceiling violation: limit_used={limit_used} exceeds limit_amount={limit_amount}")]
    CeilingViolation {
        /// The rejected `limit_used` value.
        limit_used: U256,
        /// The policy ceiling.
        limit_amount: U256,
    },

    /// A counter update would move `last_used` backwards.
    #[error("timestamp regression: last_used={last_used}, attempted={attempted}")]
    TimestampRegression {
        /// The stored `last_used`.
        last_used: Timestamp,
        /// The rejected new value.
        attempted: Timestamp,
    },

    /// The stored record changed between the read and the counter write.
    #[error("policy {key} changed concurrently")]
    ConcurrentUpdate {
        /// The key whose record moved.
        key: PolicyKey,
    },
}

impl PolicyError {
    /// Create an `InvalidWindow` error.
    #[must_use]
    pub const fn invalid_window(valid_after: Timestamp, valid_until: Timestamp) -> Self {
        Self::InvalidWindow {
            valid_after,
            valid_until,
        }
    }

    /// Create a `PolicyNotFound` error.
    #[must_use]
    pub const fn policy_not_found(key: PolicyKey) -> Self {
        Self::PolicyNotFound { key }
    }

    /// Create a `NotAccountOwner` error.
    #[must_use]
    pub const fn not_account_owner(caller: Address, account: Address) -> Self {
        Self::NotAccountOwner { caller, account }
    }

    /// Create a `ConcurrentUpdate` error.
    #[must_use]
    pub const fn concurrent_update(key: PolicyKey) -> Self {
        Self::ConcurrentUpdate { key }
    }

    /// Get the rule name associated with this error.
    #[must_use]
    pub const fn rule_name(&self) -> &'static str {
        match self {
            Self::InvalidWindow { .. } => "window",
            Self::InvalidAsset => "asset",
            Self::ZeroLimit => "limit",
            Self::PolicyNotFound { .. } => "policy_not_found",
            Self::NotAccountOwner { .. } => "owner",
            Self::CeilingViolation { .. } => "ceiling",
            Self::TimestampRegression { .. } => "last_used",
            Self::ConcurrentUpdate { .. } => "concurrent_update",
        }
    }
}

// ============================================================================
// StoreError
// ============================================================================

/// Errors that can occur in registry storage.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// File system I/O error.
    #[error("I/O error: {0}")]
    IoError(#[source] std::io::Error),

    /// The database rejected an operation.
    #[error("database error: {context}")]
    Database {
        /// Context about the failing operation.
        context: String,
    },

    /// A stored record could not be decoded.
    #[error("corrupted record: {context}")]
    Corrupted {
        /// Context about the corrupted field.
        context: String,
    },
}

impl StoreError {
    /// Create a `Database` error.
    #[must_use]
    pub fn database(context: impl Into<String>) -> Self {
        Self::Database {
            context: context.into(),
        }
    }

    /// Create a `Corrupted` error.
    #[must_use]
    pub fn corrupted(context: impl Into<String>) -> Self {
        Self::Corrupted {
            context: context.into(),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(error: std::io::Error) -> Self {
        Self::IoError(error)
    }
}

// ============================================================================
// SignError
// ============================================================================

/// Errors that can occur while recovering signers or handling keys.
#[derive(Debug, thiserror::Error)]
pub enum SignError {
    /// The signature bytes are malformed (wrong length, bad `v`, invalid scalar).
    #[error("invalid signature: {context}")]
    InvalidSignature {
        /// Context about what is malformed.
        context: String,
    },

    /// Public key recovery failed for a well-formed signature.
    #[error("signer recovery failed")]
    RecoveryFailed,

    /// The key material is invalid.
    #[error("invalid key material")]
    InvalidKey,

    /// Producing a signature failed.
    #[error("signature failed: {context}")]
    SignatureFailed {
        /// Context about why signing failed.
        context: String,
    },
}

impl SignError {
    /// Create an `InvalidSignature` error.
    #[must_use]
    pub fn invalid_signature(context: impl Into<String>) -> Self {
        Self::InvalidSignature {
            context: context.into(),
        }
    }

    /// Create a `SignatureFailed` error.
    #[must_use]
    pub fn signature_failed(context: impl Into<String>) -> Self {
        Self::SignatureFailed {
            context: context.into(),
        }
    }
}

// ============================================================================
// ConfigError
// ============================================================================

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Failed to parse the configuration file.
    #[error("failed to parse configuration: {context}")]
    ParseFailed {
        /// Context about the parsing failure.
        context: String,
    },

    /// A configuration value is invalid.
    #[error("invalid value for {field}: {value}")]
    InvalidValue {
        /// The field name with the invalid value.
        field: String,
        /// The invalid value.
        value: String,
    },

    /// A required configuration field is missing.
    #[error("missing required field: {field}")]
    MissingField {
        /// The name of the missing field.
        field: String,
    },

    /// I/O error while reading or writing configuration.
    #[error("{context}: {source}")]
    Io {
        /// What was being attempted.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The home directory could not be determined.
    #[error("could not determine home directory")]
    NoHomeDirectory,
}

impl ConfigError {
    /// Create a `FileNotFound` error.
    #[must_use]
    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create a `ParseFailed` error.
    #[must_use]
    pub fn parse_failed(context: impl Into<String>) -> Self {
        Self::ParseFailed {
            context: context.into(),
        }
    }

    /// Create an `InvalidValue` error.
    #[must_use]
    pub fn invalid_value(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a `MissingField` error.
    #[must_use]
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Create an `Io` error with context.
    #[must_use]
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a `NoHomeDirectory` error.
    #[must_use]
    pub const fn no_home_directory() -> Self {
        Self::NoHomeDirectory
    }
}
