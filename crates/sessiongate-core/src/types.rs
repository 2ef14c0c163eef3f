//! Core types for the `SessionGate` policy engine.
//!
//! This module provides the data model shared by every `SessionGate` crate:
//!
//! - [`Asset`] - Native currency or a specific fungible token
//! - [`PolicyKey`] - The `(account, signer, asset)` triple policies are stored under
//! - [`SessionPolicy`] - The persistent session-key policy record
//! - [`PolicyGrant`] - Owner input for creating or replacing a policy
//! - [`TransferRequest`] - A transfer a session key asks to perform
//! - [`AuthorizationResult`] - The verdict for a transfer request
//! - [`PolicyStatus`] - The computed lifecycle state of a policy
//!
//! # Examples
//!
//! ```
//! use sessiongate_core::types::{Asset, PolicyGrant, SessionPolicy};
//! use alloy_primitives::{Address, U256};
//!
//! let grant = PolicyGrant::new(Address::repeat_byte(0x01), Address::repeat_byte(0x02), Asset::Native)
//!     .with_window(1_000, 2_000)
//!     .with_limit(U256::from(500u64))
//!     .with_refresh_interval(60);
//!
//! assert!(grant.validate().is_ok());
//!
//! let policy = SessionPolicy::from_grant(&grant);
//! assert_eq!(policy.limit_used, U256::ZERO);
//! assert_eq!(policy.last_used, 0);
//! ```

use crate::error::{PolicyError, SessionGateError};
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Seconds since the Unix epoch, as supplied by the host's time source.
pub type Timestamp = u64;

// ============================================================================
// Asset
// ============================================================================

/// The asset a session policy governs.
///
/// The zero address is the reserved wire sentinel for native currency, so
/// `Token(Address::ZERO)` is never a valid token. Use [`Asset::token`] to
/// build a token asset with that check applied.
///
/// # Examples
///
/// ```
/// use sessiongate_core::types::Asset;
/// use alloy_primitives::Address;
///
/// assert_eq!("native".parse::<Asset>().unwrap(), Asset::Native);
/// assert_eq!(
///     "0x0000000000000000000000000000000000000000".parse::<Asset>().unwrap(),
///     Asset::Native
/// );
/// assert!(Asset::token(Address::ZERO).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Asset {
    /// The chain's native currency.
    Native,
    /// A fungible token identified by its contract address.
    Token(Address),
}

impl Asset {
    /// Creates a token asset, rejecting the native sentinel address.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidAsset`] if `address` is the zero address.
    pub fn token(address: Address) -> Result<Self, PolicyError> {
        if address == Address::ZERO {
            return Err(PolicyError::InvalidAsset);
        }
        Ok(Self::Token(address))
    }

    /// Returns the wire address of this asset (zero for native currency).
    #[must_use]
    pub const fn sentinel_address(&self) -> Address {
        match self {
            Self::Native => Address::ZERO,
            Self::Token(address) => *address,
        }
    }

    /// Returns `true` for native currency.
    #[must_use]
    pub const fn is_native(&self) -> bool {
        matches!(self, Self::Native)
    }

    /// Returns `false` for a token asset carrying the native sentinel.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Native => true,
            Self::Token(address) => *address != Address::ZERO,
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Token(address) => write!(f, "{address}"),
        }
    }
}

/// Error returned when an asset string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid asset '{input}': expected \"native\" or a 20-byte hex address")]
pub struct AssetParseError {
    /// The rejected input.
    pub input: String,
}

impl FromStr for Asset {
    type Err = AssetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("native") || trimmed.eq_ignore_ascii_case("eth") {
            return Ok(Self::Native);
        }

        let address = Address::from_str(trimmed).map_err(|_| AssetParseError {
            input: s.to_string(),
        })?;

        // The zero address on the wire means native currency.
        if address == Address::ZERO {
            Ok(Self::Native)
        } else {
            Ok(Self::Token(address))
        }
    }
}

impl From<Asset> for String {
    fn from(asset: Asset) -> Self {
        asset.to_string()
    }
}

impl TryFrom<String> for Asset {
    type Error = AssetParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ============================================================================
// PolicyKey
// ============================================================================

/// The key a [`SessionPolicy`] is stored under.
///
/// At most one policy exists per `(account, signer, asset)` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyKey {
    /// The account whose funds the policy governs.
    pub account: Address,
    /// The delegated session key.
    pub signer: Address,
    /// The governed asset.
    pub asset: Asset,
}

impl PolicyKey {
    /// Creates a new policy key.
    #[must_use]
    pub const fn new(account: Address, signer: Address, asset: Asset) -> Self {
        Self {
            account,
            signer,
            asset,
        }
    }
}

impl fmt::Display for PolicyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "account={} signer={} asset={}",
            self.account, self.signer, self.asset
        )
    }
}

// ============================================================================
// SessionPolicy
// ============================================================================

/// A session-key spend policy.
///
/// This is the only persistent entity of the engine. The window and ceiling
/// fields are written by the account owner; `limit_used` and `last_used` are
/// written only by the validator on an admitted transfer.
///
/// # Invariants
///
/// - `limit_used <= limit_amount` after every committed update
/// - `valid_after < valid_until` at creation
/// - `last_used` never decreases across commits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPolicy {
    /// The account whose funds this policy authorizes spending from.
    pub account: Address,

    /// The delegated session key permitted to request transfers.
    pub signer: Address,

    /// The asset this policy governs.
    pub asset: Asset,

    /// The policy is inactive before this instant.
    pub valid_after: Timestamp,

    /// The policy is inactive at and after this instant.
    pub valid_until: Timestamp,

    /// Ceiling per refresh period, in the asset's smallest unit.
    pub limit_amount: U256,

    /// Amount consumed in the current period.
    pub limit_used: U256,

    /// Instant of the most recent admitted transfer (0 if never used).
    pub last_used: Timestamp,

    /// Seconds after which `limit_used` resets; 0 means a lifetime cap.
    pub refresh_interval: u64,
}

impl SessionPolicy {
    /// Builds a fresh policy from an owner grant with zeroed counters.
    #[must_use]
    pub const fn from_grant(grant: &PolicyGrant) -> Self {
        Self {
            account: grant.account,
            signer: grant.signer,
            asset: grant.asset,
            valid_after: grant.valid_after,
            valid_until: grant.valid_until,
            limit_amount: grant.limit_amount,
            limit_used: U256::ZERO,
            last_used: 0,
            refresh_interval: grant.refresh_interval,
        }
    }

    /// Returns the key this policy is stored under.
    #[must_use]
    pub const fn key(&self) -> PolicyKey {
        PolicyKey::new(self.account, self.signer, self.asset)
    }

    /// Returns `true` if the owner revoked this policy.
    ///
    /// Grants reject a zero ceiling, so only revocation stores one.
    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.limit_amount == U256::ZERO
    }

    /// Returns `true` if the policy has never admitted a transfer.
    #[must_use]
    pub const fn is_unused(&self) -> bool {
        self.last_used == 0
    }
}

// ============================================================================
// PolicyGrant
// ============================================================================

/// Owner input for creating or replacing a session policy.
///
/// # Examples
///
/// ```
/// use sessiongate_core::types::{Asset, PolicyGrant};
/// use alloy_primitives::{Address, U256};
///
/// let grant = PolicyGrant::new(Address::repeat_byte(1), Address::repeat_byte(2), Asset::Native)
///     .with_window(100, 100);
///
/// // An empty window is rejected before anything is stored.
/// assert!(grant.validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyGrant {
    /// The account granting the session key.
    pub account: Address,
    /// The session key being granted.
    pub signer: Address,
    /// The asset the grant covers.
    pub asset: Asset,
    /// Start of the validity window (inclusive).
    pub valid_after: Timestamp,
    /// End of the validity window (exclusive).
    pub valid_until: Timestamp,
    /// Spend ceiling per period.
    pub limit_amount: U256,
    /// Refresh period in seconds, 0 for a lifetime cap.
    #[serde(default)]
    pub refresh_interval: u64,
}

impl PolicyGrant {
    /// Creates a grant with an empty window and a zero ceiling.
    ///
    /// Use the `with_*` builders to fill in the window and ceiling.
    #[must_use]
    pub const fn new(account: Address, signer: Address, asset: Asset) -> Self {
        Self {
            account,
            signer,
            asset,
            valid_after: 0,
            valid_until: 0,
            limit_amount: U256::ZERO,
            refresh_interval: 0,
        }
    }

    /// Builder method to set the validity window.
    #[must_use]
    pub const fn with_window(mut self, valid_after: Timestamp, valid_until: Timestamp) -> Self {
        self.valid_after = valid_after;
        self.valid_until = valid_until;
        self
    }

    /// Builder method to set the spend ceiling.
    #[must_use]
    pub const fn with_limit(mut self, limit_amount: U256) -> Self {
        self.limit_amount = limit_amount;
        self
    }

    /// Builder method to set the refresh interval.
    #[must_use]
    pub const fn with_refresh_interval(mut self, refresh_interval: u64) -> Self {
        self.refresh_interval = refresh_interval;
        self
    }

    /// Returns the key the grant will be stored under.
    #[must_use]
    pub const fn key(&self) -> PolicyKey {
        PolicyKey::new(self.account, self.signer, self.asset)
    }

    /// Validates the grant.
    ///
    /// # Errors
    ///
    /// - [`PolicyError::InvalidWindow`] if `valid_after >= valid_until`
    /// - [`PolicyError::InvalidAsset`] if the asset is a zero-address token
    /// - [`PolicyError::ZeroLimit`] if `limit_amount` is zero
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.valid_after >= self.valid_until {
            return Err(PolicyError::invalid_window(
                self.valid_after,
                self.valid_until,
            ));
        }
        if !self.asset.is_valid() {
            return Err(PolicyError::InvalidAsset);
        }
        if self.limit_amount.is_zero() {
            return Err(PolicyError::ZeroLimit);
        }
        Ok(())
    }
}

// ============================================================================
// TransferRequest / Authorization
// ============================================================================

/// A transfer a session key asks the account to perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// The account the funds leave from.
    pub account: Address,
    /// The recovered session signer.
    pub signer: Address,
    /// The asset to move.
    pub asset: Asset,
    /// The destination of the transfer.
    pub recipient: Address,
    /// Amount in the asset's smallest unit.
    pub amount: U256,
}

impl TransferRequest {
    /// Returns the policy key this request is evaluated against.
    #[must_use]
    pub const fn key(&self) -> PolicyKey {
        PolicyKey::new(self.account, self.signer, self.asset)
    }
}

/// The call contract handed to the transfer executor after an admit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    /// The account the funds leave from.
    pub account: Address,
    /// The session signer that requested the transfer.
    pub signer: Address,
    /// The asset to move.
    pub asset: Asset,
    /// The destination of the transfer.
    pub recipient: Address,
    /// The authorized amount.
    pub amount: U256,
}

impl From<&TransferRequest> for Authorization {
    fn from(request: &TransferRequest) -> Self {
        Self {
            account: request.account,
            signer: request.signer,
            asset: request.asset,
            recipient: request.recipient,
            amount: request.amount,
        }
    }
}

// ============================================================================
// DenialReason
// ============================================================================

/// Why a transfer request was denied.
///
/// A denial is a final, deterministic verdict for the given `now`. The caller
/// may retry later once the window opens or the period refreshes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DenialReason {
    /// No policy exists for the `(account, signer, asset)` key.
    PolicyNotFound,

    /// The policy window has not opened yet.
    NotYetValid {
        /// Start of the window.
        valid_after: Timestamp,
        /// The evaluation time.
        now: Timestamp,
    },

    /// The policy window has closed.
    Expired {
        /// End of the window.
        valid_until: Timestamp,
        /// The evaluation time.
        now: Timestamp,
    },

    /// The requested amount exceeds the headroom.
    LimitExceeded {
        /// The requested amount.
        requested: U256,
        /// The headroom at evaluation time.
        available: U256,
    },

    /// The requested asset does not match what the policy governs.
    AssetMismatch {
        /// The asset the policy governs (native if there is none to compare).
        expected: Asset,
        /// The asset the request claimed.
        actual: Asset,
    },
}

impl DenialReason {
    /// Returns the rule name used in logs and audit entries.
    #[must_use]
    pub const fn rule_name(&self) -> &'static str {
        match self {
            Self::PolicyNotFound => "policy_not_found",
            Self::NotYetValid { .. } => "not_yet_valid",
            Self::Expired { .. } => "expired",
            Self::LimitExceeded { .. } => "limit_exceeded",
            Self::AssetMismatch { .. } => "asset_mismatch",
        }
    }

    /// Returns a human-readable explanation.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::PolicyNotFound => "no session policy exists for this signer and asset".to_string(),
            Self::NotYetValid { valid_after, now } => {
                format!("policy becomes valid at {valid_after}, now is {now}")
            }
            Self::Expired { valid_until, now } => {
                format!("policy expired at {valid_until}, now is {now}")
            }
            Self::LimitExceeded {
                requested,
                available,
            } => format!("amount {requested} exceeds available headroom {available}"),
            Self::AssetMismatch { expected, actual } => {
                format!("policy governs {expected}, request is for {actual}")
            }
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.rule_name(), self.reason())
    }
}

// ============================================================================
// AuthorizationResult
// ============================================================================

/// The verdict for a transfer request.
///
/// # Examples
///
/// ```
/// use sessiongate_core::types::{AuthorizationResult, DenialReason};
///
/// let denied = AuthorizationResult::Denied(DenialReason::PolicyNotFound);
/// assert!(denied.is_denied());
/// assert_eq!(denied.denial().map(DenialReason::rule_name), Some("policy_not_found"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum AuthorizationResult {
    /// The transfer may be executed.
    Authorized(Authorization),
    /// The transfer must not be executed.
    Denied(DenialReason),
}

impl AuthorizationResult {
    /// Returns `true` if the transfer was authorized.
    #[must_use]
    pub const fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized(_))
    }

    /// Returns `true` if the transfer was denied.
    #[must_use]
    pub const fn is_denied(&self) -> bool {
        matches!(self, Self::Denied(_))
    }

    /// Returns the denial reason, if denied.
    #[must_use]
    pub const fn denial(&self) -> Option<&DenialReason> {
        match self {
            Self::Authorized(_) => None,
            Self::Denied(reason) => Some(reason),
        }
    }

    /// Returns the authorization, if authorized.
    #[must_use]
    pub const fn authorization(&self) -> Option<&Authorization> {
        match self {
            Self::Authorized(authorization) => Some(authorization),
            Self::Denied(_) => None,
        }
    }

    /// Converts the verdict into a `Result`, mapping a denial to
    /// [`SessionGateError::Denied`].
    ///
    /// # Errors
    ///
    /// Returns [`SessionGateError::Denied`] if the transfer was denied.
    pub fn into_result(self) -> Result<Authorization, SessionGateError> {
        match self {
            Self::Authorized(authorization) => Ok(authorization),
            Self::Denied(reason) => Err(SessionGateError::denied(
                reason.rule_name(),
                reason.reason(),
            )),
        }
    }
}

// ============================================================================
// PolicyStatus
// ============================================================================

/// The computed lifecycle state of a policy at a given instant.
///
/// Status is never stored; it is derived from the policy and `now`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PolicyStatus {
    /// The window has not opened yet.
    Pending,
    /// The window is open and some headroom remains.
    Active {
        /// Spendable amount right now.
        headroom: U256,
    },
    /// The window is open but the ceiling is used up and no refresh is due.
    Exhausted,
    /// The owner revoked the policy.
    Revoked,
    /// The window has closed.
    Expired,
}

impl PolicyStatus {
    /// Returns the string representation of this status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active { .. } => "active",
            Self::Exhausted => "exhausted",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for PolicyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active { headroom } => write!(f, "active (headroom {headroom})"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}
