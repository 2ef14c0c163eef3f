//! # sessiongate-core
//!
//! Core types, traits, and error definitions for the `SessionGate` session-key
//! policy engine.
//!
//! ## Internal Crate Warning
//!
//! **This crate is an internal implementation detail of `sessiongate`.** Its
//! API is unstable and may change between any versions.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`types`] - Policy data model ([`SessionPolicy`], [`Asset`], [`AuthorizationResult`])
//! - [`clock`] - Injected time sources
//! - [`signing`] - Signed operations and the recovery/executor seams
//! - [`config`] / [`config_loader`] - TOML configuration
//!
//! ## Example
//!
//! ```rust
//! use sessiongate_core::{Asset, PolicyGrant, SessionPolicy, U256};
//! use alloy_primitives::Address;
//!
//! let grant = PolicyGrant::new(Address::repeat_byte(1), Address::repeat_byte(2), Asset::Native)
//!     .with_window(0, 3_600)
//!     .with_limit(U256::from(10u64));
//!
//! let policy = SessionPolicy::from_grant(&grant);
//! assert!(!policy.is_revoked());
//! ```
//!
//! [`SessionPolicy`]: types::SessionPolicy
//! [`Asset`]: types::Asset
//! [`AuthorizationResult`]: types::AuthorizationResult

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod clock;
pub mod config;
pub mod config_loader;
pub mod error;
pub mod signing;
pub mod types;

pub use error::{
    ConfigError, PolicyError, Result, SessionGateError, SignError, StoreError,
};

pub use config::{AuditConfig, Config, ConfigBuilder, LoggingConfig, RegistryConfig};

pub use config_loader::{expand_path, load_config, ConfigLoader};

pub use clock::{ManualClock, SystemClock, TimeSource};

pub use types::{
    Asset, AssetParseError, Authorization, AuthorizationResult, DenialReason, PolicyGrant,
    PolicyKey, PolicyStatus, SessionPolicy, Timestamp, TransferRequest,
};

pub use signing::{
    Operation, SignatureBytes, SignedOperation, SignerRecovery, TransferExecutor,
};

// Amounts and identities are alloy primitives throughout.
pub use alloy_primitives::{Address, U256};
