//! # Test Utilities for `SessionGate`
//!
//! Shared helpers for the integration tests.
//!
//! ## Functions
//!
//! - [`temp_data_dir`] - Create an isolated temporary directory for test data
//! - [`initialized_home`] - Run `init` in a fresh directory and load its context
//! - [`grant`] - Build a native-currency grant
//! - [`request`] - Build a native-currency transfer request
//! - [`ether`] - Amounts in 18-decimal units
//!
//! ## Proptest Strategies
//!
//! - [`address`] - Arbitrary non-zero addresses
//! - [`amount`] - Transfer amounts up to 10^21

#![allow(dead_code)]
// Allow expect() in test utilities since panicking on setup failures is acceptable in tests
#![allow(clippy::expect_used)]

use alloy_primitives::{Address, U256};
use proptest::prelude::*;
use sessiongate::cli::commands::InitCommand;
use sessiongate::cli::CommandContext;
use sessiongate_core::types::{Asset, PolicyGrant, Timestamp, TransferRequest};
use tempfile::TempDir;

/// The smart-contract account in most tests.
pub const ACCOUNT: Address = Address::repeat_byte(0x11);

/// The session signer in most tests.
pub const SIGNER: Address = Address::repeat_byte(0x22);

/// The transfer destination in most tests.
pub const RECIPIENT: Address = Address::repeat_byte(0x33);

/// One unit of an 18-decimal asset.
pub const ONE_ETH: u64 = 1_000_000_000_000_000_000;

/// Create a temporary directory for test data.
///
/// # Panics
///
/// Panics if the temporary directory cannot be created.
#[must_use]
pub fn temp_data_dir() -> TempDir {
    tempfile::Builder::new()
        .prefix("sessiongate-test-")
        .tempdir()
        .expect("Failed to create temporary directory for test")
}

/// Initialize a fresh base directory and load its context.
///
/// The `TempDir` must outlive the context.
///
/// # Panics
///
/// Panics if initialization fails.
#[must_use]
pub fn initialized_home() -> (TempDir, CommandContext) {
    let temp_dir = temp_data_dir();
    InitCommand::new(false)
        .execute(temp_dir.path())
        .expect("init should succeed");
    let ctx = CommandContext::load(Some(temp_dir.path().to_path_buf()))
        .expect("context should load after init");
    (temp_dir, ctx)
}

/// `n` tenths of a unit.
#[must_use]
pub fn tenths(n: u64) -> U256 {
    U256::from(n) * U256::from(ONE_ETH / 10)
}

/// `n` whole units.
#[must_use]
pub fn ether(n: u64) -> U256 {
    U256::from(n) * U256::from(ONE_ETH)
}

/// A native-currency grant from [`ACCOUNT`] to `signer`.
#[must_use]
pub fn grant(
    signer: Address,
    window: (Timestamp, Timestamp),
    limit: U256,
    refresh_interval: u64,
) -> PolicyGrant {
    PolicyGrant::new(ACCOUNT, signer, Asset::Native)
        .with_window(window.0, window.1)
        .with_limit(limit)
        .with_refresh_interval(refresh_interval)
}

/// A native-currency transfer from [`ACCOUNT`] to [`RECIPIENT`].
#[must_use]
pub fn request(signer: Address, amount: U256) -> TransferRequest {
    TransferRequest {
        account: ACCOUNT,
        signer,
        asset: Asset::Native,
        recipient: RECIPIENT,
        amount,
    }
}

// =============================================================================
// Proptest Strategies
// =============================================================================

/// Generate a non-zero address.
pub fn address() -> impl Strategy<Value = Address> {
    prop::array::uniform20(prop::num::u8::ANY)
        .prop_filter("zero address is reserved", |bytes| bytes != &[0u8; 20])
        .prop_map(Address::from)
}

/// Generate an amount from 0 to 10^21.
pub fn amount() -> impl Strategy<Value = U256> {
    (0u128..=1_000_000_000_000_000_000_000u128).prop_map(U256::from)
}

/// Generate a grantable ceiling from 1 to 10^21.
pub fn ceiling() -> impl Strategy<Value = U256> {
    (1u128..=1_000_000_000_000_000_000_000u128).prop_map(U256::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_data_dir_isolation() {
        let dir1 = temp_data_dir();
        let dir2 = temp_data_dir();

        assert_ne!(dir1.path(), dir2.path(), "Each temp dir should be unique");
    }

    #[test]
    fn test_units() {
        assert_eq!(tenths(10), ether(1));
        assert_eq!(ether(1), U256::from(ONE_ETH));
    }

    proptest! {
        #[test]
        fn test_address_is_never_zero(addr in address()) {
            prop_assert_ne!(addr, Address::ZERO);
        }

        #[test]
        fn test_amount_range(value in amount()) {
            prop_assert!(value <= U256::from(1_000_000_000_000_000_000_000u128));
        }
    }
}
