//! Spend-limit scenarios against the `SQLite`-backed engine of an initialized
//! base directory.
//!
//! These tests verify:
//! - Cumulative spending up to the ceiling
//! - Refresh-interval resets
//! - Missing policies versus expired ones
//! - Window and ceiling boundaries
//! - Per-asset isolation and revocation
//! - Admitted totals never exceed the ceiling

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::indexing_slicing
)]

use alloy_primitives::{Address, U256};
use proptest::prelude::*;
use sessiongate_core::types::{Asset, DenialReason, PolicyKey, PolicyStatus};

use crate::common::{amount, ceiling, grant, initialized_home, request, tenths, ACCOUNT, SIGNER};

// ============================================================================
// Reference Scenarios
// ============================================================================

#[test]
fn test_two_halves_then_any_amount_is_denied() {
    let (_home, ctx) = initialized_home();
    let engine = ctx.open_engine().unwrap();
    engine
        .add_or_replace_policy(ACCOUNT, grant(SIGNER, (0, 1_000), tenths(10), 0))
        .unwrap();

    let half = tenths(5);
    assert!(engine
        .authorize_transfer(&request(SIGNER, half), 10)
        .unwrap()
        .is_authorized());
    assert!(engine
        .authorize_transfer(&request(SIGNER, half), 11)
        .unwrap()
        .is_authorized());

    let tiny = U256::from(1_000_000_000_000_000u64);
    let denied = engine
        .authorize_transfer(&request(SIGNER, tiny), 12)
        .unwrap();
    assert_eq!(
        denied.denial(),
        Some(&DenialReason::LimitExceeded {
            requested: tiny,
            available: U256::ZERO
        })
    );
}

#[test]
fn test_refresh_interval_restores_headroom() {
    let (_home, ctx) = initialized_home();
    let engine = ctx.open_engine().unwrap();
    let half = tenths(5);
    engine
        .add_or_replace_policy(ACCOUNT, grant(SIGNER, (0, 1_000), half, 5))
        .unwrap();

    assert!(engine
        .authorize_transfer(&request(SIGNER, half), 0)
        .unwrap()
        .is_authorized());

    let early = engine.authorize_transfer(&request(SIGNER, half), 4).unwrap();
    assert!(matches!(
        early.denial(),
        Some(DenialReason::LimitExceeded { .. })
    ));

    assert!(engine
        .authorize_transfer(&request(SIGNER, half), 6)
        .unwrap()
        .is_authorized());

    let key = PolicyKey::new(ACCOUNT, SIGNER, Asset::Native);
    let stored = engine.query_policy(&key).unwrap().unwrap();
    assert_eq!(stored.limit_used, half);
    assert_eq!(stored.last_used, 6);
}

#[test]
fn test_missing_policy_is_not_found_not_expired() {
    let (_home, ctx) = initialized_home();
    let engine = ctx.open_engine().unwrap();
    let key = PolicyKey::new(ACCOUNT, SIGNER, Asset::Native);

    assert!(engine.query_policy(&key).unwrap().is_none());

    let result = engine
        .authorize_transfer(&request(SIGNER, U256::from(1u64)), 500)
        .unwrap();
    assert_eq!(result.denial(), Some(&DenialReason::PolicyNotFound));
}

// ============================================================================
// Boundaries
// ============================================================================

#[test]
fn test_window_is_half_open() {
    let (_home, ctx) = initialized_home();
    let engine = ctx.open_engine().unwrap();
    engine
        .add_or_replace_policy(ACCOUNT, grant(SIGNER, (100, 200), U256::from(1_000u64), 0))
        .unwrap();
    let one = request(SIGNER, U256::from(1u64));

    assert!(matches!(
        engine.authorize_transfer(&one, 99).unwrap().denial(),
        Some(DenialReason::NotYetValid { .. })
    ));
    assert!(engine.authorize_transfer(&one, 100).unwrap().is_authorized());
    assert!(engine.authorize_transfer(&one, 199).unwrap().is_authorized());
    assert!(matches!(
        engine.authorize_transfer(&one, 200).unwrap().denial(),
        Some(DenialReason::Expired { .. })
    ));
}

#[test]
fn test_exact_ceiling_is_admitted() {
    let (_home, ctx) = initialized_home();
    let engine = ctx.open_engine().unwrap();
    let limit = U256::from(1_000u64);
    engine
        .add_or_replace_policy(ACCOUNT, grant(SIGNER, (0, 100), limit, 0))
        .unwrap();

    assert!(engine
        .authorize_transfer(&request(SIGNER, limit + U256::from(1u64)), 1)
        .unwrap()
        .is_denied());
    assert!(engine
        .authorize_transfer(&request(SIGNER, limit), 2)
        .unwrap()
        .is_authorized());

    let key = PolicyKey::new(ACCOUNT, SIGNER, Asset::Native);
    assert_eq!(
        engine.policy_status(&key, 3).unwrap(),
        Some(PolicyStatus::Exhausted)
    );
}

#[test]
fn test_zero_amount_heartbeat_on_exhausted_policy() {
    let (_home, ctx) = initialized_home();
    let engine = ctx.open_engine().unwrap();
    let limit = U256::from(10u64);
    engine
        .add_or_replace_policy(ACCOUNT, grant(SIGNER, (0, 100), limit, 0))
        .unwrap();
    engine
        .authorize_transfer(&request(SIGNER, limit), 5)
        .unwrap();

    let heartbeat = engine
        .authorize_transfer(&request(SIGNER, U256::ZERO), 7)
        .unwrap();
    assert!(heartbeat.is_authorized());

    let key = PolicyKey::new(ACCOUNT, SIGNER, Asset::Native);
    let stored = engine.query_policy(&key).unwrap().unwrap();
    assert_eq!(stored.limit_used, limit);
    assert_eq!(stored.last_used, 7);
}

// ============================================================================
// Isolation and Revocation
// ============================================================================

#[test]
fn test_policies_are_isolated_per_asset_and_signer() {
    let (_home, ctx) = initialized_home();
    let engine = ctx.open_engine().unwrap();
    let token = Asset::Token(Address::repeat_byte(0xaa));
    engine
        .add_or_replace_policy(ACCOUNT, grant(SIGNER, (0, 100), U256::from(50u64), 0))
        .unwrap();

    let mut token_request = request(SIGNER, U256::from(1u64));
    token_request.asset = token;
    assert_eq!(
        engine
            .authorize_transfer(&token_request, 1)
            .unwrap()
            .denial(),
        Some(&DenialReason::PolicyNotFound)
    );

    let other_signer = Address::repeat_byte(0x44);
    assert_eq!(
        engine
            .authorize_transfer(&request(other_signer, U256::from(1u64)), 1)
            .unwrap()
            .denial(),
        Some(&DenialReason::PolicyNotFound)
    );

    assert!(engine
        .authorize_transfer(&request(SIGNER, U256::from(50u64)), 1)
        .unwrap()
        .is_authorized());
}

#[test]
fn test_revoke_then_regrant() {
    let (_home, ctx) = initialized_home();
    let engine = ctx.open_engine().unwrap();
    let key = PolicyKey::new(ACCOUNT, SIGNER, Asset::Native);
    engine
        .add_or_replace_policy(ACCOUNT, grant(SIGNER, (0, 100), U256::from(50u64), 0))
        .unwrap();
    engine
        .authorize_transfer(&request(SIGNER, U256::from(20u64)), 1)
        .unwrap();

    engine.revoke_policy(ACCOUNT, &key).unwrap();
    assert_eq!(
        engine.policy_status(&key, 2).unwrap(),
        Some(PolicyStatus::Revoked)
    );
    assert!(engine
        .authorize_transfer(&request(SIGNER, U256::from(1u64)), 2)
        .unwrap()
        .is_denied());

    engine
        .add_or_replace_policy(ACCOUNT, grant(SIGNER, (0, 100), U256::from(30u64), 0))
        .unwrap();
    let fresh = engine.query_policy(&key).unwrap().unwrap();
    assert_eq!(fresh.limit_used, U256::ZERO);
    assert_eq!(fresh.last_used, 0);
    assert!(engine
        .authorize_transfer(&request(SIGNER, U256::from(30u64)), 3)
        .unwrap()
        .is_authorized());
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_admitted_total_never_exceeds_ceiling(
        limit in ceiling(),
        requests in prop::collection::vec(amount(), 1..12),
    ) {
        let (_home, ctx) = initialized_home();
        let engine = ctx.open_engine().unwrap();
        engine
            .add_or_replace_policy(ACCOUNT, grant(SIGNER, (0, 1_000), limit, 0))
            .unwrap();

        let mut admitted = U256::ZERO;
        for (now, value) in (1u64..).zip(requests) {
            let before = limit - admitted;
            let result = engine.authorize_transfer(&request(SIGNER, value), now).unwrap();
            if result.is_authorized() {
                prop_assert!(value <= before);
                admitted += value;
            } else {
                prop_assert!(value > before);
            }
        }

        let stored = engine
            .query_policy(&PolicyKey::new(ACCOUNT, SIGNER, Asset::Native))
            .unwrap()
            .unwrap();
        prop_assert!(admitted <= limit);
        prop_assert_eq!(stored.limit_used, admitted);
    }
}
