//! Registry persistence across engine and process restarts.
//!
//! Each test drops the engine and reopens the same base directory, the way
//! successive CLI invocations do.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::indexing_slicing
)]

use alloy_primitives::{Address, U256};
use sessiongate::cli::commands::StatusCommand;
use sessiongate::cli::CommandContext;
use sessiongate_core::types::{Asset, PolicyKey, PolicyStatus};

use crate::common::{ether, grant, initialized_home, request, ACCOUNT, SIGNER};

fn reopen(ctx: &CommandContext) -> CommandContext {
    CommandContext::load(Some(ctx.base_dir().to_path_buf())).unwrap()
}

#[test]
fn test_usage_survives_reopen() {
    let (_home, ctx) = initialized_home();
    {
        let engine = ctx.open_engine().unwrap();
        engine
            .add_or_replace_policy(ACCOUNT, grant(SIGNER, (0, 1_000), ether(2), 0))
            .unwrap();
        assert!(engine
            .authorize_transfer(&request(SIGNER, ether(1)), 50)
            .unwrap()
            .is_authorized());
    }

    let engine = reopen(&ctx).open_engine().unwrap();
    let stored = engine
        .query_policy(&PolicyKey::new(ACCOUNT, SIGNER, Asset::Native))
        .unwrap()
        .unwrap();
    assert_eq!(stored.limit_used, ether(1));
    assert_eq!(stored.last_used, 50);

    assert!(engine
        .authorize_transfer(&request(SIGNER, ether(1) + U256::from(1u64)), 60)
        .unwrap()
        .is_denied());
    assert!(engine
        .authorize_transfer(&request(SIGNER, ether(1)), 61)
        .unwrap()
        .is_authorized());
}

#[test]
fn test_revocation_survives_reopen() {
    let (_home, ctx) = initialized_home();
    let key = PolicyKey::new(ACCOUNT, SIGNER, Asset::Native);
    {
        let engine = ctx.open_engine().unwrap();
        engine
            .add_or_replace_policy(ACCOUNT, grant(SIGNER, (0, 1_000), ether(1), 0))
            .unwrap();
        engine.revoke_policy(ACCOUNT, &key).unwrap();
    }

    let engine = reopen(&ctx).open_engine().unwrap();
    assert_eq!(
        engine.policy_status(&key, 10).unwrap(),
        Some(PolicyStatus::Revoked)
    );
    assert!(engine
        .authorize_transfer(&request(SIGNER, U256::from(1u64)), 10)
        .unwrap()
        .is_denied());
}

#[test]
fn test_listing_is_ordered_and_scoped_to_account() {
    let (_home, ctx) = initialized_home();
    let token = Asset::Token(Address::repeat_byte(0xcc));
    let late_signer = Address::repeat_byte(0x44);
    {
        let engine = ctx.open_engine().unwrap();
        engine
            .add_or_replace_policy(ACCOUNT, grant(late_signer, (0, 100), ether(1), 0))
            .unwrap();
        let mut token_grant = grant(SIGNER, (0, 100), ether(1), 0);
        token_grant.asset = token;
        engine.add_or_replace_policy(ACCOUNT, token_grant).unwrap();
        engine
            .add_or_replace_policy(ACCOUNT, grant(SIGNER, (0, 100), ether(1), 0))
            .unwrap();

        let other = Address::repeat_byte(0x55);
        let mut foreign = grant(SIGNER, (0, 100), ether(1), 0);
        foreign.account = other;
        engine.add_or_replace_policy(other, foreign).unwrap();
    }

    let engine = reopen(&ctx).open_engine().unwrap();
    let keys: Vec<PolicyKey> = engine
        .list_policies(ACCOUNT)
        .unwrap()
        .iter()
        .map(|policy| policy.key())
        .collect();
    assert_eq!(
        keys,
        vec![
            PolicyKey::new(ACCOUNT, SIGNER, Asset::Native),
            PolicyKey::new(ACCOUNT, SIGNER, token),
            PolicyKey::new(ACCOUNT, late_signer, Asset::Native),
        ]
    );
}

#[test]
fn test_status_counts_every_account() {
    let (_home, ctx) = initialized_home();
    {
        let engine = ctx.open_engine().unwrap();
        engine
            .add_or_replace_policy(ACCOUNT, grant(SIGNER, (0, 100), ether(1), 0))
            .unwrap();
        // Replacing under the same key does not add a row.
        engine
            .add_or_replace_policy(ACCOUNT, grant(SIGNER, (0, 200), ether(3), 0))
            .unwrap();
        let other = Address::repeat_byte(0x55);
        let mut foreign = grant(SIGNER, (0, 100), ether(1), 0);
        foreign.account = other;
        engine.add_or_replace_policy(other, foreign).unwrap();
    }

    let report = StatusCommand::new(Some(ACCOUNT), Some(50))
        .execute(&reopen(&ctx))
        .unwrap();
    assert_eq!(report.policy_count, 2);

    let (account, views) = report.account.unwrap();
    assert_eq!(account, ACCOUNT);
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].policy.limit_amount, ether(3));
    assert_eq!(
        views[0].status,
        PolicyStatus::Active {
            headroom: ether(3)
        }
    );
}
