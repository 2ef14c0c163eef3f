//! End-to-end command flow: grant, authorize, query and revoke, driven from
//! parsed command lines against one initialized base directory.
//!
//! These tests verify:
//! - Commands compose through the shared registry
//! - Signature-based authorization recovers the session key
//! - Concurrent authorizations never overspend, including with readers
//!   and a second engine on the same database

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::indexing_slicing
)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use alloy_primitives::{Address, U256};
use clap::Parser;
use sessiongate::cli::commands::{AuthorizeCommand, GrantCommand, QueryCommand, RevokeCommand};
use sessiongate::cli::{Cli, CommandContext, Commands, OutputFormat};
use sessiongate_core::signing::Operation;
use sessiongate_core::types::{Asset, PolicyKey, PolicyStatus};
use sessiongate_crypto::Secp256k1KeyPair;

use crate::common::{grant, initialized_home, request, ACCOUNT, RECIPIENT, SIGNER};

fn parse(argv: &[&str]) -> Commands {
    let mut full = vec!["sessiongate"];
    full.extend_from_slice(argv);
    Cli::try_parse_from(full).unwrap().command
}

fn grant_cmd(signer: Address, limit: &str, refresh: &str) -> GrantCommand {
    let account = ACCOUNT.to_string();
    let signer = signer.to_string();
    match parse(&[
        "grant",
        "--account",
        &account,
        "--signer",
        &signer,
        "--valid-after",
        "1000",
        "--valid-until",
        "2000",
        "--limit",
        limit,
        "--refresh-interval",
        refresh,
    ]) {
        Commands::Grant(args) => GrantCommand::from_args(&args),
        other => panic!("unexpected command: {other:?}"),
    }
}

fn authorize_cmd(extra: &[&str]) -> AuthorizeCommand {
    let account = ACCOUNT.to_string();
    let recipient = RECIPIENT.to_string();
    let mut argv = vec![
        "authorize",
        "--account",
        account.as_str(),
        "--recipient",
        recipient.as_str(),
    ];
    argv.extend_from_slice(extra);
    match parse(&argv) {
        Commands::Authorize(args) => AuthorizeCommand::new(args),
        other => panic!("unexpected command: {other:?}"),
    }
}

fn authorize_as(signer: Address, amount: &str, now: &str) -> AuthorizeCommand {
    let signer = signer.to_string();
    authorize_cmd(&["--signer", &signer, "--amount", amount, "--now", now])
}

fn query(ctx: &CommandContext, signer: Address, now: u64) -> Option<PolicyStatus> {
    QueryCommand::new(
        PolicyKey::new(ACCOUNT, signer, Asset::Native),
        Some(now),
        OutputFormat::Json,
    )
    .execute(ctx)
    .unwrap()
    .map(|view| view.status)
}

// ============================================================================
// Command Flow
// ============================================================================

#[test]
fn test_grant_authorize_query_revoke() {
    let (_home, ctx) = initialized_home();

    let policy = grant_cmd(SIGNER, "1000", "0").execute(&ctx).unwrap();
    assert_eq!(policy.limit_amount, U256::from(1_000u64));
    assert_eq!(query(&ctx, SIGNER, 999), Some(PolicyStatus::Pending));

    let first = authorize_as(SIGNER, "600", "1500").execute(&ctx).unwrap();
    assert!(first.authorized);
    assert_eq!(
        query(&ctx, SIGNER, 1501),
        Some(PolicyStatus::Active {
            headroom: U256::from(400u64)
        })
    );

    let over = authorize_as(SIGNER, "401", "1502").execute(&ctx).unwrap();
    assert!(!over.authorized);
    assert_eq!(over.rule.as_deref(), Some("limit_exceeded"));
    assert!(over.into_result().unwrap_err().is_denied());

    let revoke = match parse(&[
        "revoke",
        "--account",
        &ACCOUNT.to_string(),
        "--signer",
        &SIGNER.to_string(),
    ]) {
        Commands::Revoke(args) => RevokeCommand::from_args(&args),
        other => panic!("unexpected command: {other:?}"),
    };
    revoke.execute(&ctx).unwrap();
    assert_eq!(query(&ctx, SIGNER, 1503), Some(PolicyStatus::Revoked));

    let after_revoke = authorize_as(SIGNER, "1", "1504").execute(&ctx).unwrap();
    assert!(!after_revoke.authorized);
}

#[test]
fn test_query_unknown_key_is_none() {
    let (_home, ctx) = initialized_home();
    assert_eq!(query(&ctx, Address::repeat_byte(0x77), 1_500), None);
}

#[test]
fn test_refresh_through_commands() {
    let (_home, ctx) = initialized_home();
    grant_cmd(SIGNER, "100", "60").execute(&ctx).unwrap();

    assert!(authorize_as(SIGNER, "100", "1000").execute(&ctx).unwrap().authorized);
    assert_eq!(query(&ctx, SIGNER, 1030), Some(PolicyStatus::Exhausted));
    assert!(!authorize_as(SIGNER, "1", "1060").execute(&ctx).unwrap().authorized);
    assert!(authorize_as(SIGNER, "100", "1061").execute(&ctx).unwrap().authorized);
}

#[test]
fn test_signed_operation_flow() {
    let (_home, ctx) = initialized_home();
    let session = Secp256k1KeyPair::from_seed_phrase("e2e session key");
    grant_cmd(session.address(), "500", "0").execute(&ctx).unwrap();

    let signed = session
        .sign_operation(&Operation {
            account: ACCOUNT,
            asset: Asset::Native,
            recipient: RECIPIENT,
            amount: U256::from(200u64),
            nonce: 42,
        })
        .unwrap();
    let signature = format!("0x{}", hex::encode(signed.signature));

    let outcome = authorize_cmd(&[
        "--signature",
        &signature,
        "--nonce",
        "42",
        "--amount",
        "200",
        "--now",
        "1200",
    ])
    .execute(&ctx)
    .unwrap();

    assert!(outcome.authorized);
    assert_eq!(outcome.request.signer, session.address());
    assert_eq!(
        query(&ctx, session.address(), 1201),
        Some(PolicyStatus::Active {
            headroom: U256::from(300u64)
        })
    );
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_authorizations_never_overspend() {
    let (_home, ctx) = initialized_home();
    let engine = Arc::new(ctx.open_engine().unwrap());
    engine
        .add_or_replace_policy(ACCOUNT, grant(SIGNER, (0, 10_000), U256::from(100u64), 0))
        .unwrap();

    let admitted = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let admitted = Arc::clone(&admitted);
            thread::spawn(move || {
                for _ in 0..10 {
                    let result = engine
                        .authorize_transfer(&request(SIGNER, U256::from(3u64)), 500)
                        .unwrap();
                    if result.is_authorized() {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    // 80 attempts of 3 against a ceiling of 100: exactly 33 fit.
    assert_eq!(admitted.load(Ordering::SeqCst), 33);
    let stored = engine
        .query_policy(&PolicyKey::new(ACCOUNT, SIGNER, Asset::Native))
        .unwrap()
        .unwrap();
    assert_eq!(stored.limit_used, U256::from(99u64));
}

#[test]
fn test_queries_during_authorizations_never_overspend() {
    let (_home, ctx) = initialized_home();
    let engine = Arc::new(ctx.open_engine().unwrap());
    engine
        .add_or_replace_policy(ACCOUNT, grant(SIGNER, (0, 10_000), U256::from(100u64), 0))
        .unwrap();
    let key = PolicyKey::new(ACCOUNT, SIGNER, Asset::Native);

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for _ in 0..300 {
                    engine.query_policy(&key).unwrap().unwrap();
                }
            })
        })
        .collect();

    let mut admitted = 0u64;
    for now in 500..650 {
        if engine
            .authorize_transfer(&request(SIGNER, U256::from(1u64)), now)
            .unwrap()
            .is_authorized()
        {
            admitted += 1;
        }
    }
    for handle in readers {
        handle.join().unwrap();
    }

    assert_eq!(admitted, 100);
    let stored = ctx
        .open_engine()
        .unwrap()
        .query_policy(&key)
        .unwrap()
        .unwrap();
    assert_eq!(stored.limit_used, U256::from(100u64));
}

#[test]
fn test_second_engine_on_same_database_cannot_double_spend() {
    let (_home, ctx) = initialized_home();
    let first = ctx.open_engine().unwrap();
    let second = ctx.open_engine().unwrap();
    first
        .add_or_replace_policy(ACCOUNT, grant(SIGNER, (0, 10_000), U256::from(100u64), 0))
        .unwrap();
    let key = PolicyKey::new(ACCOUNT, SIGNER, Asset::Native);

    // The second engine caches the unspent record.
    assert_eq!(
        second.query_policy(&key).unwrap().unwrap().limit_used,
        U256::ZERO
    );

    assert!(first
        .authorize_transfer(&request(SIGNER, U256::from(100u64)), 500)
        .unwrap()
        .is_authorized());
    assert!(second
        .authorize_transfer(&request(SIGNER, U256::from(100u64)), 501)
        .unwrap()
        .is_denied());

    let stored = ctx
        .open_engine()
        .unwrap()
        .query_policy(&key)
        .unwrap()
        .unwrap();
    assert_eq!(stored.limit_used, U256::from(100u64));
    assert_eq!(stored.last_used, 500);
}
