//! Audit trail of `authorize` decisions.
//!
//! These tests verify:
//! - Every decision, admitted or denied, is chained into the log
//! - `audit verify` detects edits to a logged decision
//! - Disabling the audit log leaves decisions unaudited

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::indexing_slicing
)]

use std::fs;
use std::path::PathBuf;

use alloy_primitives::U256;
use clap::Parser;
use sessiongate::audit::{AuditEntry, AUDIT_LOG_FILENAME};
use sessiongate::cli::commands::{
    AuditCommandError, AuthorizeCommand, AuthorizeOutcome, VerifyCommand,
};
use sessiongate::cli::{Cli, CommandContext, Commands};
use sessiongate_core::config::Config;
use sessiongate_core::config_loader::ConfigLoader;

use crate::common::{grant, initialized_home, temp_data_dir, ACCOUNT, RECIPIENT, SIGNER};

fn authorize(ctx: &CommandContext, amount: &str, now: &str) -> AuthorizeOutcome {
    let account = ACCOUNT.to_string();
    let signer = SIGNER.to_string();
    let recipient = RECIPIENT.to_string();
    let argv = vec![
        "sessiongate",
        "authorize",
        "--account",
        account.as_str(),
        "--signer",
        signer.as_str(),
        "--recipient",
        recipient.as_str(),
        "--amount",
        amount,
        "--now",
        now,
    ];
    match Cli::try_parse_from(argv).unwrap().command {
        Commands::Authorize(args) => AuthorizeCommand::new(args).execute(ctx).unwrap(),
        other => panic!("unexpected command: {other:?}"),
    }
}

fn log_path(ctx: &CommandContext) -> PathBuf {
    ctx.audit_dir().unwrap().join(AUDIT_LOG_FILENAME)
}

fn read_entries(ctx: &CommandContext) -> Vec<AuditEntry> {
    fs::read_to_string(log_path(ctx))
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn test_decisions_are_chained_in_order() {
    let (_home, ctx) = initialized_home();
    ctx.open_engine()
        .unwrap()
        .add_or_replace_policy(ACCOUNT, grant(SIGNER, (0, 1_000), U256::from(100u64), 0))
        .unwrap();

    let first = authorize(&ctx, "60", "10");
    let second = authorize(&ctx, "60", "11");
    let third = authorize(&ctx, "40", "12");
    assert_eq!(first.audit_seq, Some(0));
    assert_eq!(second.audit_seq, Some(1));
    assert_eq!(third.audit_seq, Some(2));

    let entries = read_entries(&ctx);
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].verdict, "authorized");
    assert!(entries[1].verdict.starts_with("denied:limit_exceeded:"));
    assert_eq!(entries[2].verdict, "authorized");

    assert_eq!(entries[1].amount, "60");
    assert_eq!(entries[1].decision_time, 11);
    assert_eq!(entries[1].correlation_id, second.correlation_id);
    assert_eq!(entries[0].signer, SIGNER.to_string());

    let result = VerifyCommand::new().execute(&ctx).unwrap();
    assert!(result.valid);
    assert_eq!(result.entries_checked, 3);
}

#[test]
fn test_missing_policy_is_audited() {
    let (_home, ctx) = initialized_home();

    let outcome = authorize(&ctx, "1", "10");
    assert!(!outcome.authorized);
    assert_eq!(outcome.audit_seq, Some(0));

    let entries = read_entries(&ctx);
    assert!(entries[0].verdict.starts_with("denied:policy_not_found:"));
}

#[test]
fn test_rewritten_verdict_is_detected() {
    let (_home, ctx) = initialized_home();
    authorize(&ctx, "5", "10");
    authorize(&ctx, "5", "11");

    let path = log_path(&ctx);
    let content = fs::read_to_string(&path).unwrap();
    let forged = content.replacen("denied:policy_not_found:", "authorized:", 1);
    assert_ne!(content, forged);
    fs::write(&path, forged).unwrap();

    match VerifyCommand::new().execute(&ctx) {
        Err(AuditCommandError::ChainBroken { seq, .. }) => assert_eq!(seq, 0),
        other => panic!("expected a broken chain, got {other:?}"),
    }
}

#[test]
fn test_audit_disabled_leaves_no_trail() {
    let home = temp_data_dir();
    let loader = ConfigLoader::with_base_dir(home.path().to_path_buf());
    loader
        .save(
            &Config::builder()
                .database_path("sessions.db")
                .audit_enabled(false)
                .build(),
        )
        .unwrap();
    let ctx = CommandContext::load(Some(home.path().to_path_buf())).unwrap();
    ctx.open_engine()
        .unwrap()
        .add_or_replace_policy(ACCOUNT, grant(SIGNER, (0, 1_000), U256::from(100u64), 0))
        .unwrap();

    let outcome = authorize(&ctx, "10", "5");
    assert!(outcome.authorized);
    assert_eq!(outcome.audit_seq, None);
    assert!(ctx.audit_dir().is_none());
    assert!(!home.path().join("audit").exists());
}
