//! Error handling and conversion tests.
//!
//! These tests verify that error types implement the correct traits,
//! have proper Display implementations, and convert correctly between types.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::doc_markdown,
    clippy::io_other_error,
    clippy::no_effect_underscore_binding
)]

use std::error::Error;
use std::path::PathBuf;

use alloy_primitives::Address;
use sessiongate::audit::AuditError;
use sessiongate::cli::commands::{
    AuditCommandError, AuthorizeError, ConfigCommandError, InitError, OwnerCommandError,
    QueryError, StatusError,
};
use sessiongate::cli::context::ContextError;
use sessiongate::logging::LogError;
use sessiongate_core::error::{ConfigError, PolicyError, SessionGateError, SignError, StoreError};
use sessiongate_core::types::{Asset, PolicyKey};

fn io_error() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied")
}

/// Test that all error types implement the Error trait.
#[test]
fn test_error_trait_implementation() {
    // LogError
    let err = LogError::FileCreation("test".to_string());
    assert!(err.source().is_none());

    // AuditError
    let err = AuditError::KeyNotFound(PathBuf::from("/tmp/audit.key"));
    assert!(err.source().is_none());
    let err = AuditError::Io(io_error());
    assert!(err.source().is_some());

    // InitError
    let err = InitError::AlreadyInitialized;
    assert!(err.source().is_none());
    let err = InitError::DirectoryCreation(io_error());
    assert!(err.source().is_some());

    // ContextError
    let err = ContextError::NotInitialized(PathBuf::from("/tmp/sg"));
    assert!(err.source().is_none());
    let err = ContextError::Store(StoreError::database("locked"));
    assert!(err.source().is_some());

    // StatusError
    let err = StatusError::Audit(AuditError::Io(io_error()));
    assert!(err.source().is_some());

    // ConfigCommandError
    let err = ConfigCommandError::Io(io_error());
    assert!(err.source().is_some());

    // AuditCommandError
    let err = AuditCommandError::Disabled;
    assert!(err.source().is_none());

    // AuthorizeError
    let err = AuthorizeError::MissingSigner;
    assert!(err.source().is_none());
    let err = AuthorizeError::Recovery(SignError::RecoveryFailed);
    assert!(err.source().is_some());
}

/// Test error Display implementations.
#[test]
fn test_error_display() {
    // LogError
    let err = LogError::InvalidConfig("bad value".to_string());
    assert!(err.to_string().contains("Invalid log configuration"));
    assert!(err.to_string().contains("bad value"));

    let err = LogError::SubscriberInit("already set".to_string());
    assert!(err.to_string().contains("initialize logging"));

    // AuditError
    let err = AuditError::InvalidKey("wrong length".to_string());
    assert!(err.to_string().contains("Invalid audit key"));

    let err = AuditError::RotationFailed("disk full".to_string());
    assert!(err.to_string().contains("rotation failed"));

    let err = AuditError::ChainBroken {
        seq: 7,
        message: "HMAC mismatch".to_string(),
    };
    assert!(err.to_string().contains("seq 7"));
    assert!(err.to_string().contains("HMAC mismatch"));

    // ContextError
    let err = ContextError::NotInitialized(PathBuf::from("/tmp/sg"));
    let msg = err.to_string();
    assert!(msg.contains("/tmp/sg"));
    assert!(msg.contains("sessiongate init"));

    // InitError
    let err = InitError::AlreadyInitialized;
    assert!(err.to_string().contains("--force"));

    // AuditCommandError
    let err = AuditCommandError::ChainBroken {
        seq: 3,
        message: "sequence gap".to_string(),
    };
    assert!(err.to_string().contains("entry 3"));
    assert!(err.to_string().contains("sequence gap"));

    // AuthorizeError
    let err = AuthorizeError::InvalidSignatureHex("odd length".to_string());
    assert!(err.to_string().contains("Invalid signature hex"));
}

/// Transparent wrappers show the inner message unchanged.
#[test]
fn test_transparent_wrappers() {
    let inner = ContextError::NotInitialized(PathBuf::from("/tmp/sg"));
    let expected = inner.to_string();

    let err = InitError::from(ContextError::NotInitialized(PathBuf::from("/tmp/sg")));
    assert_eq!(err.to_string(), expected);

    let err = QueryError::from(ContextError::NotInitialized(PathBuf::from("/tmp/sg")));
    assert_eq!(err.to_string(), expected);

    let err = OwnerCommandError::from(ContextError::NotInitialized(PathBuf::from("/tmp/sg")));
    assert_eq!(err.to_string(), expected);

    let err = StatusError::from(inner);
    assert_eq!(err.to_string(), expected);
}

/// Engine errors surface through the owner commands.
#[test]
fn test_owner_command_error_carries_engine_error() {
    let caller = Address::repeat_byte(0x99);
    let account = Address::repeat_byte(0x11);
    let err = OwnerCommandError::from(SessionGateError::from(PolicyError::not_account_owner(
        caller, account,
    )));

    let msg = err.to_string();
    assert!(msg.contains("not the owner"));
    assert!(msg.contains(&caller.to_string()));

    let key = PolicyKey::new(account, Address::repeat_byte(0x22), Asset::Native);
    match OwnerCommandError::from(SessionGateError::from(PolicyError::policy_not_found(key))) {
        OwnerCommandError::Engine(inner) => assert!(inner.is_policy_not_found()),
        OwnerCommandError::Context(_) => panic!("expected an engine error"),
    }
}

/// Only policy denials map to the denial exit code.
#[test]
fn test_authorize_error_is_denied() {
    let denied = AuthorizeError::Denied {
        rule: "limit_exceeded".to_string(),
        reason: "requested 5, available 0".to_string(),
    };
    assert!(denied.is_denied());
    assert!(denied.to_string().contains("limit_exceeded"));

    assert!(!AuthorizeError::MissingSigner.is_denied());
    assert!(!AuthorizeError::Engine(SessionGateError::from(StoreError::database("busy"))).is_denied());
    assert!(!AuthorizeError::Context(ContextError::Config(ConfigError::NoHomeDirectory)).is_denied());
}

/// Test From conversions between error types.
#[test]
fn test_error_conversions() {
    let err: ContextError = AuditError::LockError("poisoned".to_string()).into();
    assert!(matches!(err, ContextError::Audit(_)));

    let err: ContextError = ConfigError::parse_failed("bad toml").into();
    assert!(matches!(err, ContextError::Config(_)));

    let err: StatusError = StoreError::corrupted("row 3").into();
    assert!(matches!(err, StatusError::Store(_)));

    let err: AuditCommandError = AuditError::Serialization("eof".to_string()).into();
    assert!(matches!(err, AuditCommandError::Audit(_)));

    let err: ConfigCommandError = ConfigError::NoHomeDirectory.into();
    assert!(matches!(err, ConfigCommandError::Config(_)));

    let err: InitError = io_error().into();
    assert!(matches!(err, InitError::Io(_)));

    let err: InitError = ConfigError::NoHomeDirectory.into();
    assert!(matches!(err, InitError::Config(_)));

    let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let err: QueryError = json_err.into();
    assert!(err.to_string().contains("serialize"));
}

/// Test that errors are Send + Sync for use across threads.
#[test]
fn test_errors_are_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}

    assert_send_sync::<LogError>();
    assert_send_sync::<AuditError>();
    assert_send_sync::<ContextError>();
    assert_send_sync::<InitError>();
    assert_send_sync::<AuthorizeError>();
    assert_send_sync::<OwnerCommandError>();
    assert_send_sync::<QueryError>();
    assert_send_sync::<StatusError>();
    assert_send_sync::<ConfigCommandError>();
    assert_send_sync::<AuditCommandError>();
}
