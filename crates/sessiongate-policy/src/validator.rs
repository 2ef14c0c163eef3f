//! Transfer validation against stored session policies.
//!
//! [`OperationValidator`] is the single writer of usage counters. Each
//! authorization reads the policy, evaluates it with the
//! [accountant](crate::accountant), and on admit commits the new counters,
//! all while holding one commit lock. Two concurrent authorizations therefore
//! never both spend against the same stale `limit_used`.
//!
//! The commit is a compare-and-swap against the record that was evaluated.
//! When another writer sharing the store changed it first, the validator
//! re-reads and evaluates again, up to [`MAX_COMMIT_ATTEMPTS`] times.
//!
//! # Validation Steps
//!
//! 1. A token asset carrying the zero address is denied as an asset mismatch
//! 2. A missing policy is denied as [`DenialReason::PolicyNotFound`]
//! 3. The stored record must match the request's account, signer and asset
//! 4. The accountant decides; a denial leaves the record untouched
//! 5. On admit the counters are committed, then the transfer is authorized
//!
//! Storage failures surface as `Err`, never as denials.

use crate::accountant::{evaluate, Evaluation};
use crate::registry::SessionRegistry;
use sessiongate_core::error::SessionGateError;
use sessiongate_core::types::{
    Asset, Authorization, AuthorizationResult, DenialReason, Timestamp, TransferRequest,
};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Evaluations attempted before a lost compare-and-swap is returned as an error.
pub const MAX_COMMIT_ATTEMPTS: usize = 3;

/// Validates transfer requests and commits admitted spends.
///
/// # Example
///
/// ```
/// use sessiongate_policy::registry::{InMemoryRegistry, SessionRegistry};
/// use sessiongate_policy::validator::OperationValidator;
/// use sessiongate_core::types::{Asset, PolicyGrant, SessionPolicy, TransferRequest};
/// use alloy_primitives::{Address, U256};
///
/// let account = Address::repeat_byte(1);
/// let signer = Address::repeat_byte(2);
///
/// let validator = OperationValidator::new(InMemoryRegistry::new());
/// validator
///     .registry()
///     .put(SessionPolicy::from_grant(
///         &PolicyGrant::new(account, signer, Asset::Native)
///             .with_window(0, 100)
///             .with_limit(U256::from(10u64)),
///     ))
///     .unwrap();
///
/// let request = TransferRequest {
///     account,
///     signer,
///     asset: Asset::Native,
///     recipient: Address::repeat_byte(3),
///     amount: U256::from(10u64),
/// };
///
/// assert!(validator.authorize(&request, 5).unwrap().is_authorized());
/// assert!(validator.authorize(&request, 6).unwrap().is_denied());
/// ```
#[derive(Debug)]
pub struct OperationValidator<R> {
    registry: R,
    commit_lock: Mutex<()>,
}

impl<R: SessionRegistry> OperationValidator<R> {
    /// Creates a validator over `registry`.
    #[must_use]
    pub const fn new(registry: R) -> Self {
        Self {
            registry,
            commit_lock: Mutex::new(()),
        }
    }

    /// Returns the underlying registry.
    #[must_use]
    pub const fn registry(&self) -> &R {
        &self.registry
    }

    /// Acquires the commit lock.
    ///
    /// The lock guards no data, so a panic in another holder cannot leave
    /// anything inconsistent and poisoning is ignored.
    pub(crate) fn lock(&self) -> MutexGuard<'_, ()> {
        self.commit_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Validates `request` at `now` and, if admitted, commits the spend.
    ///
    /// # Errors
    ///
    /// Returns [`SessionGateError`] if the registry fails or rejects the
    /// commit, including a [`PolicyError::ConcurrentUpdate`] that persisted
    /// through every attempt. The stored policy is unchanged in that case.
    ///
    /// [`PolicyError::ConcurrentUpdate`]: sessiongate_core::error::PolicyError::ConcurrentUpdate
    pub fn authorize(
        &self,
        request: &TransferRequest,
        now: Timestamp,
    ) -> Result<AuthorizationResult, SessionGateError> {
        let _guard = self.lock();
        self.authorize_locked(request, now)
    }

    fn authorize_locked(
        &self,
        request: &TransferRequest,
        now: Timestamp,
    ) -> Result<AuthorizationResult, SessionGateError> {
        if !request.asset.is_valid() {
            return Ok(deny(
                request,
                DenialReason::AssetMismatch {
                    expected: Asset::Native,
                    actual: request.asset,
                },
            ));
        }

        let mut attempt = 1;
        loop {
            match self.evaluate_and_commit(request, now) {
                Err(err) if err.is_concurrent_update() && attempt < MAX_COMMIT_ATTEMPTS => {
                    attempt += 1;
                    tracing::debug!(
                        account = %request.account,
                        signer = %request.signer,
                        attempt,
                        "Policy changed by another writer, evaluating again"
                    );
                }
                result => return result,
            }
        }
    }

    fn evaluate_and_commit(
        &self,
        request: &TransferRequest,
        now: Timestamp,
    ) -> Result<AuthorizationResult, SessionGateError> {
        let key = request.key();
        let Some(policy) = self.registry.get(&key)? else {
            return Ok(deny(request, DenialReason::PolicyNotFound));
        };

        if policy.key() != key {
            return Ok(deny(
                request,
                DenialReason::AssetMismatch {
                    expected: policy.asset,
                    actual: request.asset,
                },
            ));
        }

        match evaluate(&policy, now, request.amount) {
            Evaluation::Deny(reason) => Ok(deny(request, reason)),
            Evaluation::Admit {
                new_limit_used,
                new_last_used,
            } => {
                let updated =
                    self.registry
                        .compare_and_commit(&policy, new_limit_used, new_last_used)?;
                tracing::info!(
                    account = %request.account,
                    signer = %request.signer,
                    asset = %request.asset,
                    amount = %request.amount,
                    limit_used = %updated.limit_used,
                    limit_amount = %updated.limit_amount,
                    now,
                    "Transfer authorized"
                );
                Ok(AuthorizationResult::Authorized(Authorization::from(request)))
            }
        }
    }
}

fn deny(request: &TransferRequest, reason: DenialReason) -> AuthorizationResult {
    tracing::warn!(
        account = %request.account,
        signer = %request.signer,
        asset = %request.asset,
        amount = %request.amount,
        rule = reason.rule_name(),
        "Transfer denied: {}",
        reason.reason()
    );
    AuthorizationResult::Denied(reason)
}
