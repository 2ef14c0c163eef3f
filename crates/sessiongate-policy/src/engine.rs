//! Session engine: the host-facing boundary of the policy layer.
//!
//! [`SessionEngine`] wires owner operations, read-only queries and transfer
//! authorization over one [`SessionRegistry`]. Every mutation goes through
//! the validator's commit lock, so an owner re-grant or revoke can never
//! interleave with a check-then-commit on the same registry.
//!
//! # Operations
//!
//! | Operation | Caller | Effect |
//! |-----------|--------|--------|
//! | [`add_or_replace_policy`](SessionEngine::add_or_replace_policy) | account owner | stores a fresh policy with zeroed counters |
//! | [`revoke_policy`](SessionEngine::revoke_policy) | account owner | zeroes the ceiling, keeps the record |
//! | [`query_policy`](SessionEngine::query_policy) | anyone | reads the stored record |
//! | [`authorize_transfer`](SessionEngine::authorize_transfer) | host | validates and commits a spend |
//!
//! # Example
//!
//! ```
//! use sessiongate_policy::engine::SessionEngine;
//! use sessiongate_policy::registry::InMemoryRegistry;
//! use sessiongate_core::types::{Asset, PolicyGrant, TransferRequest};
//! use alloy_primitives::{Address, U256};
//!
//! let owner = Address::repeat_byte(1);
//! let signer = Address::repeat_byte(2);
//! let engine = SessionEngine::new(InMemoryRegistry::new());
//!
//! engine
//!     .add_or_replace_policy(
//!         owner,
//!         PolicyGrant::new(owner, signer, Asset::Native)
//!             .with_window(0, 3_600)
//!             .with_limit(U256::from(1_000u64)),
//!     )
//!     .unwrap();
//!
//! let request = TransferRequest {
//!     account: owner,
//!     signer,
//!     asset: Asset::Native,
//!     recipient: Address::repeat_byte(3),
//!     amount: U256::from(400u64),
//! };
//! assert!(engine.authorize_transfer(&request, 60).unwrap().is_authorized());
//! ```

use crate::accountant;
use crate::registry::SessionRegistry;
use crate::validator::OperationValidator;
use alloy_primitives::{Address, U256};
use sessiongate_core::error::{PolicyError, SessionGateError};
use sessiongate_core::signing::{SignedOperation, SignerRecovery};
use sessiongate_core::types::{
    AuthorizationResult, PolicyGrant, PolicyKey, PolicyStatus, SessionPolicy, Timestamp,
    TransferRequest,
};

/// Policy engine over a session registry.
///
/// # Thread Safety
///
/// `SessionEngine<R>` is `Send + Sync` whenever `R` is, and can be shared
/// across threads behind an `Arc`.
pub struct SessionEngine<R> {
    validator: OperationValidator<R>,
}

impl<R: SessionRegistry> std::fmt::Debug for SessionEngine<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEngine").finish_non_exhaustive()
    }
}

impl<R: SessionRegistry> SessionEngine<R> {
    /// Creates an engine over `registry`.
    #[must_use]
    pub const fn new(registry: R) -> Self {
        Self {
            validator: OperationValidator::new(registry),
        }
    }

    /// Returns the underlying registry.
    #[must_use]
    pub const fn registry(&self) -> &R {
        self.validator.registry()
    }

    /// Returns the validator that commits spends.
    #[must_use]
    pub const fn validator(&self) -> &OperationValidator<R> {
        &self.validator
    }

    /// Creates or replaces the policy at the grant's key.
    ///
    /// Counters of any previous policy at the same key are reset to zero.
    ///
    /// # Errors
    ///
    /// - [`PolicyError::NotAccountOwner`] if `caller` is not `grant.account`
    /// - [`PolicyError::InvalidWindow`] if the window is empty
    /// - [`PolicyError::InvalidAsset`] for a zero-address token
    /// - [`PolicyError::ZeroLimit`] if the grant allows nothing
    /// - [`SessionGateError::Store`] if the registry write fails
    pub fn add_or_replace_policy(
        &self,
        caller: Address,
        grant: PolicyGrant,
    ) -> Result<SessionPolicy, SessionGateError> {
        ensure_owner(caller, grant.account)?;
        grant.validate()?;

        let policy = SessionPolicy::from_grant(&grant);
        {
            let _guard = self.validator.lock();
            self.registry().put(policy.clone())?;
        }

        tracing::info!(
            account = %policy.account,
            signer = %policy.signer,
            asset = %policy.asset,
            valid_after = policy.valid_after,
            valid_until = policy.valid_until,
            limit_amount = %policy.limit_amount,
            refresh_interval = policy.refresh_interval,
            "Session policy granted"
        );

        Ok(policy)
    }

    /// Revokes the policy at `key`.
    ///
    /// The record is kept with `limit_amount` and `limit_used` zeroed, so
    /// later queries still find it and transfers see zero headroom.
    ///
    /// # Errors
    ///
    /// - [`PolicyError::NotAccountOwner`] if `caller` is not `key.account`
    /// - [`PolicyError::PolicyNotFound`] if nothing is stored at `key`
    /// - [`SessionGateError::Store`] if the registry fails
    pub fn revoke_policy(
        &self,
        caller: Address,
        key: &PolicyKey,
    ) -> Result<SessionPolicy, SessionGateError> {
        ensure_owner(caller, key.account)?;

        let revoked = {
            let _guard = self.validator.lock();
            let mut policy = self
                .registry()
                .get(key)?
                .ok_or_else(|| PolicyError::policy_not_found(*key))?;
            policy.limit_amount = U256::ZERO;
            policy.limit_used = U256::ZERO;
            self.registry().put(policy.clone())?;
            policy
        };

        tracing::info!(
            account = %key.account,
            signer = %key.signer,
            asset = %key.asset,
            "Session policy revoked"
        );

        Ok(revoked)
    }

    /// Reads the policy stored at `key`.
    ///
    /// `Ok(None)` means no policy was ever granted for the key.
    ///
    /// # Errors
    ///
    /// Returns [`SessionGateError::Store`] if the registry read fails.
    pub fn query_policy(&self, key: &PolicyKey) -> Result<Option<SessionPolicy>, SessionGateError> {
        Ok(self.registry().get(key)?)
    }

    /// Computes the logical status of the policy at `key` as of `now`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionGateError::Store`] if the registry read fails.
    pub fn policy_status(
        &self,
        key: &PolicyKey,
        now: Timestamp,
    ) -> Result<Option<PolicyStatus>, SessionGateError> {
        Ok(self
            .query_policy(key)?
            .map(|policy| accountant::status(&policy, now)))
    }

    /// Lists every policy of `account`, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns [`SessionGateError::Store`] if the registry read fails.
    pub fn list_policies(&self, account: Address) -> Result<Vec<SessionPolicy>, SessionGateError> {
        Ok(self.registry().list(account)?)
    }

    /// Validates a transfer at `now` and commits it when admitted.
    ///
    /// An `Authorized` result is the host's permission to call its
    /// `TransferExecutor` with the returned authorization.
    ///
    /// # Errors
    ///
    /// Returns [`SessionGateError`] on storage failure. Policy verdicts are
    /// returned as `Ok(AuthorizationResult::Denied(..))`.
    pub fn authorize_transfer(
        &self,
        request: &TransferRequest,
        now: Timestamp,
    ) -> Result<AuthorizationResult, SessionGateError> {
        tracing::debug!(
            account = %request.account,
            signer = %request.signer,
            asset = %request.asset,
            amount = %request.amount,
            now,
            "Evaluating transfer"
        );
        self.validator.authorize(request, now)
    }

    /// Recovers the signer of `signed` and authorizes its transfer.
    ///
    /// A signature over different operation bytes recovers some other
    /// address, which has no policy and is denied.
    ///
    /// # Errors
    ///
    /// Returns [`SessionGateError::Sign`] if recovery fails, or any error of
    /// [`authorize_transfer`](Self::authorize_transfer).
    pub fn authorize_signed_operation(
        &self,
        signed: &SignedOperation,
        recovery: &dyn SignerRecovery,
        now: Timestamp,
    ) -> Result<AuthorizationResult, SessionGateError> {
        let signer = signed.recover_signer(recovery)?;
        self.authorize_transfer(&signed.operation.to_request(signer), now)
    }
}

fn ensure_owner(caller: Address, account: Address) -> Result<(), PolicyError> {
    if caller == account {
        Ok(())
    } else {
        tracing::warn!(%caller, %account, "Rejected policy write from non-owner");
        Err(PolicyError::not_account_owner(caller, account))
    }
}
