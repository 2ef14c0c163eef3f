//! Session policy registry.
//!
//! The registry is the only shared state of the engine: a durable mapping from
//! `(account, signer, asset)` to a [`SessionPolicy`]. Two backends are
//! provided:
//!
//! - [`InMemoryRegistry`] - a `RwLock<HashMap>` for tests and embedded hosts
//! - [`SqliteRegistry`](crate::store::SqliteRegistry) - durable `SQLite` storage
//!
//! # Write Rules
//!
//! - [`SessionRegistry::put`] overwrites the whole record and rejects an
//!   invalid window, a zero-address token, or `limit_used > limit_amount`.
//! - [`SessionRegistry::commit`] only ever updates `limit_used` and
//!   `last_used` of an existing record. It never creates one, and it rejects
//!   ceiling violations and `last_used` regressions.
//! - [`SessionRegistry::compare_and_commit`] is `commit` guarded by the
//!   record the caller evaluated. If another writer changed the record in
//!   between, the write is refused with [`PolicyError::ConcurrentUpdate`].
//!
//! # Example
//!
//! ```
//! use sessiongate_policy::registry::{InMemoryRegistry, SessionRegistry};
//! use sessiongate_core::types::{Asset, PolicyGrant, SessionPolicy};
//! use alloy_primitives::{Address, U256};
//!
//! let registry = InMemoryRegistry::new();
//! let grant = PolicyGrant::new(Address::repeat_byte(1), Address::repeat_byte(2), Asset::Native)
//!     .with_window(0, 100)
//!     .with_limit(U256::from(10u64));
//!
//! registry.put(SessionPolicy::from_grant(&grant)).unwrap();
//!
//! let updated = registry.commit(&grant.key(), U256::from(4u64), 50).unwrap();
//! assert_eq!(updated.limit_used, U256::from(4u64));
//! assert_eq!(updated.last_used, 50);
//! ```

use alloy_primitives::{Address, U256};
use sessiongate_core::error::{PolicyError, SessionGateError, StoreError};
use sessiongate_core::types::{PolicyKey, SessionPolicy, Timestamp};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Storage for session policies.
///
/// Implementations must be `Send + Sync`; a single registry is shared by
/// every validator and owner operation of an engine.
pub trait SessionRegistry: Send + Sync {
    /// Returns the policy stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing store fails.
    fn get(&self, key: &PolicyKey) -> Result<Option<SessionPolicy>, StoreError>;

    /// Inserts or overwrites a policy.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidWindow`], [`PolicyError::InvalidAsset`]
    /// or [`PolicyError::CeilingViolation`] before any write, and
    /// [`StoreError`] if the backing store fails.
    fn put(&self, policy: SessionPolicy) -> Result<(), SessionGateError>;

    /// Updates the usage counters of an existing policy and returns the
    /// updated record.
    ///
    /// # Errors
    ///
    /// - [`PolicyError::PolicyNotFound`] if no policy exists for `key`
    /// - [`PolicyError::CeilingViolation`] if `new_limit_used > limit_amount`
    /// - [`PolicyError::TimestampRegression`] if `new_last_used < last_used`
    /// - [`StoreError`] if the backing store fails
    ///
    /// On error the stored record is unchanged.
    fn commit(
        &self,
        key: &PolicyKey,
        new_limit_used: U256,
        new_last_used: Timestamp,
    ) -> Result<SessionPolicy, SessionGateError>;

    /// Updates the usage counters only if the stored record still equals
    /// `expected`, and returns the updated record.
    ///
    /// # Errors
    ///
    /// - [`PolicyError::PolicyNotFound`] if the record was deleted
    /// - [`PolicyError::ConcurrentUpdate`] if the record differs from `expected`
    /// - any error of [`SessionRegistry::commit`]
    ///
    /// On error the stored record is unchanged.
    fn compare_and_commit(
        &self,
        expected: &SessionPolicy,
        new_limit_used: U256,
        new_last_used: Timestamp,
    ) -> Result<SessionPolicy, SessionGateError>;

    /// Returns every policy of `account`, ordered by signer then asset.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing store fails.
    fn list(&self, account: Address) -> Result<Vec<SessionPolicy>, StoreError>;
}

impl<R: SessionRegistry + ?Sized> SessionRegistry for Arc<R> {
    fn get(&self, key: &PolicyKey) -> Result<Option<SessionPolicy>, StoreError> {
        (**self).get(key)
    }

    fn put(&self, policy: SessionPolicy) -> Result<(), SessionGateError> {
        (**self).put(policy)
    }

    fn commit(
        &self,
        key: &PolicyKey,
        new_limit_used: U256,
        new_last_used: Timestamp,
    ) -> Result<SessionPolicy, SessionGateError> {
        (**self).commit(key, new_limit_used, new_last_used)
    }

    fn compare_and_commit(
        &self,
        expected: &SessionPolicy,
        new_limit_used: U256,
        new_last_used: Timestamp,
    ) -> Result<SessionPolicy, SessionGateError> {
        (**self).compare_and_commit(expected, new_limit_used, new_last_used)
    }

    fn list(&self, account: Address) -> Result<Vec<SessionPolicy>, StoreError> {
        (**self).list(account)
    }
}

// ============================================================================
// Invariant checks shared by all backends
// ============================================================================

/// Checks a policy before it is written by `put`.
///
/// # Errors
///
/// Returns the first violated [`PolicyError`].
pub fn validate_policy(policy: &SessionPolicy) -> Result<(), PolicyError> {
    if policy.valid_after >= policy.valid_until {
        return Err(PolicyError::invalid_window(
            policy.valid_after,
            policy.valid_until,
        ));
    }
    if !policy.asset.is_valid() {
        return Err(PolicyError::InvalidAsset);
    }
    if policy.limit_used > policy.limit_amount {
        return Err(PolicyError::CeilingViolation {
            limit_used: policy.limit_used,
            limit_amount: policy.limit_amount,
        });
    }
    Ok(())
}

/// Applies a counter update to `current`, enforcing the commit invariants.
///
/// # Errors
///
/// Returns [`PolicyError::CeilingViolation`] or
/// [`PolicyError::TimestampRegression`].
pub fn apply_commit(
    current: &SessionPolicy,
    new_limit_used: U256,
    new_last_used: Timestamp,
) -> Result<SessionPolicy, PolicyError> {
    if new_limit_used > current.limit_amount {
        return Err(PolicyError::CeilingViolation {
            limit_used: new_limit_used,
            limit_amount: current.limit_amount,
        });
    }
    if new_last_used < current.last_used {
        return Err(PolicyError::TimestampRegression {
            last_used: current.last_used,
            attempted: new_last_used,
        });
    }

    let mut updated = current.clone();
    updated.limit_used = new_limit_used;
    updated.last_used = new_last_used;
    Ok(updated)
}

/// Fails with [`PolicyError::ConcurrentUpdate`] unless `current` is the
/// record the caller evaluated.
///
/// # Errors
///
/// Returns [`PolicyError::ConcurrentUpdate`] on any field difference.
pub fn ensure_unchanged(
    current: &SessionPolicy,
    expected: &SessionPolicy,
) -> Result<(), PolicyError> {
    if current == expected {
        Ok(())
    } else {
        Err(PolicyError::concurrent_update(expected.key()))
    }
}

// ============================================================================
// InMemoryRegistry
// ============================================================================

/// A registry held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    policies: RwLock<HashMap<PolicyKey, SessionPolicy>>,
}

impl InMemoryRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored policies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.read().map_or(0, |policies| policies.len())
    }

    /// Returns `true` if no policy is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock_poisoned() -> StoreError {
    StoreError::database("registry lock poisoned")
}

impl SessionRegistry for InMemoryRegistry {
    fn get(&self, key: &PolicyKey) -> Result<Option<SessionPolicy>, StoreError> {
        let policies = self.policies.read().map_err(|_| lock_poisoned())?;
        Ok(policies.get(key).cloned())
    }

    fn put(&self, policy: SessionPolicy) -> Result<(), SessionGateError> {
        validate_policy(&policy)?;
        let mut policies = self.policies.write().map_err(|_| lock_poisoned())?;
        policies.insert(policy.key(), policy);
        Ok(())
    }

    fn commit(
        &self,
        key: &PolicyKey,
        new_limit_used: U256,
        new_last_used: Timestamp,
    ) -> Result<SessionPolicy, SessionGateError> {
        let mut policies = self.policies.write().map_err(|_| lock_poisoned())?;
        let current = policies
            .get_mut(key)
            .ok_or_else(|| PolicyError::policy_not_found(*key))?;

        let updated = apply_commit(current, new_limit_used, new_last_used)?;
        *current = updated.clone();
        Ok(updated)
    }

    fn compare_and_commit(
        &self,
        expected: &SessionPolicy,
        new_limit_used: U256,
        new_last_used: Timestamp,
    ) -> Result<SessionPolicy, SessionGateError> {
        let key = expected.key();
        let mut policies = self.policies.write().map_err(|_| lock_poisoned())?;
        let current = policies
            .get_mut(&key)
            .ok_or_else(|| PolicyError::policy_not_found(key))?;

        ensure_unchanged(current, expected)?;
        let updated = apply_commit(current, new_limit_used, new_last_used)?;
        *current = updated.clone();
        Ok(updated)
    }

    fn list(&self, account: Address) -> Result<Vec<SessionPolicy>, StoreError> {
        let policies = self.policies.read().map_err(|_| lock_poisoned())?;
        let mut found: Vec<SessionPolicy> = policies
            .values()
            .filter(|policy| policy.account == account)
            .cloned()
            .collect();
        found.sort_by_key(SessionPolicy::key);
        Ok(found)
    }
}
