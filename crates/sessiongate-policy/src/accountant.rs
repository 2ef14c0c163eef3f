//! Spend accounting for session policies.
//!
//! Everything in this module is a pure function of a [`SessionPolicy`] and
//! the caller-supplied `now`. Nothing here reads a clock or touches storage.
//!
//! # Evaluation Order
//!
//! 1. `now < valid_after` - deny, not yet valid
//! 2. `now >= valid_until` - deny, expired
//! 3. The period has refreshed if `refresh_interval != 0` and
//!    `now > last_used + refresh_interval`
//! 4. Headroom is the full `limit_amount` after a refresh, otherwise
//!    `limit_amount - limit_used`
//! 5. `requested > headroom` - deny, limit exceeded
//! 6. Admit, with `limit_used` reset to `requested` after a refresh or
//!    increased by `requested` otherwise, and `last_used = now`
//!
//! A zero-amount request inside the window is admitted and still moves
//! `last_used` forward.
//!
//! # Example
//!
//! ```
//! use sessiongate_policy::accountant::{evaluate, Evaluation};
//! use sessiongate_core::types::{Asset, PolicyGrant, SessionPolicy};
//! use alloy_primitives::{Address, U256};
//!
//! let policy = SessionPolicy::from_grant(
//!     &PolicyGrant::new(Address::repeat_byte(1), Address::repeat_byte(2), Asset::Native)
//!         .with_window(0, 1_000)
//!         .with_limit(U256::from(100u64)),
//! );
//!
//! match evaluate(&policy, 10, U256::from(60u64)) {
//!     Evaluation::Admit { new_limit_used, new_last_used } => {
//!         assert_eq!(new_limit_used, U256::from(60u64));
//!         assert_eq!(new_last_used, 10);
//!     }
//!     Evaluation::Deny(reason) => panic!("unexpected denial: {reason}"),
//! }
//! ```

use alloy_primitives::U256;
use sessiongate_core::types::{DenialReason, PolicyStatus, SessionPolicy, Timestamp};

/// Outcome of evaluating a requested amount against a policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// The amount fits. These are the counters to commit.
    Admit {
        /// `limit_used` after the transfer.
        new_limit_used: U256,
        /// `last_used` after the transfer.
        new_last_used: Timestamp,
    },
    /// The amount does not fit, or the policy is outside its window.
    Deny(DenialReason),
}

impl Evaluation {
    /// Returns `true` if the amount was admitted.
    #[must_use]
    pub const fn is_admit(&self) -> bool {
        matches!(self, Self::Admit { .. })
    }
}

/// Returns `true` if the policy window is open at `now`.
#[must_use]
pub const fn in_window(policy: &SessionPolicy, now: Timestamp) -> bool {
    now >= policy.valid_after && now < policy.valid_until
}

/// Returns `true` if the refresh period has elapsed since the last transfer.
#[must_use]
pub const fn is_refreshed(policy: &SessionPolicy, now: Timestamp) -> bool {
    policy.refresh_interval != 0 && now > policy.last_used.saturating_add(policy.refresh_interval)
}

/// Headroom ignoring the window.
fn available(policy: &SessionPolicy, refreshed: bool) -> U256 {
    if refreshed {
        policy.limit_amount
    } else {
        policy.limit_amount.saturating_sub(policy.limit_used)
    }
}

/// Evaluates a request for `requested` units at `now`.
#[must_use]
pub fn evaluate(policy: &SessionPolicy, now: Timestamp, requested: U256) -> Evaluation {
    if now < policy.valid_after {
        return Evaluation::Deny(DenialReason::NotYetValid {
            valid_after: policy.valid_after,
            now,
        });
    }
    if now >= policy.valid_until {
        return Evaluation::Deny(DenialReason::Expired {
            valid_until: policy.valid_until,
            now,
        });
    }

    let refreshed = is_refreshed(policy, now);
    let available = available(policy, refreshed);

    if requested > available {
        return Evaluation::Deny(DenialReason::LimitExceeded {
            requested,
            available,
        });
    }

    // requested <= available <= limit_amount - limit_used, so the sum cannot overflow.
    let new_limit_used = if refreshed {
        requested
    } else {
        policy.limit_used.saturating_add(requested)
    };

    Evaluation::Admit {
        new_limit_used,
        new_last_used: now,
    }
}

/// Returns the amount spendable at `now`, or zero outside the window.
#[must_use]
pub fn headroom(policy: &SessionPolicy, now: Timestamp) -> U256 {
    if in_window(policy, now) {
        available(policy, is_refreshed(policy, now))
    } else {
        U256::ZERO
    }
}

/// Computes the logical status of a policy at `now`.
///
/// A revoked policy reports [`PolicyStatus::Revoked`] regardless of its window.
#[must_use]
pub fn status(policy: &SessionPolicy, now: Timestamp) -> PolicyStatus {
    if policy.is_revoked() {
        return PolicyStatus::Revoked;
    }
    if now < policy.valid_after {
        return PolicyStatus::Pending;
    }
    if now >= policy.valid_until {
        return PolicyStatus::Expired;
    }

    let headroom = headroom(policy, now);
    if headroom == U256::ZERO {
        PolicyStatus::Exhausted
    } else {
        PolicyStatus::Active { headroom }
    }
}
