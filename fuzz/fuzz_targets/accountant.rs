//! Fuzz target for spend accounting.
//!
//! Drives a policy through an arbitrary sequence of requests and checks the
//! accounting invariants after every step.
//!
//! # Running
//!
//! ```bash
//! cargo +nightly fuzz run accountant
//! ```

#![no_main]

use alloy_primitives::{Address, U256};
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sessiongate_core::types::{Asset, DenialReason, PolicyGrant, SessionPolicy};
use sessiongate_policy::accountant::{evaluate, headroom, status, Evaluation};

/// One authorization attempt.
#[derive(Debug, Arbitrary)]
struct Step {
    /// Seconds to advance the clock by.
    advance: u32,
    /// Requested amount.
    amount: u128,
}

/// A policy and the attempts made against it.
#[derive(Debug, Arbitrary)]
struct AccountantInput {
    start: u32,
    valid_after: u32,
    valid_until: u32,
    limit: u128,
    refresh_interval: u32,
    steps: Vec<Step>,
}

fuzz_target!(|input: AccountantInput| {
    let grant = PolicyGrant::new(Address::repeat_byte(1), Address::repeat_byte(2), Asset::Native)
        .with_window(u64::from(input.valid_after), u64::from(input.valid_until))
        .with_limit(U256::from(input.limit))
        .with_refresh_interval(u64::from(input.refresh_interval));
    if grant.validate().is_err() {
        return;
    }
    let mut policy = SessionPolicy::from_grant(&grant);
    let mut now = u64::from(input.start);

    for step in input.steps.iter().take(64) {
        now = now.saturating_add(u64::from(step.advance));
        let requested = U256::from(step.amount);
        let before = headroom(&policy, now);
        let _ = status(&policy, now);

        match evaluate(&policy, now, requested) {
            Evaluation::Admit {
                new_limit_used,
                new_last_used,
            } => {
                assert!(requested <= before, "admitted more than the headroom");
                assert!(new_limit_used <= policy.limit_amount, "ceiling exceeded");
                assert_eq!(new_last_used, now);
                policy.limit_used = new_limit_used;
                policy.last_used = new_last_used;
            }
            Evaluation::Deny(DenialReason::LimitExceeded { available, .. }) => {
                assert!(requested > available);
                assert_eq!(available, before);
            }
            Evaluation::Deny(_) => {
                assert_eq!(before, U256::ZERO, "denied inside the window");
            }
        }
    }
});
