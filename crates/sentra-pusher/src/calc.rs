//! Allowance arithmetic and the update-threshold policy.

use std::collections::BTreeMap;

use sentra_core::error::SentraError;
use sentra_core::types::{mul_div, Address, Timestamp, U256};

use sentra_core::constants::BPS_DENOMINATOR;

/// `max(safe_value × max_bps / 10 000 − rolling_spend, 0)`.
pub fn compute_allowance(safe_value: U256, max_spending_bps: u64, rolling_spend: U256) -> U256 {
    let budget = mul_div(safe_value, U256::from(max_spending_bps), U256::from(BPS_DENOMINATOR));
    budget.saturating_sub(rolling_spend)
}

/// Reject any allowance above `safe_value × absolute_max_bps / 10 000`.
pub fn ensure_within_absolute_cap(
    requested: U256,
    safe_value: U256,
    absolute_max_bps: u64,
) -> Result<(), SentraError> {
    let maximum = mul_div(safe_value, U256::from(absolute_max_bps), U256::from(BPS_DENOMINATOR));
    if requested > maximum {
        return Err(SentraError::ExceedsAbsoluteMaxSpending { requested, maximum });
    }
    Ok(())
}

// ── Update policy ────────────────────────────────────────────────────────────

/// Why a sub-account's on-chain state is worth a transaction this cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateReason {
    /// Some acquired-balance slot differs from the substrate's value.
    BalanceDrift,
    /// Any decrease is pushed immediately.
    AllowanceDecrease,
    /// An increase beyond the significance threshold (increases from zero
    /// always count).
    SignificantIncrease,
    /// Nothing changed enough, but the last confirmed update is too old.
    Refresh,
}

/// Apply the update-threshold policy. `desired_balances` must already
/// include zero entries for stale on-chain tokens.
pub fn decide_update(
    new_allowance: U256,
    on_chain_allowance: U256,
    desired_balances: &BTreeMap<Address, U256>,
    on_chain_balances: &BTreeMap<Address, U256>,
    last_update: Option<Timestamp>,
    now: Timestamp,
    increase_threshold_bps: u64,
    max_staleness_seconds: i64,
) -> Option<UpdateReason> {
    // Compare only non-zero slots on both sides: a token absent from one
    // map and zero in the other is the same state.
    let differs = desired_balances
        .iter()
        .any(|(t, v)| on_chain_balances.get(t).copied().unwrap_or_default() != *v)
        || on_chain_balances
            .iter()
            .any(|(t, v)| !v.is_zero() && !desired_balances.contains_key(t));
    if differs {
        return Some(UpdateReason::BalanceDrift);
    }

    if new_allowance < on_chain_allowance {
        return Some(UpdateReason::AllowanceDecrease);
    }
    if new_allowance > on_chain_allowance {
        if on_chain_allowance.is_zero() {
            return Some(UpdateReason::SignificantIncrease);
        }
        let threshold = mul_div(
            on_chain_allowance,
            U256::from(increase_threshold_bps),
            U256::from(BPS_DENOMINATOR),
        );
        if new_allowance - on_chain_allowance > threshold {
            return Some(UpdateReason::SignificantIncrease);
        }
    }

    match last_update {
        Some(ts) if now - ts <= max_staleness_seconds => None,
        _ => Some(UpdateReason::Refresh),
    }
}
