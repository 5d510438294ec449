//! ─── Sentra Protocol Constants ──────────────────────────────────────────────
//!
//! Fixed quantities shared by the authorizer, rebuilder and pusher. Tunable
//! runtime options live in [`crate::config`]; only values that are part of
//! the accounting semantics themselves belong here.

use primitive_types::U256;

// ── Fixed-point arithmetic ───────────────────────────────────────────────────

/// 18-decimal fixed-point scale for USD values and ratio arithmetic.
pub const PRECISION_EXP: u32 = 18;

/// `10^18` as a `U256`, the ratio denominator used throughout the rebuilder.
pub fn precision() -> U256 {
    U256::from(10u64).pow(U256::from(PRECISION_EXP))
}

/// Basis-point denominator (100% = 10 000 bps).
pub const BPS_DENOMINATOR: u64 = 10_000;

// ── Spend Authorizer ─────────────────────────────────────────────────────────

/// Rolling window over which per-EOA spending is capped (24 hours).
pub const WINDOW_DURATION_SECS: i64 = 86_400;

/// Hard cap on live spend records per EOA; pruning advances a start cursor,
/// never removes records in place.
pub const MAX_RECORDS_PER_EOA: usize = 200;

// ── Rebuilder ────────────────────────────────────────────────────────────────

/// Lookback multiplier over the rolling window. Two windows are required to
/// observe acquisitions whose original timestamp is outside the current
/// window but whose inherited descendants are inside it.
pub const LOOKBACK_WINDOWS: i64 = 2;

// ── Pusher ───────────────────────────────────────────────────────────────────

/// Default allowance-increase significance threshold (2%).
pub const DEFAULT_INCREASE_THRESHOLD_BPS: u64 = 200;

/// Default absolute spending ceiling (20% of safe value).
pub const DEFAULT_ABSOLUTE_MAX_BPS: u64 = 2_000;

// ── Event source ─────────────────────────────────────────────────────────────

/// Finalized-block confirmation depth subtracted from the tip.
pub const DEFAULT_CONFIRMATION_BLOCKS: u64 = 60;

/// Endpoint failure count that triggers rotation to the next fallback.
pub const MAX_ENDPOINT_FAILURES: u32 = 3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precision_is_ten_to_the_eighteenth() {
        assert_eq!(precision(), U256::from(1_000_000_000_000_000_000u128));
    }
}
