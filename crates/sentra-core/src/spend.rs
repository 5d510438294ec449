//! Per-EOA spend-authorization state.
//!
//! These are the records the Spend Authorizer mutates and the ledger store
//! persists. The spend-record list is append-only; expired records are
//! retired by advancing `start_index`, never by removal, so the list stays
//! cheap to prune and the invariant `start_index ≤ len` is trivial to audit.

use serde::{Deserialize, Serialize};

use crate::types::{Address, Nonce, RecipientHash, Timestamp, U256};

// ── SpendRecord ──────────────────────────────────────────────────────────────

/// One authorized spend, packed compactly. Amounts fit 128 bits because a
/// single authorization is bounded by the daily limit check before append.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendRecord {
    pub amount: u128,
    pub timestamp: Timestamp,
}

// ── EoaRecord ────────────────────────────────────────────────────────────────

/// Full per-EOA state as stored: limits, policy bitmap, and the rolling
/// spend-record list with its logical start cursor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EoaRecord {
    pub address: Address,
    /// USD, 18-decimal fixed point. Always > 0 while registered.
    pub daily_limit: U256,
    /// Bitmap over transfer-type bit positions 0..=7.
    pub allowed_types: u8,
    pub registered: bool,
    /// Append-only; `records[start_index..]` are the candidates still inside
    /// (or recently fallen out of) the rolling window.
    pub records: Vec<SpendRecord>,
    pub start_index: usize,
}

impl EoaRecord {
    pub fn new(address: Address, daily_limit: U256, allowed_types: u8) -> Self {
        Self {
            address,
            daily_limit,
            allowed_types,
            registered: true,
            records: Vec::new(),
            start_index: 0,
        }
    }

    /// Records not yet retired by the start cursor.
    pub fn live_count(&self) -> usize {
        self.records.len() - self.start_index
    }

    /// Sum of record amounts inside `[now - window, now]`.
    ///
    /// Walks backward from the tail and stops at the first out-of-window
    /// record: appends are monotonic in time, so everything earlier is out
    /// of window too. Cost is O(in-window records).
    pub fn rolling_spend(&self, now: Timestamp, window: i64) -> U256 {
        let cutoff = now - window;
        let mut total = U256::zero();
        for rec in self.records[self.start_index..].iter().rev() {
            if rec.timestamp < cutoff {
                break;
            }
            total += U256::from(rec.amount);
        }
        total
    }

    /// Advance `start_index` past records older than `now - window`.
    pub fn prune_expired(&mut self, now: Timestamp, window: i64) {
        let cutoff = now - window;
        while self.start_index < self.records.len()
            && self.records[self.start_index].timestamp < cutoff
        {
            self.start_index += 1;
        }
    }

    /// Revocation clears fields but keeps the (stale) record history; a
    /// re-registered EOA must not assume a clean slate.
    pub fn revoke(&mut self) {
        self.registered = false;
        self.daily_limit = U256::zero();
        self.allowed_types = 0;
    }
}

// ── AuthorizationRecord ──────────────────────────────────────────────────────

/// The durable outcome of a successful `authorize_spend`. Emitted exactly
/// once; nonces are strictly monotonic and never reused.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRecord {
    pub avatar: Address,
    pub eoa: Address,
    pub amount: U256,
    pub recipient_hash: RecipientHash,
    pub transfer_type: u8,
    pub nonce: Nonce,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eoa_with(records: Vec<SpendRecord>, start: usize) -> EoaRecord {
        let mut e = EoaRecord::new(Address::ZERO, U256::from(1u64), 1);
        e.records = records;
        e.start_index = start;
        e
    }

    #[test]
    fn rolling_spend_stops_at_first_out_of_window_record() {
        let e = eoa_with(
            vec![
                SpendRecord { amount: 100, timestamp: 0 },
                SpendRecord { amount: 10, timestamp: 50_000 },
                SpendRecord { amount: 1, timestamp: 90_000 },
            ],
            0,
        );
        // Window covers [13_600, 100_000]; the first record is out.
        assert_eq!(e.rolling_spend(100_000, 86_400), U256::from(11u64));
    }

    #[test]
    fn prune_advances_cursor_only() {
        let mut e = eoa_with(
            vec![
                SpendRecord { amount: 1, timestamp: 0 },
                SpendRecord { amount: 2, timestamp: 1 },
                SpendRecord { amount: 3, timestamp: 99_999 },
            ],
            0,
        );
        e.prune_expired(100_000, 86_400);
        assert_eq!(e.start_index, 2);
        assert_eq!(e.records.len(), 3, "records are never removed in place");
        assert_eq!(e.live_count(), 1);
    }

    #[test]
    fn revoke_zeroes_fields_and_keeps_history() {
        let mut e = eoa_with(vec![SpendRecord { amount: 5, timestamp: 10 }], 0);
        e.revoke();
        assert!(!e.registered);
        assert_eq!(e.daily_limit, U256::zero());
        assert_eq!(e.allowed_types, 0);
        assert_eq!(e.records.len(), 1);
    }
}
