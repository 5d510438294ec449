//! Per-token FIFO queues of acquired balance.
//!
//! Consumption order is queue order (oldest position first), NOT timestamp
//! order: a swap may append entries whose inherited `original_timestamp` is
//! older than entries already present. Expiry pruning therefore has to
//! filter every position, never just the front.

use serde::{Deserialize, Serialize};

use sentra_core::types::{Timestamp, U256};

// ── AcquiredEntry ────────────────────────────────────────────────────────────

/// One atom of previously-acquired balance, tagged with the timestamp of
/// its original (non-acquired) acquisition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquiredEntry {
    pub amount: U256,
    pub original_timestamp: Timestamp,
}

// ── Consumption ──────────────────────────────────────────────────────────────

/// Outcome of a queue consumption. An unfulfilled `remainder` is not an
/// error: it means that part of the input was paid from non-acquired
/// (original) funds.
#[derive(Clone, Debug, Default)]
pub struct Consumption {
    /// Entries consumed, each preserving its original timestamp.
    pub consumed: Vec<AcquiredEntry>,
    pub remainder: U256,
}

impl Consumption {
    pub fn total(&self) -> U256 {
        self.consumed.iter().fold(U256::zero(), |acc, e| acc + e.amount)
    }

    /// Oldest original timestamp among the consumed entries.
    pub fn oldest_timestamp(&self) -> Option<Timestamp> {
        self.consumed.iter().map(|e| e.original_timestamp).min()
    }
}

// ── AcquiredQueue ────────────────────────────────────────────────────────────

/// FIFO with logical start cursor: consumed entries are retired by
/// advancing `start`, partial consumption decrements the head in place, and
/// pruning compacts with a full filter pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquiredQueue {
    entries: Vec<AcquiredEntry>,
    start: usize,
}

impl AcquiredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry; zero amounts are dropped.
    pub fn push_back(&mut self, entry: AcquiredEntry) {
        if !entry.amount.is_zero() {
            self.entries.push(entry);
        }
    }

    /// Consume up to `amount` from the head of the queue.
    ///
    /// Heads whose `original_timestamp < event_ts − window` are dropped
    /// without being consumed — they were already expired at event time and
    /// never count as acquired. Partial consumption decrements the head in
    /// place so the rest stays available.
    pub fn consume(&mut self, amount: U256, event_ts: Timestamp, window: i64) -> Consumption {
        let cutoff = event_ts - window;
        let mut remaining = amount;
        let mut consumed = Vec::new();

        while !remaining.is_zero() && self.start < self.entries.len() {
            let head = self.entries[self.start];
            if head.original_timestamp < cutoff {
                self.start += 1;
                continue;
            }
            let take = head.amount.min(remaining);
            if take == head.amount {
                self.start += 1;
            } else {
                self.entries[self.start].amount -= take;
            }
            consumed.push(AcquiredEntry { amount: take, original_timestamp: head.original_timestamp });
            remaining -= take;
        }

        Consumption { consumed, remainder: remaining }
    }

    /// Remove every entry — at any position — whose timestamp has fallen
    /// out of the window. Compacts the backing vector.
    pub fn prune_expired(&mut self, now: Timestamp, window: i64) {
        let cutoff = now - window;
        let live: Vec<AcquiredEntry> = self.entries[self.start..]
            .iter()
            .filter(|e| e.original_timestamp >= cutoff)
            .copied()
            .collect();
        self.entries = live;
        self.start = 0;
    }

    /// Sum of entries not yet consumed (no expiry filter — call
    /// [`Self::prune_expired`] first when a windowed total is wanted).
    pub fn total(&self) -> U256 {
        self.entries[self.start..]
            .iter()
            .fold(U256::zero(), |acc, e| acc + e.amount)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.entries.len()
    }

    /// Live entries in queue order.
    pub fn iter(&self) -> impl Iterator<Item = &AcquiredEntry> {
        self.entries[self.start..].iter()
    }
}
