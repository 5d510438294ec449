//! The rebuilder's per-sub-account output.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use sentra_core::types::{Address, Timestamp, U256};

use crate::deposit::DepositRecord;
use crate::queue::AcquiredQueue;

/// One spending event inside the rolling window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendingEntry {
    pub timestamp: Timestamp,
    pub cost: U256,
}

/// Reconstructed accounting state for one sub-account at a reference time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubAccountState {
    pub sub_account: Address,
    /// Sum of `spending_cost` across protocol + transfer events whose
    /// timestamp is inside `[now − window, now]`.
    pub total_spending_in_window: U256,
    /// Non-expired acquired balance per token, keyed by the token's
    /// lowercase hex form.
    pub acquired_balances: HashMap<String, U256>,
    /// Live deposit records in creation (chronological) order.
    pub deposit_records: Vec<DepositRecord>,
    /// The queues themselves, kept for re-entrant updates within a cycle.
    pub queues: HashMap<Address, AcquiredQueue>,
    pub spending_entries: Vec<SpendingEntry>,
}

impl SubAccountState {
    pub fn new(sub_account: Address) -> Self {
        Self {
            sub_account,
            total_spending_in_window: U256::zero(),
            acquired_balances: HashMap::new(),
            deposit_records: Vec::new(),
            queues: HashMap::new(),
            spending_entries: Vec::new(),
        }
    }

    pub fn queue_mut(&mut self, token: Address) -> &mut AcquiredQueue {
        self.queues.entry(token).or_default()
    }

    /// Acquired balance for a token, zero when untracked.
    pub fn acquired_balance(&self, token: &Address) -> U256 {
        self.acquired_balances.get(&token.to_hex()).copied().unwrap_or_default()
    }
}
