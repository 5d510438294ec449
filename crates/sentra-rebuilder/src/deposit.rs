//! Deposit records.
//!
//! Every protocol deposit leaves one or more records linking its input
//! token/amount to its output token/amount, so a later withdraw or claim of
//! the same token from the same target can be matched back to the deposit
//! that funded it and inherit that deposit's acquisition timestamp.

use serde::{Deserialize, Serialize};

use sentra_core::types::{Address, Timestamp, U256};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRecord {
    pub sub_account: Address,
    /// The protocol the deposit went into.
    pub target: Address,
    pub token_in: Address,
    pub amount_in: U256,
    pub token_out: Address,
    pub amount_out: U256,
    /// Input not yet matched by a withdraw/claim. `≤ amount_in`.
    pub remaining_amount: U256,
    /// Output (e.g. the aToken minted at deposit) not yet consumed back out
    /// of its queue. `≤ amount_out`. May shrink slower than the input side
    /// when queue entries expired before the withdraw.
    pub remaining_output_amount: U256,
    /// Inherited from acquired inputs, or the deposit's own event time when
    /// paid from non-acquired funds.
    pub original_acquisition_timestamp: Timestamp,
}

impl DepositRecord {
    /// True while a withdraw can still match against this record.
    pub fn is_open(&self) -> bool {
        !self.remaining_amount.is_zero()
    }

    /// Basic shape invariant; violated only by a construction bug.
    pub fn well_formed(&self) -> bool {
        self.remaining_amount <= self.amount_in && self.remaining_output_amount <= self.amount_out
    }
}
