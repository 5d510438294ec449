//! The chain-event model.
//!
//! Events are ingested from the enforcement substrate (directly or via the
//! GraphQL indexer), persisted append-only in the ledger store keyed by
//! `(tx_hash, log_index)`, and replayed chronologically by the rebuilder.

use serde::{Deserialize, Serialize};

use crate::types::{Address, BlockNumber, Nonce, RecipientHash, Timestamp, TxHash, U256};

// ── EventKey ─────────────────────────────────────────────────────────────────

/// The idempotence key for stored events. Re-ingesting the same key is a
/// no-op, which makes reorg replay safe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventKey {
    pub tx_hash: TxHash,
    pub log_index: u32,
}

// ── OpType ───────────────────────────────────────────────────────────────────

/// Protocol operation classes recognized by the calldata parsers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpType {
    Swap,
    Deposit,
    Withdraw,
    Claim,
    /// Guard-only approval; never touches queues or spending.
    Approve,
}

// ── Event payloads ───────────────────────────────────────────────────────────

/// A protocol execution observed on the DeFi interactor.
///
/// `tokens_in[i]` pairs with `amounts_in[i]` and `tokens_out[j]` with
/// `amounts_out[j]`; an event whose arrays are out of step is malformed and
/// must be skipped with a log line, never silently ingested.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolExecution {
    pub sub_account: Address,
    pub target: Address,
    pub op_type: OpType,
    pub tokens_in: Vec<Address>,
    pub amounts_in: Vec<U256>,
    pub tokens_out: Vec<Address>,
    pub amounts_out: Vec<U256>,
    /// USD cost charged against the spending allowance, 18-dec fixed point.
    pub spending_cost: U256,
}

impl ProtocolExecution {
    /// Array-length agreement check. A `false` here is an integrity error.
    pub fn arrays_consistent(&self) -> bool {
        self.tokens_in.len() == self.amounts_in.len()
            && self.tokens_out.len() == self.amounts_out.len()
    }
}

/// A direct token transfer executed by a sub-account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferExecuted {
    pub sub_account: Address,
    pub token: Address,
    pub recipient: Address,
    pub amount: U256,
    pub spending_cost: U256,
}

/// Emitted by the Spend Authorizer exactly once per successful
/// `authorize_spend`; the durable ground truth for downstream execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendAuthorized {
    pub avatar: Address,
    pub eoa: Address,
    pub amount: U256,
    pub recipient_hash: RecipientHash,
    pub transfer_type: u8,
    pub nonce: Nonce,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    ProtocolExecution(ProtocolExecution),
    TransferExecuted(TransferExecuted),
    SpendAuthorized(SpendAuthorized),
    SafeValueUpdated {
        total_value_usd: U256,
        update_count: u64,
    },
    SpendingAllowanceUpdated {
        sub_account: Address,
        new_allowance: U256,
    },
    AcquiredBalanceUpdated {
        sub_account: Address,
        token: Address,
        new_balance: U256,
    },
}

// ── ChainEvent ───────────────────────────────────────────────────────────────

/// A single event as stored and replayed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEvent {
    pub key: EventKey,
    pub block_number: BlockNumber,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl ChainEvent {
    /// The sub-account this event belongs to, when it has one.
    pub fn sub_account(&self) -> Option<Address> {
        match &self.payload {
            EventPayload::ProtocolExecution(p) => Some(p.sub_account),
            EventPayload::TransferExecuted(t) => Some(t.sub_account),
            EventPayload::SpendAuthorized(s) => Some(s.eoa),
            EventPayload::SpendingAllowanceUpdated { sub_account, .. }
            | EventPayload::AcquiredBalanceUpdated { sub_account, .. } => Some(*sub_account),
            EventPayload::SafeValueUpdated { .. } => None,
        }
    }

    /// Chronological sort key: `(timestamp, block_number, log_index)`,
    /// ties broken lexicographically as listed. This ordering governs every
    /// queue mutation in the rebuilder.
    pub fn sort_key(&self) -> (Timestamp, BlockNumber, u32) {
        (self.timestamp, self.block_number, self.key.log_index)
    }
}

/// Sort events into canonical replay order.
pub fn sort_chronological(events: &mut [ChainEvent]) {
    events.sort_by_key(|e| e.sort_key());
}
