//! The vault's companion time-delay queue.
//!
//! Operations pass through `Unset → Pending → (ready once the delay
//! elapses) → Executed | Cancelled`. Readiness is derived from
//! `scheduled_at + min_delay`, not stored. The queue here models the
//! collaborator's state machine so schedules can be validated and tracked;
//! actual execution happens in the external vault.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use sentra_core::error::SentraError;
use sentra_core::types::{keccak256, Address, Timestamp, H256, U256};

// ── Operation identity ───────────────────────────────────────────────────────

/// `keccak256(to ‖ value ‖ data ‖ salt)` — the vault's operation key.
pub fn operation_id(to: &Address, value: U256, data: &[u8], salt: &[u8; 32]) -> H256 {
    let mut buf = Vec::with_capacity(20 + 32 + data.len() + 32);
    buf.extend_from_slice(to.as_bytes());
    let mut value_bytes = [0u8; 32];
    value.to_big_endian(&mut value_bytes);
    buf.extend_from_slice(&value_bytes);
    buf.extend_from_slice(data);
    buf.extend_from_slice(salt);
    H256(keccak256(&buf))
}

// ── Status ───────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    Pending,
    Executed { executed_at: Timestamp },
    Cancelled { cancelled_at: Timestamp },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledOperation {
    pub id: H256,
    pub to: Address,
    pub value: U256,
    pub data: Vec<u8>,
    pub usd_amount: U256,
    pub scheduled_at: Timestamp,
    pub status: OperationStatus,
}

impl ScheduledOperation {
    /// Pending and past its delay.
    pub fn is_ready(&self, min_delay: i64, now: Timestamp) -> bool {
        self.status == OperationStatus::Pending && now >= self.scheduled_at + min_delay
    }
}

// ── TimelockQueue ────────────────────────────────────────────────────────────

pub struct TimelockQueue {
    operations: HashMap<H256, ScheduledOperation>,
    min_delay: i64,
    /// Movements below this USD value do not belong in the queue at all.
    timelock_threshold_usd: U256,
}

impl TimelockQueue {
    pub fn new(min_delay: i64, timelock_threshold_usd: U256) -> Self {
        Self { operations: HashMap::new(), min_delay, timelock_threshold_usd }
    }

    pub fn get(&self, id: &H256) -> Option<&ScheduledOperation> {
        self.operations.get(id)
    }

    /// Schedule an operation. Rejects sub-threshold amounts and duplicate
    /// `(to, value, data, salt)` tuples.
    pub fn schedule(
        &mut self,
        to: Address,
        value: U256,
        data: Vec<u8>,
        usd_amount: U256,
        salt: [u8; 32],
        now: Timestamp,
    ) -> Result<H256, SentraError> {
        if usd_amount < self.timelock_threshold_usd {
            return Err(SentraError::BelowTimelockThreshold);
        }
        let id = operation_id(&to, value, &data, &salt);
        if self.operations.contains_key(&id) {
            return Err(SentraError::OperationAlreadyScheduled(format!("{id:#x}")));
        }
        self.operations.insert(
            id,
            ScheduledOperation {
                id,
                to,
                value,
                data,
                usd_amount,
                scheduled_at: now,
                status: OperationStatus::Pending,
            },
        );
        Ok(id)
    }

    /// Mark an operation executed. Permitted only once the delay elapsed.
    pub fn execute(&mut self, id: &H256, now: Timestamp) -> Result<&ScheduledOperation, SentraError> {
        let op = self
            .operations
            .get_mut(id)
            .ok_or_else(|| SentraError::OperationNotFound(format!("{id:#x}")))?;
        match op.status {
            OperationStatus::Pending => {}
            _ => return Err(SentraError::OperationNotPending),
        }
        let ready_at = op.scheduled_at + self.min_delay;
        if now < ready_at {
            return Err(SentraError::OperationNotReady { ready_at });
        }
        op.status = OperationStatus::Executed { executed_at: now };
        Ok(op)
    }

    /// Cancel a pending operation.
    pub fn cancel(&mut self, id: &H256, now: Timestamp) -> Result<(), SentraError> {
        let op = self
            .operations
            .get_mut(id)
            .ok_or_else(|| SentraError::OperationNotFound(format!("{id:#x}")))?;
        match op.status {
            OperationStatus::Pending => {
                op.status = OperationStatus::Cancelled { cancelled_at: now };
                Ok(())
            }
            _ => Err(SentraError::OperationNotPending),
        }
    }

    /// Pending operations whose delay has elapsed.
    pub fn ready_operations(&self, now: Timestamp) -> Vec<&ScheduledOperation> {
        let mut ready: Vec<_> = self
            .operations
            .values()
            .filter(|op| op.is_ready(self.min_delay, now))
            .collect();
        ready.sort_by_key(|op| op.scheduled_at);
        ready
    }
}
