//! Batched, pipelined submission of state updates.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use sentra_core::config::CoreConfig;
use sentra_core::error::SentraError;
use sentra_core::types::{Address, Timestamp, U256};
use sentra_rebuilder::SubAccountState;
use sentra_store::LedgerDb;

use crate::calc::{compute_allowance, decide_update, ensure_within_absolute_cap, UpdateReason};

// ── Client interface ─────────────────────────────────────────────────────────

/// Opaque handle for one in-flight submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubmissionId(pub u64);

/// One `batch_update(sub, allowance, tokens[], balances[])` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchUpdate {
    pub sub_account: Address,
    pub new_allowance: U256,
    pub tokens: Vec<Address>,
    pub balances: Vec<U256>,
}

/// The enforcement-substrate surface the pusher reads and writes.
///
/// `submit_batch_update` must return as soon as the transaction is accepted
/// into the mempool — confirmation is awaited separately and in bulk, which
/// is what allows submissions to pipeline with contiguous sequence numbers.
#[allow(async_fn_in_trait)]
pub trait EnforcementClient: Send + Sync {
    async fn spending_allowance(&self, sub: Address) -> Result<U256, SentraError>;
    async fn acquired_balances(&self, sub: Address) -> Result<Vec<(Address, U256)>, SentraError>;
    async fn submit_batch_update(
        &self,
        sequence: u64,
        update: &BatchUpdate,
    ) -> Result<SubmissionId, SentraError>;
    async fn await_confirmation(&self, id: SubmissionId) -> Result<(), SentraError>;
}

// ── Summary ──────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PushSummary {
    pub submitted: usize,
    pub confirmed: usize,
    pub failed: usize,
    pub skipped: usize,
}

// ── AllowancePusher ──────────────────────────────────────────────────────────

pub struct AllowancePusher<C: EnforcementClient> {
    client: Arc<C>,
    db: Arc<LedgerDb>,
    cfg: CoreConfig,
    /// Module identity used for the `last_update_timestamp` key.
    module: String,
    /// Per-module spending budget in bps of safe value.
    max_spending_bps: u64,
    /// Next transaction sequence number; contiguous across one cycle's
    /// pipelined submissions.
    sequence: u64,
}

impl<C: EnforcementClient> AllowancePusher<C> {
    pub fn new(
        client: Arc<C>,
        db: Arc<LedgerDb>,
        cfg: CoreConfig,
        module: impl Into<String>,
        max_spending_bps: u64,
    ) -> Self {
        Self { client, db, cfg, module: module.into(), max_spending_bps, sequence: 0 }
    }

    /// Plan and push updates for every rebuilt sub-account.
    ///
    /// Submissions are issued without waiting for confirmation, then
    /// awaited together at the end. A failed wait leaves that sub-account's
    /// `last_update_timestamp` unadvanced so the next cycle re-attempts.
    pub async fn run_cycle(
        &mut self,
        rebuilt: &[SubAccountState],
        safe_value: U256,
        safe_value_updated_at: Timestamp,
        now: Timestamp,
    ) -> Result<PushSummary, SentraError> {
        if now - safe_value_updated_at > self.cfg.max_safe_value_age_seconds {
            return Err(SentraError::StalePortfolioValue { updated_at: safe_value_updated_at });
        }

        let mut summary = PushSummary::default();
        let mut in_flight: Vec<(Address, SubmissionId)> = Vec::new();

        for state in rebuilt {
            let sub = state.sub_account;
            let new_allowance =
                compute_allowance(safe_value, self.max_spending_bps, state.total_spending_in_window);
            if let Err(e) =
                ensure_within_absolute_cap(new_allowance, safe_value, self.cfg.absolute_max_spending_bps)
            {
                warn!(sub = %sub, error = %e, "allowance above absolute cap; sub-account skipped");
                summary.skipped += 1;
                continue;
            }

            let on_chain_allowance = self.client.spending_allowance(sub).await?;
            let on_chain: BTreeMap<Address, U256> =
                self.client.acquired_balances(sub).await?.into_iter().collect();
            let desired = desired_balances(state, &on_chain);

            let last = self.db.last_update_timestamp(&self.module, &sub)?;
            let reason = decide_update(
                new_allowance,
                on_chain_allowance,
                &desired,
                &on_chain,
                last,
                now,
                self.cfg.allowance_increase_threshold_bps,
                self.cfg.max_staleness_seconds,
            );
            let Some(reason) = reason else {
                debug!(sub = %sub, "no update needed");
                summary.skipped += 1;
                continue;
            };

            let (tokens, balances): (Vec<Address>, Vec<U256>) = desired.into_iter().unzip();
            let update = BatchUpdate { sub_account: sub, new_allowance, tokens, balances };

            let sequence = self.sequence;
            self.sequence += 1;
            let id = self.client.submit_batch_update(sequence, &update).await?;
            info!(sub = %sub, sequence, reason = ?reason, allowance = %new_allowance, "batch update submitted");
            summary.submitted += 1;
            in_flight.push((sub, id));
        }

        // Bulk confirmation wait.
        let waits = in_flight.iter().map(|(_, id)| self.client.await_confirmation(*id));
        let results = join_all(waits).await;
        for ((sub, id), result) in in_flight.into_iter().zip(results) {
            match result {
                Ok(()) => {
                    self.db.set_last_update_timestamp(&self.module, &sub, now)?;
                    summary.confirmed += 1;
                }
                Err(e) => {
                    warn!(sub = %sub, id = ?id, error = %e, "confirmation failed; will re-attempt next cycle");
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }
}

/// The balances the substrate should hold after this push: every rebuilt
/// token plus a zero for each stale token still present on-chain.
fn desired_balances(
    state: &SubAccountState,
    on_chain: &BTreeMap<Address, U256>,
) -> BTreeMap<Address, U256> {
    let mut desired: BTreeMap<Address, U256> = state
        .queues
        .keys()
        .map(|token| (*token, state.acquired_balance(token)))
        .filter(|(_, v)| !v.is_zero())
        .collect();
    for token in on_chain.keys() {
        desired.entry(*token).or_insert_with(U256::zero);
    }
    desired
}

// ── Tests ─────────────────────────────────────────────────────────────────────
