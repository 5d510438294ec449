//! Chronological event replay.
//!
//! One [`Rebuilder`] instance serves a cycle; `rebuild` is pure with
//! respect to its inputs, so replaying the same log twice yields identical
//! state. Events for other sub-accounts, guard-only approvals and malformed
//! payloads are skipped (the last with a warning — never silently).

use std::collections::HashMap;

use tracing::{debug, warn};

use sentra_core::constants::precision;
use sentra_core::error::SentraError;
use sentra_core::events::{ChainEvent, EventPayload, OpType, ProtocolExecution, TransferExecuted};
use sentra_core::types::{mul_div, Address, Timestamp, U256};
use sentra_oracle::{token_value_usd, PriceCache};

use crate::deposit::DepositRecord;
use crate::queue::{AcquiredEntry, Consumption};
use crate::state::{SpendingEntry, SubAccountState};

// ── Policy ───────────────────────────────────────────────────────────────────

/// What to do with the unmatched remainder of a CLAIM output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClaimRemainderPolicy {
    /// Inherit the oldest matching deposit's acquisition timestamp
    /// (the enforcement contract's observed behavior).
    InheritOldestDeposit,
    /// Treat the remainder as a fresh acquisition at the claim's own time.
    EventTimestamp,
}

#[derive(Clone, Copy, Debug)]
pub struct RebuilderPolicy {
    pub claim_remainder: ClaimRemainderPolicy,
}

impl Default for RebuilderPolicy {
    fn default() -> Self {
        Self { claim_remainder: ClaimRemainderPolicy::InheritOldestDeposit }
    }
}

// ── Rebuilder ────────────────────────────────────────────────────────────────

pub struct Rebuilder {
    window: i64,
    /// Native decimals per token, for USD valuation. Unlisted tokens
    /// default to 18.
    decimals: HashMap<Address, u8>,
    policy: RebuilderPolicy,
}

impl Rebuilder {
    pub fn new(window: i64, decimals: HashMap<Address, u8>, policy: RebuilderPolicy) -> Self {
        Self { window, decimals, policy }
    }

    /// Replay `events` (chronological `(timestamp, block, log)` order) and
    /// reconstruct the sub-account's state as of `now`.
    pub fn rebuild(
        &self,
        sub: Address,
        events: &[ChainEvent],
        prices: &PriceCache,
        now: Timestamp,
    ) -> Result<SubAccountState, SentraError> {
        let mut state = SubAccountState::new(sub);

        for ev in events {
            if ev.sub_account() != Some(sub) {
                continue;
            }
            match &ev.payload {
                EventPayload::ProtocolExecution(p) => {
                    if !p.arrays_consistent() {
                        warn!(
                            tx = %ev.key.tx_hash,
                            log_index = ev.key.log_index,
                            "malformed event skipped: token/amount arrays out of step"
                        );
                        continue;
                    }
                    match p.op_type {
                        OpType::Approve => continue,
                        OpType::Swap | OpType::Deposit => {
                            self.book_spending(&mut state, ev.timestamp, p.spending_cost, now);
                            self.apply_swap_or_deposit(&mut state, p, ev.timestamp, prices);
                        }
                        OpType::Withdraw | OpType::Claim => {
                            self.apply_withdraw_or_claim(&mut state, p, ev.timestamp);
                        }
                    }
                }
                EventPayload::TransferExecuted(t) => {
                    self.book_spending(&mut state, ev.timestamp, t.spending_cost, now);
                    self.apply_transfer(&mut state, t, ev.timestamp);
                }
                // Authorizations and substrate-side pushes do not affect
                // the acquired-balance reconstruction.
                _ => debug!(tx = %ev.key.tx_hash, "non-accounting event ignored by rebuilder"),
            }
        }

        // Expiry pruning must visit every position: inherited timestamps are
        // not sorted within a queue.
        for queue in state.queues.values_mut() {
            queue.prune_expired(now, self.window);
        }
        state.acquired_balances = state
            .queues
            .iter()
            .filter(|(_, q)| !q.total().is_zero())
            .map(|(token, q)| (token.to_hex(), q.total()))
            .collect();

        Ok(state)
    }

    // ── Spending bookkeeping ─────────────────────────────────────────────────

    fn book_spending(&self, state: &mut SubAccountState, ts: Timestamp, cost: U256, now: Timestamp) {
        if ts >= now - self.window && ts <= now {
            state.total_spending_in_window += cost;
            state.spending_entries.push(SpendingEntry { timestamp: ts, cost });
        }
    }

    // ── Swap / Deposit ───────────────────────────────────────────────────────

    fn apply_swap_or_deposit(
        &self,
        state: &mut SubAccountState,
        p: &ProtocolExecution,
        ts: Timestamp,
        prices: &PriceCache,
    ) {
        let inputs: Vec<(Address, U256)> = p
            .tokens_in
            .iter()
            .zip(&p.amounts_in)
            .filter(|(_, a)| !a.is_zero())
            .map(|(t, a)| (*t, *a))
            .collect();
        let outputs: Vec<(Address, U256)> = p
            .tokens_out
            .iter()
            .zip(&p.amounts_out)
            .filter(|(_, a)| !a.is_zero())
            .map(|(t, a)| (*t, *a))
            .collect();

        // Consume inputs, tracking consumed entries per input token.
        let input_tokens: Vec<Address> = inputs.iter().map(|(t, _)| *t).collect();
        let has_all_prices = prices.has_all_prices(&input_tokens);

        let mut consumptions: Vec<Consumption> = Vec::with_capacity(inputs.len());
        let mut total_amount_in = U256::zero();
        let mut total_consumed = U256::zero();
        let mut total_value_in_usd = U256::zero();
        let mut consumed_value_usd = U256::zero();

        for (token, amount) in &inputs {
            let consumption = state.queue_mut(*token).consume(*amount, ts, self.window);
            total_amount_in += *amount;
            total_consumed += consumption.total();
            if has_all_prices {
                total_value_in_usd += self.value_usd(*token, *amount, prices);
                consumed_value_usd += self.value_usd(*token, consumption.total(), prices);
            }
            consumptions.push(consumption);
        }

        // Acquired ratio: USD-weighted when every input is priced,
        // amount-weighted otherwise.
        let one = precision();
        let acquired_ratio = if has_all_prices && !total_value_in_usd.is_zero() {
            mul_div(consumed_value_usd, one, total_value_in_usd)
        } else if !total_amount_in.is_zero() {
            mul_div(total_consumed, one, total_amount_in)
        } else {
            U256::zero()
        };

        // Allocate outputs: the acquired portion splits across the consumed
        // entries by amount, inheriting each entry's original timestamp;
        // the last entry takes the truncation remainder so no dust is lost.
        let all_consumed: Vec<AcquiredEntry> = consumptions
            .iter()
            .flat_map(|c| c.consumed.iter().copied())
            .collect();

        for (token_out, amount_out) in &outputs {
            let from_acquired = mul_div(*amount_out, acquired_ratio, one);
            let from_non_acquired = *amount_out - from_acquired;

            if !from_acquired.is_zero() && !total_consumed.is_zero() {
                let mut allocated = U256::zero();
                let last = all_consumed.len() - 1;
                for (i, entry) in all_consumed.iter().enumerate() {
                    let share = if i == last {
                        from_acquired - allocated
                    } else {
                        mul_div(from_acquired, entry.amount, total_consumed)
                    };
                    allocated += share;
                    state.queue_mut(*token_out).push_back(AcquiredEntry {
                        amount: share,
                        original_timestamp: entry.original_timestamp,
                    });
                }
            }
            if !from_non_acquired.is_zero() {
                state.queue_mut(*token_out).push_back(AcquiredEntry {
                    amount: from_non_acquired,
                    original_timestamp: ts,
                });
            }
        }

        if p.op_type == OpType::Deposit {
            self.record_deposits(
                state,
                p,
                ts,
                prices,
                &inputs,
                &outputs,
                acquired_ratio,
                total_consumed,
                total_amount_in,
                oldest_consumed(&all_consumed),
            );
        }
    }

    /// Create the deposit records that let later withdrawals find this
    /// deposit again.
    #[allow(clippy::too_many_arguments)]
    fn record_deposits(
        &self,
        state: &mut SubAccountState,
        p: &ProtocolExecution,
        ts: Timestamp,
        prices: &PriceCache,
        inputs: &[(Address, U256)],
        outputs: &[(Address, U256)],
        acquired_ratio: U256,
        total_consumed: U256,
        total_amount_in: U256,
        oldest_consumed_ts: Option<Timestamp>,
    ) {
        if inputs.is_empty() || outputs.is_empty() {
            return;
        }

        // Pairing rule.
        let mut pairings: Vec<(Address, U256, Address, U256)> = Vec::new();
        if outputs.len() == 1 {
            // N inputs share the single output equally; the last input
            // takes the division remainder.
            let (token_out, amount_out) = outputs[0];
            let n = U256::from(inputs.len() as u64);
            let base_share = amount_out / n;
            let mut given = U256::zero();
            for (i, (token_in, amount_in)) in inputs.iter().enumerate() {
                let share = if i == inputs.len() - 1 { amount_out - given } else { base_share };
                given += share;
                pairings.push((*token_in, *amount_in, token_out, share));
            }
        } else if inputs.len() == 1 {
            // One input allocated across outputs by USD weight (equal split
            // when any output is unpriced); the last output takes the
            // remainder of the input.
            let (token_in, amount_in) = inputs[0];
            let output_tokens: Vec<Address> = outputs.iter().map(|(t, _)| *t).collect();
            let weights: Vec<U256> = if prices.has_all_prices(&output_tokens) {
                outputs.iter().map(|(t, a)| self.value_usd(*t, *a, prices)).collect()
            } else {
                vec![U256::from(1u64); outputs.len()]
            };
            let total_weight: U256 = weights.iter().fold(U256::zero(), |acc, w| acc + *w);
            let mut given = U256::zero();
            for (j, (token_out, amount_out)) in outputs.iter().enumerate() {
                let in_share = if j == outputs.len() - 1 {
                    amount_in - given
                } else {
                    mul_div(amount_in, weights[j], total_weight)
                };
                given += in_share;
                pairings.push((token_in, in_share, *token_out, *amount_out));
            }
        } else {
            // Pair by matching index, falling back to index 0.
            for (i, (token_in, amount_in)) in inputs.iter().enumerate() {
                let (token_out, amount_out) = if i < outputs.len() { outputs[i] } else { outputs[0] };
                pairings.push((*token_in, *amount_in, token_out, amount_out));
            }
        }

        let mixed = !total_consumed.is_zero() && total_consumed < total_amount_in;
        let one = precision();

        for (token_in, amount_in, token_out, amount_out) in pairings {
            if amount_in.is_zero() {
                continue;
            }
            if mixed {
                // Split the pairing into an acquired and a non-acquired
                // record; the second takes the truncation remainders.
                let acq_in = mul_div(amount_in, acquired_ratio, one);
                let acq_out = mul_div(amount_out, acquired_ratio, one);
                if !acq_in.is_zero() {
                    state.deposit_records.push(DepositRecord {
                        sub_account: p.sub_account,
                        target: p.target,
                        token_in,
                        amount_in: acq_in,
                        token_out,
                        amount_out: acq_out,
                        remaining_amount: acq_in,
                        remaining_output_amount: acq_out,
                        original_acquisition_timestamp: oldest_consumed_ts.unwrap_or(ts),
                    });
                }
                let non_in = amount_in - acq_in;
                let non_out = amount_out - acq_out;
                if !non_in.is_zero() {
                    state.deposit_records.push(DepositRecord {
                        sub_account: p.sub_account,
                        target: p.target,
                        token_in,
                        amount_in: non_in,
                        token_out,
                        amount_out: non_out,
                        remaining_amount: non_in,
                        remaining_output_amount: non_out,
                        original_acquisition_timestamp: ts,
                    });
                }
            } else {
                let original = if total_consumed.is_zero() {
                    ts
                } else {
                    oldest_consumed_ts.unwrap_or(ts)
                };
                state.deposit_records.push(DepositRecord {
                    sub_account: p.sub_account,
                    target: p.target,
                    token_in,
                    amount_in,
                    token_out,
                    amount_out,
                    remaining_amount: amount_in,
                    remaining_output_amount: amount_out,
                    original_acquisition_timestamp: original,
                });
            }
        }
    }

    // ── Withdraw / Claim ─────────────────────────────────────────────────────

    fn apply_withdraw_or_claim(
        &self,
        state: &mut SubAccountState,
        p: &ProtocolExecution,
        ts: Timestamp,
    ) {
        let outputs: Vec<(Address, U256)> = p
            .tokens_out
            .iter()
            .zip(&p.amounts_out)
            .filter(|(_, a)| !a.is_zero())
            .map(|(t, a)| (*t, *a))
            .collect();

        for (token_out, amount_out) in outputs {
            let mut remaining_to_match = amount_out;
            // Matched portions: (amount, inherited timestamp), one per
            // deposit — each deposit contributes its own timestamp.
            let mut matched: Vec<(U256, Timestamp)> = Vec::new();
            // Deferred output-queue consumptions: (token_out_of_deposit,
            // requested amount, record index).
            let mut output_consumptions: Vec<(Address, U256, usize)> = Vec::new();

            for (idx, dep) in state.deposit_records.iter_mut().enumerate() {
                if remaining_to_match.is_zero() {
                    break;
                }
                if dep.target != p.target || dep.token_in != token_out || !dep.is_open() {
                    continue;
                }
                let take = remaining_to_match.min(dep.remaining_amount);
                dep.remaining_amount -= take;
                remaining_to_match -= take;
                matched.push((take, dep.original_acquisition_timestamp));

                // The deposit's own output (e.g. the aToken minted back
                // then) is consumed proportionally from its queue.
                if !dep.amount_in.is_zero() {
                    let requested = mul_div(dep.amount_out, take, dep.amount_in)
                        .min(dep.remaining_output_amount);
                    if !requested.is_zero() {
                        output_consumptions.push((dep.token_out, requested, idx));
                    }
                }
            }

            for (dep_token_out, requested, idx) in output_consumptions {
                let actually = state
                    .queue_mut(dep_token_out)
                    .consume(requested, ts, self.window)
                    .total();
                // Expired queue entries may make the actual consumption
                // smaller than requested; the record shrinks only by what
                // really came out.
                state.deposit_records[idx].remaining_output_amount -= actually;
            }

            for (amount, original) in matched {
                state.queue_mut(token_out).push_back(AcquiredEntry {
                    amount,
                    original_timestamp: original,
                });
            }

            if !remaining_to_match.is_zero() {
                match p.op_type {
                    OpType::Claim => {
                        // The remainder counts as acquired only when the
                        // sub-account has at least one deposit against this
                        // target.
                        let oldest = state
                            .deposit_records
                            .iter()
                            .filter(|d| d.target == p.target)
                            .map(|d| d.original_acquisition_timestamp)
                            .min();
                        match oldest {
                            Some(oldest_ts) => {
                                let original = match self.policy.claim_remainder {
                                    ClaimRemainderPolicy::InheritOldestDeposit => oldest_ts,
                                    ClaimRemainderPolicy::EventTimestamp => ts,
                                };
                                state.queue_mut(token_out).push_back(AcquiredEntry {
                                    amount: remaining_to_match,
                                    original_timestamp: original,
                                });
                            }
                            None => debug!(
                                target = %p.target,
                                "claim remainder with no matching deposit discarded"
                            ),
                        }
                    }
                    // A withdraw of funds deposited outside the tracked
                    // history (or by a different principal) is not acquired.
                    _ => debug!(target = %p.target, "withdraw remainder discarded"),
                }
            }
        }
    }

    // ── Transfers ────────────────────────────────────────────────────────────

    fn apply_transfer(&self, state: &mut SubAccountState, t: &TransferExecuted, ts: Timestamp) {
        let consumed = state.queue_mut(t.token).consume(t.amount, ts, self.window);
        debug!(
            token = %t.token,
            consumed = %consumed.total(),
            remainder = %consumed.remainder,
            "transfer consumed acquired balance"
        );
    }

    fn value_usd(&self, token: Address, amount: U256, prices: &PriceCache) -> U256 {
        match prices.get(&token) {
            Some(price) => {
                let dec = self.decimals.get(&token).copied().unwrap_or(18);
                token_value_usd(amount, dec, price)
            }
            None => U256::zero(),
        }
    }
}

fn oldest_consumed(entries: &[AcquiredEntry]) -> Option<Timestamp> {
    entries.iter().map(|e| e.original_timestamp).min()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use sentra_core::events::EventKey;
    use sentra_core::types::TxHash;

    const WINDOW: i64 = 86_400;

    fn sub() -> Address {
        Address::from_bytes([0xab; 20])
    }

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    // Tokens used across the matrix.
    fn usdc() -> Address { addr(0x01) } // 6 decimals
    fn weth() -> Address { addr(0x02) } // 18 decimals
    fn ausdc() -> Address { addr(0x03) } // 6 decimals
    fn dai() -> Address { addr(0x04) } // 18 decimals
    fn lp() -> Address { addr(0x05) }
    fn target() -> Address { addr(0x10) }

    fn one_usd() -> U256 {
        U256::from(10u64).pow(U256::from(18u32))
    }

    fn usdc_units(n: u64) -> U256 {
        U256::from(n) * U256::from(1_000_000u64)
    }

    fn rebuilder() -> Rebuilder {
        let mut decimals = HashMap::new();
        decimals.insert(usdc(), 6u8);
        decimals.insert(ausdc(), 6u8);
        // weth/dai/lp default to 18.
        Rebuilder::new(WINDOW, decimals, RebuilderPolicy::default())
    }

    fn prices_usdc_weth_dai() -> PriceCache {
        let mut p = HashMap::new();
        p.insert(usdc(), one_usd());
        p.insert(weth(), U256::from(3_000u64) * one_usd());
        p.insert(dai(), one_usd());
        PriceCache::from_prices(p)
    }

    fn event(ts: Timestamp, log: u32, payload: EventPayload) -> ChainEvent {
        let mut tx = [0u8; 32];
        tx[..8].copy_from_slice(&(ts as u64).to_be_bytes());
        tx[8..12].copy_from_slice(&log.to_be_bytes());
        ChainEvent {
            key: EventKey { tx_hash: TxHash::from_bytes(tx), log_index: log },
            block_number: (ts / 12) as u64,
            timestamp: ts,
            payload,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn protocol(
        ts: Timestamp,
        log: u32,
        op: OpType,
        ins: &[(Address, u64, u32)],
        outs: &[(Address, u64, u32)],
        cost_usd: u64,
    ) -> ChainEvent {
        // `(token, mantissa, exponent)` → mantissa × 10^exponent.
        let expand = |(t, m, e): &(Address, u64, u32)| {
            (*t, U256::from(*m) * U256::from(10u64).pow(U256::from(*e)))
        };
        let ins: Vec<(Address, U256)> = ins.iter().map(expand).collect();
        let outs: Vec<(Address, U256)> = outs.iter().map(expand).collect();
        event(
            ts,
            log,
            EventPayload::ProtocolExecution(ProtocolExecution {
                sub_account: sub(),
                target: target(),
                op_type: op,
                tokens_in: ins.iter().map(|(t, _)| *t).collect(),
                amounts_in: ins.iter().map(|(_, a)| *a).collect(),
                tokens_out: outs.iter().map(|(t, _)| *t).collect(),
                amounts_out: outs.iter().map(|(_, a)| *a).collect(),
                spending_cost: U256::from(cost_usd) * one_usd(),
            }),
        )
    }

    fn transfer(ts: Timestamp, log: u32, token: Address, amount: U256, cost_usd: u64) -> ChainEvent {
        event(
            ts,
            log,
            EventPayload::TransferExecuted(TransferExecuted {
                sub_account: sub(),
                token,
                recipient: addr(0x77),
                amount,
                spending_cost: U256::from(cost_usd) * one_usd(),
            }),
        )
    }

    fn entries(state: &SubAccountState, token: Address) -> Vec<(U256, Timestamp)> {
        state
            .queues
            .get(&token)
            .map(|q| q.iter().map(|e| (e.amount, e.original_timestamp)).collect())
            .unwrap_or_default()
    }

    // ── S3: swap timestamp inheritance ───────────────────────────────────────

    #[test]
    fn swap_output_inherits_original_acquisition_timestamp() {
        let events = vec![
            // T=1000: 100 USDC (original funds) → 0.03 WETH.
            protocol(1_000, 0, OpType::Swap, &[(usdc(), 100, 6)], &[(weth(), 3, 16)], 100),
            // T=50000: 0.03 WETH → 120 USDC.
            protocol(50_000, 0, OpType::Swap, &[(weth(), 3, 16)], &[(usdc(), 120, 6)], 0),
        ];
        let r = rebuilder();
        let prices = prices_usdc_weth_dai();

        let state = r.rebuild(sub(), &events, &prices, 50_001).unwrap();
        assert_eq!(entries(&state, usdc()), vec![(usdc_units(120), 1_000)]);
        assert_eq!(state.acquired_balance(&usdc()), usdc_units(120));

        // One second past the inherited timestamp's window: expired.
        let state = r.rebuild(sub(), &events, &prices, 1_000 + WINDOW + 1).unwrap();
        assert_eq!(state.acquired_balance(&usdc()), U256::zero());
    }

    // ── S4: deposit/withdraw match ───────────────────────────────────────────

    #[test]
    fn withdraw_matches_deposit_and_inherits_its_timestamp() {
        let events = vec![
            protocol(1_000, 0, OpType::Deposit, &[(usdc(), 100, 6)], &[(ausdc(), 100, 6)], 100),
            protocol(50_000, 0, OpType::Withdraw, &[(ausdc(), 100, 6)], &[(usdc(), 100, 6)], 0),
        ];
        let r = rebuilder();
        let state = r.rebuild(sub(), &events, &prices_usdc_weth_dai(), 50_001).unwrap();

        assert_eq!(entries(&state, usdc()), vec![(usdc_units(100), 1_000)]);
        assert_eq!(state.acquired_balance(&ausdc()), U256::zero());

        let dep = &state.deposit_records[0];
        assert_eq!(dep.original_acquisition_timestamp, 1_000);
        assert_eq!(dep.remaining_amount, U256::zero());
        assert_eq!(dep.remaining_output_amount, U256::zero());
        assert!(dep.well_formed());
    }

    // ── Mixed acquisition (60/40 by USD value) ───────────────────────────────

    #[test]
    fn mixed_swap_splits_output_sixty_forty() {
        let events = vec![
            // Seed 60 USDC of acquired balance at T=1000.
            protocol(1_000, 0, OpType::Swap, &[(weth(), 1, 16)], &[(usdc(), 60, 6)], 30),
            // T=2000: 100 USDC in (60 acquired + 40 original) → 1 WETH out.
            protocol(2_000, 0, OpType::Swap, &[(usdc(), 100, 6)], &[(weth(), 1, 18)], 0),
        ];
        let r = rebuilder();
        let state = r.rebuild(sub(), &events, &prices_usdc_weth_dai(), 3_000).unwrap();

        // The seed entry carried timestamp 1000 (non-acquired at its own
        // swap); 60% of the WETH output inherits it, 40% is stamped 2000.
        let weth_entries = entries(&state, weth());
        assert_eq!(
            weth_entries,
            vec![
                (U256::from(600_000_000_000_000_000u64), 1_000),
                (U256::from(400_000_000_000_000_000u64), 2_000),
            ]
        );
        // No dust: the whole output is accounted for.
        assert_eq!(state.acquired_balance(&weth()), U256::from(10u64).pow(U256::from(18u32)));
    }

    // ── Amount-weighted fallback ─────────────────────────────────────────────

    #[test]
    fn unpriced_input_falls_back_to_amount_weighting() {
        let foo = addr(0x42); // no price feed
        let events = vec![
            protocol(1_000, 0, OpType::Swap, &[(weth(), 1, 16)], &[(usdc(), 10, 6)], 0),
            // 10 USDC acquired + 10 FOO original → ratio 10/20 by amounts.
            protocol(
                2_000,
                0,
                OpType::Swap,
                &[(usdc(), 10, 6), (foo, 10, 6)],
                &[(dai(), 100, 18)],
                0,
            ),
        ];
        let r = rebuilder();
        let state = r.rebuild(sub(), &events, &prices_usdc_weth_dai(), 3_000).unwrap();

        let dai_entries = entries(&state, dai());
        assert_eq!(
            dai_entries,
            vec![
                (U256::from(50u64) * one_usd(), 1_000),
                (U256::from(50u64) * one_usd(), 2_000),
            ]
        );
    }

    // ── Proportional split with remainder-to-last ────────────────────────────

    #[test]
    fn acquired_split_gives_truncation_remainder_to_last_entry() {
        let events = vec![
            protocol(100, 0, OpType::Swap, &[(weth(), 1, 16)], &[(usdc(), 3, 0)], 0),
            protocol(200, 0, OpType::Swap, &[(weth(), 1, 16)], &[(usdc(), 3, 0)], 0),
            protocol(300, 0, OpType::Swap, &[(weth(), 1, 16)], &[(usdc(), 4, 0)], 0),
            // 10 raw USDC (3+3+4 acquired) → 7 raw DAI.
            protocol(400, 0, OpType::Swap, &[(usdc(), 10, 0)], &[(dai(), 7, 0)], 0),
        ];
        let r = rebuilder();
        let state = r.rebuild(sub(), &events, &prices_usdc_weth_dai(), 500).unwrap();

        // 7×3/10 = 2, 7×3/10 = 2, last takes 7 − 4 = 3. Sum is exactly 7.
        assert_eq!(
            entries(&state, dai()),
            vec![
                (U256::from(2u64), 100),
                (U256::from(2u64), 200),
                (U256::from(3u64), 300),
            ]
        );
    }

    // ── Deposit pairing: N inputs → 1 output ─────────────────────────────────

    #[test]
    fn two_input_lp_deposit_splits_output_equally() {
        let events = vec![protocol(
            1_000,
            0,
            OpType::Deposit,
            &[(usdc(), 100, 6), (dai(), 50, 18)],
            &[(lp(), 200, 18)],
            150,
        )];
        let r = rebuilder();
        let state = r.rebuild(sub(), &events, &prices_usdc_weth_dai(), 2_000).unwrap();

        assert_eq!(state.deposit_records.len(), 2);
        let half_lp = U256::from(100u64) * one_usd();
        assert_eq!(state.deposit_records[0].token_in, usdc());
        assert_eq!(state.deposit_records[0].amount_out, half_lp);
        assert_eq!(state.deposit_records[1].token_in, dai());
        assert_eq!(state.deposit_records[1].amount_out, half_lp);
    }

    // ── Deposit pairing: 1 input → M outputs, USD-weighted ───────────────────

    #[test]
    fn single_input_multi_output_allocates_by_usd_weight_with_exact_remainder() {
        // 101 raw USDC into an output worth $30 (0.01 WETH) and one worth
        // $70 (70 DAI): 101×30/100 = 30 (truncated), last takes 71.
        let events = vec![protocol(
            1_000,
            0,
            OpType::Deposit,
            &[(usdc(), 101, 0)],
            &[(weth(), 1, 16), (dai(), 70, 18)],
            0,
        )];
        let r = rebuilder();
        let state = r.rebuild(sub(), &events, &prices_usdc_weth_dai(), 2_000).unwrap();

        assert_eq!(state.deposit_records.len(), 2);
        assert_eq!(state.deposit_records[0].amount_in, U256::from(30u64));
        assert_eq!(state.deposit_records[1].amount_in, U256::from(71u64));
        let total: U256 = state.deposit_records.iter().fold(U256::zero(), |a, d| a + d.amount_in);
        assert_eq!(total, U256::from(101u64));
    }

    // ── Mixed deposit produces two records per pairing ───────────────────────

    #[test]
    fn mixed_deposit_splits_into_acquired_and_non_acquired_records() {
        let events = vec![
            protocol(1_000, 0, OpType::Swap, &[(weth(), 1, 16)], &[(usdc(), 60, 6)], 0),
            // 100 USDC (60 acquired) deposited for 100 aUSDC.
            protocol(2_000, 0, OpType::Deposit, &[(usdc(), 100, 6)], &[(ausdc(), 100, 6)], 0),
        ];
        let r = rebuilder();
        let state = r.rebuild(sub(), &events, &prices_usdc_weth_dai(), 3_000).unwrap();

        assert_eq!(state.deposit_records.len(), 2);
        let acq = &state.deposit_records[0];
        let non = &state.deposit_records[1];
        assert_eq!(acq.amount_in, usdc_units(60));
        assert_eq!(acq.original_acquisition_timestamp, 1_000);
        assert_eq!(non.amount_in, usdc_units(40));
        assert_eq!(non.original_acquisition_timestamp, 2_000);
        assert_eq!(acq.amount_out + non.amount_out, usdc_units(100));
    }

    // ── Withdraw remainder is discarded; claim remainder inherits ────────────

    #[test]
    fn withdraw_remainder_beyond_deposits_is_not_acquired() {
        let events = vec![
            protocol(1_000, 0, OpType::Deposit, &[(usdc(), 100, 6)], &[(ausdc(), 100, 6)], 0),
            protocol(5_000, 0, OpType::Withdraw, &[], &[(usdc(), 150, 6)], 0),
        ];
        let r = rebuilder();
        let state = r.rebuild(sub(), &events, &prices_usdc_weth_dai(), 6_000).unwrap();
        // Only the matched 100 enters the queue.
        assert_eq!(state.acquired_balance(&usdc()), usdc_units(100));
    }

    #[test]
    fn claim_remainder_inherits_oldest_matching_deposit() {
        let events = vec![
            protocol(1_000, 0, OpType::Deposit, &[(usdc(), 100, 6)], &[(ausdc(), 100, 6)], 0),
            protocol(3_000, 1, OpType::Deposit, &[(usdc(), 50, 6)], &[(ausdc(), 50, 6)], 0),
            protocol(5_000, 0, OpType::Claim, &[], &[(usdc(), 200, 6)], 0),
        ];
        let r = rebuilder();
        let state = r.rebuild(sub(), &events, &prices_usdc_weth_dai(), 6_000).unwrap();

        let got = entries(&state, usdc());
        // 100 from the first deposit, 50 from the second, 50 remainder
        // stamped with the oldest deposit's timestamp.
        assert_eq!(
            got,
            vec![
                (usdc_units(100), 1_000),
                (usdc_units(50), 3_000),
                (usdc_units(50), 1_000),
            ]
        );
    }

    #[test]
    fn claim_with_no_deposit_against_target_discards_remainder() {
        let events =
            vec![protocol(5_000, 0, OpType::Claim, &[], &[(usdc(), 200, 6)], 0)];
        let r = rebuilder();
        let state = r.rebuild(sub(), &events, &prices_usdc_weth_dai(), 6_000).unwrap();
        assert_eq!(state.acquired_balance(&usdc()), U256::zero());
    }

    // ── Expired output entries shrink the deposit by actual consumption ──────

    #[test]
    fn expired_output_queue_leaves_deposit_partially_open_on_output_side() {
        let withdraw_ts = 1_000 + WINDOW + 10;
        let events = vec![
            protocol(1_000, 0, OpType::Deposit, &[(usdc(), 100, 6)], &[(ausdc(), 100, 6)], 0),
            protocol(withdraw_ts, 0, OpType::Withdraw, &[], &[(usdc(), 100, 6)], 0),
        ];
        let r = rebuilder();
        let state = r
            .rebuild(sub(), &events, &prices_usdc_weth_dai(), withdraw_ts + 10)
            .unwrap();

        let dep = &state.deposit_records[0];
        // Input side fully matched…
        assert_eq!(dep.remaining_amount, U256::zero());
        // …but the aUSDC entry had already expired, so nothing actually
        // came out of the output queue.
        assert_eq!(dep.remaining_output_amount, usdc_units(100));
        // The withdrawn entry inherited timestamp 1000 and is itself
        // expired at the reference time.
        assert_eq!(state.acquired_balance(&usdc()), U256::zero());
    }

    // ── Transfers consume from the queue and count as spending ───────────────

    #[test]
    fn transfer_consumes_acquired_balance() {
        let events = vec![
            protocol(1_000, 0, OpType::Swap, &[(weth(), 1, 16)], &[(usdc(), 100, 6)], 0),
            transfer(2_000, 0, usdc(), usdc_units(30), 5),
        ];
        let r = rebuilder();
        let state = r.rebuild(sub(), &events, &prices_usdc_weth_dai(), 3_000).unwrap();
        assert_eq!(state.acquired_balance(&usdc()), usdc_units(70));
        assert_eq!(state.total_spending_in_window, U256::from(5u64) * one_usd());
    }

    // ── Window spending bookkeeping ──────────────────────────────────────────

    #[test]
    fn spending_counts_only_events_inside_the_window() {
        let now = 90_000 + WINDOW; // window start at 90_000
        let events = vec![
            protocol(1_000, 0, OpType::Swap, &[(weth(), 1, 16)], &[(usdc(), 1, 6)], 10),
            protocol(95_000, 0, OpType::Swap, &[(weth(), 1, 16)], &[(usdc(), 1, 6)], 5),
            transfer(100_000, 0, usdc(), usdc_units(1), 2),
        ];
        let r = rebuilder();
        let state = r.rebuild(sub(), &events, &prices_usdc_weth_dai(), now).unwrap();
        assert_eq!(state.total_spending_in_window, U256::from(7u64) * one_usd());
        assert_eq!(state.spending_entries.len(), 2);
    }

    // ── Malformed events are skipped, never ingested ─────────────────────────

    #[test]
    fn malformed_event_is_skipped_and_rest_processed() {
        let mut bad = protocol(1_000, 0, OpType::Swap, &[(weth(), 1, 16)], &[(usdc(), 50, 6)], 0);
        if let EventPayload::ProtocolExecution(p) = &mut bad.payload {
            p.amounts_in.clear(); // arrays out of step
        }
        let events = vec![
            bad,
            protocol(2_000, 0, OpType::Swap, &[(weth(), 1, 16)], &[(usdc(), 25, 6)], 0),
        ];
        let r = rebuilder();
        let state = r.rebuild(sub(), &events, &prices_usdc_weth_dai(), 3_000).unwrap();
        assert_eq!(state.acquired_balance(&usdc()), usdc_units(25));
    }

    // ── Approvals are guard-only ─────────────────────────────────────────────

    #[test]
    fn approve_touches_nothing() {
        let events = vec![protocol(
            1_000,
            0,
            OpType::Approve,
            &[(usdc(), 100, 6)],
            &[],
            50,
        )];
        let r = rebuilder();
        let state = r.rebuild(sub(), &events, &prices_usdc_weth_dai(), 2_000).unwrap();
        assert!(state.acquired_balances.is_empty());
        assert_eq!(state.total_spending_in_window, U256::zero());
    }

    // ── Determinism ──────────────────────────────────────────────────────────

    #[test]
    fn rebuilding_twice_yields_identical_state() {
        let events = vec![
            protocol(1_000, 0, OpType::Swap, &[(weth(), 1, 16)], &[(usdc(), 60, 6)], 30),
            protocol(2_000, 0, OpType::Deposit, &[(usdc(), 100, 6)], &[(ausdc(), 100, 6)], 100),
            protocol(9_000, 0, OpType::Withdraw, &[], &[(usdc(), 40, 6)], 0),
            transfer(9_500, 1, usdc(), usdc_units(10), 3),
        ];
        let r = rebuilder();
        let prices = prices_usdc_weth_dai();
        let a = r.rebuild(sub(), &events, &prices, 10_000).unwrap();
        let b = r.rebuild(sub(), &events, &prices, 10_000).unwrap();
        assert_eq!(a.acquired_balances, b.acquired_balances);
        assert_eq!(a.total_spending_in_window, b.total_spending_in_window);
        assert_eq!(a.deposit_records, b.deposit_records);
    }
}
