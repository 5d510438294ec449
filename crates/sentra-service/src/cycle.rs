//! One reconstruction cycle: index → rebuild → push.

use std::sync::Arc;

use tracing::{info, warn};

use sentra_core::config::CoreConfig;
use sentra_core::constants::LOOKBACK_WINDOWS;
use sentra_core::error::SentraError;
use sentra_core::types::{Address, Timestamp};
use sentra_indexer::{EventSource, IndexerApi, SubstrateApi, SyncOutcome};
use sentra_oracle::PriceOracle;
use sentra_pusher::{AllowancePusher, EnforcementClient, PushSummary};
use sentra_rebuilder::Rebuilder;
use sentra_store::LedgerDb;

#[derive(Clone, Copy, Debug, Default)]
pub struct CycleReport {
    pub sync: SyncOutcome,
    pub push: PushSummary,
    pub sub_accounts: usize,
}

/// Owns one full pipeline pass. The caller serializes cycles behind a
/// mutex; within a cycle each sub-account rebuild is independent.
pub struct CycleRunner<S: SubstrateApi, G: IndexerApi, C: EnforcementClient> {
    source: EventSource<S, G>,
    store: Arc<LedgerDb>,
    oracle: PriceOracle,
    rebuilder: Rebuilder,
    pusher: AllowancePusher<C>,
    cfg: CoreConfig,
    /// Tokens whose prices are snapshotted at cycle start.
    tracked_tokens: Vec<Address>,
}

impl<S: SubstrateApi, G: IndexerApi, C: EnforcementClient> CycleRunner<S, G, C> {
    pub fn new(
        source: EventSource<S, G>,
        store: Arc<LedgerDb>,
        oracle: PriceOracle,
        rebuilder: Rebuilder,
        pusher: AllowancePusher<C>,
        cfg: CoreConfig,
        tracked_tokens: Vec<Address>,
    ) -> Self {
        Self { source, store, oracle, rebuilder, pusher, cfg, tracked_tokens }
    }

    pub async fn run_cycle(&mut self, now: Timestamp) -> Result<CycleReport, SentraError> {
        // 1. Bring the ledger up to the confirmed tip (reorg-safe).
        let sync = self.source.poll_once().await?;

        // 2. Snapshot prices once so every rebuild in this cycle sees the
        //    same ratios.
        let prices = self.oracle.snapshot(&self.tracked_tokens, now);

        // 3. Rebuild every known sub-account over the extended lookback —
        //    two windows, so inherited timestamps just outside the current
        //    window are still observed.
        let lookback = LOOKBACK_WINDOWS * self.cfg.window_duration_seconds;
        let subs = self.store.known_sub_accounts()?;
        let mut rebuilt = Vec::with_capacity(subs.len());
        for sub in subs {
            let events = self.store.events_for_sub(&sub, now - lookback, now)?;
            match self.rebuilder.rebuild(sub, &events, &prices, now) {
                Ok(state) => rebuilt.push(state),
                Err(e) => warn!(sub = %sub, error = %e, "rebuild failed; sub-account skipped"),
            }
        }

        // 4. Push what changed.
        let Some((safe_value, safe_value_ts)) = self.store.latest_safe_value()? else {
            warn!("no safe value observed yet; skipping push phase");
            return Ok(CycleReport { sync, push: PushSummary::default(), sub_accounts: rebuilt.len() });
        };
        let push = self.pusher.run_cycle(&rebuilt, safe_value, safe_value_ts, now).await?;

        info!(
            sub_accounts = rebuilt.len(),
            ingested = sync.events_ingested,
            submitted = push.submitted,
            confirmed = push.confirmed,
            "cycle complete"
        );
        Ok(CycleReport { sync, push, sub_accounts: rebuilt.len() })
    }
}
