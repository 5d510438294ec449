//! The reorg-safe synchronization loop.

use std::sync::Arc;

use tracing::{debug, info, warn};

use sentra_core::config::CoreConfig;
use sentra_core::error::SentraError;
use sentra_core::events::ChainEvent;
use sentra_core::types::{BlockHash, BlockNumber};
use sentra_store::LedgerDb;

// ── Client seams ─────────────────────────────────────────────────────────────

/// Direct substrate surface: tip, block hashes, raw logs.
#[allow(async_fn_in_trait)]
pub trait SubstrateApi: Send + Sync {
    async fn latest_block_number(&self) -> Result<u64, SentraError>;
    async fn block_hash(&self, height: u64) -> Result<Option<BlockHash>, SentraError>;
    async fn logs(&self, from: u64, to: u64) -> Result<Vec<ChainEvent>, SentraError>;
}

/// GraphQL indexer surface (primary event path).
#[allow(async_fn_in_trait)]
pub trait IndexerApi: Send + Sync {
    async fn events(&self, from: u64, to: u64) -> Result<Vec<ChainEvent>, SentraError>;
}

// ── Outcome ──────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Height of a detected reorg, if any (state at or above it was purged
    /// before re-ingestion).
    pub reorg_at: Option<BlockNumber>,
    pub events_purged: usize,
    pub events_ingested: usize,
    pub last_processed: Option<BlockNumber>,
}

// ── EventSource ──────────────────────────────────────────────────────────────

pub struct EventSource<S: SubstrateApi, G: IndexerApi> {
    substrate: S,
    indexer: Option<G>,
    store: Arc<LedgerDb>,
    cfg: CoreConfig,
}

impl<S: SubstrateApi, G: IndexerApi> EventSource<S, G> {
    pub fn new(substrate: S, indexer: Option<G>, store: Arc<LedgerDb>, cfg: CoreConfig) -> Self {
        Self { substrate, indexer, store, cfg }
    }

    /// One synchronization pass: reorg check, then chunked ingestion up to
    /// the confirmed tip. The cursor advances chunk by chunk, so a failure
    /// mid-pass leaves `last_processed_block` at the last fully ingested
    /// chunk and the next pass resumes from there.
    pub async fn poll_once(&self) -> Result<SyncOutcome, SentraError> {
        let mut outcome = SyncOutcome::default();

        // ── Reorg detection ──────────────────────────────────────────────
        if let Some(last) = self.store.last_processed_block()? {
            let depth = 2 * self.cfg.confirmation_blocks;
            let from = last.saturating_sub(depth.saturating_sub(1));
            for height in from..=last {
                let Some(cached) = self.store.get_block_hash(height)? else { continue };
                let Some(canonical) = self.substrate.block_hash(height).await? else { continue };
                if canonical != cached {
                    warn!(height, "block hash mismatch; rewinding");
                    self.store.drop_block_hashes_from(height)?;
                    outcome.events_purged = self.store.purge_events_from_block(height)?;
                    self.store.set_last_processed_block(height.saturating_sub(1))?;
                    outcome.reorg_at = Some(height);
                    break;
                }
            }
        }

        // ── Ingestion up to the confirmed tip ────────────────────────────
        let tip = self.substrate.latest_block_number().await?;
        let target = tip.saturating_sub(self.cfg.confirmation_blocks);
        let start = match self.store.last_processed_block()? {
            Some(last) => last + 1,
            None => target.saturating_sub(self.cfg.max_historical_blocks),
        };
        if start > target {
            debug!(start, target, "no confirmed blocks to process");
            outcome.last_processed = self.store.last_processed_block()?;
            return Ok(outcome);
        }

        let mut from = start;
        while from <= target {
            let to = (from + self.cfg.max_blocks_per_query - 1).min(target);
            let events = self.fetch_events(from, to).await?;
            for ev in &events {
                if self.store.upsert_event(ev)? {
                    outcome.events_ingested += 1;
                }
            }
            for height in from..=to {
                if let Some(hash) = self.substrate.block_hash(height).await? {
                    self.store.put_block_hash(height, &hash, self.cfg.max_block_hash_cache)?;
                }
            }
            self.store.set_last_processed_block(to)?;
            from = to + 1;
        }

        outcome.last_processed = Some(target);
        info!(
            target,
            ingested = outcome.events_ingested,
            reorg = ?outcome.reorg_at,
            "sync pass complete"
        );
        Ok(outcome)
    }

    /// Primary path is the GraphQL indexer; any failure there falls back
    /// to direct substrate logs for the same range.
    async fn fetch_events(&self, from: u64, to: u64) -> Result<Vec<ChainEvent>, SentraError> {
        if let Some(indexer) = &self.indexer {
            match indexer.events(from, to).await {
                Ok(events) => return Ok(events),
                Err(e) => {
                    warn!(from, to, error = %e, "indexer query failed; falling back to substrate logs");
                }
            }
        }
        self.substrate.logs(from, to).await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
