use std::path::Path;

use sentra_core::error::SentraError;
use sentra_core::events::{sort_chronological, ChainEvent, EventKey};
use sentra_core::spend::{AuthorizationRecord, EoaRecord};
use sentra_core::types::{Address, BlockHash, BlockNumber, Nonce, Timestamp};

/// Persistent ledger database backed by sled (pure-Rust, no C dependencies).
///
/// Named trees:
///   events         — tx_hash ‖ log_index_be → bincode(ChainEvent)
///   block_index    — block_number_be ‖ tx_hash ‖ log_index_be → [] (reorg purge index)
///   block_hashes   — block_number_be     → block hash bytes
///   eoas           — Address bytes       → bincode(EoaRecord)
///   authorizations — nonce_be            → bincode(AuthorizationRecord)
///   meta           — utf8 key bytes      → raw bytes
pub struct LedgerDb {
    _db: sled::Db,
    events: sled::Tree,
    block_index: sled::Tree,
    block_hashes: sled::Tree,
    eoas: sled::Tree,
    authorizations: sled::Tree,
    meta: sled::Tree,
}

fn event_db_key(key: &EventKey) -> [u8; 36] {
    let mut k = [0u8; 36];
    k[..32].copy_from_slice(key.tx_hash.as_bytes());
    k[32..].copy_from_slice(&key.log_index.to_be_bytes());
    k
}

fn block_index_key(block: BlockNumber, key: &EventKey) -> [u8; 44] {
    let mut k = [0u8; 44];
    k[..8].copy_from_slice(&block.to_be_bytes());
    k[8..40].copy_from_slice(key.tx_hash.as_bytes());
    k[40..].copy_from_slice(&key.log_index.to_be_bytes());
    k
}

impl LedgerDb {
    /// Open or create the ledger database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SentraError> {
        let db = sled::open(path).map_err(|e| SentraError::Storage(e.to_string()))?;
        let events         = db.open_tree("events").map_err(|e| SentraError::Storage(e.to_string()))?;
        let block_index    = db.open_tree("block_index").map_err(|e| SentraError::Storage(e.to_string()))?;
        let block_hashes   = db.open_tree("block_hashes").map_err(|e| SentraError::Storage(e.to_string()))?;
        let eoas           = db.open_tree("eoas").map_err(|e| SentraError::Storage(e.to_string()))?;
        let authorizations = db.open_tree("authorizations").map_err(|e| SentraError::Storage(e.to_string()))?;
        let meta           = db.open_tree("meta").map_err(|e| SentraError::Storage(e.to_string()))?;
        Ok(Self { _db: db, events, block_index, block_hashes, eoas, authorizations, meta })
    }

    // ── Events ───────────────────────────────────────────────────────────────

    /// Idempotent insert keyed by `(tx_hash, log_index)`. Returns `true`
    /// when the event was new, `false` when it was already stored.
    pub fn upsert_event(&self, event: &ChainEvent) -> Result<bool, SentraError> {
        let key = event_db_key(&event.key);
        if self.events.contains_key(key).map_err(|e| SentraError::Storage(e.to_string()))? {
            return Ok(false);
        }
        let bytes = bincode::serialize(event)
            .map_err(|e| SentraError::Serialization(e.to_string()))?;
        self.events
            .insert(key, bytes)
            .map_err(|e| SentraError::Storage(e.to_string()))?;
        self.block_index
            .insert(block_index_key(event.block_number, &event.key), b"".as_ref())
            .map_err(|e| SentraError::Storage(e.to_string()))?;
        Ok(true)
    }

    pub fn get_event(&self, key: &EventKey) -> Result<Option<ChainEvent>, SentraError> {
        match self.events.get(event_db_key(key)).map_err(|e| SentraError::Storage(e.to_string()))? {
            Some(b) => Ok(Some(
                bincode::deserialize(&b).map_err(|e| SentraError::Serialization(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    /// Events for one sub-account with `timestamp ∈ [from_ts, to_ts]`,
    /// sorted `(timestamp, block_number, log_index)`.
    pub fn events_for_sub(
        &self,
        sub: &Address,
        from_ts: Timestamp,
        to_ts: Timestamp,
    ) -> Result<Vec<ChainEvent>, SentraError> {
        let mut out = Vec::new();
        for item in self.events.iter() {
            let (_, b) = item.map_err(|e| SentraError::Storage(e.to_string()))?;
            let ev: ChainEvent =
                bincode::deserialize(&b).map_err(|e| SentraError::Serialization(e.to_string()))?;
            if ev.sub_account() == Some(*sub) && ev.timestamp >= from_ts && ev.timestamp <= to_ts {
                out.push(ev);
            }
        }
        sort_chronological(&mut out);
        Ok(out)
    }

    /// Every distinct sub-account with at least one stored event.
    pub fn known_sub_accounts(&self) -> Result<Vec<Address>, SentraError> {
        let mut subs = Vec::new();
        for item in self.events.iter() {
            let (_, b) = item.map_err(|e| SentraError::Storage(e.to_string()))?;
            let ev: ChainEvent =
                bincode::deserialize(&b).map_err(|e| SentraError::Serialization(e.to_string()))?;
            if let Some(sub) = ev.sub_account() {
                if !subs.contains(&sub) {
                    subs.push(sub);
                }
            }
        }
        subs.sort();
        Ok(subs)
    }

    /// Remove every event with `block_number ≥ height`. Called on reorg
    /// rewind; canonical-chain re-ingest restores them idempotently.
    pub fn purge_events_from_block(&self, height: BlockNumber) -> Result<usize, SentraError> {
        let mut purged = 0usize;
        let from = height.to_be_bytes();
        let mut index_keys = Vec::new();
        for item in self.block_index.range(from.as_slice()..) {
            let (ik, _) = item.map_err(|e| SentraError::Storage(e.to_string()))?;
            index_keys.push(ik);
        }
        for ik in index_keys {
            self.events
                .remove(&ik[8..])
                .map_err(|e| SentraError::Storage(e.to_string()))?;
            self.block_index
                .remove(&ik)
                .map_err(|e| SentraError::Storage(e.to_string()))?;
            purged += 1;
        }
        Ok(purged)
    }

    pub fn count_events(&self) -> u64 {
        self.events.len() as u64
    }

    /// The most recent `SafeValueUpdated` event by chronological order,
    /// as `(total_value_usd, timestamp)`.
    pub fn latest_safe_value(
        &self,
    ) -> Result<Option<(sentra_core::types::U256, Timestamp)>, SentraError> {
        let mut best: Option<(sentra_core::types::U256, Timestamp, (Timestamp, u64, u32))> = None;
        for item in self.events.iter() {
            let (_, b) = item.map_err(|e| SentraError::Storage(e.to_string()))?;
            let ev: ChainEvent =
                bincode::deserialize(&b).map_err(|e| SentraError::Serialization(e.to_string()))?;
            if let sentra_core::events::EventPayload::SafeValueUpdated { total_value_usd, .. } =
                ev.payload
            {
                let key = ev.sort_key();
                if best.as_ref().map(|(_, _, k)| key > *k).unwrap_or(true) {
                    best = Some((total_value_usd, ev.timestamp, key));
                }
            }
        }
        Ok(best.map(|(value, ts, _)| (value, ts)))
    }

    // ── Block-hash cache ─────────────────────────────────────────────────────

    /// Cache a processed block's hash, evicting the oldest heights once the
    /// cache exceeds `max_entries`.
    pub fn put_block_hash(
        &self,
        height: BlockNumber,
        hash: &BlockHash,
        max_entries: usize,
    ) -> Result<(), SentraError> {
        self.block_hashes
            .insert(height.to_be_bytes(), hash.0.as_ref())
            .map_err(|e| SentraError::Storage(e.to_string()))?;
        while self.block_hashes.len() > max_entries {
            match self.block_hashes.pop_min().map_err(|e| SentraError::Storage(e.to_string()))? {
                Some(_) => {}
                None => break,
            }
        }
        Ok(())
    }

    pub fn get_block_hash(&self, height: BlockNumber) -> Result<Option<BlockHash>, SentraError> {
        match self
            .block_hashes
            .get(height.to_be_bytes())
            .map_err(|e| SentraError::Storage(e.to_string()))?
        {
            Some(b) => {
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&b);
                Ok(Some(BlockHash::from_bytes(arr)))
            }
            None => Ok(None),
        }
    }

    /// Drop every cached hash at `height` and above. Companion of a reorg
    /// rewind to `height − 1`.
    pub fn drop_block_hashes_from(&self, height: BlockNumber) -> Result<(), SentraError> {
        let from = height.to_be_bytes();
        let mut keys = Vec::new();
        for item in self.block_hashes.range(from.as_slice()..) {
            let (k, _) = item.map_err(|e| SentraError::Storage(e.to_string()))?;
            keys.push(k);
        }
        for k in keys {
            self.block_hashes
                .remove(k)
                .map_err(|e| SentraError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    // ── EOA records ──────────────────────────────────────────────────────────

    pub fn get_eoa(&self, addr: &Address) -> Result<Option<EoaRecord>, SentraError> {
        match self.eoas.get(addr.as_bytes()).map_err(|e| SentraError::Storage(e.to_string()))? {
            Some(b) => Ok(Some(
                bincode::deserialize(&b).map_err(|e| SentraError::Serialization(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    pub fn put_eoa(&self, rec: &EoaRecord) -> Result<(), SentraError> {
        let b = bincode::serialize(rec).map_err(|e| SentraError::Serialization(e.to_string()))?;
        self.eoas
            .insert(rec.address.as_bytes(), b)
            .map_err(|e| SentraError::Storage(e.to_string()))?;
        Ok(())
    }

    /// The enumeration list of registered EOAs (order is maintained by the
    /// authorizer with swap-and-pop removal).
    pub fn get_eoa_list(&self) -> Result<Vec<Address>, SentraError> {
        match self.get_meta("eoa_list")? {
            Some(b) => {
                bincode::deserialize(&b).map_err(|e| SentraError::Serialization(e.to_string()))
            }
            None => Ok(Vec::new()),
        }
    }

    pub fn put_eoa_list(&self, list: &[Address]) -> Result<(), SentraError> {
        let b = bincode::serialize(list).map_err(|e| SentraError::Serialization(e.to_string()))?;
        self.put_meta("eoa_list", &b)
    }

    // ── Authorization records ────────────────────────────────────────────────

    pub fn put_authorization(&self, rec: &AuthorizationRecord) -> Result<(), SentraError> {
        let b = bincode::serialize(rec).map_err(|e| SentraError::Serialization(e.to_string()))?;
        self.authorizations
            .insert(rec.nonce.to_be_bytes(), b)
            .map_err(|e| SentraError::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn get_authorization(&self, nonce: Nonce) -> Result<Option<AuthorizationRecord>, SentraError> {
        match self
            .authorizations
            .get(nonce.to_be_bytes())
            .map_err(|e| SentraError::Storage(e.to_string()))?
        {
            Some(b) => Ok(Some(
                bincode::deserialize(&b).map_err(|e| SentraError::Serialization(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    /// Allocate the next authorization nonce (persisted so restarts can
    /// never reuse one). The caller commits the returned value only on a
    /// successful authorization.
    pub fn next_auth_nonce(&self) -> Result<Nonce, SentraError> {
        Ok(self
            .get_meta("next_auth_nonce")?
            .map(|b| {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&b[..8]);
                u64::from_be_bytes(arr)
            })
            .unwrap_or(0))
    }

    pub fn set_next_auth_nonce(&self, nonce: Nonce) -> Result<(), SentraError> {
        self.put_meta("next_auth_nonce", &nonce.to_be_bytes())
    }

    // ── Cursors / meta ───────────────────────────────────────────────────────

    pub fn last_processed_block(&self) -> Result<Option<BlockNumber>, SentraError> {
        Ok(self.get_meta("last_processed_block")?.map(|b| {
            let mut arr = [0u8; 8];
            arr.copy_from_slice(&b[..8]);
            u64::from_be_bytes(arr)
        }))
    }

    pub fn set_last_processed_block(&self, height: BlockNumber) -> Result<(), SentraError> {
        self.put_meta("last_processed_block", &height.to_be_bytes())
    }

    /// Confirmation timestamp of the last successful push for
    /// `(module, sub_account)`. Recorded only after confirmation.
    pub fn last_update_timestamp(
        &self,
        module: &str,
        sub: &Address,
    ) -> Result<Option<Timestamp>, SentraError> {
        let key = format!("last_update:{}:{}", module, sub.to_hex());
        Ok(self.get_meta(&key)?.map(|b| {
            let mut arr = [0u8; 8];
            arr.copy_from_slice(&b[..8]);
            i64::from_be_bytes(arr)
        }))
    }

    pub fn set_last_update_timestamp(
        &self,
        module: &str,
        sub: &Address,
        ts: Timestamp,
    ) -> Result<(), SentraError> {
        let key = format!("last_update:{}:{}", module, sub.to_hex());
        self.put_meta(&key, &ts.to_be_bytes())
    }

    pub fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), SentraError> {
        self.meta
            .insert(key.as_bytes(), value)
            .map_err(|e| SentraError::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, SentraError> {
        self.meta
            .get(key.as_bytes())
            .map(|v| v.map(|iv| iv.to_vec()))
            .map_err(|e| SentraError::Storage(e.to_string()))
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), SentraError> {
        self._db.flush().map_err(|e| SentraError::Storage(e.to_string()))?;
        Ok(())
    }
}
