//! Runtime configuration.
//!
//! Every tunable the daemon accepts, with the normative defaults. Loaded
//! from a JSON file by the service binary; individual engines receive the
//! slices they need by value.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ABSOLUTE_MAX_BPS, DEFAULT_CONFIRMATION_BLOCKS, DEFAULT_INCREASE_THRESHOLD_BPS,
    MAX_RECORDS_PER_EOA, WINDOW_DURATION_SECS,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Rolling spend window in seconds.
    pub window_duration_seconds: i64,
    /// Cap on live spend records per EOA.
    pub max_records_per_eoa: usize,
    /// Allowance increases below this many bps of the on-chain value are
    /// not worth a transaction.
    pub allowance_increase_threshold_bps: u64,
    /// Push an unchanged allowance anyway once the last confirmed update is
    /// older than this.
    pub max_staleness_seconds: i64,
    /// Hard ceiling on any allowance update, in bps of safe value.
    pub absolute_max_spending_bps: u64,
    /// Finalized-block depth subtracted from the chain tip.
    pub confirmation_blocks: u64,
    /// Bound on the reorg-detection block-hash cache.
    pub max_block_hash_cache: usize,
    /// Chunk size for direct substrate-log pagination.
    pub max_blocks_per_query: u64,
    /// Deepest historical backfill permitted, in blocks.
    pub max_historical_blocks: u64,
    /// Oracle-sourced data older than this is rejected.
    pub max_oracle_age_seconds: i64,
    /// Safe portfolio value older than this is rejected.
    pub max_safe_value_age_seconds: i64,
    /// Price feed rounds older than this are rejected.
    pub max_price_feed_age_seconds: i64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            window_duration_seconds: WINDOW_DURATION_SECS,
            max_records_per_eoa: MAX_RECORDS_PER_EOA,
            allowance_increase_threshold_bps: DEFAULT_INCREASE_THRESHOLD_BPS,
            max_staleness_seconds: 2_700,
            absolute_max_spending_bps: DEFAULT_ABSOLUTE_MAX_BPS,
            confirmation_blocks: DEFAULT_CONFIRMATION_BLOCKS,
            max_block_hash_cache: 1_000,
            max_blocks_per_query: 1_000,
            max_historical_blocks: 2_592_000,
            max_oracle_age_seconds: 3_600,
            max_safe_value_age_seconds: 3_600,
            max_price_feed_age_seconds: 86_400,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_table() {
        let c = CoreConfig::default();
        assert_eq!(c.window_duration_seconds, 86_400);
        assert_eq!(c.max_records_per_eoa, 200);
        assert_eq!(c.allowance_increase_threshold_bps, 200);
        assert_eq!(c.max_staleness_seconds, 2_700);
        assert_eq!(c.absolute_max_spending_bps, 2_000);
        assert_eq!(c.confirmation_blocks, 60);
        assert_eq!(c.max_block_hash_cache, 1_000);
        assert_eq!(c.max_blocks_per_query, 1_000);
        assert_eq!(c.max_historical_blocks, 2_592_000);
        assert_eq!(c.max_oracle_age_seconds, 3_600);
        assert_eq!(c.max_safe_value_age_seconds, 3_600);
        assert_eq!(c.max_price_feed_age_seconds, 86_400);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let c: CoreConfig = serde_json::from_str(r#"{"confirmation_blocks": 12}"#).unwrap();
        assert_eq!(c.confirmation_blocks, 12);
        assert_eq!(c.window_duration_seconds, 86_400);
    }
}
