//! Daemon configuration file.

use serde::{Deserialize, Serialize};

use sentra_core::config::CoreConfig;
use sentra_indexer::IndexerConfig;

/// One tracked token: its native decimals and, optionally, a constant
/// price feed (aggregator-backed feeds are registered at startup when an
/// on-chain feed address is configured instead).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenConfig {
    pub address: String,
    pub decimals: u8,
    /// Fixed USD price in 18-dec fixed point (decimal string), for
    /// stable-pegged tokens and test deployments.
    pub constant_price: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub core: CoreConfig,
    pub indexer: IndexerConfig,
    /// The parent multisig account the authorizer is attached to.
    pub avatar: String,
    /// Address allowed to call owner operations.
    pub owner: String,
    /// Module identity for `last_update_timestamp` bookkeeping.
    pub module: String,
    /// Per-module spending budget in bps of safe value.
    pub max_spending_bps: u64,
    /// Enforcement-substrate JSON-RPC endpoint for batch updates.
    pub enforcement_url: String,
    pub poll_interval_secs: u64,
    pub refresh_interval_secs: u64,
    pub tokens: Vec<TokenConfig>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            core: CoreConfig::default(),
            indexer: IndexerConfig::default(),
            avatar: format!("0x{}", "00".repeat(20)),
            owner: format!("0x{}", "00".repeat(20)),
            module: "defi".into(),
            max_spending_bps: 1_000,
            enforcement_url: "http://127.0.0.1:8545".into(),
            poll_interval_secs: 15,
            refresh_interval_secs: 300,
            tokens: Vec::new(),
        }
    }
}
