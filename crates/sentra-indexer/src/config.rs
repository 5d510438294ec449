use serde::{Deserialize, Serialize};

/// Configuration for the event source.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// GraphQL indexer endpoint; when absent, every query goes through the
    /// substrate-log fallback.
    pub graphql_url: Option<String>,
    /// Substrate JSON-RPC endpoints, tried in ring order.
    pub rpc_endpoints: Vec<String>,
    /// Consecutive failures on one endpoint before rotating to the next.
    pub max_failures: u32,
    /// Bounded retry attempts per call before giving up on the cycle.
    pub max_retries: u32,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            graphql_url: None,
            rpc_endpoints: vec!["http://127.0.0.1:8545".into()],
            max_failures: sentra_core::constants::MAX_ENDPOINT_FAILURES,
            max_retries: 3,
        }
    }
}
