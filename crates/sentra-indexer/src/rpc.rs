//! Direct substrate JSON-RPC client (the fallback event path).

use std::sync::Mutex;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use sentra_core::error::SentraError;
use sentra_core::events::ChainEvent;
use sentra_core::types::BlockHash;

use crate::config::IndexerConfig;
use crate::ring::EndpointRing;
use crate::source::SubstrateApi;
use crate::wire::WireEvent;

/// JSON-RPC 2.0 client over the configured endpoint ring. Calls retry with
/// jittered backoff; repeated failures rotate the ring before the next
/// attempt, and exhausting every retry surfaces an infrastructure error
/// without touching any state.
pub struct HttpSubstrateClient {
    client: reqwest::Client,
    ring: Mutex<EndpointRing>,
    max_retries: u32,
}

impl HttpSubstrateClient {
    pub fn new(cfg: &IndexerConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            ring: Mutex::new(EndpointRing::new(cfg.rpc_endpoints.clone(), cfg.max_failures)),
            max_retries: cfg.max_retries,
        }
    }

    /// Call a JSON-RPC method and return the `result` field.
    async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, SentraError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let mut attempt = 0u32;
        loop {
            let url = self.ring.lock().unwrap().current().to_string();
            let outcome = async {
                let resp = self
                    .client
                    .post(&url)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| SentraError::Rpc(format!("{method} via {url}: {e}")))?;
                let json: serde_json::Value = resp
                    .json()
                    .await
                    .map_err(|e| SentraError::Rpc(format!("{method}: invalid response: {e}")))?;
                if let Some(err) = json.get("error") {
                    return Err(SentraError::Rpc(format!("{method}: {err}")));
                }
                Ok(json["result"].clone())
            }
            .await;

            match outcome {
                Ok(result) => {
                    self.ring.lock().unwrap().record_success();
                    return Ok(result);
                }
                Err(e) => {
                    attempt += 1;
                    self.ring.lock().unwrap().record_failure();
                    if attempt > self.max_retries {
                        return Err(e);
                    }
                    warn!(method, attempt, error = %e, "RPC call failed; retrying");
                    let jitter_ms = rand::thread_rng().gen_range(50..250);
                    tokio::time::sleep(Duration::from_millis(200 * attempt as u64 + jitter_ms))
                        .await;
                }
            }
        }
    }
}

impl SubstrateApi for HttpSubstrateClient {
    async fn latest_block_number(&self) -> Result<u64, SentraError> {
        let result = self.call("sentra_blockNumber", serde_json::json!([])).await?;
        result
            .as_u64()
            .ok_or_else(|| SentraError::Rpc("blockNumber: expected integer".into()))
    }

    async fn block_hash(&self, height: u64) -> Result<Option<BlockHash>, SentraError> {
        let result = self.call("sentra_getBlockHash", serde_json::json!([height])).await?;
        if result.is_null() {
            return Ok(None);
        }
        let s = result
            .as_str()
            .ok_or_else(|| SentraError::Rpc("getBlockHash: expected string".into()))?;
        let hash = BlockHash::from_hex(s)
            .map_err(|e| SentraError::Rpc(format!("getBlockHash: bad hash: {e}")))?;
        Ok(Some(hash))
    }

    async fn logs(&self, from: u64, to: u64) -> Result<Vec<ChainEvent>, SentraError> {
        let result = self
            .call("sentra_getLogs", serde_json::json!([{ "fromBlock": from, "toBlock": to }]))
            .await?;
        let raw: Vec<WireEvent> = serde_json::from_value(result)
            .map_err(|e| SentraError::Rpc(format!("getLogs: bad payload: {e}")))?;
        let mut events = Vec::with_capacity(raw.len());
        for w in raw {
            match w.into_chain_event() {
                Ok(ev) => events.push(ev),
                // Malformed events are logged and dropped, never ingested.
                Err(e) => warn!(error = %e, "dropping malformed log"),
            }
        }
        Ok(events)
    }
}
