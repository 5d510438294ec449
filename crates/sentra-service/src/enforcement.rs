//! JSON-RPC client for the enforcement substrate's write surface.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Context;
use tracing::debug;

use sentra_core::error::SentraError;
use sentra_core::types::{Address, U256};
use sentra_pusher::{BatchUpdate, EnforcementClient, SubmissionId};

/// Talks to the substrate gateway that relays `batch_update` transactions.
/// Submission returns as soon as the transaction is accepted; confirmation
/// is polled separately so the pusher can pipeline.
pub struct HttpEnforcementClient {
    client: reqwest::Client,
    url: String,
    request_id: AtomicU64,
    confirmation_poll_interval: Duration,
    confirmation_attempts: u32,
}

impl HttpEnforcementClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            request_id: AtomicU64::new(1),
            confirmation_poll_interval: Duration::from_secs(2),
            confirmation_attempts: 30,
        }
    }

    async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, SentraError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": self.request_id.fetch_add(1, Ordering::Relaxed),
        });
        let result: anyhow::Result<serde_json::Value> = async {
            let resp = self
                .client
                .post(&self.url)
                .json(&body)
                .send()
                .await
                .with_context(|| format!("connecting to substrate gateway at {}", self.url))?;
            let json: serde_json::Value = resp.json().await.context("parsing RPC response")?;
            if let Some(err) = json.get("error") {
                anyhow::bail!("RPC error: {err}");
            }
            Ok(json["result"].clone())
        }
        .await;
        result.map_err(|e| SentraError::Rpc(format!("{method}: {e:#}")))
    }
}

impl EnforcementClient for HttpEnforcementClient {
    async fn spending_allowance(&self, sub: Address) -> Result<U256, SentraError> {
        let result = self
            .call("sentra_getSpendingAllowance", serde_json::json!([sub.to_hex()]))
            .await?;
        let s = result
            .as_str()
            .ok_or_else(|| SentraError::Rpc("getSpendingAllowance: expected string".into()))?;
        U256::from_dec_str(s).map_err(|e| SentraError::Rpc(format!("bad allowance: {e:?}")))
    }

    async fn acquired_balances(&self, sub: Address) -> Result<Vec<(Address, U256)>, SentraError> {
        let result = self
            .call("sentra_getAcquiredBalances", serde_json::json!([sub.to_hex()]))
            .await?;
        let raw: Vec<(String, String)> = serde_json::from_value(result)
            .map_err(|e| SentraError::Rpc(format!("getAcquiredBalances: bad payload: {e}")))?;
        raw.into_iter()
            .map(|(token, balance)| {
                let token = Address::from_hex(&token)
                    .map_err(|e| SentraError::Rpc(format!("bad token: {e}")))?;
                let balance = U256::from_dec_str(&balance)
                    .map_err(|e| SentraError::Rpc(format!("bad balance: {e:?}")))?;
                Ok((token, balance))
            })
            .collect()
    }

    async fn submit_batch_update(
        &self,
        sequence: u64,
        update: &BatchUpdate,
    ) -> Result<SubmissionId, SentraError> {
        let tokens: Vec<String> = update.tokens.iter().map(|t| t.to_hex()).collect();
        let balances: Vec<String> = update.balances.iter().map(|b| b.to_string()).collect();
        let result = self
            .call(
                "sentra_submitBatchUpdate",
                serde_json::json!([{
                    "sequence": sequence,
                    "subAccount": update.sub_account.to_hex(),
                    "newAllowance": update.new_allowance.to_string(),
                    "tokens": tokens,
                    "balances": balances,
                }]),
            )
            .await?;
        let id = result
            .as_u64()
            .ok_or_else(|| SentraError::Rpc("submitBatchUpdate: expected submission id".into()))?;
        Ok(SubmissionId(id))
    }

    async fn await_confirmation(&self, id: SubmissionId) -> Result<(), SentraError> {
        for attempt in 0..self.confirmation_attempts {
            let result = self
                .call("sentra_getSubmissionStatus", serde_json::json!([id.0]))
                .await?;
            match result.as_str() {
                Some("confirmed") => return Ok(()),
                Some("failed") => {
                    return Err(SentraError::Rpc(format!("submission {} reverted", id.0)))
                }
                _ => debug!(id = id.0, attempt, "submission still pending"),
            }
            tokio::time::sleep(self.confirmation_poll_interval).await;
        }
        Err(SentraError::Rpc(format!("submission {} unconfirmed after timeout", id.0)))
    }
}
