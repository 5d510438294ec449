//! Primary event path: the GraphQL indexer.

use serde::Deserialize;
use tracing::warn;

use sentra_core::error::SentraError;
use sentra_core::events::ChainEvent;

use crate::source::IndexerApi;
use crate::wire::WireEvent;

const EVENTS_QUERY: &str = r#"
query Events($fromBlock: Int!, $toBlock: Int!) {
  events(where: { blockNumber_gte: $fromBlock, blockNumber_lte: $toBlock },
         orderBy: [timestamp_ASC, blockNumber_ASC, logIndex_ASC]) {
    txHash
    logIndex
    blockNumber
    timestamp
    kind
    subAccount
    target
    opType
    tokensIn
    amountsIn
    tokensOut
    amountsOut
    spendingCost
    token
    recipient
    amount
    avatar
    eoa
    recipientHash
    transferType
    nonce
    totalValueUsd
    updateCount
    newAllowance
    newBalance
  }
}
"#;

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<EventsData>,
    errors: Option<Vec<serde_json::Value>>,
}

#[derive(Deserialize)]
struct EventsData {
    events: Vec<WireEvent>,
}

/// Thin reqwest client for the indexer's GraphQL endpoint.
pub struct GraphQlIndexerClient {
    client: reqwest::Client,
    url: String,
}

impl GraphQlIndexerClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), url: url.into() }
    }
}

impl IndexerApi for GraphQlIndexerClient {
    async fn events(&self, from: u64, to: u64) -> Result<Vec<ChainEvent>, SentraError> {
        let body = serde_json::json!({
            "query": EVENTS_QUERY,
            "variables": { "fromBlock": from, "toBlock": to }
        });
        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SentraError::Indexer(format!("query via {}: {e}", self.url)))?;
        let parsed: GraphQlResponse = resp
            .json()
            .await
            .map_err(|e| SentraError::Indexer(format!("invalid response: {e}")))?;

        if let Some(errors) = parsed.errors {
            if !errors.is_empty() {
                return Err(SentraError::Indexer(format!("GraphQL errors: {errors:?}")));
            }
        }
        let data = parsed
            .data
            .ok_or_else(|| SentraError::Indexer("response missing data".into()))?;

        let mut events = Vec::with_capacity(data.events.len());
        for w in data.events {
            match w.into_chain_event() {
                Ok(ev) => events.push(ev),
                Err(e) => warn!(error = %e, "dropping malformed indexer event"),
            }
        }
        Ok(events)
    }
}
