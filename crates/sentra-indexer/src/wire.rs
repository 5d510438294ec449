//! Wire representation of events as served by the GraphQL indexer and the
//! substrate-log endpoint. Both paths deliver the same JSON shape; the
//! conversion into [`ChainEvent`] is where malformed payloads are caught.

use serde::Deserialize;

use sentra_core::error::SentraError;
use sentra_core::events::{
    ChainEvent, EventKey, EventPayload, OpType, ProtocolExecution, SpendAuthorized,
    TransferExecuted,
};
use sentra_core::types::{Address, RecipientHash, TxHash, U256};

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEvent {
    pub tx_hash: String,
    pub log_index: u32,
    pub block_number: u64,
    pub timestamp: i64,
    #[serde(flatten)]
    pub body: WireEventBody,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum WireEventBody {
    #[serde(rename_all = "camelCase")]
    ProtocolExecution {
        sub_account: String,
        target: String,
        op_type: String,
        tokens_in: Vec<String>,
        amounts_in: Vec<String>,
        tokens_out: Vec<String>,
        amounts_out: Vec<String>,
        spending_cost: String,
    },
    #[serde(rename_all = "camelCase")]
    TransferExecuted {
        sub_account: String,
        token: String,
        recipient: String,
        amount: String,
        spending_cost: String,
    },
    #[serde(rename_all = "camelCase")]
    SpendAuthorized {
        avatar: String,
        eoa: String,
        amount: String,
        recipient_hash: String,
        transfer_type: u8,
        nonce: u64,
    },
    #[serde(rename_all = "camelCase")]
    SafeValueUpdated { total_value_usd: String, update_count: u64 },
    #[serde(rename_all = "camelCase")]
    SpendingAllowanceUpdated { sub_account: String, new_allowance: String },
    #[serde(rename_all = "camelCase")]
    AcquiredBalanceUpdated { sub_account: String, token: String, new_balance: String },
}

fn bad(ev: &WireEvent, what: &str) -> SentraError {
    SentraError::MalformedEvent(format!("{}#{} ({what})", ev.tx_hash, ev.log_index))
}

fn address(ev: &WireEvent, s: &str) -> Result<Address, SentraError> {
    Address::from_hex(s).map_err(|_| bad(ev, "address"))
}

fn amount(ev: &WireEvent, s: &str) -> Result<U256, SentraError> {
    U256::from_dec_str(s).map_err(|_| bad(ev, "amount"))
}

fn op_type(ev: &WireEvent, s: &str) -> Result<OpType, SentraError> {
    match s {
        "SWAP" => Ok(OpType::Swap),
        "DEPOSIT" => Ok(OpType::Deposit),
        "WITHDRAW" => Ok(OpType::Withdraw),
        "CLAIM" => Ok(OpType::Claim),
        "APPROVE" => Ok(OpType::Approve),
        // Unknown operation classes fail loudly; silent classification
        // would corrupt the accounting downstream.
        _ => Err(bad(ev, "opType")),
    }
}

impl WireEvent {
    pub fn into_chain_event(self) -> Result<ChainEvent, SentraError> {
        let tx_hash = TxHash::from_hex(&self.tx_hash).map_err(|_| bad(&self, "txHash"))?;
        let payload = match &self.body {
            WireEventBody::ProtocolExecution {
                sub_account,
                target,
                op_type: op,
                tokens_in,
                amounts_in,
                tokens_out,
                amounts_out,
                spending_cost,
            } => {
                let p = ProtocolExecution {
                    sub_account: address(&self, sub_account)?,
                    target: address(&self, target)?,
                    op_type: op_type(&self, op)?,
                    tokens_in: tokens_in
                        .iter()
                        .map(|t| address(&self, t))
                        .collect::<Result<_, _>>()?,
                    amounts_in: amounts_in
                        .iter()
                        .map(|a| amount(&self, a))
                        .collect::<Result<_, _>>()?,
                    tokens_out: tokens_out
                        .iter()
                        .map(|t| address(&self, t))
                        .collect::<Result<_, _>>()?,
                    amounts_out: amounts_out
                        .iter()
                        .map(|a| amount(&self, a))
                        .collect::<Result<_, _>>()?,
                    spending_cost: amount(&self, spending_cost)?,
                };
                if !p.arrays_consistent() {
                    return Err(bad(&self, "arrays out of step"));
                }
                EventPayload::ProtocolExecution(p)
            }
            WireEventBody::TransferExecuted { sub_account, token, recipient, amount: amt, spending_cost } => {
                EventPayload::TransferExecuted(TransferExecuted {
                    sub_account: address(&self, sub_account)?,
                    token: address(&self, token)?,
                    recipient: address(&self, recipient)?,
                    amount: amount(&self, amt)?,
                    spending_cost: amount(&self, spending_cost)?,
                })
            }
            WireEventBody::SpendAuthorized { avatar, eoa, amount: amt, recipient_hash, transfer_type, nonce } => {
                let raw = recipient_hash.strip_prefix("0x").unwrap_or(recipient_hash);
                let bytes = hex::decode(raw).map_err(|_| bad(&self, "recipientHash"))?;
                if bytes.len() != 32 {
                    return Err(bad(&self, "recipientHash length"));
                }
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&bytes);
                EventPayload::SpendAuthorized(SpendAuthorized {
                    avatar: address(&self, avatar)?,
                    eoa: address(&self, eoa)?,
                    amount: amount(&self, amt)?,
                    recipient_hash: RecipientHash::from_bytes(arr),
                    transfer_type: *transfer_type,
                    nonce: *nonce,
                })
            }
            WireEventBody::SafeValueUpdated { total_value_usd, update_count } => {
                EventPayload::SafeValueUpdated {
                    total_value_usd: amount(&self, total_value_usd)?,
                    update_count: *update_count,
                }
            }
            WireEventBody::SpendingAllowanceUpdated { sub_account, new_allowance } => {
                EventPayload::SpendingAllowanceUpdated {
                    sub_account: address(&self, sub_account)?,
                    new_allowance: amount(&self, new_allowance)?,
                }
            }
            WireEventBody::AcquiredBalanceUpdated { sub_account, token, new_balance } => {
                EventPayload::AcquiredBalanceUpdated {
                    sub_account: address(&self, sub_account)?,
                    token: address(&self, token)?,
                    new_balance: amount(&self, new_balance)?,
                }
            }
        };
        Ok(ChainEvent {
            key: EventKey { tx_hash, log_index: self.log_index },
            block_number: self.block_number,
            timestamp: self.timestamp,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(json: serde_json::Value) -> Result<ChainEvent, SentraError> {
        let ev: WireEvent = serde_json::from_value(json).expect("wire shape");
        ev.into_chain_event()
    }

    #[test]
    fn parses_protocol_execution() {
        let ev = wire(serde_json::json!({
            "txHash": format!("0x{}", "11".repeat(32)),
            "logIndex": 2,
            "blockNumber": 1048,
            "timestamp": 1700000000i64,
            "kind": "protocolExecution",
            "subAccount": format!("0x{}", "ab".repeat(20)),
            "target": format!("0x{}", "cd".repeat(20)),
            "opType": "SWAP",
            "tokensIn": [format!("0x{}", "01".repeat(20))],
            "amountsIn": ["100000000"],
            "tokensOut": [format!("0x{}", "02".repeat(20))],
            "amountsOut": ["30000000000000000"],
            "spendingCost": "100000000000000000000"
        }))
        .unwrap();
        assert_eq!(ev.key.log_index, 2);
        match ev.payload {
            EventPayload::ProtocolExecution(p) => {
                assert_eq!(p.op_type, OpType::Swap);
                assert_eq!(p.amounts_in[0], U256::from(100_000_000u64));
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn out_of_step_arrays_are_rejected_loudly() {
        let err = wire(serde_json::json!({
            "txHash": format!("0x{}", "11".repeat(32)),
            "logIndex": 0,
            "blockNumber": 1,
            "timestamp": 1i64,
            "kind": "protocolExecution",
            "subAccount": format!("0x{}", "ab".repeat(20)),
            "target": format!("0x{}", "cd".repeat(20)),
            "opType": "DEPOSIT",
            "tokensIn": [format!("0x{}", "01".repeat(20))],
            "amountsIn": [],
            "tokensOut": [],
            "amountsOut": [],
            "spendingCost": "0"
        }))
        .unwrap_err();
        assert!(matches!(err, SentraError::MalformedEvent(_)));
    }

    #[test]
    fn unknown_op_type_is_rejected() {
        let err = wire(serde_json::json!({
            "txHash": format!("0x{}", "11".repeat(32)),
            "logIndex": 0,
            "blockNumber": 1,
            "timestamp": 1i64,
            "kind": "protocolExecution",
            "subAccount": format!("0x{}", "ab".repeat(20)),
            "target": format!("0x{}", "cd".repeat(20)),
            "opType": "FLASHLOAN",
            "tokensIn": [],
            "amountsIn": [],
            "tokensOut": [],
            "amountsOut": [],
            "spendingCost": "0"
        }))
        .unwrap_err();
        assert!(matches!(err, SentraError::MalformedEvent(_)));
    }

    #[test]
    fn parses_transfer_event() {
        let ev = wire(serde_json::json!({
            "txHash": format!("0x{}", "22".repeat(32)),
            "logIndex": 0,
            "blockNumber": 7,
            "timestamp": 42i64,
            "kind": "transferExecuted",
            "subAccount": format!("0x{}", "ab".repeat(20)),
            "token": format!("0x{}", "01".repeat(20)),
            "recipient": format!("0x{}", "ee".repeat(20)),
            "amount": "5",
            "spendingCost": "1"
        }))
        .unwrap();
        assert!(matches!(ev.payload, EventPayload::TransferExecuted(_)));
    }
}
