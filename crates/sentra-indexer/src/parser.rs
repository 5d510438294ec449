//! Calldata classification for raw protocol executions.
//!
//! The GraphQL indexer serves pre-decoded events, but the substrate-log
//! fallback can surface raw `execute_on_protocol(target, data)` calls.
//! A per-target parser decodes them; the registry dispatches on the target
//! address. Unknown targets and unknown selectors fail loudly — silently
//! classifying a call would corrupt the accounting downstream.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;

use sentra_core::error::SentraError;
use sentra_core::events::OpType;
use sentra_core::types::{Address, U256};

// ── ABI word access ──────────────────────────────────────────────────────────

/// 4-byte function selector of a calldata blob.
pub fn selector(data: &[u8]) -> Option<[u8; 4]> {
    if data.len() < 4 {
        return None;
    }
    let mut s = [0u8; 4];
    s.copy_from_slice(&data[..4]);
    Some(s)
}

/// The `i`-th 32-byte argument word after the selector.
fn word(data: &[u8], i: usize) -> Result<&[u8], SentraError> {
    let start = 4 + i * 32;
    let end = start + 32;
    if data.len() < end {
        return Err(SentraError::LengthMismatch);
    }
    Ok(&data[start..end])
}

fn word_address(data: &[u8], i: usize) -> Result<Address, SentraError> {
    let w = word(data, i)?;
    let mut a = [0u8; 20];
    a.copy_from_slice(&w[12..32]);
    Ok(Address::from_bytes(a))
}

fn word_u256(data: &[u8], i: usize) -> Result<U256, SentraError> {
    Ok(U256::from_big_endian(word(data, i)?))
}

// ── ProtocolParser ───────────────────────────────────────────────────────────

/// Per-protocol calldata decoder. One implementation per integrated
/// protocol family, dispatched by target address.
pub trait ProtocolParser: Send + Sync {
    fn supports_selector(&self, selector: [u8; 4]) -> bool;
    fn operation_type(&self, selector: [u8; 4]) -> Option<OpType>;
    fn extract_input_tokens(&self, data: &[u8]) -> Result<Vec<Address>, SentraError>;
    fn extract_input_amounts(&self, data: &[u8]) -> Result<Vec<U256>, SentraError>;
    fn extract_output_tokens(&self, data: &[u8]) -> Result<Vec<Address>, SentraError>;
    fn extract_recipient(&self, data: &[u8]) -> Result<Address, SentraError>;
}

// ── SimplePoolParser ─────────────────────────────────────────────────────────

/// Selector table for the plain single-asset pool ABI:
///   deposit(address asset, uint256 amount)
///   withdraw(address asset, uint256 amount)
///   swap(address assetIn, address assetOut, uint256 amountIn)
///   claim(address asset)
///   approve(address spender, uint256 amount)
static POOL_SELECTORS: Lazy<HashMap<[u8; 4], OpType>> = Lazy::new(|| {
    use sentra_core::types::keccak256;
    let sel = |sig: &str| {
        let d = keccak256(sig.as_bytes());
        [d[0], d[1], d[2], d[3]]
    };
    HashMap::from([
        (sel("deposit(address,uint256)"), OpType::Deposit),
        (sel("withdraw(address,uint256)"), OpType::Withdraw),
        (sel("swap(address,address,uint256)"), OpType::Swap),
        (sel("claim(address)"), OpType::Claim),
        (sel("approve(address,uint256)"), OpType::Approve),
    ])
});

/// Parser for protocols exposing the plain pool ABI above.
pub struct SimplePoolParser;

impl ProtocolParser for SimplePoolParser {
    fn supports_selector(&self, selector: [u8; 4]) -> bool {
        POOL_SELECTORS.contains_key(&selector)
    }

    fn operation_type(&self, selector: [u8; 4]) -> Option<OpType> {
        POOL_SELECTORS.get(&selector).copied()
    }

    fn extract_input_tokens(&self, data: &[u8]) -> Result<Vec<Address>, SentraError> {
        Ok(vec![word_address(data, 0)?])
    }

    fn extract_input_amounts(&self, data: &[u8]) -> Result<Vec<U256>, SentraError> {
        let sel = selector(data).ok_or(SentraError::LengthMismatch)?;
        match self.operation_type(sel) {
            Some(OpType::Swap) => Ok(vec![word_u256(data, 2)?]),
            Some(OpType::Claim) => Ok(Vec::new()),
            _ => Ok(vec![word_u256(data, 1)?]),
        }
    }

    fn extract_output_tokens(&self, data: &[u8]) -> Result<Vec<Address>, SentraError> {
        let sel = selector(data).ok_or(SentraError::LengthMismatch)?;
        match self.operation_type(sel) {
            Some(OpType::Swap) => Ok(vec![word_address(data, 1)?]),
            _ => Ok(Vec::new()),
        }
    }

    fn extract_recipient(&self, data: &[u8]) -> Result<Address, SentraError> {
        word_address(data, 0)
    }
}

// ── Registry ─────────────────────────────────────────────────────────────────

/// Maps protocol targets to their calldata parsers.
#[derive(Default)]
pub struct ParserRegistry {
    parsers: HashMap<Address, Arc<dyn ProtocolParser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, target: Address, parser: Arc<dyn ProtocolParser>) {
        self.parsers.insert(target, parser);
    }

    pub fn parser_for(&self, target: &Address) -> Option<&Arc<dyn ProtocolParser>> {
        self.parsers.get(target)
    }

    /// Classify a raw execution. Unknown targets and selectors the
    /// target's parser does not support are errors, never a default class.
    pub fn classify(&self, target: &Address, data: &[u8]) -> Result<OpType, SentraError> {
        let parser = self
            .parsers
            .get(target)
            .ok_or_else(|| SentraError::TargetNotWhitelisted(target.to_hex()))?;
        let sel = selector(data)
            .ok_or_else(|| SentraError::MalformedEvent(format!("{target}: calldata too short")))?;
        parser.operation_type(sel).ok_or_else(|| {
            SentraError::MalformedEvent(format!(
                "{target}: unknown selector 0x{}",
                hex::encode(sel)
            ))
        })
    }
}
