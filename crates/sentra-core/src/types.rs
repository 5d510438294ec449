use serde::{Deserialize, Serialize};
use std::fmt;

pub use primitive_types::{H256, U256, U512};

/// Unix timestamp (seconds, UTC).
pub type Timestamp = i64;

/// Authorization sequence number (monotonically increasing per authorizer).
pub type Nonce = u64;

/// Substrate block height.
pub type BlockNumber = u64;

// ── Address ──────────────────────────────────────────────────────────────────

/// 20-byte account identity on the enforcement substrate.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn from_bytes(b: [u8; 20]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Lowercase hex string with `0x` prefix — the canonical text form.
    /// Token map keys use this form so lookups are case-insensitive.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw)?;
        if bytes.len() != 20 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({}…)", &self.to_hex()[..10])
    }
}

// ── TxHash / BlockHash ───────────────────────────────────────────────────────

/// 32-byte substrate transaction hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxHash(pub [u8; 32]);

impl TxHash {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({}…)", &self.to_hex()[..18])
    }
}

/// 32-byte substrate block hash, cached for reorg detection.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockHash(pub [u8; 32]);

impl BlockHash {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({}…)", &self.to_hex()[..18])
    }
}

// ── RecipientHash ────────────────────────────────────────────────────────────

/// 32-byte commitment to a payment recipient. The core never learns the
/// recipient itself — execution resolves the hash downstream.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecipientHash(pub [u8; 32]);

impl RecipientHash {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for RecipientHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecipientHash(0x{}…)", &hex::encode(self.0)[..16])
    }
}

// ── TransferType ─────────────────────────────────────────────────────────────

/// Kind of outbound movement an EOA may be authorized for. Encoded as a bit
/// position in the per-EOA allowed-types bitmap; positions up to 7 are
/// admissible so future kinds do not need a record migration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransferType {
    Payment = 0,
    Transfer = 1,
    Interbank = 2,
}

/// Highest admissible transfer-type bit position.
pub const MAX_TRANSFER_TYPE: u8 = 7;

impl TransferType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Build the allowed-types bitmap by OR-ing `1 << t` for each raw type.
/// Values above [`MAX_TRANSFER_TYPE`] are rejected by the caller beforehand.
pub fn types_bitmap(types: &[u8]) -> u8 {
    types.iter().fold(0u8, |acc, t| acc | (1u8 << t))
}

/// True when bit `transfer_type` is set in `bitmap`.
pub fn bitmap_allows(bitmap: u8, transfer_type: u8) -> bool {
    transfer_type <= MAX_TRANSFER_TYPE && bitmap & (1u8 << transfer_type) != 0
}

// ── Wide arithmetic ──────────────────────────────────────────────────────────

/// `a × b / denom` through a 512-bit intermediate; division truncates toward
/// zero. Returns zero when `denom` is zero.
pub fn mul_div(a: U256, b: U256, denom: U256) -> U256 {
    if denom.is_zero() {
        return U256::zero();
    }
    let prod: U512 = a.full_mul(b);
    let q = prod / U512::from(denom);
    U256::try_from(q).unwrap_or(U256::MAX)
}

// ── Keccak-256 ───────────────────────────────────────────────────────────────

/// Keccak-256 digest, used for vault operation identifiers and recipient
/// commitments.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    use sha3::{Digest, Keccak256};
    let mut h = Keccak256::new();
    h.update(data);
    h.finalize().into()
}
