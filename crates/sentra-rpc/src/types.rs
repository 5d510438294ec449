//! RPC data transfer objects.

use serde::{Deserialize, Serialize};

use sentra_core::spend::AuthorizationRecord;

/// A successful authorization as returned to callers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcAuthorization {
    pub avatar: String,
    pub eoa: String,
    pub amount: String,
    pub recipient_hash: String,
    pub transfer_type: u8,
    pub nonce: u64,
}

impl From<AuthorizationRecord> for RpcAuthorization {
    fn from(rec: AuthorizationRecord) -> Self {
        Self {
            avatar: rec.avatar.to_hex(),
            eoa: rec.eoa.to_hex(),
            amount: rec.amount.to_string(),
            recipient_hash: rec.recipient_hash.to_hex(),
            transfer_type: rec.transfer_type,
            nonce: rec.nonce,
        }
    }
}

/// Per-EOA limit summary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcEoaStatus {
    pub eoa: String,
    pub registered: bool,
    pub daily_limit: String,
    pub rolling_spend: String,
    pub remaining_limit: String,
    pub allowed_types: u8,
}

/// Parameters for `registerEoa` / `updateAllowedTypes`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcRegisterParams {
    pub caller: String,
    pub eoa: String,
    pub daily_limit: String,
    pub allowed_types: Vec<u8>,
}
