use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;

use crate::types::{RpcAuthorization, RpcEoaStatus, RpcRegisterParams};

/// Sentra JSON-RPC 2.0 API definition.
///
/// All method names are prefixed with "sentra_" via `namespace = "sentra"`.
#[rpc(server, namespace = "sentra")]
pub trait SentraApi {
    /// USD spent by an EOA inside the current rolling window (decimal
    /// string, 18-dec fixed point).
    #[method(name = "getRollingSpend")]
    async fn get_rolling_spend(&self, eoa: String) -> RpcResult<String>;

    /// Headroom left under the EOA's daily limit.
    #[method(name = "getRemainingLimit")]
    async fn get_remaining_limit(&self, eoa: String) -> RpcResult<String>;

    /// The EOA's configured daily limit (zero when unregistered).
    #[method(name = "getDailyLimit")]
    async fn get_daily_limit(&self, eoa: String) -> RpcResult<String>;

    #[method(name = "isRegisteredEoa")]
    async fn is_registered_eoa(&self, eoa: String) -> RpcResult<bool>;

    /// Registered EOAs with their limit status, enumeration order.
    #[method(name = "listEoas")]
    async fn list_eoas(&self) -> RpcResult<Vec<RpcEoaStatus>>;

    /// A past authorization by nonce.
    #[method(name = "getAuthorization")]
    async fn get_authorization(&self, nonce: u64) -> RpcResult<Option<RpcAuthorization>>;

    /// The event source's sync cursor.
    #[method(name = "getLastProcessedBlock")]
    async fn get_last_processed_block(&self) -> RpcResult<Option<u64>>;

    /// Authorize a spend for `eoa` (the authenticated caller identity).
    /// `amount` is a decimal string; `recipient_hash` 0x-prefixed 32 bytes.
    #[method(name = "authorizeSpend")]
    async fn authorize_spend(
        &self,
        eoa: String,
        amount: String,
        recipient_hash: String,
        transfer_type: u8,
    ) -> RpcResult<RpcAuthorization>;

    // ── Owner administration ──────────────────────────────────────────────────

    #[method(name = "registerEoa")]
    async fn register_eoa(&self, params: RpcRegisterParams) -> RpcResult<bool>;

    #[method(name = "revokeEoa")]
    async fn revoke_eoa(&self, caller: String, eoa: String) -> RpcResult<bool>;

    #[method(name = "updateLimit")]
    async fn update_limit(&self, caller: String, eoa: String, new_limit: String) -> RpcResult<bool>;

    #[method(name = "updateAllowedTypes")]
    async fn update_allowed_types(&self, params: RpcRegisterParams) -> RpcResult<bool>;

    #[method(name = "pause")]
    async fn pause(&self, caller: String) -> RpcResult<bool>;

    #[method(name = "unpause")]
    async fn unpause(&self, caller: String) -> RpcResult<bool>;
}
