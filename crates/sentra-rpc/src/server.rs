use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObject;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use sentra_authorizer::SpendAuthorizer;
use sentra_core::error::SentraError;
use sentra_core::types::{Address, RecipientHash, U256};
use sentra_store::LedgerDb;

use crate::api::SentraApiServer;
use crate::types::{RpcAuthorization, RpcEoaStatus, RpcRegisterParams};

fn rpc_err(code: i32, msg: impl Into<String>) -> ErrorObject<'static> {
    ErrorObject::owned(code, msg.into(), None::<()>)
}

fn engine_err(e: SentraError) -> ErrorObject<'static> {
    // Validation/policy failures are caller errors; everything else is an
    // internal fault.
    let code = match e {
        SentraError::Storage(_) | SentraError::Serialization(_) | SentraError::Rpc(_) => -32603,
        _ => -32000,
    };
    rpc_err(code, e.to_string())
}

fn parse_address(s: &str) -> Result<Address, ErrorObject<'static>> {
    Address::from_hex(s).map_err(|e| rpc_err(-32602, format!("invalid address: {e}")))
}

fn parse_amount(s: &str) -> Result<U256, ErrorObject<'static>> {
    U256::from_dec_str(s).map_err(|e| rpc_err(-32602, format!("invalid amount: {e:?}")))
}

fn parse_recipient_hash(s: &str) -> Result<RecipientHash, ErrorObject<'static>> {
    let raw = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(raw).map_err(|e| rpc_err(-32602, format!("invalid recipient hash: {e}")))?;
    if bytes.len() != 32 {
        return Err(rpc_err(-32602, "recipient hash must be 32 bytes"));
    }
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&bytes);
    Ok(RecipientHash::from_bytes(arr))
}

/// Shared state passed to the RPC server.
pub struct RpcServerState {
    pub authorizer: tokio::sync::Mutex<SpendAuthorizer>,
    pub db: Arc<LedgerDb>,
}

/// The RPC server implementation.
pub struct RpcServer {
    state: Arc<RpcServerState>,
}

impl RpcServer {
    pub fn new(state: Arc<RpcServerState>) -> Self {
        Self { state }
    }

    /// Start the JSON-RPC server on `addr` with permissive CORS headers.
    /// Returns a handle to stop it.
    pub async fn start(self, addr: SocketAddr) -> anyhow::Result<ServerHandle> {
        let cors = CorsLayer::new()
            .allow_methods(Any)
            .allow_origin(Any)
            .allow_headers(Any);

        let server = Server::builder()
            .set_http_middleware(tower::ServiceBuilder::new().layer(cors))
            .build(addr)
            .await?;

        let module = self.into_rpc();
        let handle = server.start(module);
        info!(%addr, "RPC server started");
        Ok(handle)
    }

    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

#[async_trait]
impl SentraApiServer for RpcServer {
    async fn get_rolling_spend(&self, eoa: String) -> RpcResult<String> {
        let eoa = parse_address(&eoa)?;
        let auth = self.state.authorizer.lock().await;
        let spend = auth.rolling_spend(&eoa, self.now()).map_err(engine_err)?;
        Ok(spend.to_string())
    }

    async fn get_remaining_limit(&self, eoa: String) -> RpcResult<String> {
        let eoa = parse_address(&eoa)?;
        let auth = self.state.authorizer.lock().await;
        let remaining = auth.remaining_limit(&eoa, self.now()).map_err(engine_err)?;
        Ok(remaining.to_string())
    }

    async fn get_daily_limit(&self, eoa: String) -> RpcResult<String> {
        let eoa = parse_address(&eoa)?;
        let auth = self.state.authorizer.lock().await;
        Ok(auth.daily_limit(&eoa).map_err(engine_err)?.to_string())
    }

    async fn is_registered_eoa(&self, eoa: String) -> RpcResult<bool> {
        let eoa = parse_address(&eoa)?;
        let auth = self.state.authorizer.lock().await;
        auth.is_registered(&eoa).map_err(engine_err)
    }

    async fn list_eoas(&self) -> RpcResult<Vec<RpcEoaStatus>> {
        let now = self.now();
        let auth = self.state.authorizer.lock().await;
        let mut out = Vec::new();
        for eoa in auth.list_eoas().map_err(engine_err)? {
            let rec = self
                .state
                .db
                .get_eoa(&eoa)
                .map_err(engine_err)?
                .ok_or_else(|| rpc_err(-32603, "enumeration list out of sync"))?;
            let rolling = auth.rolling_spend(&eoa, now).map_err(engine_err)?;
            out.push(RpcEoaStatus {
                eoa: eoa.to_hex(),
                registered: rec.registered,
                daily_limit: rec.daily_limit.to_string(),
                rolling_spend: rolling.to_string(),
                remaining_limit: rec.daily_limit.saturating_sub(rolling).to_string(),
                allowed_types: rec.allowed_types,
            });
        }
        Ok(out)
    }

    async fn get_authorization(&self, nonce: u64) -> RpcResult<Option<RpcAuthorization>> {
        let rec = self.state.db.get_authorization(nonce).map_err(engine_err)?;
        Ok(rec.map(RpcAuthorization::from))
    }

    async fn get_last_processed_block(&self) -> RpcResult<Option<u64>> {
        self.state.db.last_processed_block().map_err(engine_err)
    }

    async fn authorize_spend(
        &self,
        eoa: String,
        amount: String,
        recipient_hash: String,
        transfer_type: u8,
    ) -> RpcResult<RpcAuthorization> {
        let eoa = parse_address(&eoa)?;
        let amount = parse_amount(&amount)?;
        let recipient_hash = parse_recipient_hash(&recipient_hash)?;
        let mut auth = self.state.authorizer.lock().await;
        let record = auth
            .authorize_spend(&eoa, amount, recipient_hash, transfer_type, self.now())
            .map_err(engine_err)?;
        Ok(record.into())
    }

    async fn register_eoa(&self, params: RpcRegisterParams) -> RpcResult<bool> {
        let caller = parse_address(&params.caller)?;
        let eoa = parse_address(&params.eoa)?;
        let limit = parse_amount(&params.daily_limit)?;
        let mut auth = self.state.authorizer.lock().await;
        auth.register_eoa(&caller, eoa, limit, &params.allowed_types)
            .map_err(engine_err)?;
        Ok(true)
    }

    async fn revoke_eoa(&self, caller: String, eoa: String) -> RpcResult<bool> {
        let caller = parse_address(&caller)?;
        let eoa = parse_address(&eoa)?;
        let mut auth = self.state.authorizer.lock().await;
        auth.revoke_eoa(&caller, eoa).map_err(engine_err)?;
        Ok(true)
    }

    async fn update_limit(&self, caller: String, eoa: String, new_limit: String) -> RpcResult<bool> {
        let caller = parse_address(&caller)?;
        let eoa = parse_address(&eoa)?;
        let limit = parse_amount(&new_limit)?;
        let mut auth = self.state.authorizer.lock().await;
        auth.update_limit(&caller, eoa, limit).map_err(engine_err)?;
        Ok(true)
    }

    async fn update_allowed_types(&self, params: RpcRegisterParams) -> RpcResult<bool> {
        let caller = parse_address(&params.caller)?;
        let eoa = parse_address(&params.eoa)?;
        let mut auth = self.state.authorizer.lock().await;
        auth.update_allowed_types(&caller, eoa, &params.allowed_types)
            .map_err(engine_err)?;
        Ok(true)
    }

    async fn pause(&self, caller: String) -> RpcResult<bool> {
        let caller = parse_address(&caller)?;
        let mut auth = self.state.authorizer.lock().await;
        auth.pause(&caller).map_err(engine_err)?;
        Ok(true)
    }

    async fn unpause(&self, caller: String) -> RpcResult<bool> {
        let caller = parse_address(&caller)?;
        let mut auth = self.state.authorizer.lock().await;
        auth.unpause(&caller).map_err(engine_err)?;
        Ok(true)
    }
}
