use primitive_types::U256;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SentraError {
    // ── Validation errors ────────────────────────────────────────────────────
    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("daily limit must be greater than zero")]
    InvalidDailyLimit,

    #[error("invalid transfer type: {0} (max 7)")]
    InvalidTransferType(u8),

    #[error("invalid address")]
    InvalidAddress,

    #[error("cannot register a core address as an EOA")]
    CannotRegisterCoreAddress,

    #[error("EOA already registered: {0}")]
    EoaAlreadyRegistered(String),

    // ── Policy errors ────────────────────────────────────────────────────────
    #[error("EOA not registered: {0}")]
    EoaNotRegistered(String),

    #[error("transfer type {0} not allowed for this EOA")]
    TransferTypeNotAllowed(u8),

    #[error("daily limit exceeded: requested {requested}, remaining {remaining}")]
    DailyLimitExceeded { requested: U256, remaining: U256 },

    #[error("too many spend records in window (max {max})")]
    TooManySpendRecords { max: usize },

    #[error("amount exceeds spending allowance")]
    ExceedsSpendingLimit,

    #[error("allowance exceeds absolute cap: requested {requested}, maximum {maximum}")]
    ExceedsAbsoluteMaxSpending { requested: U256, maximum: U256 },

    #[error("transfer would breach the reserve requirement for token {token}")]
    ReserveViolation { token: String },

    #[error("amount exceeds the caller's role limit")]
    AmountExceedsRoleLimit,

    #[error("target not whitelisted: {0}")]
    TargetNotWhitelisted(String),

    #[error("authorizer is paused")]
    Paused,

    #[error("caller is not the owner")]
    NotOwner,

    // ── Vault / delay-queue errors ───────────────────────────────────────────
    #[error("operation not found: {0}")]
    OperationNotFound(String),

    #[error("operation already scheduled: {0}")]
    OperationAlreadyScheduled(String),

    #[error("operation not ready (executable at {ready_at})")]
    OperationNotReady { ready_at: i64 },

    #[error("operation is not pending")]
    OperationNotPending,

    #[error("amount below the time-lock threshold; schedule rejected")]
    BelowTimelockThreshold,

    // ── Integrity errors ─────────────────────────────────────────────────────
    #[error("array length mismatch")]
    LengthMismatch,

    #[error("malformed event at {0}: token/amount arrays out of step")]
    MalformedEvent(String),

    #[error("oracle data is stale (updated at {updated_at})")]
    StaleOracleData { updated_at: i64 },

    #[error("portfolio safe value is stale (updated at {updated_at})")]
    StalePortfolioValue { updated_at: i64 },

    #[error("price feed for {token} is stale (updated at {updated_at})")]
    StalePriceFeed { token: String, updated_at: i64 },

    #[error("price feed for {token} returned a non-positive answer")]
    InvalidPrice { token: String },

    #[error("no price feed set for token {0}")]
    NoPriceFeedSet(String),

    // ── Infrastructure errors ────────────────────────────────────────────────
    #[error("substrate RPC failure: {0}")]
    Rpc(String),

    #[error("indexer query failure: {0}")]
    Indexer(String),

    #[error("reorg detected at block {height}")]
    ReorgDetected { height: u64 },

    #[error("all configured endpoints exhausted")]
    EndpointsExhausted,

    #[error("cycle already in progress")]
    CycleInProgress,

    // ── Serialization / storage ──────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Other(String),
}
