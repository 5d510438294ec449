//! sentra-authorizer
//!
//! The Spend Authorizer: validates per-EOA spending intents against rolling
//! 24-hour limits and transfer-type policy, assigns strictly monotonic
//! nonces, and emits authorization records. It never moves funds — the
//! records it persists are the ground truth consumed by the execution
//! gateway downstream.

pub mod engine;

pub use engine::SpendAuthorizer;
