//! sentra-rpc
//!
//! JSON-RPC 2.0 control surface for the authorization core: spend
//! authorization, EOA administration, and read queries over the ledger
//! store. Addresses travel as 0x-prefixed hex, USD amounts as decimal
//! strings in 18-dec fixed point.

pub mod api;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerState};
