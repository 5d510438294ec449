//! sentra-store
//!
//! Append-only ledger persistence for the authorization & accounting core.
//! Events are keyed by `(tx_hash, log_index)` so re-ingesting after a reorg
//! replay is a no-op.

pub mod db;

pub use db::LedgerDb;
