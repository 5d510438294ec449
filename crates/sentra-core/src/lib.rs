//! sentra-core
//!
//! Shared foundation for the Sentra authorization & accounting core:
//! - [`types`] — addresses, hashes, transfer types, USD fixed-point aliases
//! - [`events`] — the chain-event model consumed from the enforcement substrate
//! - [`error`] — the single error taxonomy surfaced by every engine
//! - [`spend`] — per-EOA rolling spend state and authorization records
//! - [`config`] — enumerated runtime options with their normative defaults
//! - [`constants`] — fixed protocol quantities

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod spend;
pub mod types;

pub use config::CoreConfig;
pub use error::SentraError;
