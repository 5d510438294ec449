//! sentra-service
//!
//! Wiring and scheduling for the authorization & accounting daemon. The
//! binary in `main.rs` assembles the pipeline from this crate's pieces;
//! integration tests drive [`cycle::CycleRunner`] directly.

pub mod config;
pub mod cycle;
pub mod enforcement;

pub use config::ServiceConfig;
pub use cycle::{CycleReport, CycleRunner};
pub use enforcement::HttpEnforcementClient;
