//! sentra-vault
//!
//! The treasury vault is an external collaborator: the role/whitelist/
//! reserve guard and its companion time-delay queue live outside this
//! repository. What lives here is the interface the core consumes — role
//! and operation types, the admission rules, and the delay-queue state
//! machine — so callers can validate movements before handing them to the
//! vault and interpret what comes back.

pub mod queue;
pub mod role;

pub use queue::{operation_id, OperationStatus, ScheduledOperation, TimelockQueue};
pub use role::{Role, TreasuryVault, VaultPolicy};
