//! sentra-pusher
//!
//! Computes each sub-account's new spending allowance from the rebuilt
//! state and pushes batched updates to the enforcement substrate — but only
//! when the update-threshold policy says the difference is worth a
//! transaction. Submissions are pipelined with contiguous sequence numbers
//! and awaited in bulk at cycle end; `last_update_timestamp` advances only
//! on confirmation.

pub mod calc;
pub mod push;

pub use calc::{compute_allowance, decide_update, ensure_within_absolute_cap, UpdateReason};
pub use push::{AllowancePusher, BatchUpdate, EnforcementClient, PushSummary, SubmissionId};
