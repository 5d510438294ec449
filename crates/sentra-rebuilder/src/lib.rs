//! sentra-rebuilder
//!
//! Off-chain reconstruction of per-sub-account DeFi accounting state under
//! the Acquired-Balance Model: withdrawn or swapped output inherits the
//! original acquisition timestamp of the input that paid for it, so reusing
//! previously-acquired tokens does not consume new allowance.
//!
//! The rebuilder replays a chronological event stream and produces
//! [`state::SubAccountState`]: rolling-window spending, per-token acquired
//! queues with inherited timestamps, and the live deposit records that let
//! later withdrawals find their way back to the deposit that funded them.

pub mod deposit;
pub mod queue;
pub mod rebuild;
pub mod state;

pub use deposit::DepositRecord;
pub use queue::{AcquiredEntry, AcquiredQueue, Consumption};
pub use rebuild::{ClaimRemainderPolicy, Rebuilder, RebuilderPolicy};
pub use state::SubAccountState;
