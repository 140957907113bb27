//! Mock chain for local testing of the lowest-unique-bid auction engine.
//!
//! The chain owns an in-memory ledger (balances, asset ownership, finalized
//! headers with balance snapshots) and the auction module state. Calls run
//! against copies of both and commit only on success.

pub mod chain;
pub mod ledger;
pub mod types;

pub use chain::{Chain, ChainError, Receipt, BLOCK_TIME};
pub use ledger::MockLedger;
