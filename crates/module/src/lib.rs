//! Lowest-unique-bid sealed auction module.
//!
//! This module implements the on-ledger logic for sealed auctions in which
//! the lowest unique bid wins and pays the second-lowest unique bid:
//!
//! - Auction creation with asset custody and reserve ceiling
//! - Bid commitment by funding a deterministically derived escrow
//! - Reveals with a collateralization deadline fixed at the first reveal
//! - Uniqueness bookkeeping and winner/price selection
//! - One-shot escrow settlement and collateral withdrawal
//!
//! # Architecture
//!
//! - `call`: Message types for state-changing operations
//! - `handlers`: Business logic for processing calls
//! - `bookkeeping`: Per-generation bid tallies and standings
//! - `settlement`: One-shot escrow settlement
//! - `queries`: Read-only state access
//! - `state`: Module state structures
//! - `host`: Interfaces to the host ledger
//! - `events`: Notifications
//! - `genesis`: Engine configuration
//! - `error`: Error types
//!
//! # Example
//!
//! ```ignore
//! use auction_module::{handlers, AuctionState, AuctionGenesisConfig};
//!
//! let mut state = AuctionState::new(AuctionGenesisConfig::default());
//! let ctx = handlers::CallContext { ... };
//!
//! // List an asset
//! let generation = handlers::handle_create_auction(&mut state, &ctx, &mut host, asset, 3600, 3600, 0)?;
//!
//! // Reveal a bid once the bidding period is over
//! handlers::handle_reveal_bid(&mut state, &ctx, &mut host, &verifier, asset, 7, salt, None)?;
//! ```

pub mod bookkeeping;
pub mod call;
pub mod error;
pub mod events;
pub mod genesis;
pub mod handlers;
pub mod host;
pub mod queries;
pub mod settlement;
pub mod state;

#[cfg(test)]
mod testing;

pub use call::AuctionCall;
pub use error::AuctionError;
pub use events::AuctionEvent;
pub use genesis::{AuctionGenesisConfig, GenesisValidationError};
pub use handlers::{CallContext, CallOutcome, HandlerResult};
pub use host::{AssetRegistry, ChainHistory, FundsLedger, Host, HostError};
pub use queries::{AuctionQuery, AuctionQueryResponse};
pub use state::AuctionState;
