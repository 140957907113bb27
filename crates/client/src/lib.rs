//! Client SDK for bidding in lowest-unique-bid auctions.
//!
//! This crate provides a high-level API for:
//! - Preparing bids with a secret salt and their escrow address
//! - Funding escrows and revealing bids through the mock chain RPC
//! - Querying auction state
//! - Withdrawing collateral after losing

pub mod bid;
pub mod rpc;

pub use bid::{create_bid, BidBuilder, BidError, PreparedBid};
pub use rpc::AuctionRpcClient;
