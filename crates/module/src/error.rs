//! Auction module error types.

use auction_types::{Address, AssetKey};
use thiserror::Error;

use crate::host::HostError;

/// Errors that can occur in the auction module.
///
/// Every error aborts the call; insufficient collateral is not an error but a
/// disqualification reported in the reveal outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuctionError {
    #[error("Auction not found for {0:?}")]
    AuctionNotFound(AssetKey),

    #[error("Period too short: minimum {minimum}, got {got}")]
    DurationTooShort { minimum: u64, got: u64 },

    #[error("Auction still active for {0:?}")]
    AuctionActive(AssetKey),

    #[error("Not in reveal period: now {now}, window ({opens_after}, {closes_at}]")]
    NotInRevealPeriod {
        now: u64,
        opens_after: u64,
        closes_at: u64,
    },

    #[error("Reveal period not over: ends at {ends_at}, now {now}")]
    RevealPeriodNotOver { now: u64, ends_at: u64 },

    #[error("Bid already revealed: escrow {}", hex::encode(.0))]
    BidAlreadyRevealed(Address),

    #[error("Invalid collateralization proof: {0}")]
    InvalidProof(String),

    #[error("Incorrect vault address: expected {}, got {}", hex::encode(.expected), hex::encode(.got))]
    IncorrectVaultAddress { expected: Address, got: Address },

    #[error("Cannot withdraw from escrow {}", hex::encode(.0))]
    CannotWithdraw(Address),

    #[error("Bid was never revealed: escrow {}", hex::encode(.0))]
    UnrevealedBid(Address),

    #[error("Invalid auction index: requested {requested}, current {current}")]
    InvalidAuctionIndex { requested: u64, current: u64 },

    #[error("Auction already ended")]
    AuctionEnded,

    #[error("Escrow {} holds {held}, settlement needs {owed}", hex::encode(.escrow))]
    InsufficientCollateral {
        escrow: Address,
        owed: u128,
        held: u128,
    },

    #[error("Re-entrant call rejected")]
    Reentrancy,

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Host error: {0}")]
    Host(#[from] HostError),
}
