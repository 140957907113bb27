//! Core type definitions for lowest-unique-bid sealed auctions.
//!
//! This crate provides the shared data structures used across the auction
//! system: asset keys, the per-key auction record, escrow identities and the
//! snapshot/balance-proof types consumed by the collateralization check.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

// =========================
// PRIMITIVES
// =========================

/// Generic address type (32 bytes)
pub type Address = [u8; 32];

/// Bid salt chosen by the bidder and kept secret until reveal.
pub type Salt = [u8; 32];

/// Reference to a finalized block (its header hash).
pub type SnapshotRef = [u8; 32];

/// Upper bound used when an auction is created without a reserve price.
pub const NO_RESERVE: u64 = u64::MAX;

/// Identity of a listed asset: (collection, item).
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct AssetKey {
    pub collection: Address,
    pub item_id: u64,
}

impl AssetKey {
    pub fn new(collection: Address, item_id: u64) -> Self {
        Self {
            collection,
            item_id,
        }
    }
}

// =========================
// AUCTION TYPES
// =========================

/// Lifecycle phase of the current generation, derived from the clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionPhase {
    /// Escrows may be funded; nothing is revealed yet
    Bidding,
    /// Bids may be revealed
    Reveal,
    /// Reveal period over, waiting for `end_auction`
    AwaitingEnd,
    /// Asset and winning escrow have been settled
    Ended,
}

/// Auction record for one asset key.
///
/// The record is overwritten on every new listing; `generation_index`
/// distinguishes the listings.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct AuctionRecord {
    pub seller: Address,

    // Timing
    pub end_of_bidding_period: u64,
    pub end_of_reveal_period: u64,

    pub generation_index: u64,

    /// Upper bound on winning bids; `NO_RESERVE` when listed without one
    pub reserve_price: u64,

    // Standings
    pub lowest_unique_bid: u64,
    pub second_lowest_unique_bid: u64,
    pub lowest_unique_bid_escrow: Option<Address>,

    /// Fixed by the first collateralized reveal of the generation
    pub collateralization_deadline: Option<SnapshotRef>,

    pub ended: bool,
}

impl AuctionRecord {
    /// Phase of this generation at `now`.
    pub fn phase(&self, now: u64) -> AuctionPhase {
        if self.ended {
            AuctionPhase::Ended
        } else if now <= self.end_of_bidding_period {
            AuctionPhase::Bidding
        } else if now <= self.end_of_reveal_period {
            AuctionPhase::Reveal
        } else {
            AuctionPhase::AwaitingEnd
        }
    }

    /// Whether a reveal submitted at `now` falls inside the reveal window.
    pub fn is_reveal_open(&self, now: u64) -> bool {
        now > self.end_of_bidding_period && now <= self.end_of_reveal_period
    }
}

/// Normalize a reserve price supplied at listing time.
///
/// Zero means the seller set no ceiling.
pub fn reserve_ceiling(reserve_price: u64) -> u64 {
    if reserve_price == 0 {
        NO_RESERVE
    } else {
        reserve_price
    }
}

// =========================
// SNAPSHOTS AND PROOFS
// =========================

/// Header of a finalized block. Its hash is the snapshot reference.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub number: u64,
    pub parent_hash: [u8; 32],
    /// Merkle root over (account, balance) leaves
    pub state_root: [u8; 32],
    pub timestamp: u64,
}

impl SnapshotHeader {
    /// Hash of the header fields in declaration order.
    pub fn hash(&self) -> SnapshotRef {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(b"SNAPSHOT_HEADER_V1:");
        hasher.update(self.number.to_le_bytes());
        hasher.update(self.parent_hash);
        hasher.update(self.state_root);
        hasher.update(self.timestamp.to_le_bytes());
        hasher.finalize().into()
    }
}

/// Proof that `account` held `balance` in the state committed by `header`.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct BalanceProof {
    pub header: SnapshotHeader,
    pub account: Address,
    pub balance: u128,
    pub leaf_index: u64,
    /// Sibling hashes from the leaf level up to the root
    pub siblings: Vec<[u8; 32]>,
}

// =========================
// HELPER FUNCTIONS
// =========================

/// Compute SHA-256 hash
pub fn sha256(data: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    Sha256::digest(data).into()
}
