//! Deterministic escrow addresses.
//!
//! Every bid is collateralized in its own escrow account whose address is a
//! SHA-256 commitment to the full bid tuple:
//!
//! ```text
//! H("LUB_ESCROW_V1:" || engine || collection || item || generation || bidder || value || salt)
//! ```
//!
//! - **Hiding**: without the 32-byte salt the address reveals nothing about
//!   the bid value.
//! - **Binding**: a reveal must reproduce the exact address that was funded.
//!
//! The generation index namespaces the address so escrows from different
//! listings of the same asset never collide.

use auction_types::{Address, AssetKey, Salt};
use sha2::{Digest, Sha256};

const ESCROW_DOMAIN: &[u8] = b"LUB_ESCROW_V1:";

/// Derive the escrow address for a bid.
pub fn derive_escrow_address(
    engine: &Address,
    asset: &AssetKey,
    generation: u64,
    bidder: &Address,
    bid_value: u64,
    salt: &Salt,
) -> Address {
    let mut hasher = Sha256::new();
    hasher.update(ESCROW_DOMAIN);
    hasher.update(engine);
    hasher.update(asset.collection);
    hasher.update(asset.item_id.to_le_bytes());
    hasher.update(generation.to_le_bytes());
    hasher.update(bidder);
    hasher.update(bid_value.to_le_bytes());
    hasher.update(salt);
    hasher.finalize().into()
}

/// The full tuple an escrow address commits to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EscrowTuple {
    pub asset: AssetKey,
    pub generation: u64,
    pub bidder: Address,
    pub bid_value: u64,
    pub salt: Salt,
}

impl EscrowTuple {
    /// Address of this tuple's escrow under `engine`.
    pub fn address(&self, engine: &Address) -> Address {
        derive_escrow_address(
            engine,
            &self.asset,
            self.generation,
            &self.bidder,
            self.bid_value,
            &self.salt,
        )
    }
}
