//! Bid preparation.

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use auction_crypto::EscrowTuple;
use auction_types::{Address, AssetKey, Salt};

/// Errors that can occur during bid preparation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BidError {
    #[error("Bid value {0} overflows the required collateral")]
    CollateralOverflow(u64),

    #[error("Bid value not set")]
    MissingValue,
}

/// A prepared bid ready to be funded.
///
/// The salt and value stay private until the reveal; only the escrow address
/// is visible on the ledger while bidding is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedBid {
    pub asset: AssetKey,
    pub generation: u64,
    pub bidder: Address,
    /// Bid value (keep secret)
    pub bid_value: u64,
    /// Salt (keep secret until reveal)
    pub salt: Salt,
    /// Account to fund with the collateral
    pub escrow: Address,
}

impl PreparedBid {
    /// Ledger units to deposit into the escrow.
    pub fn collateral(&self, bid_unit: u128) -> Result<u128, BidError> {
        (self.bid_value as u128)
            .checked_mul(bid_unit)
            .ok_or(BidError::CollateralOverflow(self.bid_value))
    }

    pub fn tuple(&self) -> EscrowTuple {
        EscrowTuple {
            asset: self.asset,
            generation: self.generation,
            bidder: self.bidder,
            bid_value: self.bid_value,
            salt: self.salt,
        }
    }
}

/// Prepare a bid with a fresh random salt.
///
/// # Arguments
/// * `engine` - Engine account that namespaces escrows
/// * `asset` - Asset being bid on
/// * `generation` - Generation index of the listing
/// * `bidder` - Account that will reveal the bid
/// * `bid_value` - The bid amount
/// * `rng` - Cryptographically secure random number generator
pub fn create_bid<R: RngCore + CryptoRng>(
    engine: &Address,
    asset: AssetKey,
    generation: u64,
    bidder: Address,
    bid_value: u64,
    rng: &mut R,
) -> PreparedBid {
    let mut salt = [0u8; 32];
    rng.fill_bytes(&mut salt);
    prepare_with_salt(engine, asset, generation, bidder, bid_value, salt)
}

fn prepare_with_salt(
    engine: &Address,
    asset: AssetKey,
    generation: u64,
    bidder: Address,
    bid_value: u64,
    salt: Salt,
) -> PreparedBid {
    let tuple = EscrowTuple {
        asset,
        generation,
        bidder,
        bid_value,
        salt,
    };
    PreparedBid {
        asset,
        generation,
        bidder,
        bid_value,
        salt,
        escrow: tuple.address(engine),
    }
}

/// Builder for preparing bids with additional options.
pub struct BidBuilder {
    engine: Address,
    asset: AssetKey,
    generation: u64,
    bidder: Address,
    bid_value: Option<u64>,
    salt: Option<Salt>,
}

impl BidBuilder {
    /// Create a new bid builder.
    pub fn new(engine: Address, asset: AssetKey, generation: u64, bidder: Address) -> Self {
        Self {
            engine,
            asset,
            generation,
            bidder,
            bid_value: None,
            salt: None,
        }
    }

    /// Set the bid value.
    pub fn bid_value(mut self, value: u64) -> Self {
        self.bid_value = Some(value);
        self
    }

    /// Use a fixed salt instead of a random one.
    pub fn salt(mut self, salt: Salt) -> Self {
        self.salt = Some(salt);
        self
    }

    /// Build the prepared bid.
    pub fn build<R: RngCore + CryptoRng>(self, rng: &mut R) -> Result<PreparedBid, BidError> {
        let bid_value = self.bid_value.ok_or(BidError::MissingValue)?;
        Ok(match self.salt {
            Some(salt) => prepare_with_salt(
                &self.engine,
                self.asset,
                self.generation,
                self.bidder,
                bid_value,
                salt,
            ),
            None => create_bid(
                &self.engine,
                self.asset,
                self.generation,
                self.bidder,
                bid_value,
                rng,
            ),
        })
    }
}
