//! Genesis configuration for the auction module.
//!
//! This module defines the engine parameters fixed when the chain starts.

use auction_types::Address;
use serde::{Deserialize, Serialize};

/// Genesis configuration for the auction module.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionGenesisConfig {
    /// Account that takes custody of listed assets and namespaces escrows
    pub engine_id: Address,

    /// Minimum bidding period (seconds)
    pub min_bidding_period: u64,

    /// Minimum reveal period (seconds)
    pub min_reveal_period: u64,

    /// Ledger units per unit of bid value
    pub bid_unit: u128,
}

impl Default for AuctionGenesisConfig {
    fn default() -> Self {
        Self {
            engine_id: default_engine_id(),
            min_bidding_period: 3600, // 1 hour
            min_reveal_period: 3600,  // 1 hour
            bid_unit: 1_000_000_000,
        }
    }
}

impl AuctionGenesisConfig {
    /// Validate the genesis configuration.
    pub fn validate(&self) -> Result<(), GenesisValidationError> {
        if self.engine_id == [0u8; 32] {
            return Err(GenesisValidationError::ZeroEngineId);
        }
        if self.bid_unit == 0 {
            return Err(GenesisValidationError::InvalidBidUnit);
        }
        if self.min_bidding_period == 0 || self.min_reveal_period == 0 {
            return Err(GenesisValidationError::InvalidPeriods(
                "Minimum periods cannot be zero".into(),
            ));
        }
        Ok(())
    }
}

fn default_engine_id() -> Address {
    auction_types::sha256(b"LUB_AUCTION_ENGINE_V1")
}

/// Errors that can occur during genesis validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenesisValidationError {
    #[error("Engine identity cannot be the zero address")]
    ZeroEngineId,

    #[error("Bid unit cannot be zero")]
    InvalidBidUnit,

    #[error("Invalid periods: {0}")]
    InvalidPeriods(String),
}
