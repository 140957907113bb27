//! Interfaces to the host ledger.
//!
//! The engine never holds funds or assets itself. Asset custody, account
//! balances and finalized block history are owned by the host and reached
//! through these traits.

use auction_types::{Address, AssetKey, SnapshotRef};
use thiserror::Error;

/// Errors raised by the host ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("Asset {0:?} does not exist")]
    AssetNotFound(AssetKey),

    #[error("Transfer source does not own the asset")]
    NotOwner,

    #[error("Operator is not approved for the asset")]
    NotAuthorized,

    #[error("Insufficient funds in {account}: need {needed}, have {available}")]
    InsufficientFunds {
        account: String,
        needed: u128,
        available: u128,
    },
}

/// Asset-ownership registry.
pub trait AssetRegistry {
    /// Current owner of `asset`, if it exists.
    fn owner_of(&self, asset: &AssetKey) -> Option<Address>;

    /// Move `asset` from `from` to `to` on behalf of `operator`.
    ///
    /// Fails unless `from` owns the asset and `operator` is the owner or an
    /// operator approved by the owner.
    fn transfer_asset(
        &mut self,
        operator: &Address,
        from: &Address,
        to: &Address,
        asset: &AssetKey,
    ) -> Result<(), HostError>;
}

/// Account balances.
pub trait FundsLedger {
    fn balance_of(&self, account: &Address) -> u128;

    fn transfer_funds(&mut self, from: &Address, to: &Address, amount: u128)
        -> Result<(), HostError>;
}

/// Finalized block history.
pub trait ChainHistory {
    /// Hash of the most recently finalized block.
    fn latest_finalized_block_hash(&self) -> SnapshotRef;
}

/// Everything the engine needs from the host.
pub trait Host: AssetRegistry + FundsLedger + ChainHistory {}

impl<T: AssetRegistry + FundsLedger + ChainHistory> Host for T {}
