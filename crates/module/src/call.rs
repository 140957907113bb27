//! Call message types for the auction module.

use auction_types::{Address, AssetKey, BalanceProof, Salt};
use borsh::{BorshDeserialize, BorshSerialize};

/// Call messages for the auction module.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum AuctionCall {
    /// List an asset; the sender becomes the seller.
    CreateAuction {
        asset: AssetKey,
        bidding_period: u64,
        reveal_period: u64,
        /// Zero lists without a reserve
        reserve_price: u64,
    },

    /// Reveal a bid committed by funding its escrow.
    RevealBid {
        asset: AssetKey,
        bid_value: u64,
        salt: Salt,
        /// Required once the collateralization deadline is set
        proof: Option<BalanceProof>,
    },

    /// Finalize the current generation (permissionless).
    EndAuction {
        asset: AssetKey,
        winner: Address,
        bid_value: u64,
        salt: Salt,
    },

    /// Reclaim collateral of a losing or disqualified bid.
    WithdrawCollateral {
        asset: AssetKey,
        generation: u64,
        bid_value: u64,
        salt: Salt,
    },
}
