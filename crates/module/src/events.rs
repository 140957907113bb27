//! Notifications emitted by the auction module.
//!
//! Events are queued in module state and drained by the host after each
//! successful call.

use auction_types::{Address, AssetKey, SnapshotRef};
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum AuctionEvent {
    AuctionCreated {
        asset: AssetKey,
        seller: Address,
        generation: u64,
        end_of_bidding_period: u64,
        end_of_reveal_period: u64,
        reserve_price: u64,
    },

    CollateralizationDeadlineSet {
        asset: AssetKey,
        generation: u64,
        snapshot: SnapshotRef,
    },

    BidRevealed {
        asset: AssetKey,
        generation: u64,
        bidder: Address,
        bid_value: u64,
        escrow: Address,
        collateralized: bool,
    },

    EscrowSettled {
        escrow: Address,
        bidder: Address,
        paid_to_seller: u128,
        refunded: u128,
    },

    AuctionEnded {
        asset: AssetKey,
        generation: u64,
        winner: Option<Address>,
        price: u64,
    },
}
