//! Query handlers for the auction module.
//!
//! These functions provide read-only access to auction state.

use auction_crypto::derive_escrow_address;
use auction_types::{Address, AssetKey, AuctionPhase, AuctionRecord, Salt};
use serde::{Deserialize, Serialize};

use crate::state::AuctionState as ModuleState;

/// Query request types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum AuctionQuery {
    /// Get the current record for an asset.
    GetAuction { asset: AssetKey },

    /// Compute the escrow address for a bid tuple.
    GetEscrowAddress {
        asset: AssetKey,
        generation: u64,
        bidder: Address,
        bid_value: u64,
        salt: Salt,
    },

    /// Get the seller of the current generation.
    GetSeller { asset: AssetKey },

    /// Get lowest and second-lowest unique bid with the winning escrow.
    GetStandings { asset: AssetKey },

    /// Get the number of collateralized reveals at a value.
    GetBidCount {
        asset: AssetKey,
        generation: u64,
        bid_value: u64,
    },

    /// Get the phase of the current generation at a given time.
    GetPhase { asset: AssetKey, now: u64 },

    /// Check whether an escrow was revealed.
    IsRevealed { escrow: Address },

    /// Check whether an escrow was settled.
    IsSettled { escrow: Address },
}

/// Query response types.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionQueryResponse {
    Auction(Option<AuctionRecord>),
    EscrowAddress(Address),
    Seller(Option<Address>),
    Standings(Option<StandingsView>),
    BidCount(u32),
    Phase(Option<AuctionPhase>),
    Revealed(bool),
    Settled(bool),
}

/// Public view of the current standings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingsView {
    pub generation: u64,
    pub lowest_unique_bid: u64,
    pub second_lowest_unique_bid: u64,
    pub lowest_unique_bid_escrow: Option<Address>,
}

impl StandingsView {
    pub fn from_record(record: &AuctionRecord) -> Self {
        Self {
            generation: record.generation_index,
            lowest_unique_bid: record.lowest_unique_bid,
            second_lowest_unique_bid: record.second_lowest_unique_bid,
            lowest_unique_bid_escrow: record.lowest_unique_bid_escrow,
        }
    }
}

/// Handle a query.
pub fn handle_query(state: &ModuleState, query: AuctionQuery) -> AuctionQueryResponse {
    match query {
        AuctionQuery::GetAuction { asset } => {
            AuctionQueryResponse::Auction(state.get_auction(&asset).cloned())
        }

        AuctionQuery::GetEscrowAddress {
            asset,
            generation,
            bidder,
            bid_value,
            salt,
        } => AuctionQueryResponse::EscrowAddress(derive_escrow_address(
            &state.engine_id(),
            &asset,
            generation,
            &bidder,
            bid_value,
            &salt,
        )),

        AuctionQuery::GetSeller { asset } => {
            AuctionQueryResponse::Seller(state.get_auction(&asset).map(|r| r.seller))
        }

        AuctionQuery::GetStandings { asset } => AuctionQueryResponse::Standings(
            state.get_auction(&asset).map(StandingsView::from_record),
        ),

        AuctionQuery::GetBidCount {
            asset,
            generation,
            bid_value,
        } => AuctionQueryResponse::BidCount(state.bid_count(&asset, generation, bid_value)),

        AuctionQuery::GetPhase { asset, now } => {
            AuctionQueryResponse::Phase(state.get_auction(&asset).map(|r| r.phase(now)))
        }

        AuctionQuery::IsRevealed { escrow } => {
            AuctionQueryResponse::Revealed(state.is_revealed(&escrow))
        }

        AuctionQuery::IsSettled { escrow } => {
            AuctionQueryResponse::Settled(state.is_settled(&escrow))
        }
    }
}

/// Auctions whose reveal period is over but that have not been ended.
pub fn get_pending_end(state: &ModuleState, current_time: u64) -> Vec<AssetKey> {
    let mut pending: Vec<AssetKey> = state
        .auctions
        .iter()
        .filter(|(_, record)| record.phase(current_time) == AuctionPhase::AwaitingEnd)
        .map(|(asset, _)| *asset)
        .collect();
    pending.sort();
    pending
}
