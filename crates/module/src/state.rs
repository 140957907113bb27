//! State structures for the auction module.

use std::collections::{HashMap, HashSet};

use auction_types::{Address, AssetKey, AuctionRecord};

use crate::bookkeeping::BidBook;
use crate::events::AuctionEvent;
use crate::genesis::AuctionGenesisConfig;

/// Auction module state.
///
/// In a ledger deployment these would be storage maps; here they are owned
/// in-memory tables. The host clones the state around each call to get
/// all-or-nothing execution.
#[derive(Clone, Debug)]
pub struct AuctionState {
    /// Engine parameters
    pub config: AuctionGenesisConfig,

    /// Current record per asset key
    pub auctions: HashMap<AssetKey, AuctionRecord>,

    /// Every escrow ever revealed, across all generations
    pub revealed: HashSet<Address>,

    /// Bid tallies: (asset, generation) -> book
    pub bid_books: HashMap<(AssetKey, u64), BidBook>,

    /// Escrows whose one-shot settlement has run
    pub settled: HashSet<Address>,

    /// Notifications not yet drained by the host
    pub pending_events: Vec<AuctionEvent>,

    /// Set while a state-mutating call is in flight
    pub in_flight: bool,
}

impl AuctionState {
    /// Create a new auction state.
    pub fn new(config: AuctionGenesisConfig) -> Self {
        Self {
            config,
            auctions: HashMap::new(),
            revealed: HashSet::new(),
            bid_books: HashMap::new(),
            settled: HashSet::new(),
            pending_events: Vec::new(),
            in_flight: false,
        }
    }

    /// Get auction by key.
    pub fn get_auction(&self, asset: &AssetKey) -> Option<&AuctionRecord> {
        self.auctions.get(asset)
    }

    /// Get mutable auction by key.
    pub fn get_auction_mut(&mut self, asset: &AssetKey) -> Option<&mut AuctionRecord> {
        self.auctions.get_mut(asset)
    }

    pub fn is_revealed(&self, escrow: &Address) -> bool {
        self.revealed.contains(escrow)
    }

    /// Mark an escrow revealed. Returns false if it already was.
    pub fn mark_revealed(&mut self, escrow: Address) -> bool {
        self.revealed.insert(escrow)
    }

    pub fn is_settled(&self, escrow: &Address) -> bool {
        self.settled.contains(escrow)
    }

    /// Bid book for a generation, if any reveal was tallied.
    pub fn bid_book(&self, asset: &AssetKey, generation: u64) -> Option<&BidBook> {
        self.bid_books.get(&(*asset, generation))
    }

    pub fn bid_book_mut(&mut self, asset: &AssetKey, generation: u64) -> &mut BidBook {
        self.bid_books.entry((*asset, generation)).or_default()
    }

    /// Number of collateralized reveals at `value` in a generation.
    pub fn bid_count(&self, asset: &AssetKey, generation: u64, value: u64) -> u32 {
        self.bid_book(asset, generation)
            .map(|book| book.count(value))
            .unwrap_or(0)
    }

    pub fn emit(&mut self, event: AuctionEvent) {
        self.pending_events.push(event);
    }

    /// Drain queued notifications.
    pub fn take_events(&mut self) -> Vec<AuctionEvent> {
        std::mem::take(&mut self.pending_events)
    }

    pub fn engine_id(&self) -> Address {
        self.config.engine_id
    }
}

impl Default for AuctionState {
    fn default() -> Self {
        Self::new(AuctionGenesisConfig::default())
    }
}
