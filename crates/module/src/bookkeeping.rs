//! Uniqueness bookkeeping for one auction generation.
//!
//! Reveals are tallied per bid value in an ordered map. A value is a live
//! candidate while exactly one collateralized reveal has been seen for it and
//! it lies strictly below the reserve ceiling. The standings (lowest and
//! second-lowest unique bid) are always the two smallest live values, padded
//! with the ceiling, so a value that became a duplicate can never win or set
//! the price.

use std::collections::BTreeMap;

use auction_types::Address;

/// Reveal tally for one bid value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BidTally {
    pub count: u32,
    /// Escrow of the first reveal at this value
    pub first_escrow: Address,
    /// Bidder of the first reveal at this value
    pub first_bidder: Address,
}

/// Result of recording a reveal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recorded {
    /// Tally for the value after this reveal
    pub count: u32,
    /// `(escrow, bidder)` of the previously unique reveal at this value, if
    /// this reveal turned the value into a duplicate
    pub invalidated: Option<(Address, Address)>,
}

/// Current winner and runner-up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Standings {
    pub lowest_unique_bid: u64,
    pub second_lowest_unique_bid: u64,
    pub lowest_unique_bid_escrow: Option<Address>,
}

/// Ordered bid-value tallies for one generation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BidBook {
    tallies: BTreeMap<u64, BidTally>,
}

impl BidBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of collateralized reveals seen at `value`.
    pub fn count(&self, value: u64) -> u32 {
        self.tallies.get(&value).map(|t| t.count).unwrap_or(0)
    }

    /// Record a collateralized reveal at `value`.
    pub fn record(&mut self, value: u64, escrow: Address, bidder: Address) -> Recorded {
        match self.tallies.get_mut(&value) {
            None => {
                self.tallies.insert(
                    value,
                    BidTally {
                        count: 1,
                        first_escrow: escrow,
                        first_bidder: bidder,
                    },
                );
                Recorded {
                    count: 1,
                    invalidated: None,
                }
            }
            Some(tally) => {
                let invalidated =
                    (tally.count == 1).then_some((tally.first_escrow, tally.first_bidder));
                tally.count = tally.count.saturating_add(1);
                Recorded {
                    count: tally.count,
                    invalidated,
                }
            }
        }
    }

    /// Whether `escrow` holds the only reveal at `value` and the value can
    /// still win under `ceiling`.
    pub fn is_live_candidate(&self, value: u64, escrow: &Address, ceiling: u64) -> bool {
        value < ceiling
            && self
                .tallies
                .get(&value)
                .map(|t| t.count == 1 && t.first_escrow == *escrow)
                .unwrap_or(false)
    }

    /// Unique values strictly below `ceiling`, ascending.
    pub fn unique_values(&self, ceiling: u64) -> impl Iterator<Item = (u64, &BidTally)> {
        self.tallies
            .range(..ceiling)
            .filter(|(_, tally)| tally.count == 1)
            .map(|(value, tally)| (*value, tally))
    }

    /// Lowest and second-lowest unique values below `ceiling`.
    pub fn standings(&self, ceiling: u64) -> Standings {
        let mut unique = self.unique_values(ceiling);
        let lowest = unique.next();
        let second = unique.next();

        Standings {
            lowest_unique_bid: lowest.map(|(v, _)| v).unwrap_or(ceiling),
            second_lowest_unique_bid: second.map(|(v, _)| v).unwrap_or(ceiling),
            lowest_unique_bid_escrow: lowest.map(|(_, t)| t.first_escrow),
        }
    }
}
