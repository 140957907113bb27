//! One-shot escrow settlement.
//!
//! Settling an escrow inspects engine state to decide whether the escrow is
//! the recorded winner of its generation. A winning escrow pays the
//! settlement price to the seller in full, and settlement fails if it cannot;
//! every escrow then returns whatever is left to its bidder. The escrow is recorded as settled and any later settlement
//! attempt is a no-op, which stands in for retiring the account.

use auction_types::{Address, AssetKey, AuctionRecord, NO_RESERVE};
use tracing::{debug, info, warn};

use crate::error::AuctionError;
use crate::events::AuctionEvent;
use crate::handlers::HandlerResult;
use crate::host::FundsLedger;
use crate::state::AuctionState as ModuleState;

/// The bid an escrow was derived from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EscrowClaim {
    pub asset: AssetKey,
    pub generation: u64,
    pub escrow: Address,
    pub bidder: Address,
    pub bid_value: u64,
}

/// What a settlement moved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct SettlementReceipt {
    pub paid_to_seller: u128,
    pub refunded: u128,
    /// The escrow had been settled before; nothing moved
    pub already_settled: bool,
}

/// Price the winner of `record` pays, in bid units.
///
/// The runner-up bid sets the price. With no reserve and no runner-up the
/// winner pays their own bid.
pub fn settlement_price(record: &AuctionRecord, winning_bid: u64) -> u64 {
    if record.second_lowest_unique_bid == NO_RESERVE {
        winning_bid
    } else {
        record.second_lowest_unique_bid
    }
}

/// Required escrow balance for `bid_value`.
pub fn required_collateral(bid_value: u64, bid_unit: u128) -> HandlerResult<u128> {
    (bid_value as u128)
        .checked_mul(bid_unit)
        .ok_or(AuctionError::Overflow)
}

/// Settle an escrow once.
pub fn settle_escrow<H: FundsLedger + ?Sized>(
    state: &mut ModuleState,
    host: &mut H,
    claim: &EscrowClaim,
) -> HandlerResult<SettlementReceipt> {
    if state.is_settled(&claim.escrow) {
        debug!(escrow = hex::encode(claim.escrow), "Escrow already settled");
        return Ok(SettlementReceipt {
            already_settled: true,
            ..Default::default()
        });
    }

    let payout = state
        .get_auction(&claim.asset)
        .filter(|record| {
            record.generation_index == claim.generation
                && record.lowest_unique_bid_escrow == Some(claim.escrow)
        })
        .map(|record| (record.seller, settlement_price(record, claim.bid_value)));

    let mut balance = host.balance_of(&claim.escrow);
    let mut paid_to_seller = 0u128;

    if let Some((seller, price)) = payout {
        let owed = required_collateral(price, state.config.bid_unit)?;
        // The seller is paid in full or not at all
        if balance < owed {
            warn!(
                escrow = hex::encode(claim.escrow),
                owed,
                balance,
                "Winning escrow cannot cover the settlement price"
            );
            return Err(AuctionError::InsufficientCollateral {
                escrow: claim.escrow,
                owed,
                held: balance,
            });
        }
        if owed > 0 {
            host.transfer_funds(&claim.escrow, &seller, owed)?;
        }
        paid_to_seller = owed;
        balance -= owed;
    }

    if balance > 0 {
        host.transfer_funds(&claim.escrow, &claim.bidder, balance)?;
    }

    state.settled.insert(claim.escrow);
    state.emit(AuctionEvent::EscrowSettled {
        escrow: claim.escrow,
        bidder: claim.bidder,
        paid_to_seller,
        refunded: balance,
    });

    info!(
        escrow = hex::encode(claim.escrow),
        paid_to_seller,
        refunded = balance,
        "Escrow settled"
    );

    Ok(SettlementReceipt {
        paid_to_seller,
        refunded: balance,
        already_settled: false,
    })
}
