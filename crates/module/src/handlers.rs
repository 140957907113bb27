//! Call handlers for the auction module.
//!
//! These functions implement the business logic for each call type. Every
//! state-mutating handler runs under the module's re-entrancy guard and
//! performs all checks that can fail before it mutates state.

use auction_crypto::{derive_escrow_address, BalanceProofVerifier};
use auction_types::{
    reserve_ceiling, Address, AssetKey, AuctionRecord, BalanceProof, Salt, SnapshotRef,
};
use tracing::{debug, info, warn};

use crate::call::AuctionCall;
use crate::error::AuctionError;
use crate::events::AuctionEvent;
use crate::host::{Host, HostError};
use crate::settlement::{
    required_collateral, settle_escrow, settlement_price, EscrowClaim, SettlementReceipt,
};
use crate::state::AuctionState as ModuleState;

/// Context provided by the runtime for each call.
#[derive(Clone, Copy, Debug)]
pub struct CallContext {
    /// Sender of the transaction
    pub sender: Address,
    /// Current block height
    pub block_height: u64,
    /// Current timestamp
    pub timestamp: u64,
}

/// Result type for handlers.
pub type HandlerResult<T> = Result<T, AuctionError>;

/// Outcome of a reveal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RevealOutcome {
    pub escrow: Address,
    /// Whether the escrow proved enough collateral
    pub collateralized: bool,
    /// Whether this reveal fixed the collateralization deadline
    pub deadline_set: Option<SnapshotRef>,
    /// Whether the escrow's value is still unique and below the reserve
    pub live_candidate: bool,
    /// Settlement of this escrow, if it was settled immediately
    pub settlement: Option<SettlementReceipt>,
}

/// Outcome of ending an auction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EndOutcome {
    /// Winner who received the asset, or `None` if it went back to the seller
    pub winner: Option<Address>,
    /// Settlement price in bid units (zero without a winner)
    pub price: u64,
    /// The lowest unique bidder could not cover the price and got nothing
    pub defaulted: bool,
    pub settlement: Option<SettlementReceipt>,
}

/// Outcome of a dispatched call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallOutcome {
    Created { generation: u64 },
    Revealed(RevealOutcome),
    Ended(EndOutcome),
    Withdrawn(SettlementReceipt),
}

/// Run `f` with the re-entrancy flag held.
fn guarded<T>(
    state: &mut ModuleState,
    f: impl FnOnce(&mut ModuleState) -> HandlerResult<T>,
) -> HandlerResult<T> {
    if state.in_flight {
        warn!("Rejected re-entrant call");
        return Err(AuctionError::Reentrancy);
    }
    state.in_flight = true;
    let result = f(state);
    state.in_flight = false;
    result
}

/// Dispatch a call message.
pub fn handle_call<H, V>(
    state: &mut ModuleState,
    ctx: &CallContext,
    host: &mut H,
    verifier: &V,
    call: AuctionCall,
) -> HandlerResult<CallOutcome>
where
    H: Host + ?Sized,
    V: BalanceProofVerifier + ?Sized,
{
    match call {
        AuctionCall::CreateAuction {
            asset,
            bidding_period,
            reveal_period,
            reserve_price,
        } => handle_create_auction(
            state,
            ctx,
            host,
            asset,
            bidding_period,
            reveal_period,
            reserve_price,
        )
        .map(|generation| CallOutcome::Created { generation }),

        AuctionCall::RevealBid {
            asset,
            bid_value,
            salt,
            proof,
        } => handle_reveal_bid(state, ctx, host, verifier, asset, bid_value, salt, proof.as_ref())
            .map(CallOutcome::Revealed),

        AuctionCall::EndAuction {
            asset,
            winner,
            bid_value,
            salt,
        } => handle_end_auction(state, ctx, host, asset, winner, bid_value, salt)
            .map(CallOutcome::Ended),

        AuctionCall::WithdrawCollateral {
            asset,
            generation,
            bid_value,
            salt,
        } => handle_withdraw_collateral(state, ctx, host, asset, generation, bid_value, salt)
            .map(CallOutcome::Withdrawn),
    }
}

/// Handle CreateAuction call.
///
/// Returns the new generation index.
pub fn handle_create_auction<H: Host + ?Sized>(
    state: &mut ModuleState,
    ctx: &CallContext,
    host: &mut H,
    asset: AssetKey,
    bidding_period: u64,
    reveal_period: u64,
    reserve_price: u64,
) -> HandlerResult<u64> {
    guarded(state, |state| {
        // Validate timing
        if bidding_period < state.config.min_bidding_period {
            return Err(AuctionError::DurationTooShort {
                minimum: state.config.min_bidding_period,
                got: bidding_period,
            });
        }
        if reveal_period < state.config.min_reveal_period {
            return Err(AuctionError::DurationTooShort {
                minimum: state.config.min_reveal_period,
                got: reveal_period,
            });
        }

        let previous = state.get_auction(&asset);
        if previous.map(|record| !record.ended).unwrap_or(false) {
            return Err(AuctionError::AuctionActive(asset));
        }
        let generation = previous
            .map(|record| record.generation_index)
            .unwrap_or(0)
            .checked_add(1)
            .ok_or(AuctionError::Overflow)?;

        let end_of_bidding_period = ctx
            .timestamp
            .checked_add(bidding_period)
            .ok_or(AuctionError::Overflow)?;
        let end_of_reveal_period = end_of_bidding_period
            .checked_add(reveal_period)
            .ok_or(AuctionError::Overflow)?;

        // Take custody; fails unless the caller owns or is approved for the asset
        let engine = state.engine_id();
        let owner = host
            .owner_of(&asset)
            .ok_or(HostError::AssetNotFound(asset))?;
        host.transfer_asset(&ctx.sender, &owner, &engine, &asset)?;

        let ceiling = reserve_ceiling(reserve_price);
        state.auctions.insert(
            asset,
            AuctionRecord {
                seller: ctx.sender,
                end_of_bidding_period,
                end_of_reveal_period,
                generation_index: generation,
                reserve_price: ceiling,
                lowest_unique_bid: ceiling,
                second_lowest_unique_bid: ceiling,
                lowest_unique_bid_escrow: None,
                collateralization_deadline: None,
                ended: false,
            },
        );

        state.emit(AuctionEvent::AuctionCreated {
            asset,
            seller: ctx.sender,
            generation,
            end_of_bidding_period,
            end_of_reveal_period,
            reserve_price: ceiling,
        });

        info!(
            item_id = asset.item_id,
            generation,
            end_of_bidding_period,
            end_of_reveal_period,
            "Created auction"
        );

        Ok(generation)
    })
}

/// Handle RevealBid call.
#[allow(clippy::too_many_arguments)]
pub fn handle_reveal_bid<H, V>(
    state: &mut ModuleState,
    ctx: &CallContext,
    host: &mut H,
    verifier: &V,
    asset: AssetKey,
    bid_value: u64,
    salt: Salt,
    proof: Option<&BalanceProof>,
) -> HandlerResult<RevealOutcome>
where
    H: Host + ?Sized,
    V: BalanceProofVerifier + ?Sized,
{
    guarded(state, |state| {
        let record = state
            .get_auction(&asset)
            .cloned()
            .ok_or(AuctionError::AuctionNotFound(asset))?;

        if !record.is_reveal_open(ctx.timestamp) {
            return Err(AuctionError::NotInRevealPeriod {
                now: ctx.timestamp,
                opens_after: record.end_of_bidding_period,
                closes_at: record.end_of_reveal_period,
            });
        }

        let generation = record.generation_index;
        let escrow = derive_escrow_address(
            &state.engine_id(),
            &asset,
            generation,
            &ctx.sender,
            bid_value,
            &salt,
        );
        if state.is_revealed(&escrow) {
            return Err(AuctionError::BidAlreadyRevealed(escrow));
        }

        // Collateralization check
        let required = required_collateral(bid_value, state.config.bid_unit)?;
        let (collateralized, deadline_set) = match record.collateralization_deadline {
            None => {
                let balance = host.balance_of(&escrow);
                if balance >= required {
                    (true, Some(host.latest_finalized_block_hash()))
                } else {
                    (false, None)
                }
            }
            Some(snapshot) => {
                let proven = match proof {
                    Some(proof) => verifier
                        .verify_balance(proof, &snapshot, &escrow)
                        .map_err(|e| {
                            warn!(escrow = hex::encode(escrow), error = %e, "Rejected proof");
                            AuctionError::InvalidProof(e.to_string())
                        })?,
                    // No proof means no proven balance: the bid is disqualified and refunded
                    None => {
                        debug!(
                            escrow = hex::encode(escrow),
                            "Reveal after the deadline without a balance proof"
                        );
                        0
                    }
                };
                (proven >= required, None)
            }
        };

        state.mark_revealed(escrow);

        let mut invalidated = None;
        let mut live_candidate = false;
        if collateralized {
            let book = state.bid_book_mut(&asset, generation);
            invalidated = book.record(bid_value, escrow, ctx.sender).invalidated;
            live_candidate = book.is_live_candidate(bid_value, &escrow, record.reserve_price);
            let standings = book.standings(record.reserve_price);

            if let Some(auction) = state.get_auction_mut(&asset) {
                if let Some(snapshot) = deadline_set {
                    auction.collateralization_deadline = Some(snapshot);
                }
                auction.lowest_unique_bid = standings.lowest_unique_bid;
                auction.second_lowest_unique_bid = standings.second_lowest_unique_bid;
                auction.lowest_unique_bid_escrow = standings.lowest_unique_bid_escrow;
            }

            if let Some(snapshot) = deadline_set {
                state.emit(AuctionEvent::CollateralizationDeadlineSet {
                    asset,
                    generation,
                    snapshot,
                });
                info!(
                    item_id = asset.item_id,
                    generation,
                    snapshot = hex::encode(snapshot),
                    "Collateralization deadline set"
                );
            }
        } else {
            debug!(
                escrow = hex::encode(escrow),
                bid_value, "Bid disqualified for insufficient collateral"
            );
        }

        // The previous holder of a now-duplicated value can never win
        if let Some((first_escrow, first_bidder)) = invalidated {
            settle_escrow(
                state,
                host,
                &EscrowClaim {
                    asset,
                    generation,
                    escrow: first_escrow,
                    bidder: first_bidder,
                    bid_value,
                },
            )?;
        }

        let settlement = if live_candidate {
            None
        } else {
            Some(settle_escrow(
                state,
                host,
                &EscrowClaim {
                    asset,
                    generation,
                    escrow,
                    bidder: ctx.sender,
                    bid_value,
                },
            )?)
        };

        state.emit(AuctionEvent::BidRevealed {
            asset,
            generation,
            bidder: ctx.sender,
            bid_value,
            escrow,
            collateralized,
        });

        info!(
            item_id = asset.item_id,
            generation,
            bid_value,
            collateralized,
            live_candidate,
            "Bid revealed"
        );

        Ok(RevealOutcome {
            escrow,
            collateralized,
            deadline_set,
            live_candidate,
            settlement,
        })
    })
}

/// Handle EndAuction call.
///
/// The winner receives the asset only if their escrow covers the settlement
/// price; otherwise the winner defaults, the asset returns to the seller and
/// the escrow is refunded. Losing unique bids are refunded at the same time.
pub fn handle_end_auction<H: Host + ?Sized>(
    state: &mut ModuleState,
    ctx: &CallContext,
    host: &mut H,
    asset: AssetKey,
    winner: Address,
    bid_value: u64,
    salt: Salt,
) -> HandlerResult<EndOutcome> {
    guarded(state, |state| {
        let record = state
            .get_auction(&asset)
            .cloned()
            .ok_or(AuctionError::InvalidAuctionIndex {
                requested: 0,
                current: 0,
            })?;

        if ctx.timestamp <= record.end_of_reveal_period {
            return Err(AuctionError::RevealPeriodNotOver {
                now: ctx.timestamp,
                ends_at: record.end_of_reveal_period,
            });
        }
        if record.ended {
            return Err(AuctionError::AuctionEnded);
        }

        let engine = state.engine_id();
        let generation = record.generation_index;

        let Some(winning_escrow) = record.lowest_unique_bid_escrow else {
            host.transfer_asset(&engine, &engine, &record.seller, &asset)?;
            mark_ended(state, &asset);
            state.emit(AuctionEvent::AuctionEnded {
                asset,
                generation,
                winner: None,
                price: 0,
            });
            info!(item_id = asset.item_id, generation, "Auction ended without a winner");
            return Ok(EndOutcome {
                winner: None,
                price: 0,
                defaulted: false,
                settlement: None,
            });
        };

        let claimed = derive_escrow_address(&engine, &asset, generation, &winner, bid_value, &salt);
        if claimed != winning_escrow {
            return Err(AuctionError::IncorrectVaultAddress {
                expected: winning_escrow,
                got: claimed,
            });
        }

        let price = settlement_price(&record, bid_value);
        let owed = required_collateral(price, state.config.bid_unit)?;
        let held = host.balance_of(&winning_escrow);
        let defaulted = held < owed;

        let recipient = if defaulted { record.seller } else { winner };
        host.transfer_asset(&engine, &engine, &recipient, &asset)?;
        mark_ended(state, &asset);

        if defaulted {
            // A defaulted winner's escrow settles as a plain refund
            if let Some(auction) = state.get_auction_mut(&asset) {
                auction.lowest_unique_bid_escrow = None;
            }
            warn!(
                item_id = asset.item_id,
                generation,
                winner = hex::encode(winner),
                owed,
                held,
                "Winner defaulted, asset returned to seller"
            );
        }

        let settlement = settle_escrow(
            state,
            host,
            &EscrowClaim {
                asset,
                generation,
                escrow: winning_escrow,
                bidder: winner,
                bid_value,
            },
        )?;
        refund_losing_candidates(state, host, &asset, &record, &winning_escrow)?;

        let (winner, price) = if defaulted {
            (None, 0)
        } else {
            (Some(winner), price)
        };
        state.emit(AuctionEvent::AuctionEnded {
            asset,
            generation,
            winner,
            price,
        });
        info!(
            item_id = asset.item_id,
            generation,
            winner = ?winner.map(hex::encode),
            price,
            "Auction ended"
        );

        Ok(EndOutcome {
            winner,
            price,
            defaulted,
            settlement: Some(settlement),
        })
    })
}

/// Refund every unique bid below the reserve that did not win.
fn refund_losing_candidates<H: Host + ?Sized>(
    state: &mut ModuleState,
    host: &mut H,
    asset: &AssetKey,
    record: &AuctionRecord,
    winning_escrow: &Address,
) -> HandlerResult<()> {
    let generation = record.generation_index;
    let claims: Vec<EscrowClaim> = state
        .bid_book(asset, generation)
        .map(|book| {
            book.unique_values(record.reserve_price)
                .filter(|(_, tally)| tally.first_escrow != *winning_escrow)
                .map(|(value, tally)| EscrowClaim {
                    asset: *asset,
                    generation,
                    escrow: tally.first_escrow,
                    bidder: tally.first_bidder,
                    bid_value: value,
                })
                .collect()
        })
        .unwrap_or_default();

    for claim in &claims {
        settle_escrow(state, host, claim)?;
    }
    Ok(())
}

fn mark_ended(state: &mut ModuleState, asset: &AssetKey) {
    if let Some(auction) = state.get_auction_mut(asset) {
        auction.ended = true;
    }
}

/// Handle WithdrawCollateral call.
pub fn handle_withdraw_collateral<H: Host + ?Sized>(
    state: &mut ModuleState,
    ctx: &CallContext,
    host: &mut H,
    asset: AssetKey,
    generation: u64,
    bid_value: u64,
    salt: Salt,
) -> HandlerResult<SettlementReceipt> {
    guarded(state, |state| {
        let record = state
            .get_auction(&asset)
            .cloned()
            .ok_or(AuctionError::InvalidAuctionIndex {
                requested: generation,
                current: 0,
            })?;

        if generation == 0 || generation > record.generation_index {
            return Err(AuctionError::InvalidAuctionIndex {
                requested: generation,
                current: record.generation_index,
            });
        }

        let escrow = derive_escrow_address(
            &state.engine_id(),
            &asset,
            generation,
            &ctx.sender,
            bid_value,
            &salt,
        );
        if !state.is_revealed(&escrow) {
            return Err(AuctionError::UnrevealedBid(escrow));
        }

        if generation == record.generation_index {
            // Winner's funds stay locked until final settlement
            if record.lowest_unique_bid_escrow == Some(escrow) {
                return Err(AuctionError::CannotWithdraw(escrow));
            }
            // A unique runner-up may still inherit the win during reveals
            let still_live = ctx.timestamp <= record.end_of_reveal_period
                && state
                    .bid_book(&asset, generation)
                    .map(|book| book.is_live_candidate(bid_value, &escrow, record.reserve_price))
                    .unwrap_or(false);
            if still_live {
                return Err(AuctionError::CannotWithdraw(escrow));
            }
        }

        settle_escrow(
            state,
            host,
            &EscrowClaim {
                asset,
                generation,
                escrow,
                bidder: ctx.sender,
                bid_value,
            },
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genesis::AuctionGenesisConfig;
    use crate::host::ChainHistory;
    use crate::testing::TestHost;
    use auction_crypto::MerkleBalanceVerifier;
    use auction_types::NO_RESERVE;

    const ENGINE: Address = [0xEEu8; 32];
    const SELLER: Address = [1u8; 32];
    const ALICE: Address = [0xA1u8; 32];
    const BOB: Address = [0xB0u8; 32];
    const CAROL: Address = [0xC0u8; 32];

    const CREATED_AT: u64 = 1000;
    const BIDDING_ENDS: u64 = 1100;
    const REVEAL_AT: u64 = 1150;
    const REVEAL_ENDS: u64 = 1200;
    const AFTER_REVEAL: u64 = 1201;

    /// Ledger units per bid unit in these tests.
    const UNIT: u128 = 10;

    struct Fixture {
        state: ModuleState,
        host: TestHost,
        asset: AssetKey,
    }

    impl Fixture {
        fn escrow(&self, bidder: Address, value: u64, salt: Salt) -> Address {
            let generation = self.state.get_auction(&self.asset).unwrap().generation_index;
            derive_escrow_address(&ENGINE, &self.asset, generation, &bidder, value, &salt)
        }

        fn fund_bid(&mut self, bidder: Address, value: u64, salt: Salt, amount: u128) -> Address {
            let escrow = self.escrow(bidder, value, salt);
            self.host.fund(escrow, amount);
            escrow
        }

        fn record(&self) -> AuctionRecord {
            self.state.get_auction(&self.asset).unwrap().clone()
        }

        fn proof(&self, escrow: &Address) -> Option<BalanceProof> {
            let snapshot = self.record().collateralization_deadline?;
            self.host.prove(&snapshot, escrow)
        }

        fn reveal(
            &mut self,
            bidder: Address,
            value: u64,
            salt: Salt,
            proof: Option<BalanceProof>,
        ) -> HandlerResult<RevealOutcome> {
            handle_reveal_bid(
                &mut self.state,
                &ctx(bidder, REVEAL_AT),
                &mut self.host,
                &MerkleBalanceVerifier,
                self.asset,
                value,
                salt,
                proof.as_ref(),
            )
        }

        /// Reveal with a proof against the deadline when one is set.
        fn reveal_proven(
            &mut self,
            bidder: Address,
            value: u64,
            salt: Salt,
        ) -> HandlerResult<RevealOutcome> {
            let escrow = self.escrow(bidder, value, salt);
            let proof = self.proof(&escrow);
            self.reveal(bidder, value, salt, proof)
        }

        fn end(&mut self, winner: Address, value: u64, salt: Salt) -> HandlerResult<EndOutcome> {
            handle_end_auction(
                &mut self.state,
                &ctx(CAROL, AFTER_REVEAL),
                &mut self.host,
                self.asset,
                winner,
                value,
                salt,
            )
        }

        fn withdraw(
            &mut self,
            bidder: Address,
            generation: u64,
            value: u64,
            salt: Salt,
            now: u64,
        ) -> HandlerResult<SettlementReceipt> {
            handle_withdraw_collateral(
                &mut self.state,
                &ctx(bidder, now),
                &mut self.host,
                self.asset,
                generation,
                value,
                salt,
            )
        }
    }

    fn ctx(sender: Address, timestamp: u64) -> CallContext {
        CallContext {
            sender,
            block_height: timestamp / 12,
            timestamp,
        }
    }

    fn test_config() -> AuctionGenesisConfig {
        AuctionGenesisConfig {
            engine_id: ENGINE,
            min_bidding_period: 100,
            min_reveal_period: 100,
            bid_unit: UNIT,
        }
    }

    fn salt(n: u8) -> Salt {
        [n; 32]
    }

    fn listed(reserve_price: u64) -> Fixture {
        let mut state = ModuleState::new(test_config());
        let mut host = TestHost::new();
        let asset = AssetKey::new([0x42u8; 32], 1);
        host.mint(asset, SELLER);

        let generation = handle_create_auction(
            &mut state,
            &ctx(SELLER, CREATED_AT),
            &mut host,
            asset,
            100,
            100,
            reserve_price,
        )
        .unwrap();
        assert_eq!(generation, 1);

        Fixture { state, host, asset }
    }

    #[test]
    fn test_create_auction() {
        let f = listed(0);
        let record = f.record();

        assert_eq!(record.seller, SELLER);
        assert_eq!(record.end_of_bidding_period, BIDDING_ENDS);
        assert_eq!(record.end_of_reveal_period, REVEAL_ENDS);
        assert_eq!(record.lowest_unique_bid, NO_RESERVE);
        assert_eq!(record.second_lowest_unique_bid, NO_RESERVE);
        assert_eq!(record.lowest_unique_bid_escrow, None);
        assert_eq!(record.collateralization_deadline, None);
        assert_eq!(f.host.owners[&f.asset], ENGINE);
        assert!(matches!(
            f.state.pending_events[0],
            AuctionEvent::AuctionCreated { generation: 1, .. }
        ));
    }

    #[test]
    fn test_create_auction_duration_too_short() {
        let mut state = ModuleState::new(test_config());
        let mut host = TestHost::new();
        let asset = AssetKey::new([0x42u8; 32], 1);
        host.mint(asset, SELLER);

        let result =
            handle_create_auction(&mut state, &ctx(SELLER, 0), &mut host, asset, 99, 100, 0);
        assert_eq!(
            result,
            Err(AuctionError::DurationTooShort {
                minimum: 100,
                got: 99
            })
        );

        let result =
            handle_create_auction(&mut state, &ctx(SELLER, 0), &mut host, asset, 100, 50, 0);
        assert!(matches!(result, Err(AuctionError::DurationTooShort { .. })));
        assert!(state.auctions.is_empty());
    }

    #[test]
    fn test_create_auction_requires_authorization() {
        let mut state = ModuleState::new(test_config());
        let mut host = TestHost::new();
        let asset = AssetKey::new([0x42u8; 32], 1);
        host.mint(asset, SELLER);

        let result =
            handle_create_auction(&mut state, &ctx(ALICE, 0), &mut host, asset, 100, 100, 0);
        assert_eq!(result, Err(AuctionError::Host(HostError::NotAuthorized)));
        assert!(state.auctions.is_empty());
        assert_eq!(host.owners[&asset], SELLER);

        // Approved operators may list on the owner's behalf
        host.approvals.insert((SELLER, ALICE));
        let generation =
            handle_create_auction(&mut state, &ctx(ALICE, 0), &mut host, asset, 100, 100, 0)
                .unwrap();
        assert_eq!(generation, 1);
        assert_eq!(state.get_auction(&asset).unwrap().seller, ALICE);
    }

    #[test]
    fn test_create_auction_missing_asset() {
        let mut state = ModuleState::new(test_config());
        let mut host = TestHost::new();
        let asset = AssetKey::new([0x42u8; 32], 1);

        let result =
            handle_create_auction(&mut state, &ctx(SELLER, 0), &mut host, asset, 100, 100, 0);
        assert_eq!(result, Err(AuctionError::Host(HostError::AssetNotFound(asset))));
    }

    #[test]
    fn test_create_auction_while_active() {
        let mut f = listed(0);
        let result = handle_create_auction(
            &mut f.state,
            &ctx(SELLER, 1050),
            &mut f.host,
            f.asset,
            100,
            100,
            0,
        );
        assert_eq!(result, Err(AuctionError::AuctionActive(f.asset)));
        assert_eq!(f.record().generation_index, 1);
    }

    #[test]
    fn test_reveal_outside_window() {
        let mut f = listed(0);
        f.fund_bid(ALICE, 1, salt(1), 10);

        for now in [BIDDING_ENDS, AFTER_REVEAL] {
            let result = handle_reveal_bid(
                &mut f.state,
                &ctx(ALICE, now),
                &mut f.host,
                &MerkleBalanceVerifier,
                f.asset,
                1,
                salt(1),
                None,
            );
            assert!(matches!(result, Err(AuctionError::NotInRevealPeriod { .. })));
        }
        assert!(f.state.revealed.is_empty());
    }

    #[test]
    fn test_lowest_unique_wins_and_pays_second() {
        let mut f = listed(0);
        let escrow_a = f.fund_bid(ALICE, 1, salt(1), 30);
        let escrow_b = f.fund_bid(BOB, 2, salt(2), 20);
        let escrow_c = f.fund_bid(CAROL, 3, salt(3), 30);
        f.host.finalize_block();

        let first = f.reveal(ALICE, 1, salt(1), None).unwrap();
        assert!(first.collateralized);
        assert!(first.live_candidate);
        assert_eq!(first.deadline_set, Some(f.host.latest_finalized_block_hash()));
        assert_eq!(first.settlement, None);

        assert!(f.reveal_proven(BOB, 2, salt(2)).unwrap().live_candidate);
        assert!(f.reveal_proven(CAROL, 3, salt(3)).unwrap().live_candidate);

        let record = f.record();
        assert_eq!(record.lowest_unique_bid, 1);
        assert_eq!(record.second_lowest_unique_bid, 2);
        assert_eq!(record.lowest_unique_bid_escrow, Some(escrow_a));

        let outcome = f.end(ALICE, 1, salt(1)).unwrap();
        assert_eq!(outcome.winner, Some(ALICE));
        assert_eq!(outcome.price, 2);
        assert!(!outcome.defaulted);
        assert_eq!(f.host.owners[&f.asset], ALICE);
        assert_eq!(f.host.balance(&SELLER), 2 * UNIT);
        assert_eq!(f.host.balance(&ALICE), 10);
        assert_eq!(f.host.balance(&escrow_a), 0);

        // Losing unique bids are refunded when the auction ends
        assert_eq!(f.host.balance(&BOB), 20);
        assert_eq!(f.host.balance(&CAROL), 30);
        assert_eq!(f.host.balance(&escrow_b), 0);
        assert_eq!(f.host.balance(&escrow_c), 0);
        assert!(f.withdraw(BOB, 1, 2, salt(2), AFTER_REVEAL).unwrap().already_settled);
        assert!(f.withdraw(CAROL, 1, 3, salt(3), AFTER_REVEAL).unwrap().already_settled);
    }

    #[test]
    fn test_winner_funded_for_own_bid_only_defaults() {
        let mut f = listed(0);
        let escrow_a = f.fund_bid(ALICE, 1, salt(1), 10);
        f.fund_bid(BOB, 2, salt(2), 20);
        f.fund_bid(CAROL, 3, salt(3), 30);
        f.host.finalize_block();

        f.reveal(ALICE, 1, salt(1), None).unwrap();
        f.reveal_proven(BOB, 2, salt(2)).unwrap();
        f.reveal_proven(CAROL, 3, salt(3)).unwrap();
        f.state.take_events();

        // Price is 2 units but Alice only holds 1
        let outcome = f.end(ALICE, 1, salt(1)).unwrap();
        assert_eq!(outcome.winner, None);
        assert_eq!(outcome.price, 0);
        assert!(outcome.defaulted);
        assert_eq!(outcome.settlement.unwrap().paid_to_seller, 0);

        assert_eq!(f.host.owners[&f.asset], SELLER);
        assert_eq!(f.host.balance(&SELLER), 0);
        assert_eq!(f.host.balance(&ALICE), 10);
        assert_eq!(f.host.balance(&BOB), 20);
        assert_eq!(f.host.balance(&CAROL), 30);
        assert_eq!(f.host.balance(&escrow_a), 0);

        let record = f.record();
        assert!(record.ended);
        assert_eq!(record.lowest_unique_bid_escrow, None);
        assert!(f.state.take_events().iter().any(|e| matches!(
            e,
            AuctionEvent::AuctionEnded { winner: None, price: 0, .. }
        )));
        assert_eq!(f.end(ALICE, 1, salt(1)), Err(AuctionError::AuctionEnded));
    }

    #[test]
    fn test_winner_funded_exactly_for_price() {
        let mut f = listed(0);
        f.fund_bid(ALICE, 1, salt(1), 20);
        f.fund_bid(BOB, 2, salt(2), 20);
        f.host.finalize_block();
        f.reveal(ALICE, 1, salt(1), None).unwrap();
        f.reveal_proven(BOB, 2, salt(2)).unwrap();

        let outcome = f.end(ALICE, 1, salt(1)).unwrap();
        assert_eq!(outcome.winner, Some(ALICE));
        assert_eq!(f.host.balance(&SELLER), 20);
        assert_eq!(f.host.balance(&ALICE), 0);
        assert_eq!(f.host.balance(&BOB), 20);
    }

    #[test]
    fn test_duplicate_bids_are_both_refunded() {
        let mut f = listed(0);
        let escrow_a = f.fund_bid(ALICE, 5, salt(1), 50);
        let escrow_b = f.fund_bid(BOB, 5, salt(2), 50);
        f.host.finalize_block();

        assert!(f.reveal(ALICE, 5, salt(1), None).unwrap().live_candidate);
        let second = f.reveal_proven(BOB, 5, salt(2)).unwrap();
        assert!(second.collateralized);
        assert!(!second.live_candidate);

        assert_eq!(f.state.bid_count(&f.asset, 1, 5), 2);
        let record = f.record();
        assert_eq!(record.lowest_unique_bid, NO_RESERVE);
        assert_eq!(record.second_lowest_unique_bid, NO_RESERVE);
        assert_eq!(record.lowest_unique_bid_escrow, None);

        assert_eq!(f.host.balance(&ALICE), 50);
        assert_eq!(f.host.balance(&BOB), 50);
        assert_eq!(f.host.balance(&escrow_a), 0);
        assert_eq!(f.host.balance(&escrow_b), 0);
        assert!(f.state.is_settled(&escrow_a));
        assert!(f.state.is_settled(&escrow_b));
    }

    #[test]
    fn test_duplicate_of_winner_promotes_next_unique() {
        let mut f = listed(0);
        let escrow_a = f.fund_bid(ALICE, 1, salt(1), 10);
        let escrow_b = f.fund_bid(BOB, 2, salt(2), 40);
        f.fund_bid(CAROL, 1, salt(3), 10);
        f.host.finalize_block();

        f.reveal(ALICE, 1, salt(1), None).unwrap();
        f.reveal_proven(BOB, 2, salt(2)).unwrap();
        f.reveal_proven(CAROL, 1, salt(3)).unwrap();

        let record = f.record();
        assert_eq!(record.lowest_unique_bid, 2);
        assert_eq!(record.second_lowest_unique_bid, NO_RESERVE);
        assert_eq!(record.lowest_unique_bid_escrow, Some(escrow_b));
        assert_eq!(f.host.balance(&escrow_a), 0);
        assert_eq!(f.host.balance(&ALICE), 10);

        // No runner-up and no reserve: the winner pays their own bid
        let outcome = f.end(BOB, 2, salt(2)).unwrap();
        assert_eq!(outcome.price, 2);
        assert_eq!(f.host.balance(&SELLER), 20);
        assert_eq!(f.host.balance(&BOB), 20);
    }

    #[test]
    fn test_double_reveal_rejected() {
        let mut f = listed(0);
        let escrow = f.fund_bid(ALICE, 1, salt(1), 10);
        f.host.finalize_block();

        f.reveal(ALICE, 1, salt(1), None).unwrap();
        let before = f.record();
        let proof = f.proof(&escrow);

        let result = f.reveal(ALICE, 1, salt(1), proof);
        assert_eq!(result, Err(AuctionError::BidAlreadyRevealed(escrow)));
        assert_eq!(f.record(), before);
        assert_eq!(f.state.bid_count(&f.asset, 1, 1), 1);
    }

    #[test]
    fn test_invalid_proof_leaves_state_unchanged() {
        let mut f = listed(0);
        f.fund_bid(ALICE, 1, salt(1), 10);
        let escrow_b = f.fund_bid(BOB, 2, salt(2), 5);
        f.host.finalize_block();

        f.reveal(ALICE, 1, salt(1), None).unwrap();
        let before = f.record();

        let mut forged = f.proof(&escrow_b).unwrap();
        forged.balance = 1_000;
        let result = f.reveal(BOB, 2, salt(2), Some(forged));

        assert!(matches!(result, Err(AuctionError::InvalidProof(_))));
        assert_eq!(f.record(), before);
        assert!(!f.state.is_revealed(&escrow_b));
        assert_eq!(f.state.bid_count(&f.asset, 1, 2), 0);
        assert_eq!(f.host.balance(&escrow_b), 5);
    }

    #[test]
    fn test_late_funding_cannot_undercut() {
        let mut f = listed(0);
        f.fund_bid(ALICE, 5, salt(1), 50);
        f.host.finalize_block();
        f.reveal(ALICE, 5, salt(1), None).unwrap();
        let deadline = f.record().collateralization_deadline.unwrap();

        // Bob sees the standing bid, then funds a lower one
        let escrow_b = f.fund_bid(BOB, 1, salt(2), 10);
        let later = f.host.finalize_block();
        assert!(f.host.prove(&deadline, &escrow_b).is_none());

        // A proof from a later snapshot is rejected outright
        let stale = f.host.prove(&later, &escrow_b);
        let result = f.reveal(BOB, 1, salt(2), stale);
        assert!(matches!(result, Err(AuctionError::InvalidProof(_))));

        // Without a proof the bid is disqualified and refunded
        let outcome = f.reveal(BOB, 1, salt(2), None).unwrap();
        assert!(!outcome.collateralized);
        assert_eq!(outcome.settlement.unwrap().refunded, 10);
        assert_eq!(f.host.balance(&BOB), 10);
        assert_eq!(f.record().lowest_unique_bid, 5);
        assert_eq!(f.record().collateralization_deadline, Some(deadline));
    }

    #[test]
    fn test_undercollateralized_first_reveal_sets_no_deadline() {
        let mut f = listed(0);
        f.fund_bid(ALICE, 1, salt(1), 5);
        f.fund_bid(BOB, 2, salt(2), 20);
        f.host.finalize_block();

        let outcome = f.reveal(ALICE, 1, salt(1), None).unwrap();
        assert!(!outcome.collateralized);
        assert_eq!(outcome.deadline_set, None);
        assert_eq!(f.record().collateralization_deadline, None);
        assert_eq!(f.host.balance(&ALICE), 5);
        assert_eq!(f.state.bid_count(&f.asset, 1, 1), 0);

        let outcome = f.reveal(BOB, 2, salt(2), None).unwrap();
        assert!(outcome.collateralized);
        assert!(outcome.deadline_set.is_some());
        assert_eq!(f.record().lowest_unique_bid, 2);
    }

    #[test]
    fn test_deadline_never_overwritten() {
        let mut f = listed(0);
        f.fund_bid(ALICE, 1, salt(1), 10);
        f.fund_bid(BOB, 2, salt(2), 20);
        f.fund_bid(CAROL, 3, salt(3), 30);
        f.host.finalize_block();

        f.reveal(ALICE, 1, salt(1), None).unwrap();
        let deadline = f.record().collateralization_deadline;

        f.host.finalize_block();
        assert!(f.reveal_proven(BOB, 2, salt(2)).unwrap().deadline_set.is_none());
        f.host.finalize_block();
        f.reveal_proven(CAROL, 3, salt(3)).unwrap();

        assert_eq!(f.record().collateralization_deadline, deadline);
        let deadline_events = f
            .state
            .pending_events
            .iter()
            .filter(|e| matches!(e, AuctionEvent::CollateralizationDeadlineSet { .. }))
            .count();
        assert_eq!(deadline_events, 1);
    }

    #[test]
    fn test_bid_at_or_above_reserve_is_refunded() {
        let mut f = listed(5);
        let escrow = f.fund_bid(ALICE, 7, salt(1), 70);
        f.host.finalize_block();

        let outcome = f.reveal(ALICE, 7, salt(1), None).unwrap();
        assert!(outcome.collateralized);
        assert!(!outcome.live_candidate);
        assert_eq!(outcome.settlement.unwrap().refunded, 70);
        assert_eq!(f.host.balance(&escrow), 0);

        let record = f.record();
        assert_eq!(record.lowest_unique_bid, 5);
        assert_eq!(record.second_lowest_unique_bid, 5);
        assert_eq!(f.state.bid_count(&f.asset, 1, 7), 1);
    }

    #[test]
    fn test_single_bid_under_reserve_pays_reserve() {
        let mut f = listed(5);
        f.fund_bid(ALICE, 3, salt(1), 50);
        f.host.finalize_block();
        f.reveal(ALICE, 3, salt(1), None).unwrap();

        let outcome = f.end(ALICE, 3, salt(1)).unwrap();
        assert_eq!(outcome.price, 5);
        assert_eq!(f.host.balance(&SELLER), 50);
        assert_eq!(f.host.balance(&ALICE), 0);
    }

    #[test]
    fn test_end_without_winner_returns_asset() {
        let mut f = listed(0);
        let outcome = f.end(ALICE, 1, salt(1)).unwrap();
        assert_eq!(outcome.winner, None);
        assert_eq!(outcome.price, 0);
        assert_eq!(f.host.owners[&f.asset], SELLER);
        assert!(f.record().ended);
    }

    #[test]
    fn test_end_auction_checks() {
        let mut f = listed(0);
        let escrow_a = f.fund_bid(ALICE, 1, salt(1), 10);
        f.host.finalize_block();
        f.reveal(ALICE, 1, salt(1), None).unwrap();

        let early = handle_end_auction(
            &mut f.state,
            &ctx(ALICE, REVEAL_ENDS),
            &mut f.host,
            f.asset,
            ALICE,
            1,
            salt(1),
        );
        assert!(matches!(early, Err(AuctionError::RevealPeriodNotOver { .. })));

        let wrong = f.end(ALICE, 1, salt(9));
        assert!(matches!(
            wrong,
            Err(AuctionError::IncorrectVaultAddress { expected, .. }) if expected == escrow_a
        ));
        assert_eq!(f.host.owners[&f.asset], ENGINE);

        f.end(ALICE, 1, salt(1)).unwrap();
        assert_eq!(f.end(ALICE, 1, salt(1)), Err(AuctionError::AuctionEnded));
    }

    #[test]
    fn test_end_unknown_asset() {
        let mut f = listed(0);
        f.asset = AssetKey::new([0x43u8; 32], 1);
        assert!(matches!(
            f.end(ALICE, 1, salt(1)),
            Err(AuctionError::InvalidAuctionIndex { .. })
        ));
    }

    #[test]
    fn test_withdraw_rules() {
        let mut f = listed(0);
        f.fund_bid(ALICE, 1, salt(1), 10);
        f.fund_bid(BOB, 2, salt(2), 20);
        f.host.finalize_block();
        f.reveal(ALICE, 1, salt(1), None).unwrap();
        f.reveal_proven(BOB, 2, salt(2)).unwrap();

        // Winner is locked
        assert!(matches!(
            f.withdraw(ALICE, 1, 1, salt(1), AFTER_REVEAL),
            Err(AuctionError::CannotWithdraw(_))
        ));
        // Unique runner-up is locked while reveals can still promote it
        assert!(matches!(
            f.withdraw(BOB, 1, 2, salt(2), REVEAL_AT),
            Err(AuctionError::CannotWithdraw(_))
        ));
        // Never revealed
        assert!(matches!(
            f.withdraw(CAROL, 1, 3, salt(3), AFTER_REVEAL),
            Err(AuctionError::UnrevealedBid(_))
        ));
        // Generation out of range
        for generation in [0, 2] {
            assert_eq!(
                f.withdraw(BOB, generation, 2, salt(2), AFTER_REVEAL),
                Err(AuctionError::InvalidAuctionIndex {
                    requested: generation,
                    current: 1
                })
            );
        }

        let receipt = f.withdraw(BOB, 1, 2, salt(2), AFTER_REVEAL).unwrap();
        assert_eq!(receipt.refunded, 20);
        assert!(!receipt.already_settled);

        let again = f.withdraw(BOB, 1, 2, salt(2), AFTER_REVEAL).unwrap();
        assert!(again.already_settled);
        assert_eq!(again.refunded, 0);
        assert_eq!(f.host.balance(&BOB), 20);
    }

    #[test]
    fn test_relisting_starts_new_generation() {
        let mut f = listed(0);
        f.fund_bid(ALICE, 1, salt(1), 30);
        let old_escrow = f.fund_bid(BOB, 3, salt(3), 30);
        f.host.finalize_block();
        f.reveal(ALICE, 1, salt(1), None).unwrap();
        f.reveal_proven(BOB, 3, salt(3)).unwrap();
        f.end(ALICE, 1, salt(1)).unwrap();
        assert_eq!(f.host.owners[&f.asset], ALICE);
        assert_eq!(f.host.balance(&BOB), 30);

        let generation = handle_create_auction(
            &mut f.state,
            &ctx(ALICE, 1300),
            &mut f.host,
            f.asset,
            100,
            100,
            0,
        )
        .unwrap();
        assert_eq!(generation, 2);

        let record = f.record();
        assert_eq!(record.seller, ALICE);
        assert_eq!(record.collateralization_deadline, None);
        assert_eq!(record.lowest_unique_bid_escrow, None);

        // The same bid tuple maps to a fresh escrow in the new generation
        let new_escrow = f.fund_bid(BOB, 3, salt(3), 30);
        assert_ne!(new_escrow, old_escrow);
        f.host.finalize_block();
        let outcome = handle_reveal_bid(
            &mut f.state,
            &ctx(BOB, 1450),
            &mut f.host,
            &MerkleBalanceVerifier,
            f.asset,
            3,
            salt(3),
            None,
        )
        .unwrap();
        assert!(outcome.live_candidate);
        assert_eq!(f.state.bid_count(&f.asset, 2, 3), 1);
        assert_eq!(f.state.bid_count(&f.asset, 1, 3), 1);

        // Old-generation escrows stay addressable after the refund at end
        let receipt = f.withdraw(BOB, 1, 3, salt(3), 1450).unwrap();
        assert!(receipt.already_settled);
        assert_eq!(f.host.balance(&BOB), 30);
        assert_eq!(f.host.balance(&new_escrow), 30);
    }

    #[test]
    fn test_reentrant_call_rejected() {
        let mut f = listed(0);
        f.fund_bid(ALICE, 1, salt(1), 10);
        f.state.in_flight = true;

        assert_eq!(f.reveal(ALICE, 1, salt(1), None), Err(AuctionError::Reentrancy));
        assert!(f.state.revealed.is_empty());
    }

    #[test]
    fn test_dispatch_create() {
        let mut state = ModuleState::new(test_config());
        let mut host = TestHost::new();
        let asset = AssetKey::new([0x42u8; 32], 1);
        host.mint(asset, SELLER);

        let outcome = handle_call(
            &mut state,
            &ctx(SELLER, 0),
            &mut host,
            &MerkleBalanceVerifier,
            AuctionCall::CreateAuction {
                asset,
                bidding_period: 100,
                reveal_period: 100,
                reserve_price: 0,
            },
        )
        .unwrap();
        assert_eq!(outcome, CallOutcome::Created { generation: 1 });
        assert!(!state.in_flight);
    }
}
