//! End-to-end integration tests for the lowest-unique-bid auction.
//!
//! These tests drive the auction module through the mock chain:
//! 1. Asset minting and listing
//! 2. Bid preparation and escrow funding
//! 3. Reveals against the collateralization deadline
//! 4. Ending the auction and settling escrows
//! 5. Collateral withdrawal and relisting

#![cfg(test)]

use auction_client::{create_bid, PreparedBid};
use auction_module::handlers::{EndOutcome, RevealOutcome};
use auction_module::settlement::SettlementReceipt;
use auction_module::{
    AuctionCall, AuctionError, AuctionEvent, AuctionGenesisConfig, AuctionQuery,
    AuctionQueryResponse, CallOutcome, FundsLedger, HostError,
};
use auction_types::{Address, AssetKey, AuctionPhase, NO_RESERVE};
use mock_chain::{Chain, ChainError};
use rand::rngs::OsRng;

const ENGINE: Address = [0xEEu8; 32];
const SELLER: Address = [0x5Eu8; 32];
const ALICE: Address = [0xA1u8; 32];
const BOB: Address = [0xB0u8; 32];
const CAROL: Address = [0xC0u8; 32];

const BID_UNIT: u128 = 1_000;
const STARTING_BALANCE: u128 = 10_000;

const BIDDING_PERIOD: u64 = 120;
const REVEAL_PERIOD: u64 = 120;

fn new_chain() -> Chain {
    let config = AuctionGenesisConfig {
        engine_id: ENGINE,
        min_bidding_period: 60,
        min_reveal_period: 60,
        bid_unit: BID_UNIT,
    };
    let mut chain = Chain::new(config).expect("valid genesis");
    for account in [SELLER, ALICE, BOB, CAROL] {
        chain.ledger_mut().deposit(account, STARTING_BALANCE);
    }
    chain
}

fn test_asset() -> AssetKey {
    AssetKey::new([0x42u8; 32], 1)
}

/// Mint the test asset to the seller and list it at the current time.
fn list(chain: &mut Chain, reserve_price: u64) -> AssetKey {
    let asset = test_asset();
    chain.mint_asset(asset, SELLER).expect("fresh asset");
    let receipt = chain
        .execute(
            SELLER,
            AuctionCall::CreateAuction {
                asset,
                bidding_period: BIDDING_PERIOD,
                reveal_period: REVEAL_PERIOD,
                reserve_price,
            },
        )
        .expect("listing succeeds");
    assert_eq!(receipt.outcome, CallOutcome::Created { generation: 1 });
    asset
}

fn record(chain: &Chain, asset: &AssetKey) -> auction_types::AuctionRecord {
    chain
        .module()
        .get_auction(asset)
        .cloned()
        .expect("auction exists")
}

/// Prepare a bid in the current generation and fund its escrow.
fn place_bid(
    chain: &mut Chain,
    asset: AssetKey,
    bidder: Address,
    value: u64,
    funding: u128,
) -> PreparedBid {
    let generation = record(chain, &asset).generation_index;
    let bid = create_bid(&ENGINE, asset, generation, bidder, value, &mut OsRng);
    chain
        .ledger_mut()
        .transfer_funds(&bidder, &bid.escrow, funding)
        .expect("bidder can fund escrow");
    bid
}

fn reveal_call(bid: &PreparedBid, proof: Option<auction_types::BalanceProof>) -> AuctionCall {
    AuctionCall::RevealBid {
        asset: bid.asset,
        bid_value: bid.bid_value,
        salt: bid.salt,
        proof,
    }
}

/// Reveal with a proof against the deadline when one is set.
fn reveal(chain: &mut Chain, bid: &PreparedBid) -> Result<RevealOutcome, ChainError> {
    let proof = chain.deadline_proof(&bid.asset, &bid.escrow);
    match chain.execute(bid.bidder, reveal_call(bid, proof))?.outcome {
        CallOutcome::Revealed(outcome) => Ok(outcome),
        other => panic!("unexpected outcome {:?}", other),
    }
}

fn end(chain: &mut Chain, winner: &PreparedBid) -> Result<EndOutcome, ChainError> {
    let call = AuctionCall::EndAuction {
        asset: winner.asset,
        winner: winner.bidder,
        bid_value: winner.bid_value,
        salt: winner.salt,
    };
    match chain.execute(SELLER, call)?.outcome {
        CallOutcome::Ended(outcome) => Ok(outcome),
        other => panic!("unexpected outcome {:?}", other),
    }
}

fn withdraw(chain: &mut Chain, bid: &PreparedBid) -> Result<SettlementReceipt, ChainError> {
    let call = AuctionCall::WithdrawCollateral {
        asset: bid.asset,
        generation: bid.generation,
        bid_value: bid.bid_value,
        salt: bid.salt,
    };
    match chain.execute(bid.bidder, call)?.outcome {
        CallOutcome::Withdrawn(receipt) => Ok(receipt),
        other => panic!("unexpected outcome {:?}", other),
    }
}

fn enter_reveal(chain: &mut Chain, asset: &AssetKey) {
    let record = record(chain, asset);
    chain.set_timestamp(record.end_of_bidding_period + 1);
}

fn close_reveal(chain: &mut Chain, asset: &AssetKey) {
    let record = record(chain, asset);
    chain.set_timestamp(record.end_of_reveal_period + 1);
}

fn count_events(chain: &Chain, pred: impl Fn(&AuctionEvent) -> bool) -> usize {
    chain.events().iter().filter(|e| pred(e)).count()
}

/// Test the complete auction flow on the mock chain.
#[test]
fn test_full_auction_flow() {
    let mut chain = new_chain();

    // ========================================
    // Phase 1: List the asset
    // ========================================

    let asset = list(&mut chain, 0);
    assert_eq!(chain.ledger().owner(&asset), Some(ENGINE));
    println!("Asset listed, generation 1");

    // ========================================
    // Phase 2: Bidders fund escrows
    // ========================================

    // The winner pays the runner-up price, so Alice funds for a bid of 2
    let bid_a = place_bid(&mut chain, asset, ALICE, 1, 2 * BID_UNIT);
    let bid_b = place_bid(&mut chain, asset, BOB, 2, 2 * BID_UNIT);
    let bid_c = place_bid(&mut chain, asset, CAROL, 3, 3 * BID_UNIT);
    let snapshot = chain.advance_block();

    assert_eq!(
        chain.query(AuctionQuery::GetPhase {
            asset,
            now: chain.timestamp()
        }),
        AuctionQueryResponse::Phase(Some(AuctionPhase::Bidding))
    );
    println!("3 escrows funded");

    // ========================================
    // Phase 3: Reveals
    // ========================================

    enter_reveal(&mut chain, &asset);

    let first = reveal(&mut chain, &bid_a).expect("reveal A");
    assert_eq!(first.deadline_set, Some(snapshot));
    assert!(first.live_candidate);

    let second = reveal(&mut chain, &bid_b).expect("reveal B");
    assert!(second.collateralized);
    assert_eq!(second.deadline_set, None);

    reveal(&mut chain, &bid_c).expect("reveal C");

    let standings = record(&chain, &asset);
    assert_eq!(standings.lowest_unique_bid, 1);
    assert_eq!(standings.second_lowest_unique_bid, 2);
    assert_eq!(standings.lowest_unique_bid_escrow, Some(bid_a.escrow));
    println!("3 bids revealed, lowest unique bid 1");

    // ========================================
    // Phase 4: End and settle
    // ========================================

    close_reveal(&mut chain, &asset);
    assert_eq!(chain.pending_end(), vec![asset]);

    let outcome = end(&mut chain, &bid_a).expect("end auction");
    assert_eq!(outcome.winner, Some(ALICE));
    assert_eq!(outcome.price, 2);
    assert!(!outcome.defaulted);

    assert_eq!(chain.ledger().owner(&asset), Some(ALICE));
    assert_eq!(chain.ledger().balance(&SELLER), STARTING_BALANCE + 2 * BID_UNIT);
    assert_eq!(chain.ledger().balance(&ALICE), STARTING_BALANCE - 2 * BID_UNIT);
    assert!(chain.pending_end().is_empty());
    println!("Auction ended, Alice pays 2");

    // ========================================
    // Phase 5: Losers were refunded at end
    // ========================================

    assert!(withdraw(&mut chain, &bid_b).unwrap().already_settled);
    assert!(withdraw(&mut chain, &bid_c).unwrap().already_settled);
    assert_eq!(chain.ledger().balance(&BOB), STARTING_BALANCE);
    assert_eq!(chain.ledger().balance(&CAROL), STARTING_BALANCE);

    for bid in [&bid_a, &bid_b, &bid_c] {
        assert_eq!(chain.ledger().balance(&bid.escrow), 0);
        assert_eq!(
            chain.query(AuctionQuery::IsSettled { escrow: bid.escrow }),
            AuctionQueryResponse::Settled(true)
        );
    }

    assert_eq!(count_events(&chain, |e| matches!(e, AuctionEvent::AuctionCreated { .. })), 1);
    assert_eq!(
        count_events(&chain, |e| matches!(e, AuctionEvent::CollateralizationDeadlineSet { .. })),
        1
    );
    assert_eq!(count_events(&chain, |e| matches!(e, AuctionEvent::BidRevealed { .. })), 3);
    assert_eq!(count_events(&chain, |e| matches!(e, AuctionEvent::EscrowSettled { .. })), 3);
    assert_eq!(count_events(&chain, |e| matches!(e, AuctionEvent::AuctionEnded { .. })), 1);
}

#[test]
fn test_winner_short_of_price_defaults() {
    let mut chain = new_chain();
    let asset = list(&mut chain, 0);

    // Every escrow holds exactly its own bid
    let bid_a = place_bid(&mut chain, asset, ALICE, 1, BID_UNIT);
    let bid_b = place_bid(&mut chain, asset, BOB, 2, 2 * BID_UNIT);
    let bid_c = place_bid(&mut chain, asset, CAROL, 3, 3 * BID_UNIT);
    chain.advance_block();
    enter_reveal(&mut chain, &asset);
    for bid in [&bid_a, &bid_b, &bid_c] {
        assert!(reveal(&mut chain, bid).unwrap().live_candidate);
    }

    close_reveal(&mut chain, &asset);
    let outcome = end(&mut chain, &bid_a).unwrap();
    assert_eq!(outcome.winner, None);
    assert!(outcome.defaulted);

    // No discounted sale: the seller keeps the asset and every bidder is made whole
    assert_eq!(chain.ledger().owner(&asset), Some(SELLER));
    assert_eq!(chain.ledger().balance(&SELLER), STARTING_BALANCE);
    for (bidder, bid) in [(ALICE, &bid_a), (BOB, &bid_b), (CAROL, &bid_c)] {
        assert_eq!(chain.ledger().balance(&bidder), STARTING_BALANCE);
        assert_eq!(chain.ledger().balance(&bid.escrow), 0);
    }
    assert!(chain.pending_end().is_empty());
    assert!(record(&chain, &asset).ended);
}

#[test]
fn test_duplicate_bids_are_refunded() {
    let mut chain = new_chain();
    let asset = list(&mut chain, 0);

    let bid_a = place_bid(&mut chain, asset, ALICE, 5, 5 * BID_UNIT);
    let bid_b = place_bid(&mut chain, asset, BOB, 5, 5 * BID_UNIT);
    chain.advance_block();
    enter_reveal(&mut chain, &asset);

    reveal(&mut chain, &bid_a).unwrap();
    let outcome = reveal(&mut chain, &bid_b).unwrap();
    assert!(!outcome.live_candidate);

    assert_eq!(
        chain.query(AuctionQuery::GetBidCount {
            asset,
            generation: 1,
            bid_value: 5
        }),
        AuctionQueryResponse::BidCount(2)
    );
    let standings = record(&chain, &asset);
    assert_eq!(standings.lowest_unique_bid, NO_RESERVE);
    assert_eq!(standings.lowest_unique_bid_escrow, None);
    assert_eq!(chain.ledger().balance(&ALICE), STARTING_BALANCE);
    assert_eq!(chain.ledger().balance(&BOB), STARTING_BALANCE);

    // Nobody won: the asset goes back to the seller
    close_reveal(&mut chain, &asset);
    let outcome = end(&mut chain, &bid_a).unwrap();
    assert_eq!(outcome.winner, None);
    assert_eq!(chain.ledger().owner(&asset), Some(SELLER));
    assert_eq!(chain.ledger().balance(&SELLER), STARTING_BALANCE);
}

#[test]
fn test_reveal_before_bidding_ends() {
    let mut chain = new_chain();
    let asset = list(&mut chain, 0);
    let bid = place_bid(&mut chain, asset, ALICE, 1, BID_UNIT);

    let result = reveal(&mut chain, &bid);
    assert!(matches!(
        result,
        Err(ChainError::Auction(AuctionError::NotInRevealPeriod { .. }))
    ));
    assert_eq!(
        chain.query(AuctionQuery::IsRevealed { escrow: bid.escrow }),
        AuctionQueryResponse::Revealed(false)
    );
}

#[test]
fn test_invalid_proof_reverts_whole_call() {
    let mut chain = new_chain();
    let asset = list(&mut chain, 0);
    let bid_a = place_bid(&mut chain, asset, ALICE, 3, 3 * BID_UNIT);
    let bid_b = place_bid(&mut chain, asset, BOB, 1, BID_UNIT / 2);
    chain.advance_block();
    enter_reveal(&mut chain, &asset);
    reveal(&mut chain, &bid_a).unwrap();

    let before = record(&chain, &asset);
    let events_before = chain.events().len();

    let mut forged = chain
        .deadline_proof(&asset, &bid_b.escrow)
        .expect("escrow is in the snapshot");
    forged.balance = BID_UNIT;
    let result = chain.execute(BOB, reveal_call(&bid_b, Some(forged)));

    assert!(matches!(
        result,
        Err(ChainError::Auction(AuctionError::InvalidProof(_)))
    ));
    assert_eq!(record(&chain, &asset), before);
    assert_eq!(chain.events().len(), events_before);
    assert_eq!(chain.ledger().balance(&bid_b.escrow), BID_UNIT / 2);

    // Revealing honestly disqualifies the bid and refunds it
    let outcome = reveal(&mut chain, &bid_b).unwrap();
    assert!(!outcome.collateralized);
    assert_eq!(chain.ledger().balance(&BOB), STARTING_BALANCE);
    assert_eq!(record(&chain, &asset).lowest_unique_bid, 3);
}

#[test]
fn test_late_funding_cannot_undercut() {
    let mut chain = new_chain();
    let asset = list(&mut chain, 0);
    let bid_a = place_bid(&mut chain, asset, ALICE, 4, 4 * BID_UNIT);
    chain.advance_block();
    enter_reveal(&mut chain, &asset);
    reveal(&mut chain, &bid_a).unwrap();

    // Bob learns Alice's bid and funds a lower one after the deadline
    let bid_b = place_bid(&mut chain, asset, BOB, 1, BID_UNIT);
    chain.advance_block();
    assert!(chain.deadline_proof(&asset, &bid_b.escrow).is_none());

    let outcome = reveal(&mut chain, &bid_b).unwrap();
    assert!(!outcome.collateralized);
    assert_eq!(record(&chain, &asset).lowest_unique_bid_escrow, Some(bid_a.escrow));
    assert_eq!(chain.ledger().balance(&BOB), STARTING_BALANCE);
}

#[test]
fn test_double_reveal_rejected() {
    let mut chain = new_chain();
    let asset = list(&mut chain, 0);
    let bid = place_bid(&mut chain, asset, ALICE, 2, 2 * BID_UNIT);
    chain.advance_block();
    enter_reveal(&mut chain, &asset);

    reveal(&mut chain, &bid).unwrap();
    let before = record(&chain, &asset);
    let result = reveal(&mut chain, &bid);
    assert!(matches!(
        result,
        Err(ChainError::Auction(AuctionError::BidAlreadyRevealed(escrow))) if escrow == bid.escrow
    ));
    assert_eq!(record(&chain, &asset), before);
}

#[test]
fn test_reserve_price_caps_winner() {
    let mut chain = new_chain();
    let asset = list(&mut chain, 3);

    let bid_a = place_bid(&mut chain, asset, ALICE, 2, 3 * BID_UNIT);
    let bid_b = place_bid(&mut chain, asset, BOB, 5, 5 * BID_UNIT);
    chain.advance_block();
    enter_reveal(&mut chain, &asset);

    reveal(&mut chain, &bid_a).unwrap();
    let above = reveal(&mut chain, &bid_b).unwrap();
    assert!(!above.live_candidate);
    assert_eq!(chain.ledger().balance(&BOB), STARTING_BALANCE);

    // Alone below the reserve, Alice pays the reserve
    close_reveal(&mut chain, &asset);
    let outcome = end(&mut chain, &bid_a).unwrap();
    assert_eq!(outcome.price, 3);
    assert_eq!(chain.ledger().balance(&SELLER), STARTING_BALANCE + 3 * BID_UNIT);
}

#[test]
fn test_withdraw_restrictions() {
    let mut chain = new_chain();
    let asset = list(&mut chain, 0);
    let bid_a = place_bid(&mut chain, asset, ALICE, 1, BID_UNIT);
    let bid_b = place_bid(&mut chain, asset, BOB, 2, 2 * BID_UNIT);
    let unrevealed = place_bid(&mut chain, asset, CAROL, 3, 3 * BID_UNIT);
    chain.advance_block();
    enter_reveal(&mut chain, &asset);
    reveal(&mut chain, &bid_a).unwrap();
    reveal(&mut chain, &bid_b).unwrap();

    assert!(matches!(
        withdraw(&mut chain, &bid_a),
        Err(ChainError::Auction(AuctionError::CannotWithdraw(_)))
    ));
    assert!(matches!(
        withdraw(&mut chain, &bid_b),
        Err(ChainError::Auction(AuctionError::CannotWithdraw(_)))
    ));
    assert!(matches!(
        withdraw(&mut chain, &unrevealed),
        Err(ChainError::Auction(AuctionError::UnrevealedBid(_)))
    ));

    close_reveal(&mut chain, &asset);
    assert!(matches!(
        withdraw(&mut chain, &bid_a),
        Err(ChainError::Auction(AuctionError::CannotWithdraw(_)))
    ));
    assert_eq!(withdraw(&mut chain, &bid_b).unwrap().refunded, 2 * BID_UNIT);

    // Unrevealed escrows stay locked for good
    assert_eq!(chain.ledger().balance(&unrevealed.escrow), 3 * BID_UNIT);
}

#[test]
fn test_relisting_after_sale() {
    let mut chain = new_chain();
    let asset = list(&mut chain, 0);
    let bid_a = place_bid(&mut chain, asset, ALICE, 1, BID_UNIT);
    chain.advance_block();
    enter_reveal(&mut chain, &asset);
    reveal(&mut chain, &bid_a).unwrap();
    close_reveal(&mut chain, &asset);
    end(&mut chain, &bid_a).unwrap();

    // The old seller is no longer authorized to move the asset
    let relist = AuctionCall::CreateAuction {
        asset,
        bidding_period: BIDDING_PERIOD,
        reveal_period: REVEAL_PERIOD,
        reserve_price: 0,
    };
    assert!(matches!(
        chain.execute(SELLER, relist.clone()),
        Err(ChainError::Auction(AuctionError::Host(HostError::NotAuthorized)))
    ));

    let receipt = chain.execute(ALICE, relist).unwrap();
    assert_eq!(receipt.outcome, CallOutcome::Created { generation: 2 });
    let relisted = record(&chain, &asset);
    assert_eq!(relisted.seller, ALICE);
    assert_eq!(relisted.collateralization_deadline, None);
    assert_eq!(relisted.lowest_unique_bid, NO_RESERVE);

    let bid_b = place_bid(&mut chain, asset, BOB, 1, BID_UNIT);
    assert_eq!(bid_b.generation, 2);
    chain.advance_block();
    enter_reveal(&mut chain, &asset);
    let outcome = reveal(&mut chain, &bid_b).unwrap();
    assert!(outcome.deadline_set.is_some());
    assert_eq!(
        chain.query(AuctionQuery::GetBidCount {
            asset,
            generation: 2,
            bid_value: 1
        }),
        AuctionQueryResponse::BidCount(1)
    );
}

#[test]
fn test_operator_lists_for_owner() {
    let mut chain = new_chain();
    let asset = test_asset();
    chain.mint_asset(asset, SELLER).unwrap();

    let call = AuctionCall::CreateAuction {
        asset,
        bidding_period: BIDDING_PERIOD,
        reveal_period: REVEAL_PERIOD,
        reserve_price: 0,
    };
    assert!(matches!(
        chain.execute(BOB, call.clone()),
        Err(ChainError::Auction(AuctionError::Host(HostError::NotAuthorized)))
    ));

    chain.ledger_mut().set_approval_for_all(SELLER, BOB, true);
    chain.execute(BOB, call).unwrap();
    assert_eq!(chain.ledger().owner(&asset), Some(ENGINE));
}

#[test]
fn test_encoded_calls_dispatch() {
    let mut chain = new_chain();
    let asset = test_asset();
    chain.mint_asset(asset, SELLER).unwrap();

    let call = AuctionCall::CreateAuction {
        asset,
        bidding_period: BIDDING_PERIOD,
        reveal_period: REVEAL_PERIOD,
        reserve_price: 7,
    };
    let bytes = borsh::to_vec(&call).unwrap();
    let decoded: AuctionCall = borsh::from_slice(&bytes).unwrap();
    chain.execute(SELLER, decoded).unwrap();

    assert_eq!(record(&chain, &asset).reserve_price, 7);
}
