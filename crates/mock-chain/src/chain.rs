//! Simulated chain driving the auction module.

use auction_crypto::{derive_escrow_address, MerkleBalanceVerifier};
use auction_module::{
    handlers, queries, AuctionCall, AuctionError, AuctionEvent, AuctionGenesisConfig,
    AuctionQuery, AuctionQueryResponse, AuctionState as ModuleState, CallContext, CallOutcome,
    GenesisValidationError,
};
use auction_types::{Address, AssetKey, BalanceProof, Salt, SnapshotRef};
use thiserror::Error;
use tracing::{info, warn};

use crate::ledger::MockLedger;

/// Seconds per simulated block.
pub const BLOCK_TIME: u64 = 12;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Invalid genesis config: {0}")]
    Genesis(#[from] GenesisValidationError),

    #[error("Asset {0:?} already exists")]
    AssetExists(AssetKey),

    #[error(transparent)]
    Auction(#[from] AuctionError),
}

/// Result of a committed call.
#[derive(Clone, Debug)]
pub struct Receipt {
    pub outcome: CallOutcome,
    pub events: Vec<AuctionEvent>,
    pub block_height: u64,
    pub timestamp: u64,
}

/// Module state, ledger and clock.
pub struct Chain {
    module: ModuleState,
    ledger: MockLedger,
    verifier: MerkleBalanceVerifier,
    /// Current block height (simulated)
    block_height: u64,
    /// Current timestamp (simulated, can be advanced)
    timestamp: u64,
    event_log: Vec<AuctionEvent>,
}

impl Chain {
    pub fn new(config: AuctionGenesisConfig) -> Result<Self, ChainError> {
        Self::with_timestamp(config, 0)
    }

    pub fn with_timestamp(
        config: AuctionGenesisConfig,
        timestamp: u64,
    ) -> Result<Self, ChainError> {
        config.validate()?;
        info!(engine = hex::encode(config.engine_id), "Chain initialized");
        Ok(Self {
            module: ModuleState::new(config),
            ledger: MockLedger::new(timestamp),
            verifier: MerkleBalanceVerifier,
            block_height: 0,
            timestamp,
            event_log: Vec::new(),
        })
    }

    pub fn config(&self) -> &AuctionGenesisConfig {
        &self.module.config
    }

    pub fn block_height(&self) -> u64 {
        self.block_height
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Produce and finalize the next block.
    pub fn advance_block(&mut self) -> SnapshotRef {
        self.block_height += 1;
        self.timestamp += BLOCK_TIME; // ~12 second blocks
        self.ledger.finalize_block(self.timestamp)
    }

    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
    }

    pub fn ledger(&self) -> &MockLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut MockLedger {
        &mut self.ledger
    }

    pub fn module(&self) -> &ModuleState {
        &self.module
    }

    pub fn mint_asset(&mut self, asset: AssetKey, owner: Address) -> Result<(), ChainError> {
        if !self.ledger.mint_asset(asset, owner) {
            return Err(ChainError::AssetExists(asset));
        }
        Ok(())
    }

    /// Execute a call from `sender` in the current block.
    ///
    /// The call runs against copies of module state and ledger; nothing
    /// changes unless it succeeds.
    pub fn execute(&mut self, sender: Address, call: AuctionCall) -> Result<Receipt, ChainError> {
        let ctx = CallContext {
            sender,
            block_height: self.block_height,
            timestamp: self.timestamp,
        };

        let mut module = self.module.clone();
        let mut ledger = self.ledger.clone();
        let outcome = handlers::handle_call(&mut module, &ctx, &mut ledger, &self.verifier, call)
            .map_err(|e| {
                warn!(sender = hex::encode(sender), error = %e, "Call reverted");
                e
            })?;

        let events = module.take_events();
        self.module = module;
        self.ledger = ledger;
        self.event_log.extend(events.iter().cloned());

        Ok(Receipt {
            outcome,
            events,
            block_height: self.block_height,
            timestamp: self.timestamp,
        })
    }

    pub fn query(&self, query: AuctionQuery) -> AuctionQueryResponse {
        queries::handle_query(&self.module, query)
    }

    /// Auctions waiting for `end_auction` at the current time.
    pub fn pending_end(&self) -> Vec<AssetKey> {
        queries::get_pending_end(&self.module, self.timestamp)
    }

    /// Every event committed so far, in order.
    pub fn events(&self) -> &[AuctionEvent] {
        &self.event_log
    }

    /// Escrow address for a bid in the asset's current generation.
    pub fn escrow_address(
        &self,
        asset: &AssetKey,
        bidder: &Address,
        bid_value: u64,
        salt: &Salt,
    ) -> Option<Address> {
        let record = self.module.get_auction(asset)?;
        Some(derive_escrow_address(
            &self.module.engine_id(),
            asset,
            record.generation_index,
            bidder,
            bid_value,
            salt,
        ))
    }

    /// Balance proof for `account` against the asset's collateralization
    /// deadline, once one is set.
    pub fn deadline_proof(&self, asset: &AssetKey, account: &Address) -> Option<BalanceProof> {
        let snapshot = self.module.get_auction(asset)?.collateralization_deadline?;
        self.ledger.prove_balance(&snapshot, account)
    }
}
