//! Mock chain server for local testing of the lowest-unique-bid auction.
//!
//! This provides a JSON-RPC server that simulates the host ledger and runs
//! the auction module without requiring a real blockchain.

use anyhow::Result;
use jsonrpsee::core::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::Server;
use jsonrpsee::types::ErrorObjectOwned;
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use auction_module::{AuctionCall, AuctionEvent, AuctionGenesisConfig, CallOutcome, FundsLedger};
use auction_types::Address;
use mock_chain::types::*;
use mock_chain::{Chain, ChainError};

/// RPC API definition for the mock chain.
#[rpc(server)]
pub trait MockChainApi {
    // ============ Admin Methods ============

    /// Reset the chain with a genesis config.
    #[method(name = "admin_init")]
    async fn admin_init(&self, config: GenesisConfigRpc) -> Result<bool, ErrorObjectOwned>;

    /// Advance the chain by one block.
    #[method(name = "admin_advanceBlock")]
    async fn admin_advance_block(&self) -> Result<BlockInfo, ErrorObjectOwned>;

    /// Set the current timestamp (for testing time-dependent logic).
    #[method(name = "admin_setTimestamp")]
    async fn admin_set_timestamp(&self, timestamp: u64) -> Result<bool, ErrorObjectOwned>;

    // ============ Ledger Methods ============

    /// Create an asset.
    #[method(name = "ledger_mintAsset")]
    async fn ledger_mint_asset(&self, params: MintAssetParams) -> Result<bool, ErrorObjectOwned>;

    /// Approve or revoke an operator.
    #[method(name = "ledger_setApprovalForAll")]
    async fn ledger_set_approval_for_all(
        &self,
        params: ApprovalParams,
    ) -> Result<bool, ErrorObjectOwned>;

    /// Credit funds to an account.
    #[method(name = "ledger_deposit")]
    async fn ledger_deposit(&self, account: String, amount: u128)
        -> Result<u128, ErrorObjectOwned>;

    /// Move funds between accounts.
    #[method(name = "ledger_transfer")]
    async fn ledger_transfer(&self, params: TransferParams) -> Result<bool, ErrorObjectOwned>;

    /// Get an account balance.
    #[method(name = "ledger_balanceOf")]
    async fn ledger_balance_of(&self, account: String) -> Result<u128, ErrorObjectOwned>;

    /// Get the owner of an asset.
    #[method(name = "ledger_ownerOf")]
    async fn ledger_owner_of(&self, asset: AssetRpc) -> Result<Option<String>, ErrorObjectOwned>;

    /// Prove an account's balance at the asset's collateralization deadline.
    #[method(name = "ledger_proveBalance")]
    async fn ledger_prove_balance(
        &self,
        asset: AssetRpc,
        account: String,
    ) -> Result<Option<String>, ErrorObjectOwned>;

    // ============ Auction Methods ============

    /// List an asset.
    #[method(name = "auction_create")]
    async fn auction_create(&self, params: CreateAuctionParams) -> Result<u64, ErrorObjectOwned>;

    /// Reveal a committed bid.
    #[method(name = "auction_revealBid")]
    async fn auction_reveal_bid(
        &self,
        params: RevealBidParams,
    ) -> Result<RevealOutcomeRpc, ErrorObjectOwned>;

    /// End an auction and settle the winner.
    #[method(name = "auction_end")]
    async fn auction_end(&self, params: EndAuctionParams)
        -> Result<EndOutcomeRpc, ErrorObjectOwned>;

    /// Reclaim a revealed escrow.
    #[method(name = "auction_withdrawCollateral")]
    async fn auction_withdraw_collateral(
        &self,
        params: WithdrawParams,
    ) -> Result<SettlementRpc, ErrorObjectOwned>;

    // ============ Query Methods ============

    /// Get current block info.
    #[method(name = "chain_getBlockInfo")]
    async fn chain_get_block_info(&self) -> Result<BlockInfo, ErrorObjectOwned>;

    /// Get the engine parameters.
    #[method(name = "chain_getConfig")]
    async fn chain_get_config(&self) -> Result<ChainConfigRpc, ErrorObjectOwned>;

    /// Get every committed event.
    #[method(name = "chain_getEvents")]
    async fn chain_get_events(&self) -> Result<Vec<AuctionEvent>, ErrorObjectOwned>;

    /// Get the current record for an asset.
    #[method(name = "query_getAuction")]
    async fn query_get_auction(
        &self,
        asset: AssetRpc,
    ) -> Result<Option<AuctionRecordRpc>, ErrorObjectOwned>;

    /// Compute the escrow address for a bid in the current generation.
    #[method(name = "query_getEscrowAddress")]
    async fn query_get_escrow_address(
        &self,
        asset: AssetRpc,
        bidder: String,
        bid_value: u64,
        salt: String,
    ) -> Result<Option<String>, ErrorObjectOwned>;

    /// Number of collateralized reveals at a value.
    #[method(name = "query_getBidCount")]
    async fn query_get_bid_count(
        &self,
        asset: AssetRpc,
        generation: u64,
        bid_value: u64,
    ) -> Result<u32, ErrorObjectOwned>;

    /// List all auctions.
    #[method(name = "query_listAuctions")]
    async fn query_list_auctions(&self) -> Result<Vec<AuctionRecordRpc>, ErrorObjectOwned>;

    /// Auctions whose reveal period is over but that have not been ended.
    #[method(name = "query_getPendingEnd")]
    async fn query_get_pending_end(&self) -> Result<Vec<AssetRpc>, ErrorObjectOwned>;
}

/// Implementation of the mock chain RPC server.
struct MockChainServer {
    chain: Arc<RwLock<Chain>>,
}

impl MockChainServer {
    fn new(chain: Chain) -> Self {
        Self {
            chain: Arc::new(RwLock::new(chain)),
        }
    }

    fn rpc_error(msg: &str) -> ErrorObjectOwned {
        ErrorObjectOwned::owned(-32000, msg.to_string(), None::<()>)
    }

    fn invalid_params(msg: String) -> ErrorObjectOwned {
        ErrorObjectOwned::owned(-32602, msg, None::<()>)
    }

    fn call_error(e: ChainError) -> ErrorObjectOwned {
        Self::rpc_error(&e.to_string())
    }

    fn block_info(chain: &Chain) -> BlockInfo {
        BlockInfo {
            height: chain.block_height(),
            timestamp: chain.timestamp(),
            finalized_hash: chain
                .ledger()
                .latest_header()
                .map(|h| hex::encode(h.hash()))
                .unwrap_or_default(),
        }
    }
}

fn address(s: &str) -> Result<Address, ErrorObjectOwned> {
    parse_hex32(s).map_err(MockChainServer::invalid_params)
}

fn unexpected(outcome: CallOutcome) -> ErrorObjectOwned {
    MockChainServer::rpc_error(&format!("Unexpected outcome: {:?}", outcome))
}

#[async_trait]
impl MockChainApiServer for MockChainServer {
    async fn admin_init(&self, config: GenesisConfigRpc) -> Result<bool, ErrorObjectOwned> {
        let genesis = config.to_config().map_err(Self::invalid_params)?;
        let chain = Chain::with_timestamp(genesis, config.initial_timestamp.unwrap_or(0))
            .map_err(Self::call_error)?;
        *self.chain.write() = chain;
        Ok(true)
    }

    async fn admin_advance_block(&self) -> Result<BlockInfo, ErrorObjectOwned> {
        let mut chain = self.chain.write();
        chain.advance_block();
        Ok(Self::block_info(&chain))
    }

    async fn admin_set_timestamp(&self, timestamp: u64) -> Result<bool, ErrorObjectOwned> {
        let mut chain = self.chain.write();
        chain.set_timestamp(timestamp);
        info!("Timestamp set to {}", timestamp);
        Ok(true)
    }

    async fn ledger_mint_asset(&self, params: MintAssetParams) -> Result<bool, ErrorObjectOwned> {
        let owner = address(&params.owner)?;
        let asset = params.asset.to_key().map_err(Self::invalid_params)?;
        self.chain
            .write()
            .mint_asset(asset, owner)
            .map_err(Self::call_error)?;
        info!("Minted asset {} to {}", asset.item_id, params.owner);
        Ok(true)
    }

    async fn ledger_set_approval_for_all(
        &self,
        params: ApprovalParams,
    ) -> Result<bool, ErrorObjectOwned> {
        let owner = address(&params.owner)?;
        let operator = address(&params.operator)?;
        self.chain
            .write()
            .ledger_mut()
            .set_approval_for_all(owner, operator, params.approved);
        Ok(true)
    }

    async fn ledger_deposit(
        &self,
        account: String,
        amount: u128,
    ) -> Result<u128, ErrorObjectOwned> {
        let account = address(&account)?;
        let mut chain = self.chain.write();
        chain.ledger_mut().deposit(account, amount);
        Ok(chain.ledger().balance(&account))
    }

    async fn ledger_transfer(&self, params: TransferParams) -> Result<bool, ErrorObjectOwned> {
        let from = address(&params.from)?;
        let to = address(&params.to)?;
        self.chain
            .write()
            .ledger_mut()
            .transfer_funds(&from, &to, params.amount)
            .map_err(|e| Self::rpc_error(&e.to_string()))?;
        Ok(true)
    }

    async fn ledger_balance_of(&self, account: String) -> Result<u128, ErrorObjectOwned> {
        let account = address(&account)?;
        Ok(self.chain.read().ledger().balance(&account))
    }

    async fn ledger_owner_of(&self, asset: AssetRpc) -> Result<Option<String>, ErrorObjectOwned> {
        let asset = asset.to_key().map_err(Self::invalid_params)?;
        Ok(self.chain.read().ledger().owner(&asset).map(hex::encode))
    }

    async fn ledger_prove_balance(
        &self,
        asset: AssetRpc,
        account: String,
    ) -> Result<Option<String>, ErrorObjectOwned> {
        let asset = asset.to_key().map_err(Self::invalid_params)?;
        let account = address(&account)?;
        self.chain
            .read()
            .deadline_proof(&asset, &account)
            .map(|proof| encode_proof(&proof).map_err(|e| Self::rpc_error(&e)))
            .transpose()
    }

    async fn auction_create(&self, params: CreateAuctionParams) -> Result<u64, ErrorObjectOwned> {
        let sender = address(&params.sender)?;
        let asset = params.asset.to_key().map_err(Self::invalid_params)?;
        let call = AuctionCall::CreateAuction {
            asset,
            bidding_period: params.bidding_period,
            reveal_period: params.reveal_period,
            reserve_price: params.reserve_price,
        };

        let receipt = self
            .chain
            .write()
            .execute(sender, call)
            .map_err(Self::call_error)?;
        match receipt.outcome {
            CallOutcome::Created { generation } => Ok(generation),
            other => Err(unexpected(other)),
        }
    }

    async fn auction_reveal_bid(
        &self,
        params: RevealBidParams,
    ) -> Result<RevealOutcomeRpc, ErrorObjectOwned> {
        let sender = address(&params.sender)?;
        let asset = params.asset.to_key().map_err(Self::invalid_params)?;
        let salt = address(&params.salt)?;
        let proof = params
            .proof
            .as_deref()
            .map(decode_proof)
            .transpose()
            .map_err(Self::invalid_params)?;
        let call = AuctionCall::RevealBid {
            asset,
            bid_value: params.bid_value,
            salt,
            proof,
        };

        let receipt = self
            .chain
            .write()
            .execute(sender, call)
            .map_err(Self::call_error)?;
        match receipt.outcome {
            CallOutcome::Revealed(outcome) => Ok(outcome.into()),
            other => Err(unexpected(other)),
        }
    }

    async fn auction_end(
        &self,
        params: EndAuctionParams,
    ) -> Result<EndOutcomeRpc, ErrorObjectOwned> {
        let sender = address(&params.sender)?;
        let call = AuctionCall::EndAuction {
            asset: params.asset.to_key().map_err(Self::invalid_params)?,
            winner: address(&params.winner)?,
            bid_value: params.bid_value,
            salt: address(&params.salt)?,
        };

        let receipt = self
            .chain
            .write()
            .execute(sender, call)
            .map_err(Self::call_error)?;
        match receipt.outcome {
            CallOutcome::Ended(outcome) => Ok(outcome.into()),
            other => Err(unexpected(other)),
        }
    }

    async fn auction_withdraw_collateral(
        &self,
        params: WithdrawParams,
    ) -> Result<SettlementRpc, ErrorObjectOwned> {
        let sender = address(&params.sender)?;
        let call = AuctionCall::WithdrawCollateral {
            asset: params.asset.to_key().map_err(Self::invalid_params)?,
            generation: params.generation,
            bid_value: params.bid_value,
            salt: address(&params.salt)?,
        };

        let receipt = self
            .chain
            .write()
            .execute(sender, call)
            .map_err(Self::call_error)?;
        match receipt.outcome {
            CallOutcome::Withdrawn(receipt) => Ok(receipt.into()),
            other => Err(unexpected(other)),
        }
    }

    async fn chain_get_block_info(&self) -> Result<BlockInfo, ErrorObjectOwned> {
        Ok(Self::block_info(&self.chain.read()))
    }

    async fn chain_get_config(&self) -> Result<ChainConfigRpc, ErrorObjectOwned> {
        Ok(ChainConfigRpc::from(self.chain.read().config()))
    }

    async fn chain_get_events(&self) -> Result<Vec<AuctionEvent>, ErrorObjectOwned> {
        Ok(self.chain.read().events().to_vec())
    }

    async fn query_get_auction(
        &self,
        asset: AssetRpc,
    ) -> Result<Option<AuctionRecordRpc>, ErrorObjectOwned> {
        let asset = asset.to_key().map_err(Self::invalid_params)?;
        let chain = self.chain.read();
        Ok(chain
            .module()
            .get_auction(&asset)
            .map(|record| AuctionRecordRpc::new(&asset, record, chain.timestamp())))
    }

    async fn query_get_escrow_address(
        &self,
        asset: AssetRpc,
        bidder: String,
        bid_value: u64,
        salt: String,
    ) -> Result<Option<String>, ErrorObjectOwned> {
        let asset = asset.to_key().map_err(Self::invalid_params)?;
        let bidder = address(&bidder)?;
        let salt = address(&salt)?;
        Ok(self
            .chain
            .read()
            .escrow_address(&asset, &bidder, bid_value, &salt)
            .map(hex::encode))
    }

    async fn query_get_bid_count(
        &self,
        asset: AssetRpc,
        generation: u64,
        bid_value: u64,
    ) -> Result<u32, ErrorObjectOwned> {
        let asset = asset.to_key().map_err(Self::invalid_params)?;
        Ok(self
            .chain
            .read()
            .module()
            .bid_count(&asset, generation, bid_value))
    }

    async fn query_list_auctions(&self) -> Result<Vec<AuctionRecordRpc>, ErrorObjectOwned> {
        let chain = self.chain.read();
        let mut auctions: Vec<_> = chain.module().auctions.iter().collect();
        auctions.sort_by_key(|(asset, _)| **asset);
        Ok(auctions
            .into_iter()
            .map(|(asset, record)| AuctionRecordRpc::new(asset, record, chain.timestamp()))
            .collect())
    }

    async fn query_get_pending_end(&self) -> Result<Vec<AssetRpc>, ErrorObjectOwned> {
        Ok(self
            .chain
            .read()
            .pending_end()
            .iter()
            .map(AssetRpc::from)
            .collect())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mock_chain=info".parse()?)
                .add_directive("auction_module=info".parse()?)
                .add_directive("jsonrpsee=warn".parse()?),
        )
        .init();

    let addr: SocketAddr = "127.0.0.1:9944".parse()?;

    let chain = Chain::new(AuctionGenesisConfig::default())?;
    info!("Starting mock chain server on {}", addr);

    let server = Server::builder().build(addr).await?;
    let handle = server.start(MockChainServer::new(chain).into_rpc());

    info!("Mock chain server running. Press Ctrl+C to stop.");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    handle.stop()?;
    handle.stopped().await;

    Ok(())
}
