//! Typed wrapper over the mock chain's JSON-RPC API.

use anyhow::{anyhow, Result};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use tracing::debug;

use auction_types::{Address, AssetKey};
use mock_chain::types::{
    parse_hex32, ApprovalParams, AssetRpc, AuctionRecordRpc, BlockInfo, ChainConfigRpc,
    CreateAuctionParams,
    EndAuctionParams, EndOutcomeRpc, MintAssetParams, RevealBidParams, RevealOutcomeRpc,
    SettlementRpc, TransferParams, WithdrawParams,
};

use crate::bid::PreparedBid;

/// Mock chain RPC client.
pub struct AuctionRpcClient {
    inner: HttpClient,
}

impl AuctionRpcClient {
    pub fn new(url: &str) -> Result<Self> {
        Ok(Self {
            inner: HttpClientBuilder::default().build(url)?,
        })
    }

    // ============ Admin ============

    pub async fn advance_block(&self) -> Result<BlockInfo> {
        Ok(self
            .inner
            .request("admin_advanceBlock", rpc_params![])
            .await?)
    }

    pub async fn set_timestamp(&self, timestamp: u64) -> Result<()> {
        let _: bool = self
            .inner
            .request("admin_setTimestamp", rpc_params![timestamp])
            .await?;
        Ok(())
    }

    pub async fn block_info(&self) -> Result<BlockInfo> {
        Ok(self
            .inner
            .request("chain_getBlockInfo", rpc_params![])
            .await?)
    }

    pub async fn config(&self) -> Result<ChainConfigRpc> {
        Ok(self.inner.request("chain_getConfig", rpc_params![]).await?)
    }

    // ============ Ledger ============

    pub async fn mint_asset(&self, owner: &Address, asset: &AssetKey) -> Result<()> {
        let params = MintAssetParams {
            owner: hex::encode(owner),
            asset: AssetRpc::from(asset),
        };
        let _: bool = self
            .inner
            .request("ledger_mintAsset", rpc_params![params])
            .await?;
        Ok(())
    }

    pub async fn set_approval_for_all(
        &self,
        owner: &Address,
        operator: &Address,
        approved: bool,
    ) -> Result<()> {
        let params = ApprovalParams {
            owner: hex::encode(owner),
            operator: hex::encode(operator),
            approved,
        };
        let _: bool = self
            .inner
            .request("ledger_setApprovalForAll", rpc_params![params])
            .await?;
        Ok(())
    }

    /// Credit funds; returns the new balance.
    pub async fn deposit(&self, account: &Address, amount: u128) -> Result<u128> {
        Ok(self
            .inner
            .request("ledger_deposit", rpc_params![hex::encode(account), amount])
            .await?)
    }

    pub async fn transfer(&self, from: &Address, to: &Address, amount: u128) -> Result<()> {
        let params = TransferParams {
            from: hex::encode(from),
            to: hex::encode(to),
            amount,
        };
        let _: bool = self
            .inner
            .request("ledger_transfer", rpc_params![params])
            .await?;
        Ok(())
    }

    pub async fn balance_of(&self, account: &Address) -> Result<u128> {
        Ok(self
            .inner
            .request("ledger_balanceOf", rpc_params![hex::encode(account)])
            .await?)
    }

    pub async fn owner_of(&self, asset: &AssetKey) -> Result<Option<Address>> {
        let owner: Option<String> = self
            .inner
            .request("ledger_ownerOf", rpc_params![AssetRpc::from(asset)])
            .await?;
        owner
            .map(|o| parse_hex32(&o).map_err(|e| anyhow!(e)))
            .transpose()
    }

    // ============ Auction ============

    pub async fn create_auction(
        &self,
        sender: &Address,
        asset: &AssetKey,
        bidding_period: u64,
        reveal_period: u64,
        reserve_price: u64,
    ) -> Result<u64> {
        let params = CreateAuctionParams {
            sender: hex::encode(sender),
            asset: AssetRpc::from(asset),
            bidding_period,
            reveal_period,
            reserve_price,
        };
        Ok(self
            .inner
            .request("auction_create", rpc_params![params])
            .await?)
    }

    /// Fund a prepared bid's escrow from the bidder's account.
    pub async fn fund_bid(&self, bid: &PreparedBid, bid_unit: u128) -> Result<u128> {
        let amount = bid.collateral(bid_unit)?;
        self.transfer(&bid.bidder, &bid.escrow, amount).await?;
        Ok(amount)
    }

    /// Reveal a prepared bid, attaching a balance proof when the
    /// collateralization deadline is already set.
    pub async fn reveal_bid(&self, bid: &PreparedBid) -> Result<RevealOutcomeRpc> {
        let asset = AssetRpc::from(&bid.asset);
        let proof: Option<String> = self
            .inner
            .request(
                "ledger_proveBalance",
                rpc_params![asset.clone(), hex::encode(bid.escrow)],
            )
            .await?;
        debug!(with_proof = proof.is_some(), "Revealing bid");

        let params = RevealBidParams {
            sender: hex::encode(bid.bidder),
            asset,
            bid_value: bid.bid_value,
            salt: hex::encode(bid.salt),
            proof,
        };
        Ok(self
            .inner
            .request("auction_revealBid", rpc_params![params])
            .await?)
    }

    pub async fn end_auction(
        &self,
        sender: &Address,
        winning: &PreparedBid,
    ) -> Result<EndOutcomeRpc> {
        let params = EndAuctionParams {
            sender: hex::encode(sender),
            asset: AssetRpc::from(&winning.asset),
            winner: hex::encode(winning.bidder),
            bid_value: winning.bid_value,
            salt: hex::encode(winning.salt),
        };
        Ok(self
            .inner
            .request("auction_end", rpc_params![params])
            .await?)
    }

    pub async fn withdraw_collateral(&self, bid: &PreparedBid) -> Result<SettlementRpc> {
        let params = WithdrawParams {
            sender: hex::encode(bid.bidder),
            asset: AssetRpc::from(&bid.asset),
            generation: bid.generation,
            bid_value: bid.bid_value,
            salt: hex::encode(bid.salt),
        };
        Ok(self
            .inner
            .request("auction_withdrawCollateral", rpc_params![params])
            .await?)
    }

    // ============ Queries ============

    pub async fn get_auction(&self, asset: &AssetKey) -> Result<Option<AuctionRecordRpc>> {
        Ok(self
            .inner
            .request("query_getAuction", rpc_params![AssetRpc::from(asset)])
            .await?)
    }

    pub async fn list_auctions(&self) -> Result<Vec<AuctionRecordRpc>> {
        Ok(self
            .inner
            .request("query_listAuctions", rpc_params![])
            .await?)
    }

    pub async fn pending_end(&self) -> Result<Vec<AssetRpc>> {
        Ok(self
            .inner
            .request("query_getPendingEnd", rpc_params![])
            .await?)
    }
}
