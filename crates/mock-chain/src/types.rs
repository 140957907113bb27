//! RPC-compatible types for the mock chain.
//!
//! These types are JSON-serializable versions of the core auction types.
//! Addresses, salts and hashes travel as hex strings; balance proofs travel
//! as hex-encoded borsh.

use auction_module::handlers::{EndOutcome, RevealOutcome};
use auction_module::settlement::SettlementReceipt;
use auction_module::AuctionGenesisConfig;
use auction_types::{AssetKey, AuctionPhase, AuctionRecord, BalanceProof, NO_RESERVE};
use serde::{Deserialize, Serialize};

/// Parse a 32-byte hex value, with or without `0x`.
pub fn parse_hex32(s: &str) -> Result<[u8; 32], String> {
    let bytes = hex::decode(s.trim_start_matches("0x")).map_err(|e| format!("invalid hex: {}", e))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| format!("expected 32 bytes, got {}", b.len()))
}

pub fn encode_proof(proof: &BalanceProof) -> Result<String, String> {
    borsh::to_vec(proof)
        .map(hex::encode)
        .map_err(|e| e.to_string())
}

pub fn decode_proof(s: &str) -> Result<BalanceProof, String> {
    let bytes = hex::decode(s.trim_start_matches("0x")).map_err(|e| format!("invalid hex: {}", e))?;
    borsh::from_slice(&bytes).map_err(|e| format!("malformed proof: {}", e))
}

/// Genesis configuration for RPC.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenesisConfigRpc {
    /// Hex-encoded engine account
    pub engine_id: Option<String>,
    pub min_bidding_period: Option<u64>,
    pub min_reveal_period: Option<u64>,
    pub bid_unit: Option<u128>,
    pub initial_timestamp: Option<u64>,
}

impl GenesisConfigRpc {
    /// Fill unset fields from the default configuration.
    pub fn to_config(&self) -> Result<AuctionGenesisConfig, String> {
        let defaults = AuctionGenesisConfig::default();
        Ok(AuctionGenesisConfig {
            engine_id: match &self.engine_id {
                Some(id) => parse_hex32(id)?,
                None => defaults.engine_id,
            },
            min_bidding_period: self
                .min_bidding_period
                .unwrap_or(defaults.min_bidding_period),
            min_reveal_period: self.min_reveal_period.unwrap_or(defaults.min_reveal_period),
            bid_unit: self.bid_unit.unwrap_or(defaults.bid_unit),
        })
    }
}

/// Active engine parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfigRpc {
    pub engine_id: String,
    pub min_bidding_period: u64,
    pub min_reveal_period: u64,
    pub bid_unit: u128,
}

impl From<&AuctionGenesisConfig> for ChainConfigRpc {
    fn from(c: &AuctionGenesisConfig) -> Self {
        Self {
            engine_id: hex::encode(c.engine_id),
            min_bidding_period: c.min_bidding_period,
            min_reveal_period: c.min_reveal_period,
            bid_unit: c.bid_unit,
        }
    }
}

/// Block info response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockInfo {
    pub height: u64,
    pub timestamp: u64,
    /// Hex-encoded hash of the latest finalized header
    pub finalized_hash: String,
}

/// Asset key for RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRpc {
    /// Hex-encoded collection address
    pub collection: String,
    pub item_id: u64,
}

impl AssetRpc {
    pub fn to_key(&self) -> Result<AssetKey, String> {
        Ok(AssetKey::new(parse_hex32(&self.collection)?, self.item_id))
    }
}

impl From<&AssetKey> for AssetRpc {
    fn from(k: &AssetKey) -> Self {
        Self {
            collection: hex::encode(k.collection),
            item_id: k.item_id,
        }
    }
}

/// Parameters for creating an asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintAssetParams {
    pub owner: String,
    pub asset: AssetRpc,
}

/// Parameters for operator approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalParams {
    pub owner: String,
    pub operator: String,
    pub approved: bool,
}

/// Parameters for a plain funds transfer, e.g. funding an escrow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferParams {
    pub from: String,
    pub to: String,
    pub amount: u128,
}

/// Parameters for creating an auction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuctionParams {
    pub sender: String,
    pub asset: AssetRpc,
    pub bidding_period: u64,
    pub reveal_period: u64,
    /// Zero lists without a reserve
    pub reserve_price: u64,
}

/// Parameters for revealing a bid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealBidParams {
    pub sender: String,
    pub asset: AssetRpc,
    pub bid_value: u64,
    /// Hex-encoded salt (32 bytes)
    pub salt: String,
    /// Hex-encoded borsh `BalanceProof`
    pub proof: Option<String>,
}

/// Parameters for ending an auction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndAuctionParams {
    pub sender: String,
    pub asset: AssetRpc,
    pub winner: String,
    pub bid_value: u64,
    pub salt: String,
}

/// Parameters for withdrawing collateral.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawParams {
    pub sender: String,
    pub asset: AssetRpc,
    pub generation: u64,
    pub bid_value: u64,
    pub salt: String,
}

/// Auction record for RPC responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionRecordRpc {
    pub asset: AssetRpc,
    pub seller: String,
    pub generation: u64,
    pub phase: String,
    pub end_of_bidding_period: u64,
    pub end_of_reveal_period: u64,
    /// `None` when listed without a reserve
    pub reserve_price: Option<u64>,
    pub lowest_unique_bid: Option<u64>,
    pub second_lowest_unique_bid: Option<u64>,
    pub lowest_unique_bid_escrow: Option<String>,
    pub collateralization_deadline: Option<String>,
}

impl AuctionRecordRpc {
    pub fn new(asset: &AssetKey, record: &AuctionRecord, now: u64) -> Self {
        let bounded = |v: u64| (v != NO_RESERVE).then_some(v);
        Self {
            asset: AssetRpc::from(asset),
            seller: hex::encode(record.seller),
            generation: record.generation_index,
            phase: match record.phase(now) {
                AuctionPhase::Bidding => "bidding",
                AuctionPhase::Reveal => "reveal",
                AuctionPhase::AwaitingEnd => "awaiting_end",
                AuctionPhase::Ended => "ended",
            }
            .to_string(),
            end_of_bidding_period: record.end_of_bidding_period,
            end_of_reveal_period: record.end_of_reveal_period,
            reserve_price: bounded(record.reserve_price),
            lowest_unique_bid: bounded(record.lowest_unique_bid),
            second_lowest_unique_bid: bounded(record.second_lowest_unique_bid),
            lowest_unique_bid_escrow: record.lowest_unique_bid_escrow.map(hex::encode),
            collateralization_deadline: record.collateralization_deadline.map(hex::encode),
        }
    }
}

/// Settlement receipt for RPC responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRpc {
    pub paid_to_seller: u128,
    pub refunded: u128,
    pub already_settled: bool,
}

impl From<SettlementReceipt> for SettlementRpc {
    fn from(r: SettlementReceipt) -> Self {
        Self {
            paid_to_seller: r.paid_to_seller,
            refunded: r.refunded,
            already_settled: r.already_settled,
        }
    }
}

/// Reveal outcome for RPC responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealOutcomeRpc {
    pub escrow: String,
    pub collateralized: bool,
    pub deadline_set: Option<String>,
    pub live_candidate: bool,
    pub settlement: Option<SettlementRpc>,
}

impl From<RevealOutcome> for RevealOutcomeRpc {
    fn from(o: RevealOutcome) -> Self {
        Self {
            escrow: hex::encode(o.escrow),
            collateralized: o.collateralized,
            deadline_set: o.deadline_set.map(hex::encode),
            live_candidate: o.live_candidate,
            settlement: o.settlement.map(SettlementRpc::from),
        }
    }
}

/// End outcome for RPC responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndOutcomeRpc {
    pub winner: Option<String>,
    pub price: u64,
    #[serde(default)]
    pub defaulted: bool,
    pub settlement: Option<SettlementRpc>,
}

impl From<EndOutcome> for EndOutcomeRpc {
    fn from(o: EndOutcome) -> Self {
        Self {
            winner: o.winner.map(hex::encode),
            price: o.price,
            defaulted: o.defaulted,
            settlement: o.settlement.map(SettlementRpc::from),
        }
    }
}
