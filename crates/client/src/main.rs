//! CLI for interacting with lowest-unique-bid auctions.
//!
//! This binary provides commands for:
//! - Minting assets and funding accounts on the mock chain
//! - Listing assets for auction
//! - Preparing, funding and revealing bids
//! - Ending auctions and withdrawing collateral

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::OsRng;
use tracing::info;

use auction_client::{create_bid, AuctionRpcClient, PreparedBid};
use auction_types::{Address, AssetKey};
use mock_chain::types::{parse_hex32, AuctionRecordRpc};

#[derive(Parser)]
#[command(name = "auction-cli")]
#[command(about = "CLI for lowest-unique-bid sealed auctions")]
struct Cli {
    /// Mock chain RPC endpoint
    #[arg(long, default_value = "http://127.0.0.1:9944")]
    rpc: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an asset on the mock ledger
    Mint {
        /// Owner address (hex)
        #[arg(long)]
        owner: String,

        /// Collection address (hex)
        #[arg(long)]
        collection: String,

        #[arg(long)]
        item_id: u64,
    },

    /// Approve (or revoke) an operator for all of an owner's assets
    Approve {
        #[arg(long)]
        owner: String,

        #[arg(long)]
        operator: String,

        #[arg(long)]
        revoke: bool,
    },

    /// Credit funds to an account
    Deposit {
        #[arg(long)]
        account: String,

        #[arg(long)]
        amount: u128,
    },

    /// Show an account balance
    Balance {
        #[arg(long)]
        account: String,
    },

    /// List an asset for auction
    CreateAuction {
        /// Sender address (hex)
        #[arg(long)]
        sender: String,

        #[arg(long)]
        collection: String,

        #[arg(long)]
        item_id: u64,

        /// Bidding period (seconds)
        #[arg(long)]
        bidding_period: u64,

        /// Reveal period (seconds)
        #[arg(long)]
        reveal_period: u64,

        /// Reserve price in bid units (0 for none)
        #[arg(long, default_value = "0")]
        reserve_price: u64,
    },

    /// Prepare a bid, fund its escrow and save it for the reveal
    Bid {
        /// Bidder address (hex)
        #[arg(long)]
        bidder: String,

        #[arg(long)]
        collection: String,

        #[arg(long)]
        item_id: u64,

        /// Bid value (kept secret until reveal)
        #[arg(long)]
        value: u64,

        /// File to save the bid to
        #[arg(long)]
        out: PathBuf,

        /// Only prepare and save; do not fund the escrow
        #[arg(long)]
        no_fund: bool,
    },

    /// Reveal a saved bid
    Reveal {
        #[arg(long)]
        bid: PathBuf,
    },

    /// End an auction with the winning bid's tuple
    End {
        /// Sender address (hex)
        #[arg(long)]
        sender: String,

        /// Winner's saved bid; omit when there is no winner
        #[arg(long)]
        bid: Option<PathBuf>,

        #[arg(long)]
        collection: Option<String>,

        #[arg(long)]
        item_id: Option<u64>,
    },

    /// Withdraw collateral for a saved bid
    Withdraw {
        #[arg(long)]
        bid: PathBuf,
    },

    /// Get auction details
    GetAuction {
        #[arg(long)]
        collection: String,

        #[arg(long)]
        item_id: u64,
    },

    /// List all auctions
    ListAuctions,

    /// Auctions waiting to be ended
    PendingEnd,

    /// Advance chain time (for testing)
    AdvanceBlock,

    /// Set chain timestamp (for testing)
    SetTimestamp {
        /// Unix timestamp to set
        #[arg(long)]
        timestamp: u64,
    },
}

fn address(s: &str) -> Result<Address> {
    parse_hex32(s).map_err(|e| anyhow!("invalid address {}: {}", s, e))
}

fn asset_key(collection: &str, item_id: u64) -> Result<AssetKey> {
    Ok(AssetKey::new(address(collection)?, item_id))
}

fn load_bid(path: &Path) -> Result<PreparedBid> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading bid from {}", path.display()))?;
    Ok(serde_json::from_str(&json)?)
}

fn print_auction(a: &AuctionRecordRpc) {
    println!("Auction {}/{}:", a.asset.collection, a.asset.item_id);
    println!("  Generation: {}", a.generation);
    println!("  Phase: {}", a.phase);
    println!("  Seller: {}", a.seller);
    println!("  Bidding ends: {}", a.end_of_bidding_period);
    println!("  Reveal ends: {}", a.end_of_reveal_period);
    if let Some(reserve) = a.reserve_price {
        println!("  Reserve: {}", reserve);
    }
    if let Some(lowest) = a.lowest_unique_bid {
        println!("  Lowest unique bid: {}", lowest);
    }
    if let Some(second) = a.second_lowest_unique_bid {
        println!("  Second lowest unique bid: {}", second);
    }
    if let Some(deadline) = &a.collateralization_deadline {
        println!("  Collateralization deadline: {}", deadline);
    }
}

async fn bid_cmd(
    client: &AuctionRpcClient,
    bidder: Address,
    asset: AssetKey,
    value: u64,
    out: &Path,
    fund: bool,
) -> Result<()> {
    let config = client.config().await?;
    let engine = address(&config.engine_id)?;
    let auction = client
        .get_auction(&asset)
        .await?
        .ok_or_else(|| anyhow!("No auction for asset"))?;

    let mut rng = OsRng;
    let bid = create_bid(&engine, asset, auction.generation, bidder, value, &mut rng);

    // Save before funding so the salt is never lost
    std::fs::write(out, serde_json::to_string_pretty(&bid)?)
        .with_context(|| format!("writing bid to {}", out.display()))?;
    info!("Bid saved to {}", out.display());

    println!("Escrow: {}", hex::encode(bid.escrow));
    if fund {
        let amount = client.fund_bid(&bid, config.bid_unit).await?;
        println!("Funded escrow with {}", amount);
    } else {
        println!("Fund with {} before bidding ends", bid.collateral(config.bid_unit)?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("auction_cli=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let client = AuctionRpcClient::new(&cli.rpc)?;

    match cli.command {
        Commands::Mint {
            owner,
            collection,
            item_id,
        } => {
            client
                .mint_asset(&address(&owner)?, &asset_key(&collection, item_id)?)
                .await?;
            println!("Minted item {}", item_id);
        }

        Commands::Approve {
            owner,
            operator,
            revoke,
        } => {
            client
                .set_approval_for_all(&address(&owner)?, &address(&operator)?, !revoke)
                .await?;
            println!("Approval {}", if revoke { "revoked" } else { "granted" });
        }

        Commands::Deposit { account, amount } => {
            let balance = client.deposit(&address(&account)?, amount).await?;
            println!("Balance: {}", balance);
        }

        Commands::Balance { account } => {
            println!("Balance: {}", client.balance_of(&address(&account)?).await?);
        }

        Commands::CreateAuction {
            sender,
            collection,
            item_id,
            bidding_period,
            reveal_period,
            reserve_price,
        } => {
            let generation = client
                .create_auction(
                    &address(&sender)?,
                    &asset_key(&collection, item_id)?,
                    bidding_period,
                    reveal_period,
                    reserve_price,
                )
                .await?;
            info!("Created auction generation {}", generation);
            println!("Generation: {}", generation);
        }

        Commands::Bid {
            bidder,
            collection,
            item_id,
            value,
            out,
            no_fund,
        } => {
            bid_cmd(
                &client,
                address(&bidder)?,
                asset_key(&collection, item_id)?,
                value,
                &out,
                !no_fund,
            )
            .await?;
        }

        Commands::Reveal { bid } => {
            let bid = load_bid(&bid)?;
            let outcome = client.reveal_bid(&bid).await?;
            println!("Bid revealed:");
            println!("  Collateralized: {}", outcome.collateralized);
            println!("  Live candidate: {}", outcome.live_candidate);
            if let Some(deadline) = outcome.deadline_set {
                println!("  Set collateralization deadline: {}", deadline);
            }
            if let Some(settlement) = outcome.settlement {
                println!("  Refunded: {}", settlement.refunded);
            }
        }

        Commands::End {
            sender,
            bid,
            collection,
            item_id,
        } => {
            let winning = match (bid, collection, item_id) {
                (Some(path), _, _) => load_bid(&path)?,
                // No winner: any tuple will do
                (None, Some(collection), Some(item_id)) => PreparedBid {
                    asset: asset_key(&collection, item_id)?,
                    generation: 0,
                    bidder: [0u8; 32],
                    bid_value: 0,
                    salt: [0u8; 32],
                    escrow: [0u8; 32],
                },
                _ => return Err(anyhow!("Pass --bid, or --collection and --item-id")),
            };
            let outcome = client.end_auction(&address(&sender)?, &winning).await?;
            match outcome.winner {
                Some(winner) => {
                    println!("Auction ended. Winner: {}, Price: {}", winner, outcome.price)
                }
                None if outcome.defaulted => {
                    println!("Winner could not cover the price; asset returned to seller")
                }
                None => println!("Auction ended without a winner"),
            }
        }

        Commands::Withdraw { bid } => {
            let bid = load_bid(&bid)?;
            let receipt = client.withdraw_collateral(&bid).await?;
            if receipt.already_settled {
                println!("Escrow already settled");
            } else {
                println!("Refunded: {}", receipt.refunded);
            }
        }

        Commands::GetAuction {
            collection,
            item_id,
        } => match client.get_auction(&asset_key(&collection, item_id)?).await? {
            Some(a) => print_auction(&a),
            None => println!("No auction for item {}", item_id),
        },

        Commands::ListAuctions => {
            let auctions = client.list_auctions().await?;
            if auctions.is_empty() {
                println!("No auctions found");
            }
            for a in auctions {
                println!(
                    "  [{}/{}] generation {} - {} ({})",
                    a.asset.collection, a.asset.item_id, a.generation, a.phase, a.seller
                );
            }
        }

        Commands::PendingEnd => {
            for asset in client.pending_end().await? {
                println!("  {}/{}", asset.collection, asset.item_id);
            }
        }

        Commands::AdvanceBlock => {
            let info = client.advance_block().await?;
            println!(
                "Block advanced: height={}, timestamp={}",
                info.height, info.timestamp
            );
        }

        Commands::SetTimestamp { timestamp } => {
            client.set_timestamp(timestamp).await?;
            println!("Timestamp set to {}", timestamp);
        }
    }

    Ok(())
}
