//! CLI for sealed-bid auctions.
//!
//! This binary provides commands for:
//! - Generating the evaluator key
//! - Creating and cancelling auctions
//! - Submitting sealed bids
//! - Settling auctions, one at a time or as a background sweep
//! - Querying auction status

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::OsRng;
use tokio::sync::watch;
use tracing::info;

use auction_client::{submit_bid, AuctionView};
use auction_crypto::{KeyPair, PrivateScalar};
use auction_evaluator::{Evaluator, LocalEvaluator};
use auction_module::{
    AuctionHouse, AuctionParams, CallContext, Clock, CreateAuction, JsonFileStore, ManualClock,
    SettlementStage, SystemClock,
};
use auction_settler::{SettlementService, SettlerConfig};
use auction_types::{parse_amount, LAMPORT_DECIMALS};

#[derive(Parser)]
#[command(name = "auction-cli")]
#[command(about = "CLI for sealed-bid auctions")]
struct Cli {
    /// Auction store file
    #[arg(long, default_value = "auctions.json")]
    store: PathBuf,

    /// Evaluator private key file (hex)
    #[arg(long, default_value = "evaluator.key")]
    key: PathBuf,

    /// Auction limits (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the current time (unix milliseconds)
    #[arg(long)]
    now: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the evaluator key pair
    Keygen {
        /// Overwrite an existing key file
        #[arg(long)]
        force: bool,
    },

    /// Create a new auction
    CreateAuction {
        /// Creator identity
        #[arg(long)]
        sender: String,

        /// Item name
        #[arg(long)]
        item: String,

        /// Item description
        #[arg(long, default_value = "")]
        description: String,

        /// Minimum bid (decimal, e.g. 0.5)
        #[arg(long)]
        min_bid: String,

        /// Bidding window in minutes
        #[arg(long, default_value = "60")]
        duration_mins: u64,
    },

    /// Submit a sealed bid
    Bid {
        /// Bidder identity
        #[arg(long)]
        sender: String,

        /// Auction ID
        #[arg(long)]
        auction_id: u64,

        /// Bid amount (decimal, sealed before submission)
        #[arg(long)]
        amount: String,

        /// Escrow transaction reference
        #[arg(long)]
        tx_reference: Option<String>,
    },

    /// Settle a closed auction
    Settle {
        /// Caller identity
        #[arg(long, default_value = "settler")]
        sender: String,

        /// Auction ID
        #[arg(long)]
        auction_id: u64,
    },

    /// Cancel an auction that has no bids
    Cancel {
        /// Creator identity
        #[arg(long)]
        sender: String,

        /// Auction ID
        #[arg(long)]
        auction_id: u64,
    },

    /// Get auction details
    GetAuction {
        /// Auction ID
        #[arg(long)]
        auction_id: u64,
    },

    /// List all auctions
    ListAuctions,

    /// Settle every auction whose window has passed
    SettleDue,

    /// Keep settling due auctions until interrupted
    Watch {
        /// Polling interval in seconds
        #[arg(long, default_value = "10")]
        interval: u64,
    },
}

fn keygen_cmd(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists; pass --force to replace it", path.display());
    }
    let keys = KeyPair::generate(&mut OsRng);
    std::fs::write(path, keys.private().to_hex())
        .with_context(|| format!("writing {}", path.display()))?;

    info!("Wrote evaluator key to {}", path.display());
    println!("Evaluator public key: {}", hex::encode(keys.public().0));
    Ok(())
}

fn load_evaluator(path: &Path) -> Result<LocalEvaluator> {
    let raw = std::fs::read_to_string(path).with_context(|| {
        format!(
            "reading evaluator key {} (run `auction-cli keygen` first)",
            path.display()
        )
    })?;
    let private = PrivateScalar::from_hex(&raw)?;
    Ok(LocalEvaluator::from_private(private))
}

fn open_house(
    store_path: &Path,
    key_path: &Path,
    config: Option<&Path>,
    now: Option<u64>,
) -> Result<AuctionHouse> {
    let store = JsonFileStore::open(store_path)?;
    let evaluator = load_evaluator(key_path)?;
    let params = match config {
        Some(path) => AuctionParams::load(path)?,
        None => AuctionParams::default(),
    };
    let clock: Arc<dyn Clock> = match now {
        Some(now) => Arc::new(ManualClock::new(now)),
        None => Arc::new(SystemClock),
    };

    info!(
        store = %store_path.display(),
        evaluator = %hex::encode(evaluator.public_key().0),
        "Opened auction house"
    );
    Ok(AuctionHouse::builder(Arc::new(store), Arc::new(evaluator))
        .clock(clock)
        .params(params)
        .build()?)
}

fn print_auction(house: &AuctionHouse, auction: &auction_types::Auction) -> Result<()> {
    let view = AuctionView::new(auction, house.now(), LAMPORT_DECIMALS);
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

fn create_auction_cmd(
    house: &AuctionHouse,
    sender: &str,
    item: String,
    description: String,
    min_bid: &str,
    duration_mins: u64,
) -> Result<()> {
    let minimum_bid = parse_amount(min_bid, LAMPORT_DECIMALS)?;
    let open_until = house
        .now()
        .checked_add(duration_mins.saturating_mul(60 * 1000))
        .ok_or_else(|| anyhow!("Duration too long"))?;

    let auction = house.create_auction(
        &CallContext::new(sender),
        CreateAuction {
            item_name: item,
            description,
            minimum_bid,
            open_until,
        },
    )?;
    println!("Auction ID: {}", auction.id);
    Ok(())
}

fn bid_cmd(
    house: &AuctionHouse,
    sender: &str,
    auction_id: u64,
    amount: &str,
    tx_reference: Option<String>,
) -> Result<()> {
    let amount = parse_amount(amount, LAMPORT_DECIMALS)?;
    let submitted = submit_bid(
        house,
        &CallContext::new(sender),
        auction_id,
        amount,
        tx_reference,
        &mut OsRng,
    )?;

    println!("Bid submitted successfully");
    println!("  Auction ID: {}", auction_id);
    println!("  Bid ID: {}", submitted.bid.id);
    println!("  Submitted at: {}", submitted.bid.submitted_at);
    Ok(())
}

fn settle_cmd(house: &AuctionHouse, sender: &str, auction_id: u64) -> Result<()> {
    let ctx = CallContext::new(sender);
    let observer = |id: u64, stage: SettlementStage| info!(auction_id = id, ?stage, "Settlement progress");
    match house.settle_with_observer(&ctx, auction_id, &observer) {
        Ok(auction) => print_auction(house, &auction),
        Err(err) if err.is_settlement_decided() => {
            println!("Auction {} is already settled", auction_id);
            print_auction(house, &house.get_auction(auction_id)?)
        }
        Err(err) => Err(err.into()),
    }
}

fn list_auctions_cmd(house: &AuctionHouse) -> Result<()> {
    let auctions = house.list_auctions()?;
    if auctions.is_empty() {
        println!("No auctions found");
        return Ok(());
    }

    println!("Auctions:");
    let now = house.now();
    for auction in &auctions {
        println!("  {}", AuctionView::new(auction, now, LAMPORT_DECIMALS).summary_line());
    }
    Ok(())
}

async fn watch_cmd(house: AuctionHouse, interval: u64) -> Result<()> {
    let service = Arc::new(SettlementService::new(
        Arc::new(house),
        SettlerConfig {
            poll_interval_secs: interval,
            ..Default::default()
        },
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received");
        }
        let _ = shutdown_tx.send(true);
    });

    service.start(shutdown_rx).await
}

async fn run(house: AuctionHouse, command: Commands) -> Result<()> {
    match command {
        Commands::Keygen { .. } => bail!("keygen does not use the auction store"),

        Commands::CreateAuction {
            sender,
            item,
            description,
            min_bid,
            duration_mins,
        } => create_auction_cmd(&house, &sender, item, description, &min_bid, duration_mins),

        Commands::Bid {
            sender,
            auction_id,
            amount,
            tx_reference,
        } => bid_cmd(&house, &sender, auction_id, &amount, tx_reference),

        Commands::Settle { sender, auction_id } => settle_cmd(&house, &sender, auction_id),

        Commands::Cancel { sender, auction_id } => {
            let auction = house.cancel_auction(&CallContext::new(sender), auction_id)?;
            println!("Auction {} cancelled", auction.id);
            Ok(())
        }

        Commands::GetAuction { auction_id } => print_auction(&house, &house.get_auction(auction_id)?),

        Commands::ListAuctions => list_auctions_cmd(&house),

        Commands::SettleDue => {
            let service = SettlementService::new(Arc::new(house), SettlerConfig::default());
            let report = service.run_once()?;
            println!(
                "Settled {} auctions ({} sold, {} unsold), {} skipped, {} failed",
                report.settled(),
                report.sold.len(),
                report.unsold.len(),
                report.skipped.len(),
                report.failed.len()
            );
            Ok(())
        }

        Commands::Watch { interval } => watch_cmd(house, interval).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("auction_cli=info".parse()?),
        )
        .init();

    let Cli {
        store,
        key,
        config,
        now,
        command,
    } = Cli::parse();

    match command {
        Commands::Keygen { force } => keygen_cmd(&key, force),
        command => {
            let house = open_house(&store, &key, config.as_deref(), now)?;
            run(house, command).await
        }
    }
}
