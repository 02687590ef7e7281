//! Token Auction daemon
//!
//! Opens the configured ledger store, makes sure every configured team has
//! an account, and runs one round in which each team bids a random
//! priority for the configured recipient.

use anyhow::Context;
use rand::Rng;
use token_auction::{store, AuctionEngine, Bid, Config, Priority, MAX_PRIORITY, MIN_PRIORITY};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Token Auction daemon");

    let config_path =
        std::env::var("AUCTION_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let config = Config::load_from(&config_path)?;

    let store = store::open(&config.storage)
        .await
        .context("Failed to open ledger store")?;
    let engine = AuctionEngine::from_config(store, &config);

    let teams = &config.auction.teams;
    if teams.is_empty() {
        warn!("No teams configured, nothing to auction");
        return Ok(());
    }

    let created = engine.ledger().initialize_all(teams).await?;
    info!("{} of {} team accounts created", created, teams.len());

    let bids = random_bids(teams, &config.auction.recipient)?;
    for bid in &bids {
        info!("Team {} bids priority {}", bid.team_id, bid.priority);
    }

    match engine.run_auction(&bids).await {
        Ok(winner) => info!("Winner: {}", winner),
        Err(e) => {
            error!("Auction failed: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}

fn random_bids(teams: &[String], recipient: &str) -> anyhow::Result<Vec<Bid>> {
    let mut rng = rand::thread_rng();
    teams
        .iter()
        .map(|team| {
            let priority = Priority::new(rng.gen_range(MIN_PRIORITY..=MAX_PRIORITY) as i64)?;
            Ok(Bid::new(team.as_str(), recipient, priority))
        })
        .collect()
}
