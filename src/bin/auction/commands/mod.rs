//! CLI commands

pub mod balance;
pub mod bid;
pub mod config;
pub mod history;
pub mod init;
pub mod refill;

use anyhow::{Context, Result};
use token_auction::{store, AuctionEngine, Config};

/// Open the configured store and wire an engine over it.
pub async fn open_engine(config: &Config) -> Result<AuctionEngine> {
    let store = store::open(&config.storage)
        .await
        .context("Failed to open ledger store")?;
    Ok(AuctionEngine::from_config(store, config))
}

/// Teams named on the command line, or the configured ones.
pub fn teams_or_configured(teams: Vec<String>, config: &Config) -> Vec<String> {
    if teams.is_empty() {
        config.auction.teams.clone()
    } else {
        teams
    }
}
