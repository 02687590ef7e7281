//! Refill command - reset balance and reputation

use crate::style::*;
use anyhow::Result;
use token_auction::{AuctionError, Config};

pub async fn run(config: &Config, teams: Vec<String>) -> Result<()> {
    let teams = super::teams_or_configured(teams, config);
    let engine = super::open_engine(config).await?;

    print_header("Refill");

    for team in &teams {
        match engine.ledger().refill(team).await {
            Ok(()) => print_success(&format!(
                "{} reset to {} tokens, reputation {}",
                style_cyan(team),
                config.ledger.initial_balance,
                config.ledger.initial_reputation
            )),
            Err(AuctionError::AccountNotFound(_)) => {
                print_warning(&format!("{} has no account, run `auction init` first", team))
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
