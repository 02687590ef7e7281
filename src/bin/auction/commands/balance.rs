//! Balance command - show team accounts

use crate::style::*;
use anyhow::Result;
use token_auction::{AuctionError, Config, Priority};

pub async fn run(config: &Config, teams: Vec<String>) -> Result<()> {
    let teams = super::teams_or_configured(teams, config);
    let engine = super::open_engine(config).await?;
    let abuse_priority = config.penalty.abuse_priority;

    print_header("Team Balances");
    println!();
    println!(
        "{:<24} {:>10} {:>12} {:>10}",
        "Team",
        "Balance",
        "Reputation",
        format!("P{} uses", abuse_priority)
    );
    println!("{}", style_dim(&"─".repeat(59)));

    for team in &teams {
        match engine.ledger().account(team).await {
            Ok(account) => {
                let usage = account.usage(abuse_priority);
                let usage_text = if usage > config.penalty.threshold {
                    style_red(&format!("{:>10}", usage))
                } else {
                    format!("{:>10}", usage)
                };
                println!(
                    "{:<24} {:>10} {:>12} {}",
                    team,
                    account.token_balance,
                    style_reputation(account.reputation_score, config.ledger.initial_reputation),
                    usage_text
                );
            }
            Err(AuctionError::AccountNotFound(_)) => {
                println!("{:<24} {}", team, style_dim("no account"));
            }
            Err(e) => return Err(e.into()),
        }
    }

    if teams.len() == 1 {
        if let Ok(account) = engine.ledger().account(&teams[0]).await {
            println!();
            println!("{}", style_bold("Priority usage:"));
            for priority in Priority::all() {
                println!("  P{:<3} {}", priority, account.usage(priority));
            }
        }
    }

    Ok(())
}
