//! Bid command - run one auction round

use crate::style::*;
use anyhow::Result;
use token_auction::{AuctionError, Bid, Config, Priority};

pub async fn run(config: &Config, bids: Vec<(String, Priority)>, target: Option<String>) -> Result<()> {
    let target = target.unwrap_or_else(|| config.auction.recipient.clone());
    let bids: Vec<Bid> = bids
        .into_iter()
        .map(|(team, priority)| Bid::new(team, target.as_str(), priority))
        .collect();

    let engine = super::open_engine(config).await?;

    print_header(&format!("Auction for {}", target));
    println!();
    for bid in &bids {
        let (balance, reputation) = engine.ledger().get_balance(&bid.team_id).await?;
        let cost = config.pricing.price(bid.priority, reputation);
        let score = config.scoring.score(bid.priority, reputation);
        let affordable = if balance >= cost {
            style_green("ok")
        } else {
            style_red("short")
        };
        println!(
            "  {:<20} P{:<3} cost {:>4}  score {:>7.2}  balance {:>6}  {}",
            bid.team_id, bid.priority, cost, score, balance, affordable
        );
    }
    println!();

    match engine.run_round(&bids).await {
        Ok(outcome) => {
            print_success(&format!(
                "{} wins for {} tokens (score {:.2})",
                style_cyan(&outcome.winner.team_id),
                outcome.cost,
                outcome.score
            ));
            println!("  Remaining balance: {}", style_bold(&outcome.balance.to_string()));
            Ok(())
        }
        Err(AuctionError::NoWinner) => {
            print_warning("No team could afford its bid");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
