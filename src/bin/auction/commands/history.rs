//! History command - list a team's bids

use crate::style::*;
use anyhow::Result;
use chrono::{TimeZone, Utc};
use token_auction::Config;

pub async fn run(config: &Config, team: &str, limit: usize) -> Result<()> {
    let engine = super::open_engine(config).await?;
    let bids = engine.recorder().history(team).await?;

    print_header(&format!("Bid History: {}", team));

    if bids.is_empty() {
        println!();
        print_info("No bids recorded");
        return Ok(());
    }

    println!();
    println!(
        "{:<20} {:<14} {:<16} {:>8} {:>6} {:>8}",
        "Time", "Bid", "Target", "Priority", "Cost", "Score"
    );
    println!("{}", style_dim(&"─".repeat(77)));

    let skip = bids.len().saturating_sub(limit);
    for bid in bids.iter().skip(skip) {
        let time = Utc
            .timestamp_millis_opt(bid.created_at_ms)
            .single()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| bid.created_at_ms.to_string());
        println!(
            "{:<20} {:<14} {:<16} {:>8} {:>6} {:>8.2}",
            time,
            truncate_bid_id(bid.bid_id()),
            bid.target,
            bid.priority,
            bid.cost,
            bid.score
        );
    }

    println!();
    println!(
        "{}",
        style_dim(&format!("Showing {} of {} bids", bids.len() - skip, bids.len()))
    );

    Ok(())
}
