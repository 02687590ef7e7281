//! Config command - show the effective configuration

use crate::style::*;
use anyhow::Result;
use token_auction::{Config, Priority, StorageBackend};

pub fn run(config: &Config, path: &str) -> Result<()> {
    print_header("Auction Configuration");

    println!();
    let source = if std::path::Path::new(path).exists() {
        path.to_string()
    } else {
        format!("embedded default ({} not found)", path)
    };
    println!("Source:           {}", style_dim(&source));

    let backend = match config.storage.backend {
        StorageBackend::Memory => "memory".to_string(),
        StorageBackend::Sqlite => format!("sqlite ({})", config.storage.sqlite_path),
        StorageBackend::Postgres => match config.storage.database_url() {
            Some(_) => "postgres".to_string(),
            None => format!("postgres {}", style_red("(DATABASE_URL not set)")),
        },
    };
    println!("Storage:          {}", style_cyan(&backend));

    println!();
    println!("{}", style_bold("Ledger:"));
    println!("  Initial balance:    {}", config.ledger.initial_balance);
    println!("  Initial reputation: {}", config.ledger.initial_reputation);

    println!();
    println!("{}", style_bold("Pricing:"));
    let costs = Priority::all()
        .map(|p| format!("P{}={}", p, config.pricing.base_cost(p)))
        .collect::<Vec<_>>()
        .join(" ");
    println!("  Base costs:         {}", costs);
    println!(
        "  Multiplier:         {} - {} (scale {})",
        config.pricing.min_multiplier, config.pricing.max_multiplier, config.pricing.reputation_scale
    );

    println!();
    println!("{}", style_bold("Scoring:"));
    println!(
        "  Weights:            priority {} / reputation {}",
        config.scoring.priority_weight, config.scoring.reputation_weight
    );

    println!();
    println!("{}", style_bold("Penalty:"));
    println!(
        "  More than {} uses of P{} costs {} reputation ({:?})",
        config.penalty.threshold,
        config.penalty.abuse_priority,
        config.penalty.reputation_penalty,
        config.penalty.mode
    );

    println!();
    println!("{}", style_bold("Auction:"));
    println!("  Recipient:          {}", config.auction.recipient);
    println!("  Teams:              {}", config.auction.teams.join(", "));

    Ok(())
}
