//! Token Auction CLI
//!
//! Command-line interface for inspecting and driving the token ledger.

mod commands;
mod style;

use clap::{Parser, Subcommand};
use style::*;
use token_auction::{Config, Priority};

const BANNER: &str = r#"
   █████╗ ██╗   ██╗ ██████╗████████╗██╗ ██████╗ ███╗   ██╗
  ██╔══██╗██║   ██║██╔════╝╚══██╔══╝██║██╔═══██╗████╗  ██║
  ███████║██║   ██║██║        ██║   ██║██║   ██║██╔██╗ ██║
  ██╔══██║██║   ██║██║        ██║   ██║██║   ██║██║╚██╗██║
  ██║  ██║╚██████╔╝╚██████╗   ██║   ██║╚██████╔╝██║ ╚████║
  ╚═╝  ╚═╝ ╚═════╝  ╚═════╝   ╚═╝   ╚═╝ ╚═════╝ ╚═╝  ╚═══╝
"#;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "auction")]
#[command(author = "CortexLM")]
#[command(version)]
#[command(about = "Token Auction - reputation-weighted notification auctions", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(
        short,
        long,
        env = "AUCTION_CONFIG",
        default_value = "config.toml",
        global = true
    )]
    config: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create token accounts (defaults to the configured teams)
    #[command(visible_alias = "i")]
    Init {
        /// Team ids
        teams: Vec<String>,
    },

    /// Show balance, reputation and priority usage (default)
    #[command(visible_aliases = ["b", "status"])]
    Balance {
        /// Team ids
        teams: Vec<String>,
    },

    /// Run one auction round from TEAM:PRIORITY pairs
    Bid {
        /// Bids in submission order, e.g. team-a:9 team-b:5
        #[arg(required = true, value_parser = parse_bid_pair)]
        bids: Vec<(String, Priority)>,

        /// Recipient of the notification (defaults to the configured one)
        #[arg(short, long)]
        target: Option<String>,
    },

    /// Reset balance and reputation to their initial values
    #[command(visible_alias = "r")]
    Refill {
        /// Team ids
        teams: Vec<String>,
    },

    /// List the bids a team has submitted
    #[command(visible_alias = "h")]
    History {
        /// Team id
        team: String,

        /// Number of most recent bids to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show the effective configuration
    Config,
}

/// Parse `TEAM:PRIORITY`. The team id may itself contain colons.
fn parse_bid_pair(s: &str) -> Result<(String, Priority), String> {
    let (team, priority) = s
        .rsplit_once(':')
        .ok_or_else(|| format!("expected TEAM:PRIORITY, got '{}'", s))?;
    if team.is_empty() {
        return Err(format!("missing team id in '{}'", s));
    }
    let value: i64 = priority
        .parse()
        .map_err(|_| format!("priority '{}' is not a number", priority))?;
    let priority = Priority::new(value).map_err(|e| e.to_string())?;
    Ok((team.to_string(), priority))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt().with_env_filter("info").init();
    }

    let config = match Config::load_from(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            print_error(&format!("{:#}", e));
            std::process::exit(1);
        }
    };

    let command = cli.command.unwrap_or(Commands::Balance { teams: Vec::new() });

    let result = match command {
        Commands::Init { teams } => commands::init::run(&config, teams).await,
        Commands::Balance { teams } => commands::balance::run(&config, teams).await,
        Commands::Bid { bids, target } => {
            print_banner();
            commands::bid::run(&config, bids, target).await
        }
        Commands::Refill { teams } => commands::refill::run(&config, teams).await,
        Commands::History { team, limit } => commands::history::run(&config, &team, limit).await,
        Commands::Config => commands::config::run(&config, &cli.config),
    };

    if let Err(e) = result {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

pub fn print_banner() {
    println!("{}", style_cyan(BANNER));
    println!(
        "  {} {}",
        style_dim("Token Auction"),
        style_dim(&format!("v{}", VERSION))
    );
    println!();
}
