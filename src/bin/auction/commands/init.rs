//! Init command - create token accounts

use crate::style::*;
use anyhow::Result;
use token_auction::Config;

pub async fn run(config: &Config, teams: Vec<String>) -> Result<()> {
    let teams = super::teams_or_configured(teams, config);
    if teams.is_empty() {
        print_warning("No teams given and none configured under [auction].teams");
        return Ok(());
    }

    print_header("Initialize Accounts");

    let engine = super::open_engine(config).await?;
    for team in &teams {
        if engine.ledger().initialize(team).await? {
            print_success(&format!(
                "{} created with {} tokens",
                style_cyan(team),
                config.ledger.initial_balance
            ));
        } else {
            print_info(&format!("{} already exists", style_cyan(team)));
        }
    }

    Ok(())
}
