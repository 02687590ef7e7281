//! Configuration management
//!
//! Loads configuration from config.toml with support for:
//! - Ledger store backend selection
//! - Initial balance and reputation
//! - Pricing tiers and reputation multipliers
//! - Score weights
//! - Priority abuse penalty

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ledger::{LedgerConfig, PenaltyPolicy};
use crate::pricing::PriceSchedule;
use crate::scoring::ScoreWeights;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub ledger: LedgerConfig,
    pub pricing: PriceSchedule,
    pub scoring: ScoreWeights,
    pub penalty: PenaltyPolicy,
    pub auction: AuctionConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    #[default]
    Sqlite,
    Postgres,
}

/// Ledger store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// SQLite database file (sqlite backend only)
    pub sqlite_path: String,
    /// PostgreSQL URL, DATABASE_URL env var takes precedence
    pub database_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            sqlite_path: "auction.db".to_string(),
            database_url: None,
        }
    }
}

impl StorageConfig {
    /// Get the PostgreSQL URL (env var takes precedence over the config value)
    pub fn database_url(&self) -> Option<String> {
        match std::env::var("DATABASE_URL") {
            Ok(url) if !url.is_empty() => Some(url),
            _ => self.database_url.clone().filter(|url| !url.is_empty()),
        }
    }
}

/// Teams and recipient used by the auction daemon
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuctionConfig {
    pub teams: Vec<String>,
    pub recipient: String,
}

impl Config {
    /// Load from config.toml or use defaults
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    /// Load from specific path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            // Use embedded default config
            Self::embedded()
        }
    }

    pub fn embedded() -> Result<Self> {
        toml::from_str(DEFAULT_CONFIG).context("Failed to parse default config")
    }
}
