//! Token Auction - decide which team may notify a user
//!
//! Teams holding a token balance compete for the right to send the next
//! notification to a recipient. Each bid declares a priority from 1 to 10;
//! the engine prices it from the team's reputation, scores it, and debits
//! the winner.
//!
//! # How a round works
//!
//! 1. Every bid is priced: base cost for its priority times a multiplier
//!    that grows as reputation falls
//! 2. Every priced bid is written to the audit trail
//! 3. Affordable bids are scored (70% priority, 30% reputation)
//! 4. The highest score wins; the first bid wins a tie
//! 5. The winner is debited with a conditional write that rejects an
//!    overdraft
//!
//! # Anti-abuse measures
//!
//! - Each successful debit increments a per-priority usage counter
//! - Teams that keep bidding the top priority lose reputation
//! - Lower reputation makes every later bid more expensive

pub mod auction;
pub mod config;
pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pg_storage;
pub mod pricing;
pub mod recorder;
pub mod scoring;
pub mod storage;
pub mod store;
pub mod types;

pub use auction::{AuctionEngine, RoundOutcome, RoundPhase};
pub use config::{AuctionConfig, Config, StorageBackend, StorageConfig};
pub use error::{AuctionError, Result};
pub use ledger::{AccountLedger, LedgerConfig, PenaltyMode, PenaltyPolicy};
pub use pg_storage::PgStorage;
pub use pricing::PriceSchedule;
pub use recorder::{BidIdSource, BidRecorder, UuidBidIds};
pub use scoring::ScoreWeights;
pub use storage::SqliteStorage;
pub use store::{AccountMutation, LedgerStore, MemoryStore, Precondition, StoreError};
pub use types::{Account, Bid, BidRecord, Priority, MAX_PRIORITY, MIN_PRIORITY};
