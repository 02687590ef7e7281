//! Error types for the auction engine and token ledger.

use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by pricing, the account ledger, the bid recorder and
/// the auction engine.
#[derive(Debug, Error)]
pub enum AuctionError {
    /// Priority outside the 1-10 range. Raised before any store access.
    #[error("invalid priority {0}: expected a value between 1 and 10")]
    InvalidPriority(i64),

    /// No account exists for the team.
    #[error("team not found: {0}")]
    AccountNotFound(String),

    /// The debit precondition `balance >= cost` did not hold at write time.
    #[error("insufficient token balance for team {team_id}: cost {cost}")]
    InsufficientBalance { team_id: String, cost: i64 },

    /// A negative amount was passed to a debit.
    #[error("invalid debit amount {0}: cost must not be negative")]
    InvalidCost(i64),

    /// The audit record for a bid could not be written.
    #[error("failed to record bid for team {team_id}: {source}")]
    RecordingFailed {
        team_id: String,
        #[source]
        source: StoreError,
    },

    /// No bid in the round was both recorded and affordable.
    #[error("auction had no winner")]
    NoWinner,

    #[error("ledger store error: {0}")]
    Store(#[from] StoreError),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, AuctionError>;
