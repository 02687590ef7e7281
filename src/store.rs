//! Ledger store contract
//!
//! The ledger and the recorder talk to persistence only through
//! [`LedgerStore`]. Implementations must make every call atomic with
//! respect to the single account it touches; that conditional write is the
//! only thing protecting balances from concurrent rounds.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::info;

use crate::config::{StorageBackend, StorageConfig};
use crate::pg_storage::PgStorage;
use crate::storage::SqliteStorage;
use crate::types::{bid_pk, token_pk, Account, BidRecord, Priority};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("record already exists: {0}")]
    AlreadyExists(String),

    #[error("conditional check failed")]
    PreconditionFailed,

    #[error("ledger store unavailable: {0}")]
    Unavailable(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("failed to create connection pool: {0}")]
    CreatePool(#[from] deadpool_postgres::CreatePoolError),

    #[error("malformed record: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Current wall clock in unix milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Numeric guard evaluated atomically with a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    None,
    BalanceAtLeast(i64),
}

impl Precondition {
    pub fn holds(&self, account: &Account) -> bool {
        match self {
            Precondition::None => true,
            Precondition::BalanceAtLeast(amount) => account.token_balance >= *amount,
        }
    }

    /// Lowest balance that satisfies the guard, for `WHERE token_balance >= ?`.
    pub fn min_balance(&self) -> i64 {
        match self {
            Precondition::None => i64::MIN,
            Precondition::BalanceAtLeast(amount) => *amount,
        }
    }
}

/// Absolute values written by a refill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reset {
    pub balance: i64,
    pub reputation: i64,
}

/// Field-level change applied to one account.
///
/// A reset is applied first, then the deltas, then the usage increment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountMutation {
    pub reset: Option<Reset>,
    pub balance_delta: i64,
    pub reputation_delta: i64,
    pub usage_increment: Option<Priority>,
    pub updated_at_ms: i64,
}

impl AccountMutation {
    pub fn debit(cost: i64, priority: Priority, now_ms: i64) -> Self {
        Self {
            balance_delta: -cost,
            usage_increment: Some(priority),
            updated_at_ms: now_ms,
            ..Default::default()
        }
    }

    pub fn adjust_reputation(delta: i64, now_ms: i64) -> Self {
        Self {
            reputation_delta: delta,
            updated_at_ms: now_ms,
            ..Default::default()
        }
    }

    pub fn refill(balance: i64, reputation: i64, now_ms: i64) -> Self {
        Self {
            reset: Some(Reset {
                balance,
                reputation,
            }),
            updated_at_ms: now_ms,
            ..Default::default()
        }
    }

    pub fn apply(&self, account: &mut Account) {
        if let Some(reset) = self.reset {
            account.token_balance = reset.balance;
            account.reputation_score = reset.reputation;
            account.last_refill_time = self.updated_at_ms;
        }
        account.token_balance += self.balance_delta;
        account.reputation_score += self.reputation_delta;
        if let Some(priority) = self.usage_increment {
            *account.priority_usage.entry(priority.get()).or_insert(0) += 1;
        }
        account.updated_at_ms = self.updated_at_ms;
    }
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Create the account. Fails with [`StoreError::AlreadyExists`] if the
    /// team already has one.
    async fn insert_account(&self, account: &Account) -> Result<(), StoreError>;

    async fn get_account(&self, team_id: &str) -> Result<Option<Account>, StoreError>;

    /// Single atomic read-modify-write. Returns the updated account, or
    /// [`StoreError::PreconditionFailed`] leaving the account untouched.
    async fn conditional_update(
        &self,
        team_id: &str,
        precondition: Precondition,
        mutation: &AccountMutation,
    ) -> Result<Account, StoreError>;

    async fn update(
        &self,
        team_id: &str,
        mutation: &AccountMutation,
    ) -> Result<Account, StoreError> {
        self.conditional_update(team_id, Precondition::None, mutation)
            .await
    }

    /// Write-once audit append.
    async fn append_bid(&self, record: &BidRecord) -> Result<(), StoreError>;

    /// Every bid record of a team, ordered by sort key.
    async fn bids_for_team(&self, team_id: &str) -> Result<Vec<BidRecord>, StoreError>;
}

/// Open the backend selected by configuration.
pub async fn open(config: &StorageConfig) -> Result<Arc<dyn LedgerStore>, StoreError> {
    let store: Arc<dyn LedgerStore> = match config.backend {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::Sqlite => Arc::new(SqliteStorage::new(&config.sqlite_path)?),
        StorageBackend::Postgres => {
            let url = config.database_url().ok_or_else(|| {
                StoreError::Unavailable("DATABASE_URL not set".to_string())
            })?;
            Arc::new(PgStorage::new(&url).await?)
        }
    };
    info!("Opened {:?} ledger store", config.backend);
    Ok(store)
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<String, Account>,
    bids: BTreeMap<(String, String), BidRecord>,
}

/// Process-local store. Each call holds the lock for its whole
/// read-modify-write, which gives the same per-account atomicity as the
/// conditional writes of the database backends.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn insert_account(&self, account: &Account) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if state.accounts.contains_key(&account.pk) {
            return Err(StoreError::AlreadyExists(account.pk.clone()));
        }
        state.accounts.insert(account.pk.clone(), account.clone());
        Ok(())
    }

    async fn get_account(&self, team_id: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.state.lock().accounts.get(&token_pk(team_id)).cloned())
    }

    async fn conditional_update(
        &self,
        team_id: &str,
        precondition: Precondition,
        mutation: &AccountMutation,
    ) -> Result<Account, StoreError> {
        let pk = token_pk(team_id);
        let mut state = self.state.lock();
        let account = state
            .accounts
            .get_mut(&pk)
            .ok_or(StoreError::NotFound(pk))?;
        if !precondition.holds(account) {
            return Err(StoreError::PreconditionFailed);
        }
        mutation.apply(account);
        Ok(account.clone())
    }

    async fn append_bid(&self, record: &BidRecord) -> Result<(), StoreError> {
        let key = (record.pk.clone(), record.sk.clone());
        let mut state = self.state.lock();
        if state.bids.contains_key(&key) {
            return Err(StoreError::AlreadyExists(record.sk.clone()));
        }
        state.bids.insert(key, record.clone());
        Ok(())
    }

    async fn bids_for_team(&self, team_id: &str) -> Result<Vec<BidRecord>, StoreError> {
        let pk = bid_pk(team_id);
        let state = self.state.lock();
        Ok(state
            .bids
            .range((pk.clone(), String::new())..)
            .take_while(|((key, _), _)| *key == pk)
            .map(|(_, record)| record.clone())
            .collect())
    }
}
