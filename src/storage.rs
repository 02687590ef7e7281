//! Embedded SQLite ledger store
//!
//! Default backend for a single auction process. Conditional writes are a
//! single `UPDATE ... WHERE ... RETURNING` statement, so the balance check
//! and the mutation can never interleave with another writer.
//!
//! Calls run synchronously on the calling task while holding the connection
//! lock. Each statement is a single-row lookup or write, so rounds sharing
//! one process serialize on the lock rather than on a blocking pool.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::migrations::Migrator;
use crate::store::{AccountMutation, LedgerStore, Precondition, StoreError};
use crate::types::{bid_pk, token_pk, Account, BidRecord};

const ACCOUNT_COLUMNS: &str = "pk, team_id, token_balance, last_refill_time, reputation_score, \
     priority_usage, created_at_ms, updated_at_ms";

const BID_COLUMNS: &str = "pk, sk, target, priority, cost, score, created_at_ms, updated_at_ms";

pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.run_migrations()?;
        Ok(storage)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.run_migrations()?;
        Ok(storage)
    }

    fn run_migrations(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        Migrator::new().run(&conn)?;
        Ok(())
    }

    fn insert_account_sync(&self, account: &Account) -> Result<(), StoreError> {
        let usage = serde_json::to_string(&account.priority_usage)?;
        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT INTO tokens (pk, team_id, token_balance, last_refill_time, reputation_score, priority_usage, created_at_ms, updated_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(pk) DO NOTHING",
            params![
                account.pk,
                account.team_id,
                account.token_balance,
                account.last_refill_time,
                account.reputation_score,
                usage,
                account.created_at_ms,
                account.updated_at_ms,
            ],
        )?;
        if inserted == 0 {
            return Err(StoreError::AlreadyExists(account.pk.clone()));
        }
        Ok(())
    }

    fn get_account_sync(&self, team_id: &str) -> Result<Option<Account>, StoreError> {
        let conn = self.conn.lock();
        let account = conn
            .query_row(
                &format!("SELECT {} FROM tokens WHERE pk = ?1", ACCOUNT_COLUMNS),
                params![token_pk(team_id)],
                account_from_row,
            )
            .optional()?;
        Ok(account)
    }

    fn conditional_update_sync(
        &self,
        team_id: &str,
        precondition: Precondition,
        mutation: &AccountMutation,
    ) -> Result<Account, StoreError> {
        let pk = token_pk(team_id);
        let usage_key = mutation.usage_increment.map(i64::from);

        let conn = self.conn.lock();
        let updated = conn
            .query_row(
                &format!(
                    "UPDATE tokens SET
                         token_balance = COALESCE(?2, token_balance) + ?3,
                         reputation_score = COALESCE(?4, reputation_score) + ?5,
                         last_refill_time = CASE WHEN ?2 IS NULL THEN last_refill_time ELSE ?7 END,
                         priority_usage = CASE WHEN ?6 IS NULL THEN priority_usage
                             ELSE json_set(priority_usage, '$.\"' || ?6 || '\"',
                                  COALESCE(json_extract(priority_usage, '$.\"' || ?6 || '\"'), 0) + 1)
                             END,
                         updated_at_ms = ?7
                     WHERE pk = ?1 AND token_balance >= ?8
                     RETURNING {}",
                    ACCOUNT_COLUMNS
                ),
                params![
                    pk,
                    mutation.reset.map(|r| r.balance),
                    mutation.balance_delta,
                    mutation.reset.map(|r| r.reputation),
                    mutation.reputation_delta,
                    usage_key,
                    mutation.updated_at_ms,
                    precondition.min_balance(),
                ],
                account_from_row,
            )
            .optional()?;

        if let Some(account) = updated {
            return Ok(account);
        }

        let exists = conn
            .query_row("SELECT 1 FROM tokens WHERE pk = ?1", params![pk], |_| Ok(()))
            .optional()?
            .is_some();
        if exists {
            Err(StoreError::PreconditionFailed)
        } else {
            Err(StoreError::NotFound(pk))
        }
    }

    fn append_bid_sync(&self, record: &BidRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let inserted = conn.execute(
            &format!(
                "INSERT INTO bids ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(pk, sk) DO NOTHING",
                BID_COLUMNS
            ),
            params![
                record.pk,
                record.sk,
                record.target,
                record.priority,
                record.cost,
                record.score,
                record.created_at_ms,
                record.updated_at_ms,
            ],
        )?;
        if inserted == 0 {
            return Err(StoreError::AlreadyExists(record.sk.clone()));
        }
        Ok(())
    }

    fn bids_for_team_sync(&self, team_id: &str) -> Result<Vec<BidRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM bids WHERE pk = ?1 ORDER BY sk",
            BID_COLUMNS
        ))?;
        let bids = stmt
            .query_map(params![bid_pk(team_id)], |row| {
                Ok(BidRecord {
                    pk: row.get(0)?,
                    sk: row.get(1)?,
                    target: row.get(2)?,
                    priority: row.get(3)?,
                    cost: row.get(4)?,
                    score: row.get(5)?,
                    created_at_ms: row.get(6)?,
                    updated_at_ms: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(bids)
    }
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    let usage: String = row.get(5)?;
    let priority_usage: BTreeMap<u8, i64> = serde_json::from_str(&usage)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;
    Ok(Account {
        pk: row.get(0)?,
        team_id: row.get(1)?,
        token_balance: row.get(2)?,
        last_refill_time: row.get(3)?,
        reputation_score: row.get(4)?,
        priority_usage,
        created_at_ms: row.get(6)?,
        updated_at_ms: row.get(7)?,
    })
}

#[async_trait]
impl LedgerStore for SqliteStorage {
    async fn insert_account(&self, account: &Account) -> Result<(), StoreError> {
        self.insert_account_sync(account)
    }

    async fn get_account(&self, team_id: &str) -> Result<Option<Account>, StoreError> {
        self.get_account_sync(team_id)
    }

    async fn conditional_update(
        &self,
        team_id: &str,
        precondition: Precondition,
        mutation: &AccountMutation,
    ) -> Result<Account, StoreError> {
        self.conditional_update_sync(team_id, precondition, mutation)
    }

    async fn append_bid(&self, record: &BidRecord) -> Result<(), StoreError> {
        self.append_bid_sync(record)
    }

    async fn bids_for_team(&self, team_id: &str) -> Result<Vec<BidRecord>, StoreError> {
        self.bids_for_team_sync(team_id)
    }
}
