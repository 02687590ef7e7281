//! PostgreSQL ledger store
//!
//! Shared backend for several auction processes working against the same
//! teams. Connects with DATABASE_URL and applies the embedded migrations on
//! startup.

use std::collections::BTreeMap;

use async_trait::async_trait;
use deadpool_postgres::{Config, Pool, Runtime};
use serde_json::Value;
use tokio_postgres::{NoTls, Row};
use tracing::{debug, info};

use crate::migrations::{POSTGRES_MIGRATIONS, SCHEMA_MIGRATIONS_TABLE};
use crate::store::{now_ms, AccountMutation, LedgerStore, Precondition, StoreError};
use crate::types::{bid_pk, token_pk, Account, BidRecord};

/// Database pool configuration
const DB_POOL_MAX_SIZE: usize = 20;
const DB_QUERY_TIMEOUT_SECS: u64 = 30;

const ACCOUNT_COLUMNS: &str = "pk, team_id, token_balance, last_refill_time, reputation_score, \
     priority_usage, created_at_ms, updated_at_ms";

const BID_COLUMNS: &str = "pk, sk, target, priority, cost, score, created_at_ms, updated_at_ms";

#[derive(Clone)]
pub struct PgStorage {
    pool: Pool,
}

impl PgStorage {
    /// Create storage from a connection string
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        use deadpool_postgres::{ManagerConfig, PoolConfig, RecyclingMethod};
        use std::time::Duration;

        let mut config = Config::new();
        config.url = Some(database_url.to_string());
        // applied to every pooled connection at startup
        config.options = Some(connection_options());

        config.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        config.pool = Some(PoolConfig {
            max_size: DB_POOL_MAX_SIZE,
            timeouts: deadpool_postgres::Timeouts {
                wait: Some(Duration::from_secs(DB_QUERY_TIMEOUT_SECS)),
                create: Some(Duration::from_secs(10)),
                recycle: Some(Duration::from_secs(30)),
            },
            ..Default::default()
        });

        let pool = config.create_pool(Some(Runtime::Tokio1), NoTls)?;

        // Test connection
        drop(pool.get().await?);

        info!(
            "Connected to PostgreSQL (pool_size: {}, query_timeout: {}s)",
            DB_POOL_MAX_SIZE, DB_QUERY_TIMEOUT_SECS
        );

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run embedded migrations
    async fn run_migrations(&self) -> Result<(), StoreError> {
        let mut client = self.pool.get().await?;
        client.batch_execute(SCHEMA_MIGRATIONS_TABLE).await?;

        for migration in POSTGRES_MIGRATIONS {
            let applied: bool = client
                .query_one(
                    "SELECT EXISTS(SELECT 1 FROM schema_migrations WHERE version = $1)",
                    &[&migration.version],
                )
                .await?
                .get(0);
            if applied {
                continue;
            }

            let tx = client.transaction().await?;
            tx.batch_execute(migration.sql).await?;
            tx.execute(
                "INSERT INTO schema_migrations (version, name, applied_at_ms) VALUES ($1, $2, $3)",
                &[&migration.version, &migration.name, &now_ms()],
            )
            .await?;
            tx.commit().await?;
            info!("Applied migration {}", migration.name);
        }

        Ok(())
    }
}

/// Server options sent with every new connection.
fn connection_options() -> String {
    format!("-c statement_timeout={}s", DB_QUERY_TIMEOUT_SECS)
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn usage_from_json(value: Value) -> Result<BTreeMap<u8, i64>, StoreError> {
    Ok(serde_json::from_value(value)?)
}

fn account_from_row(row: &Row) -> Result<Account, StoreError> {
    Ok(Account {
        pk: row.get("pk"),
        team_id: row.get("team_id"),
        token_balance: row.get("token_balance"),
        last_refill_time: row.get("last_refill_time"),
        reputation_score: row.get("reputation_score"),
        priority_usage: usage_from_json(row.get("priority_usage"))?,
        created_at_ms: row.get("created_at_ms"),
        updated_at_ms: row.get("updated_at_ms"),
    })
}

fn bid_from_row(row: &Row) -> BidRecord {
    BidRecord {
        pk: row.get("pk"),
        sk: row.get("sk"),
        target: row.get("target"),
        priority: row.get("priority"),
        cost: row.get("cost"),
        score: row.get("score"),
        created_at_ms: row.get("created_at_ms"),
        updated_at_ms: row.get("updated_at_ms"),
    }
}

// ============================================================================
// LEDGER STORE
// ============================================================================

#[async_trait]
impl LedgerStore for PgStorage {
    async fn insert_account(&self, account: &Account) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        let usage = serde_json::to_value(&account.priority_usage)?;
        let inserted = client
            .execute(
                "INSERT INTO tokens (pk, team_id, token_balance, last_refill_time, reputation_score, priority_usage, created_at_ms, updated_at_ms)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                 ON CONFLICT (pk) DO NOTHING",
                &[
                    &account.pk,
                    &account.team_id,
                    &account.token_balance,
                    &account.last_refill_time,
                    &account.reputation_score,
                    &usage,
                    &account.created_at_ms,
                    &account.updated_at_ms,
                ],
            )
            .await?;
        if inserted == 0 {
            return Err(StoreError::AlreadyExists(account.pk.clone()));
        }
        Ok(())
    }

    async fn get_account(&self, team_id: &str) -> Result<Option<Account>, StoreError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT {} FROM tokens WHERE pk = $1", ACCOUNT_COLUMNS),
                &[&token_pk(team_id)],
            )
            .await?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn conditional_update(
        &self,
        team_id: &str,
        precondition: Precondition,
        mutation: &AccountMutation,
    ) -> Result<Account, StoreError> {
        let client = self.pool.get().await?;
        let pk = token_pk(team_id);
        let reset_balance = mutation.reset.map(|r| r.balance);
        let reset_reputation = mutation.reset.map(|r| r.reputation);
        let usage_key = mutation.usage_increment.map(|p| p.to_string());
        let min_balance = precondition.min_balance();

        let row = client
            .query_opt(
                &format!(
                    "UPDATE tokens SET
                         token_balance = COALESCE($2::BIGINT, token_balance) + $3,
                         reputation_score = COALESCE($4::BIGINT, reputation_score) + $5,
                         last_refill_time = CASE WHEN $2::BIGINT IS NULL THEN last_refill_time ELSE $7 END,
                         priority_usage = CASE WHEN $6::TEXT IS NULL THEN priority_usage
                             ELSE jsonb_set(priority_usage, ARRAY[$6::TEXT],
                                  to_jsonb(COALESCE((priority_usage->>$6::TEXT)::BIGINT, 0) + 1))
                             END,
                         updated_at_ms = $7
                     WHERE pk = $1 AND token_balance >= $8
                     RETURNING {}",
                    ACCOUNT_COLUMNS
                ),
                &[
                    &pk,
                    &reset_balance,
                    &mutation.balance_delta,
                    &reset_reputation,
                    &mutation.reputation_delta,
                    &usage_key,
                    &mutation.updated_at_ms,
                    &min_balance,
                ],
            )
            .await?;

        if let Some(row) = row {
            return account_from_row(&row);
        }

        let exists: bool = client
            .query_one("SELECT EXISTS(SELECT 1 FROM tokens WHERE pk = $1)", &[&pk])
            .await?
            .get(0);
        if exists {
            debug!("Conditional update rejected for {}", pk);
            Err(StoreError::PreconditionFailed)
        } else {
            Err(StoreError::NotFound(pk))
        }
    }

    async fn append_bid(&self, record: &BidRecord) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        let inserted = client
            .execute(
                &format!(
                    "INSERT INTO bids ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                     ON CONFLICT (pk, sk) DO NOTHING",
                    BID_COLUMNS
                ),
                &[
                    &record.pk,
                    &record.sk,
                    &record.target,
                    &record.priority,
                    &record.cost,
                    &record.score,
                    &record.created_at_ms,
                    &record.updated_at_ms,
                ],
            )
            .await?;
        if inserted == 0 {
            return Err(StoreError::AlreadyExists(record.sk.clone()));
        }
        Ok(())
    }

    async fn bids_for_team(&self, team_id: &str) -> Result<Vec<BidRecord>, StoreError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                &format!("SELECT {} FROM bids WHERE pk = $1 ORDER BY sk", BID_COLUMNS),
                &[&bid_pk(team_id)],
            )
            .await?;
        Ok(rows.iter().map(bid_from_row).collect())
    }
}
