//! Embedded schema migrations
//!
//! Both backends track applied versions in `schema_migrations` and run
//! each pending script once, in version order.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::store::{now_ms, StoreError};

/// Portable across SQLite and PostgreSQL.
pub const SCHEMA_MIGRATIONS_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version BIGINT PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at_ms BIGINT NOT NULL
)";

#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub sql: &'static str,
}

pub const SQLITE_MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "001_schema",
        sql: include_str!("../migrations/sqlite/001_schema.sql"),
    },
    Migration {
        version: 2,
        name: "002_bid_target_index",
        sql: include_str!("../migrations/sqlite/002_bid_target_index.sql"),
    },
];

pub const POSTGRES_MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "001_schema",
        sql: include_str!("../migrations/postgres/001_schema.sql"),
    },
    Migration {
        version: 2,
        name: "002_bid_target_index",
        sql: include_str!("../migrations/postgres/002_bid_target_index.sql"),
    },
];

/// Applies [`SQLITE_MIGRATIONS`] to a connection.
pub struct Migrator {
    migrations: &'static [Migration],
}

impl Default for Migrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Migrator {
    pub fn new() -> Self {
        Self {
            migrations: SQLITE_MIGRATIONS,
        }
    }

    /// Run pending migrations, each in its own transaction. Returns how
    /// many were applied.
    pub fn run(&self, conn: &Connection) -> Result<usize, StoreError> {
        conn.execute_batch(SCHEMA_MIGRATIONS_TABLE)?;

        let mut applied = 0;
        for migration in self.migrations {
            let done = conn
                .query_row(
                    "SELECT 1 FROM schema_migrations WHERE version = ?1",
                    params![migration.version],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if done {
                continue;
            }

            let tx = conn.unchecked_transaction()?;
            tx.execute_batch(migration.sql)?;
            tx.execute(
                "INSERT INTO schema_migrations (version, name, applied_at_ms) VALUES (?1, ?2, ?3)",
                params![migration.version, migration.name, now_ms()],
            )?;
            tx.commit()?;

            info!("Applied migration {}", migration.name);
            applied += 1;
        }
        Ok(applied)
    }
}
