//! SQLite backing store plumbing.
//!
//! Opens the [`SqlitePool`] the ledger and the account store run on, bootstraps the four relations
//! the core relies on and classifies driver errors the ledger needs to tell apart.

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::sqlite::SqliteJournalMode;
use sqlx::sqlite::SqlitePoolOptions;

use crate::config::Config;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Merchandise offered by a freshly bootstrapped store, `(name, price)`.
pub const CATALOG: [(&str, i64); 10] = [
    ("t-shirt", 80),
    ("cup", 20),
    ("book", 50),
    ("pen", 10),
    ("powerbank", 200),
    ("hoody", 300),
    ("umbrella", 200),
    ("socks", 10),
    ("wallet", 50),
    ("pink-hoody", 500),
];

/// Connects to `config.database_url`, creating the database file if needed.
///
/// # Errors
///
/// Returns an error if the URL cannot be parsed or the pool cannot open a connection.
pub async fn connect(config: &Config) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(&config.database_url)?;
    connect_with(options, config.max_connections).await
}

/// Opens a pool from explicit connect options, applying the journal and locking settings every
/// connection needs.
///
/// # Errors
///
/// Returns an error if the pool cannot open a connection.
pub async fn connect_with(options: SqliteConnectOptions, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = options
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
}

/// Creates the accounts, transfers, merchandise and inventory relations if missing and seeds the
/// merchandise [`CATALOG`]. Idempotent.
///
/// # Errors
///
/// Returns an error if any statement fails.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            id BLOB PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            balance INTEGER NOT NULL CHECK (balance >= 0),
            credential TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transfers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sender_id BLOB NOT NULL REFERENCES accounts(id),
            receiver_id BLOB NOT NULL REFERENCES accounts(id),
            amount INTEGER NOT NULL CHECK (amount > 0),
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_transfers_sender ON transfers(sender_id)")
        .execute(&mut *tx)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_transfers_receiver ON transfers(receiver_id)")
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS merchandise (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            price INTEGER NOT NULL CHECK (price >= 0)
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS inventory (
            account_id BLOB NOT NULL REFERENCES accounts(id),
            merchandise_id INTEGER NOT NULL REFERENCES merchandise(id),
            quantity INTEGER NOT NULL CHECK (quantity > 0),
            PRIMARY KEY (account_id, merchandise_id)
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    for (name, price) in CATALOG {
        sqlx::query("INSERT OR IGNORE INTO merchandise (name, price) VALUES (?, ?)")
            .bind(name)
            .bind(price)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await
}

/// Whether `error` is the store aborting a transaction because of a concurrent writer.
///
/// SQLite reports a lost write race on a deferred transaction as `SQLITE_BUSY` (5) or, in WAL mode,
/// `SQLITE_BUSY_SNAPSHOT` (517); shared-cache connections report `SQLITE_LOCKED` (6, 262). `40001`
/// is the SQL standard serialization failure state.
pub fn is_serialization_failure(error: &sqlx::Error) -> bool {
    database_code(error).is_some_and(|code| matches!(code.as_str(), "5" | "517" | "6" | "262" | "40001"))
}

/// Whether `error` is a unique constraint violation (`SQLITE_CONSTRAINT_UNIQUE`, 2067).
pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db_error) => db_error.is_unique_violation(),
        _ => false,
    }
}

fn database_code(error: &sqlx::Error) -> Option<String> {
    match error {
        sqlx::Error::Database(db_error) => db_error.code().map(|code| code.into_owned()),
        _ => None,
    }
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::test_support::temp_pool;
    use super::*;

    #[tokio::test]
    async fn init_schema_is_idempotent_and_seeds_catalog_once() {
        let (_dir, pool) = temp_pool().await;
        init_schema(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM merchandise")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, CATALOG.len() as i64);
    }

    #[tokio::test]
    async fn is_unique_violation_detects_duplicate_merchandise() {
        let (_dir, pool) = temp_pool().await;
        let error = sqlx::query("INSERT INTO merchandise (name, price) VALUES ('cup', 1)")
            .execute(&pool)
            .await
            .unwrap_err();

        assert!(is_unique_violation(&error));
        assert!(!is_serialization_failure(&error));
    }

    #[test]
    fn is_serialization_failure_detects_busy_snapshot() {
        assert!(is_serialization_failure(&super::test_support::busy_snapshot_error()));
    }

    #[test]
    fn is_serialization_failure_ignores_non_database_errors() {
        assert!(!is_serialization_failure(&sqlx::Error::RowNotFound));
        assert!(!is_unique_violation(&sqlx::Error::PoolTimedOut));
    }
}
