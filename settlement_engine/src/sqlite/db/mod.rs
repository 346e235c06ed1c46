//! # SQLite Database methods
//!
//! This module contains the "low-level" SQLite database interactions.
//!
//! These are plain functions (rather than stateful structs) that accept a `&mut SqliteConnection` argument. Callers
//! can obtain a connection from the pool, or open a transaction when several calls must be atomic and pass `&mut tx`
//! through without any other changes.
//!
//! Timestamps are always bound from Rust, never taken from `CURRENT_TIMESTAMP`, so that every stored timestamp has
//! the same RFC 3339 format and string comparisons in SQL order them correctly.
//!
//! Rows are always read with `fetch_all`, even when at most one row can come back. A statement that is not stepped
//! to completion keeps SQLite's transaction open on the pooled connection. An unfinished write stays invisible to
//! other connections and holds the write lock, and an unfinished read pins a stale snapshot.
//!
//! Transactions that write start with the write (an `INSERT` or a guarded `UPDATE`) and read afterwards. A deferred
//! transaction that reads first cannot be upgraded to a writer in WAL mode once another connection has committed.
use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod adjustments;
pub mod batches;
pub mod checkout_sessions;
pub mod orders;
pub mod voucher_costs;

const SQLITE_DB_URL: &str = "sqlite://data/settlement.db";

pub fn db_url() -> String {
    let result = env::var("SPE_DATABASE_URL").unwrap_or_else(|_| {
        info!("SPE_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

/// Opens a pool in WAL mode, creating the database file if it does not exist. Writers queue on the busy timeout
/// instead of failing immediately.
pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}

/// True if the error is a violation of a UNIQUE constraint.
pub fn is_unique_violation(e: &SqlxError) -> bool {
    e.as_database_error().map(|e| e.is_unique_violation()).unwrap_or(false)
}
