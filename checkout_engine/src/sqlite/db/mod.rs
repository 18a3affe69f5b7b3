//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interactions are plain functions (rather than stateful structs) that accept a `&mut SqliteConnection`
//! argument. Callers can obtain a connection from a pool, or open an atomic transaction and pass `&mut *tx`, without
//! any other changes.
use std::{str::FromStr, time::Duration};

use checkout_common::helpers::env_or_default;
use log::*;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod addresses;
pub mod line_items;
pub mod orders;
pub mod transactions;

const SQLITE_DB_URL: &str = "sqlite://data/checkout_store.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn db_url() -> String {
    let result = std::env::var("CHECKOUT_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ CHECKOUT_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub fn max_connections() -> u32 {
    env_or_default("CHECKOUT_DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)
}

/// Opens a pool on `url`, creating the database file if needed.
///
/// Connections use write-ahead logging and wait on locks held by other connections rather than failing straight away.
pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections.max(1)).connect_with(options).await?;
    Ok(pool)
}
