//! # SQLite database methods
//!
//! This module contains the low-level SQLite interactions.
//!
//! Everything here is a plain function that accepts a `&mut SqliteConnection` argument. Callers
//! obtain a connection from a pool, or open a transaction when several calls must land
//! atomically, and pass it straight through.
use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

pub mod orders;
pub mod products;

const SQLITE_DB_URL: &str = "sqlite://data/storefront.db";

pub fn db_url() -> String {
    let result = env::var("SOE_DATABASE_URL").unwrap_or_else(|_| {
        info!("SOE_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}
