// Bookshelf
// Copyright 2023 Julio Merino
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! Common utilities to interact with an SQLite database.

use crate::db::{DbError, DbResult};
use log::warn;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use time::OffsetDateTime;

/// Takes a raw SQLx error `e` and converts it to our generic error type.
pub fn map_sqlx_error(e: sqlx::Error) -> DbError {
    match e {
        sqlx::Error::ColumnDecode { source, .. } => DbError::DataIntegrityError(source.to_string()),
        sqlx::Error::RowNotFound => DbError::NotFound,
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => DbError::Unavailable,
        e if e.to_string().contains("UNIQUE constraint failed") => DbError::AlreadyExists,
        e if e.to_string().contains("CHECK constraint failed")
            || e.to_string().contains("NOT NULL constraint failed") =>
        {
            DbError::InvalidRecord(e.to_string())
        }
        e if e.to_string().contains("database is locked") => DbError::Unavailable,
        e => DbError::BackendError(e.to_string()),
    }
}

/// Returns true if `conn_str` names an in-memory database.
fn is_in_memory(conn_str: &str) -> bool {
    conn_str.contains(":memory:") || conn_str.contains("mode=memory")
}

/// A database instance backed by an SQLite database.
pub struct SqliteDb {
    /// Shared SQLite connection pool.  This is a cloneable type that all concurrent
    /// operations can use concurrently.
    pool: SqlitePool,
}

impl SqliteDb {
    /// Opens the database described by `conn_str`.
    ///
    /// In-memory databases vanish once their last connection goes away and are not shared
    /// across connections, so for those the pool keeps exactly one connection open forever.
    pub async fn connect(conn_str: &str) -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str(conn_str).map_err(map_sqlx_error)?;

        let mut pool_options = SqlitePoolOptions::new();
        if is_in_memory(conn_str) {
            pool_options = pool_options
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await.map_err(map_sqlx_error)?;
        Ok(Self { pool })
    }

    /// Returns the connection pool to issue queries against.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes all connections to the database.  Further operations report `Unavailable`.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl Drop for SqliteDb {
    fn drop(&mut self) {
        if !self.pool.is_closed() {
            warn!("Dropping connection without having called close() first");
        }
    }
}

/// Helper function to initialize the database with a schema.
///
/// The `schema` may contain multiple statements and must be idempotent.
pub async fn run_schema(db: &SqliteDb, schema: &str) -> DbResult<()> {
    sqlx::raw_sql(schema).execute(db.pool()).await.map_err(map_sqlx_error)?;
    Ok(())
}

/// Converts a timestamp as extracted from the database into an `OffsetDateTime`.
///
/// The input parameters must both be positive.  The reason why their types are `i64`s instead of
/// the `u64` you would expect is because the numeric types exposed by sqlx and SQLite are all
/// signed.  We could simply cast the types and accept negative representations in the database,
/// but that would pose difficulties when attempting to compare timestamps via relation operators
/// in SQL queries.
pub fn build_timestamp(timestamp_sec: i64, timestamp_nsec: i64) -> DbResult<OffsetDateTime> {
    if timestamp_sec < 0 || timestamp_nsec < 0 {
        return Err(DbError::DataIntegrityError(format!(
            "Timestamp cannot have negative quantities: sec={}, nsec={}",
            timestamp_sec, timestamp_nsec
        )));
    }

    match OffsetDateTime::from_unix_timestamp_nanos(
        (i128::from(timestamp_sec) * 1_000_000_000) + (i128::from(timestamp_nsec)),
    ) {
        Ok(timestamp) => Ok(timestamp),
        Err(e) => Err(DbError::DataIntegrityError(format!("Invalid timestamp: {}", e))),
    }
}

/// Converts a timestamp into the seconds and nanoseconds pair needed by the database.
///
/// The timestamp must be positive because `build_timestamp` also expects it to be positive when
/// recovering its values from the database.
pub fn unpack_timestamp(ts: OffsetDateTime) -> DbResult<(i64, i64)> {
    let nanos = ts.unix_timestamp_nanos();
    if nanos < 0 {
        return Err(DbError::InvalidRecord(format!(
            "Cannot store a timestamp before the epoch: {}",
            ts
        )));
    }
    match (i64::try_from(nanos / 1_000_000_000), i64::try_from(nanos % 1_000_000_000)) {
        (Ok(sec), Ok(nsec)) => Ok((sec, nsec)),
        _ => Err(DbError::InvalidRecord(format!("Timestamp out of range: {}", ts))),
    }
}

/// Test utilities for the SQLite connection.
#[cfg(any(feature = "testutils", test))]
pub mod testutils {
    use super::*;

    /// Initializes the test database.
    pub async fn setup() -> SqliteDb {
        let _can_fail = env_logger::builder().is_test(true).try_init();
        SqliteDb::connect(":memory:").await.unwrap()
    }
}
