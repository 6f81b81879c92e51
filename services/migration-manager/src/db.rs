// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! PostgreSQL directory ledger using tokio-postgres
//!
//! Status updates are guarded in SQL so a row can only move forward, and
//! timestamps are stamped by the server the first time a row enters a state.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Config, Pool, Runtime};
use tokio_postgres::NoTls;

use migration_types::{DirectoryCounts, DirectoryRecord, DirectoryStatus};

use crate::ledger::{Ledger, LedgerError};

/// Ledger table, created at startup if missing
pub const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS directory (
    id           BIGSERIAL PRIMARY KEY,
    did          TEXT NOT NULL UNIQUE,
    total_files  INT,
    status       TEXT NOT NULL DEFAULT 'pending',
    started_at   TIMESTAMPTZ,
    completed_at TIMESTAMPTZ
)";

const SELECT_COLUMNS: &str = "SELECT id, did, total_files, status, started_at, completed_at FROM directory";

impl From<tokio_postgres::Error> for LedgerError {
    fn from(e: tokio_postgres::Error) -> Self {
        LedgerError::Query(e.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for LedgerError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        LedgerError::Connection(e.to_string())
    }
}

fn parse_status(s: &str) -> Result<DirectoryStatus, LedgerError> {
    DirectoryStatus::from_str(s).map_err(|_| LedgerError::InvalidStatus(s.to_string()))
}

fn row_to_record(row: &tokio_postgres::Row) -> Result<DirectoryRecord, LedgerError> {
    let status: String = row.try_get(3)?;
    let total_files: Option<i32> = row.try_get(2)?;
    let started_at: Option<DateTime<Utc>> = row.try_get(4)?;
    let completed_at: Option<DateTime<Utc>> = row.try_get(5)?;

    Ok(DirectoryRecord {
        id: row.try_get(0)?,
        did: row.try_get(1)?,
        total_files: total_files.map(i64::from),
        status: parse_status(&status)?,
        started_at,
        completed_at,
    })
}

/// Database operations
pub struct Database {
    pool: Pool,
}

impl Database {
    /// Create a new database connection pool from a connection URL
    pub async fn new(database_url: &str) -> Result<Self, LedgerError> {
        let pg_config: tokio_postgres::Config = database_url
            .parse()
            .map_err(|e| LedgerError::Connection(format!("Invalid database URL: {}", e)))?;

        let mut cfg = Config::new();
        if let Some(host) = pg_config.get_hosts().first() {
            match host {
                tokio_postgres::config::Host::Tcp(host) => {
                    cfg.host = Some(host.clone());
                }
                tokio_postgres::config::Host::Unix(path) => {
                    cfg.host = Some(path.to_string_lossy().to_string());
                }
            }
        }
        if let Some(port) = pg_config.get_ports().first() {
            cfg.port = Some(*port);
        }
        if let Some(user) = pg_config.get_user() {
            cfg.user = Some(user.to_string());
        }
        if let Some(password) = pg_config.get_password() {
            cfg.password = Some(String::from_utf8_lossy(password).to_string());
        }
        if let Some(dbname) = pg_config.get_dbname() {
            cfg.dbname = Some(dbname.to_string());
        }

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| LedgerError::Connection(format!("Failed to create pool: {}", e)))?;

        let client = pool.get().await?;
        client
            .execute("SELECT 1", &[])
            .await
            .map_err(|e| LedgerError::Connection(format!("Failed to connect to database: {}", e)))?;

        Ok(Self { pool })
    }

    /// Create the ledger table if it does not exist
    pub async fn init_schema(&self) -> Result<(), LedgerError> {
        let client = self.pool.get().await?;
        client.batch_execute(SCHEMA).await?;
        Ok(())
    }

    async fn query_records(&self, sql: &str) -> Result<Vec<DirectoryRecord>, LedgerError> {
        let client = self.pool.get().await?;
        let rows = client.query(sql, &[]).await?;
        rows.iter().map(row_to_record).collect()
    }
}

#[async_trait]
impl Ledger for Database {
    async fn list_pending(&self) -> Result<Vec<DirectoryRecord>, LedgerError> {
        self.query_records(&format!(
            "{} WHERE status IN ('pending', 'in_progress') ORDER BY id",
            SELECT_COLUMNS
        ))
        .await
    }

    async fn mark_started(&self, did: &str) -> Result<(), LedgerError> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                "UPDATE directory
                 SET status = 'in_progress', started_at = COALESCE(started_at, now())
                 WHERE did = $1 AND status <> 'completed'",
                &[&did],
            )
            .await?;

        if updated == 0 {
            return Err(LedgerError::NotUpdated(format!(
                "{} is missing or already completed",
                did
            )));
        }
        Ok(())
    }

    async fn mark_completed(&self, did: &str) -> Result<(), LedgerError> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                "UPDATE directory
                 SET status = 'completed',
                     started_at = COALESCE(started_at, now()),
                     completed_at = COALESCE(completed_at, now())
                 WHERE did = $1",
                &[&did],
            )
            .await?;

        if updated == 0 {
            return Err(LedgerError::NotUpdated(format!("{} is missing", did)));
        }
        Ok(())
    }

    async fn fetch_status(&self, did: &str) -> Result<Option<DirectoryStatus>, LedgerError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt("SELECT status FROM directory WHERE did = $1", &[&did])
            .await?;

        match row {
            Some(row) => {
                let status: String = row.try_get(0)?;
                parse_status(&status).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn list_directories(&self) -> Result<Vec<DirectoryRecord>, LedgerError> {
        self.query_records(&format!("{} ORDER BY id", SELECT_COLUMNS))
            .await
    }

    async fn status_counts(&self) -> Result<DirectoryCounts, LedgerError> {
        let client = self.pool.get().await?;
        let rows = client
            .query("SELECT status, COUNT(*) FROM directory GROUP BY status", &[])
            .await?;

        let mut counts = DirectoryCounts::default();
        for row in rows {
            let status: String = row.try_get(0)?;
            let count: i64 = row.try_get(1)?;
            counts.add(parse_status(&status)?, count);
        }
        Ok(counts)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_stored_status_strings() {
        assert_eq!(parse_status("pending").unwrap(), DirectoryStatus::Pending);
        assert_eq!(
            parse_status("in_progress").unwrap(),
            DirectoryStatus::InProgress
        );
        assert_eq!(
            parse_status("completed").unwrap(),
            DirectoryStatus::Completed
        );
    }

    #[test]
    fn unknown_status_is_rejected() {
        match parse_status("done") {
            Err(LedgerError::InvalidStatus(s)) => assert_eq!(s, "done"),
            other => panic!("Expected InvalidStatus, got {:?}", other),
        }
    }

    #[test]
    fn schema_defaults_to_pending() {
        assert!(SCHEMA.contains("did          TEXT NOT NULL UNIQUE"));
        assert!(SCHEMA.contains("DEFAULT 'pending'"));
    }

    #[tokio::test]
    async fn invalid_url_is_a_connection_error() {
        match Database::new("postgres://user@host:notaport/db").await {
            Err(LedgerError::Connection(msg)) => assert!(msg.contains("Invalid database URL")),
            Err(e) => panic!("Expected Connection error, got {}", e),
            Ok(_) => panic!("Expected an error"),
        }
    }
}
