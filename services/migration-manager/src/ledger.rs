// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Directory ledger
//!
//! The ledger records one row per directory with its migration status and is
//! the source of truth for resuming an interrupted migration. The production
//! implementation lives in [`crate::db`]; `memory::MemoryLedger` (behind the
//! `test-util` feature) keeps the same contract in process.

use async_trait::async_trait;
use thiserror::Error;

use migration_types::{DirectoryCounts, DirectoryRecord, DirectoryStatus};

/// Ledger (persistence) errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Directory not updated: {0}")]
    NotUpdated(String),

    #[error("Invalid directory status: {0}")]
    InvalidStatus(String),
}

/// Persistence operations the migration engine relies on
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Directories that still need work, in the order the store returns them.
    ///
    /// This includes rows left `in_progress` by an interrupted run.
    async fn list_pending(&self) -> Result<Vec<DirectoryRecord>, LedgerError>;

    /// Move a directory to `in_progress`, stamping `started_at` if unset.
    async fn mark_started(&self, did: &str) -> Result<(), LedgerError>;

    /// Move a directory to `completed`, stamping `completed_at` if unset.
    async fn mark_completed(&self, did: &str) -> Result<(), LedgerError>;

    /// Current status of a directory, `None` if there is no such row.
    async fn fetch_status(&self, did: &str) -> Result<Option<DirectoryStatus>, LedgerError>;

    /// Every ledger row
    async fn list_directories(&self) -> Result<Vec<DirectoryRecord>, LedgerError>;

    /// Row count per status
    async fn status_counts(&self) -> Result<DirectoryCounts, LedgerError>;

    /// True only if the directory is known to be `completed`.
    ///
    /// Lookup failures count as not completed: re-copying a directory is
    /// safe, silently skipping one is not.
    async fn is_completed(&self, did: &str) -> bool {
        match self.fetch_status(did).await {
            Ok(status) => status == Some(DirectoryStatus::Completed),
            Err(e) => {
                tracing::warn!(did = %did, error = %e, "Directory status lookup failed");
                false
            }
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod memory {
    //! In-process ledger with failure injection

    use std::collections::HashSet;
    use std::sync::{Mutex, PoisonError};

    use chrono::Utc;

    use super::*;

    #[derive(Default)]
    struct State {
        rows: Vec<DirectoryRecord>,
        fail_list: bool,
        fail_lookup: bool,
        fail_started: HashSet<String>,
        fail_completed: HashSet<String>,
        calls: Vec<String>,
    }

    /// Ledger kept in memory, preserving insertion order
    #[derive(Default)]
    pub struct MemoryLedger {
        state: Mutex<State>,
    }

    impl MemoryLedger {
        pub fn new() -> Self {
            Self::default()
        }

        /// Build a ledger from `(did, status)` pairs
        pub fn with_directories<'a>(
            dirs: impl IntoIterator<Item = (&'a str, DirectoryStatus)>,
        ) -> Self {
            let ledger = Self::new();
            for (did, status) in dirs {
                ledger.insert(did, status);
            }
            ledger
        }

        pub fn insert(&self, did: &str, status: DirectoryStatus) {
            let mut state = self.lock();
            let id = state.rows.len() as i64 + 1;
            let mut record = DirectoryRecord::pending(id, did);
            let now = Utc::now();
            if status >= DirectoryStatus::InProgress {
                record.started_at = Some(now);
            }
            if status == DirectoryStatus::Completed {
                record.completed_at = Some(now);
            }
            record.status = status;
            state.rows.push(record);
        }

        pub fn record(&self, did: &str) -> Option<DirectoryRecord> {
            self.lock().rows.iter().find(|r| r.did == did).cloned()
        }

        pub fn status(&self, did: &str) -> Option<DirectoryStatus> {
            self.record(did).map(|r| r.status)
        }

        /// Make `list_pending` fail
        pub fn fail_list(&self) {
            self.lock().fail_list = true;
        }

        /// Make every status lookup fail
        pub fn fail_lookup(&self) {
            self.lock().fail_lookup = true;
        }

        pub fn fail_mark_started(&self, did: &str) {
            self.lock().fail_started.insert(did.to_string());
        }

        pub fn fail_mark_completed(&self, did: &str) {
            self.lock().fail_completed.insert(did.to_string());
        }

        /// Operations issued so far, as `op:did`
        pub fn calls(&self) -> Vec<String> {
            self.lock().calls.clone()
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, State> {
            self.state.lock().unwrap_or_else(PoisonError::into_inner)
        }

        fn advance(&self, op: &str, did: &str, next: DirectoryStatus) -> Result<(), LedgerError> {
            let mut state = self.lock();
            state.calls.push(format!("{}:{}", op, did));

            let failing = match next {
                DirectoryStatus::Completed => state.fail_completed.contains(did),
                _ => state.fail_started.contains(did),
            };
            if failing {
                return Err(LedgerError::Query(format!("injected {} failure", op)));
            }

            let row = state
                .rows
                .iter_mut()
                .find(|r| r.did == did)
                .ok_or_else(|| LedgerError::NotUpdated(did.to_string()))?;

            if !row.status.can_advance_to(next) {
                return Err(LedgerError::NotUpdated(format!(
                    "{} is already {}",
                    did, row.status
                )));
            }

            let now = Utc::now();
            row.status = next;
            if row.started_at.is_none() {
                row.started_at = Some(now);
            }
            if next == DirectoryStatus::Completed && row.completed_at.is_none() {
                row.completed_at = Some(now);
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Ledger for MemoryLedger {
        async fn list_pending(&self) -> Result<Vec<DirectoryRecord>, LedgerError> {
            let mut state = self.lock();
            state.calls.push("list_pending".to_string());
            if state.fail_list {
                return Err(LedgerError::Connection("injected list failure".to_string()));
            }
            Ok(state
                .rows
                .iter()
                .filter(|r| r.status != DirectoryStatus::Completed)
                .cloned()
                .collect())
        }

        async fn mark_started(&self, did: &str) -> Result<(), LedgerError> {
            self.advance("mark_started", did, DirectoryStatus::InProgress)
        }

        async fn mark_completed(&self, did: &str) -> Result<(), LedgerError> {
            self.advance("mark_completed", did, DirectoryStatus::Completed)
        }

        async fn fetch_status(&self, did: &str) -> Result<Option<DirectoryStatus>, LedgerError> {
            let mut state = self.lock();
            state.calls.push(format!("fetch_status:{}", did));
            if state.fail_lookup {
                return Err(LedgerError::Query("injected lookup failure".to_string()));
            }
            Ok(state.rows.iter().find(|r| r.did == did).map(|r| r.status))
        }

        async fn list_directories(&self) -> Result<Vec<DirectoryRecord>, LedgerError> {
            Ok(self.lock().rows.clone())
        }

        async fn status_counts(&self) -> Result<DirectoryCounts, LedgerError> {
            let mut counts = DirectoryCounts::default();
            for row in &self.lock().rows {
                counts.add(row.status, 1);
            }
            Ok(counts)
        }
    }
}
