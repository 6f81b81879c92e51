// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Shared fixtures for the migration manager integration tests.

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::watch;

use migration_manager::config::ManagerConfig;
use migration_manager::context::ApiContext;
use migration_manager::ledger::memory::MemoryLedger;
use migration_manager::store::memory::MemoryStore;
use migration_types::DirectoryStatus;

/// In-memory ledger and stores plus a temp directory for the run logs
pub struct Harness {
    pub ledger: Arc<MemoryLedger>,
    pub source: Arc<MemoryStore>,
    pub target: Arc<MemoryStore>,
    pub config_tx: watch::Sender<ManagerConfig>,
    pub dir: TempDir,
    context: ApiContext,
}

impl Harness {
    pub fn new(dirs: &[(&str, DirectoryStatus)]) -> Self {
        Self::with_target(dirs, MemoryStore::new("target"))
    }

    pub fn with_target(dirs: &[(&str, DirectoryStatus)], target: MemoryStore) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let config = ManagerConfig {
            migration_log: dir.path().join("migration.log"),
            failed_files_log: dir.path().join("failed_files.log"),
            max_concurrent_transfers: 4,
            ..ManagerConfig::default()
        };
        let (config_tx, _) = watch::channel(config);
        let ledger = Arc::new(MemoryLedger::with_directories(dirs.iter().copied()));
        let source = Arc::new(MemoryStore::new("source"));
        let target = Arc::new(target);
        let context = ApiContext::new(
            ledger.clone(),
            source.clone(),
            target.clone(),
            config_tx.subscribe(),
        );

        Self {
            ledger,
            source,
            target,
            config_tx,
            dir,
            context,
        }
    }

    /// Put objects with a small text body on the source
    pub fn seed(&self, keys: &[&str]) {
        for key in keys {
            self.source
                .insert(key, format!("body of {}", key), Some("text/plain"));
        }
    }

    /// The context every engine test drives, so run state persists across
    /// calls
    pub fn context(&self) -> &ApiContext {
        &self.context
    }

    /// A separate context for handing to a server, sharing the same ledger,
    /// stores and config
    pub fn server_context(&self) -> ApiContext {
        ApiContext::new(
            self.ledger.clone(),
            self.source.clone(),
            self.target.clone(),
            self.config_tx.subscribe(),
        )
    }

    pub fn set_max_concurrent_transfers(&self, n: usize) {
        self.config_tx
            .send_modify(|config| config.max_concurrent_transfers = n);
    }

    /// Point the progress log at a directory that does not exist
    pub fn break_progress_log(&self) {
        let missing: PathBuf = self.dir.path().join("missing").join("migration.log");
        self.config_tx
            .send_modify(|config| config.migration_log = missing);
    }

    pub fn progress_log(&self) -> String {
        std::fs::read_to_string(self.dir.path().join("migration.log")).unwrap_or_default()
    }

    pub fn failed_log(&self) -> String {
        std::fs::read_to_string(self.dir.path().join("failed_files.log")).unwrap_or_default()
    }
}
