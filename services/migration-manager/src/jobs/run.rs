// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Migration run controller
//!
//! One run fetches the pending directories once and processes them in order,
//! one at a time. Ledger write failures are logged and the run moves on to
//! the next directory; only a failure to fetch the pending list fails the run.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use migration_types::RunOutcome;

use crate::jobs::{DirectoryError, RunCounters};
use crate::jobs::directory::DirectoryMigrator;
use crate::jobs::transfer::ObjectTransfer;
use crate::ledger::Ledger;
use crate::metrics;
use crate::progress::RunLogs;
use crate::store::ObjectStore;

pub struct RunController {
    ledger: Arc<dyn Ledger>,
    migrator: DirectoryMigrator,
    logs: RunLogs,
    counters: Arc<RunCounters>,
}

impl RunController {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        source: Arc<dyn ObjectStore>,
        target: Arc<dyn ObjectStore>,
        logs: RunLogs,
        counters: Arc<RunCounters>,
        max_concurrent_transfers: usize,
    ) -> Self {
        let transfer = Arc::new(ObjectTransfer::new(
            Arc::clone(&source),
            target,
            logs.clone(),
            Arc::clone(&counters),
        ));
        Self {
            ledger,
            migrator: DirectoryMigrator::new(source, transfer, max_concurrent_transfers),
            logs,
            counters,
        }
    }

    /// Process every pending directory until done or cancelled.
    pub async fn run(&self, cancel: &CancellationToken) -> RunOutcome {
        let pending = match self.ledger.list_pending().await {
            Ok(pending) => pending,
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch pending directories");
                self.logs
                    .progress
                    .write(&format!("Migration failed: {}", e))
                    .await;
                return RunOutcome::Failed;
            }
        };

        tracing::info!(directories = pending.len(), "Migration run started");

        for record in pending {
            if cancel.is_cancelled() {
                break;
            }
            self.migrate_one(cancel, &record.did).await;
        }

        if cancel.is_cancelled() {
            tracing::info!(stats = ?self.counters.snapshot(), "Migration stopped");
            self.logs.progress.write("Migration stopped").await;
            RunOutcome::Stopped
        } else {
            tracing::info!(stats = ?self.counters.snapshot(), "Migration completed successfully");
            self.logs
                .progress
                .write("Migration completed successfully")
                .await;
            RunOutcome::Completed
        }
    }

    async fn migrate_one(&self, cancel: &CancellationToken, did: &str) {
        if self.ledger.is_completed(did).await {
            tracing::info!(did = %did, "Directory already completed, skipping");
            metrics::record_directory("skipped");
            return;
        }

        if let Err(e) = self.ledger.mark_started(did).await {
            tracing::error!(did = %did, error = %e, "Failed to mark directory started, skipping");
            metrics::record_ledger_write_failure("mark_started");
            return;
        }

        tracing::info!(did = %did, "Migrating directory");
        self.logs
            .progress
            .write(&format!("Migrating directory {}", did))
            .await;

        let started = Instant::now();
        let result = self.migrator.migrate_directory(cancel, did).await;
        metrics::record_directory_duration(started.elapsed().as_secs_f64());

        let report = match result {
            Ok(report) => report,
            Err(DirectoryError::Cancelled) => {
                tracing::warn!(did = %did, "Directory migration interrupted by stop request");
                self.logs
                    .progress
                    .write(&format!("Directory {} stopped", did))
                    .await;
                self.counters.directory_cancelled();
                return;
            }
            Err(e) => {
                tracing::error!(did = %did, error = %e, "Directory migration failed");
                self.logs
                    .progress
                    .write(&format!("Directory {} failed: {}", did, e))
                    .await;
                self.counters.directory_failed();
                return;
            }
        };

        if let Err(e) = self.ledger.mark_completed(did).await {
            // The objects are copied; the next run will copy them again.
            tracing::error!(did = %did, error = %e, "Failed to mark directory completed");
            metrics::record_ledger_write_failure("mark_completed");
            return;
        }

        tracing::info!(
            did = %did,
            migrated = report.migrated,
            failed = report.failed,
            bytes = report.bytes,
            listed_bytes = report.listed_bytes,
            "Directory migrated"
        );
        self.logs
            .progress
            .write(&format!("Directory {} migrated", did))
            .await;
        self.counters.directory_completed();
    }
}
