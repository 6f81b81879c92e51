// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! API context for the migration manager

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use migration_types::{DirectoryRecord, MigrationStatus, RunOutcome};

use crate::config::ManagerConfig;
use crate::jobs::run::RunController;
use crate::ledger::{Ledger, LedgerError};
use crate::metrics;
use crate::progress::RunLogs;
use crate::run_state::{ConflictError, RunState};
use crate::store::ObjectStore;

/// Reasons a run could not be started
#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error("Failed to open log file: {0}")]
    Log(#[from] std::io::Error),
}

/// A started run
pub struct RunHandle {
    pub run_id: String,
    /// Resolves once the run has finished and released the run slot
    pub task: JoinHandle<RunOutcome>,
}

/// API context shared across all request handlers
pub struct ApiContext {
    ledger: Arc<dyn Ledger>,
    source: Arc<dyn ObjectStore>,
    target: Arc<dyn ObjectStore>,
    run_state: Arc<RunState>,
    config: watch::Receiver<ManagerConfig>,
}

impl ApiContext {
    /// `config` carries the current reloadable settings; each run reads it
    /// once when it starts.
    pub fn new(
        ledger: Arc<dyn Ledger>,
        source: Arc<dyn ObjectStore>,
        target: Arc<dyn ObjectStore>,
        config: watch::Receiver<ManagerConfig>,
    ) -> Self {
        Self {
            ledger,
            source,
            target,
            run_state: Arc::new(RunState::new()),
            config,
        }
    }

    /// Start a run in the background
    pub async fn start_migration(&self) -> Result<RunHandle, StartError> {
        let ticket = self.run_state.try_start()?;
        let config = self.config.borrow().clone();

        let logs = match RunLogs::open(&config.migration_log, &config.failed_files_log).await {
            Ok(logs) => logs,
            Err(e) => {
                self.run_state.abandon(&ticket.run_id);
                return Err(e.into());
            }
        };

        let controller = RunController::new(
            Arc::clone(&self.ledger),
            Arc::clone(&self.source),
            Arc::clone(&self.target),
            logs,
            Arc::clone(&ticket.counters),
            config.max_concurrent_transfers,
        );

        tracing::info!(
            run_id = %ticket.run_id,
            max_concurrent_transfers = config.max_concurrent_transfers,
            "Starting migration run"
        );

        let run_id = ticket.run_id.clone();
        let run_state = Arc::clone(&self.run_state);
        let task = tokio::spawn(async move {
            metrics::set_run_active(true);
            let outcome = controller.run(&ticket.cancel).await;
            run_state.finish(&ticket.run_id, outcome);
            metrics::set_run_active(false);
            tracing::info!(run_id = %ticket.run_id, outcome = %outcome, "Migration run finished");
            outcome
        });

        Ok(RunHandle { run_id, task })
    }

    /// Ask the active run to stop
    pub fn stop_migration(&self) -> Result<(), ConflictError> {
        self.run_state.request_stop()?;
        tracing::info!("Migration stop requested");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.run_state.is_running()
    }

    pub async fn status(&self) -> Result<MigrationStatus, LedgerError> {
        let directories = self.ledger.status_counts().await?;
        let run = self.run_state.snapshot();

        Ok(MigrationStatus {
            running: run.running,
            run_id: run.run_id,
            last_outcome: run.last_outcome,
            directories,
            transfers: run.transfers,
        })
    }

    pub async fn list_directories(&self) -> Result<Vec<DirectoryRecord>, LedgerError> {
        self.ledger.list_directories().await
    }
}
