// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Process-wide run state
//!
//! At most one run is active. Starting and stopping go through a single lock,
//! and a stop cancels the run's token directly so the caller never waits on
//! the run.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use migration_types::{RunOutcome, TransferStats};

use crate::jobs::RunCounters;

/// A start or stop request that does not fit the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConflictError {
    #[error("{}", migration_api::MSG_ALREADY_RUNNING)]
    AlreadyRunning,

    #[error("{}", migration_api::MSG_NOT_RUNNING)]
    NotRunning,
}

/// Handle given to the task that executes a run
#[derive(Debug, Clone)]
pub struct RunTicket {
    pub run_id: String,
    pub cancel: CancellationToken,
    pub counters: Arc<RunCounters>,
}

/// Point-in-time view of the run state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSnapshot {
    pub running: bool,
    pub run_id: Option<String>,
    pub last_outcome: Option<RunOutcome>,
    pub transfers: TransferStats,
}

#[derive(Default)]
struct Inner {
    active: Option<RunTicket>,
    last_run_id: Option<String>,
    last_outcome: Option<RunOutcome>,
    last_stats: TransferStats,
}

#[derive(Default)]
pub struct RunState {
    inner: Mutex<Inner>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the single run slot.
    pub fn try_start(&self) -> Result<RunTicket, ConflictError> {
        let mut inner = self.lock();
        if inner.active.is_some() {
            return Err(ConflictError::AlreadyRunning);
        }

        let ticket = RunTicket {
            run_id: uuid::Uuid::new_v4().to_string(),
            cancel: CancellationToken::new(),
            counters: Arc::new(RunCounters::default()),
        };
        inner.active = Some(ticket.clone());
        Ok(ticket)
    }

    /// Cancel the active run. Returns without waiting for it to wind down.
    pub fn request_stop(&self) -> Result<(), ConflictError> {
        let inner = self.lock();
        match &inner.active {
            Some(run) => {
                run.cancel.cancel();
                Ok(())
            }
            None => Err(ConflictError::NotRunning),
        }
    }

    /// Record the outcome of a run and release the slot.
    pub fn finish(&self, run_id: &str, outcome: RunOutcome) {
        let mut inner = self.lock();
        let Some(run) = inner.active.take_if(|run| run.run_id == run_id) else {
            tracing::warn!(run_id = %run_id, "Finish for a run that is not active");
            return;
        };
        inner.last_stats = run.counters.snapshot();
        inner.last_run_id = Some(run.run_id);
        inner.last_outcome = Some(outcome);
    }

    /// Release the slot of a run that never got going, leaving no trace.
    pub fn abandon(&self, run_id: &str) {
        let mut inner = self.lock();
        let _ = inner.active.take_if(|run| run.run_id == run_id);
    }

    pub fn is_running(&self) -> bool {
        self.lock().active.is_some()
    }

    pub fn snapshot(&self) -> RunSnapshot {
        let inner = self.lock();
        match &inner.active {
            Some(run) => RunSnapshot {
                running: true,
                run_id: Some(run.run_id.clone()),
                last_outcome: inner.last_outcome,
                transfers: run.counters.snapshot(),
            },
            None => RunSnapshot {
                running: false,
                run_id: inner.last_run_id.clone(),
                last_outcome: inner.last_outcome,
                transfers: inner.last_stats.clone(),
            },
        }
    }
}
