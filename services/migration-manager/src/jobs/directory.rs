// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Directory migration
//!
//! Objects under a directory prefix are copied as the listing produces them.
//! At most `max_concurrent` copies run at once; a failed copy is logged and
//! counted but does not fail the directory. Whatever the result, every copy
//! that was launched finishes before [`DirectoryMigrator::migrate_directory`]
//! returns.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::jobs::transfer::ObjectTransfer;
use crate::jobs::{DirectoryError, TransferError};
use crate::store::ObjectStore;

/// What happened to the objects of one directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryReport {
    /// Keys produced by the listing
    pub listed: u64,
    /// Sizes reported by the listing
    pub listed_bytes: u64,
    pub migrated: u64,
    pub failed: u64,
    pub bytes: u64,
}

impl DirectoryReport {
    fn tally(&mut self, joined: Result<Result<u64, TransferError>, JoinError>) {
        match joined {
            Ok(Ok(bytes)) => {
                self.migrated += 1;
                self.bytes += bytes;
            }
            // Already logged by the transfer
            Ok(Err(_)) => self.failed += 1,
            Err(e) => {
                tracing::error!(error = %e, "Transfer task did not complete");
                self.failed += 1;
            }
        }
    }
}

pub struct DirectoryMigrator {
    source: Arc<dyn ObjectStore>,
    transfer: Arc<ObjectTransfer>,
    max_concurrent: usize,
}

impl DirectoryMigrator {
    /// `max_concurrent` is clamped to at least one.
    pub fn new(
        source: Arc<dyn ObjectStore>,
        transfer: Arc<ObjectTransfer>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            source,
            transfer,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Copy every object whose key starts with `did`.
    ///
    /// A listing error or cancellation stops new launches; in-flight copies
    /// are drained first, then the error is returned.
    pub async fn migrate_directory(
        &self,
        cancel: &CancellationToken,
        did: &str,
    ) -> Result<DirectoryReport, DirectoryError> {
        let mut listing = self.source.list_objects(did);
        let permits = Arc::new(Semaphore::new(self.max_concurrent));
        let mut in_flight = JoinSet::new();
        let mut report = DirectoryReport::default();

        let result = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Err(DirectoryError::Cancelled),
                next = listing.next() => next,
            };

            let entry = match next {
                None => break Ok(()),
                Some(Err(e)) => break Err(DirectoryError::Listing(e)),
                Some(Ok(entry)) => entry,
            };
            report.listed += 1;
            report.listed_bytes += entry.size;

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Err(DirectoryError::Cancelled),
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    // The semaphore is never closed
                    Err(_) => break Err(DirectoryError::Cancelled),
                },
            };

            let transfer = Arc::clone(&self.transfer);
            let key = entry.key;
            in_flight.spawn(async move {
                let _permit = permit;
                transfer.transfer(&key).await
            });

            while let Some(joined) = in_flight.try_join_next() {
                report.tally(joined);
            }
        };

        drop(listing);
        while let Some(joined) = in_flight.join_next().await {
            report.tally(joined);
        }

        match result {
            Ok(()) => Ok(report),
            Err(e) => {
                tracing::warn!(
                    did = %did,
                    error = %e,
                    listed = report.listed,
                    migrated = report.migrated,
                    failed = report.failed,
                    "Directory abandoned after draining in-flight transfers"
                );
                Err(e)
            }
        }
    }
}
