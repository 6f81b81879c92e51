// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Migration engine
//!
//! A run walks the ledger's pending directories one at a time
//! ([`run::RunController`]). Each directory is listed on the source and its
//! objects are copied concurrently ([`directory::DirectoryMigrator`]), one
//! [`transfer::ObjectTransfer`] per object.

pub mod directory;
pub mod run;
pub mod transfer;

use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use migration_types::TransferStats;

use crate::metrics;
use crate::store::StoreError;

/// Failure to copy a single object, naming the step that failed
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Failed to open source object: {0}")]
    Open(#[source] StoreError),

    #[error("Failed to stat source object: {0}")]
    Stat(#[source] StoreError),

    #[error("Failed to write target object: {0}")]
    Write(#[source] StoreError),
}

/// Failure that abandons a whole directory
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Failed to list directory: {0}")]
    Listing(#[source] StoreError),

    #[error("Directory migration cancelled")]
    Cancelled,
}

/// Per-run transfer counters, shared between the engine and status queries
#[derive(Debug, Default)]
pub struct RunCounters {
    directories_completed: AtomicU64,
    directories_failed: AtomicU64,
    directories_cancelled: AtomicU64,
    objects_migrated: AtomicU64,
    objects_failed: AtomicU64,
    bytes_migrated: AtomicU64,
}

impl RunCounters {
    pub fn object_migrated(&self, bytes: u64) {
        self.objects_migrated.fetch_add(1, Ordering::Relaxed);
        self.bytes_migrated.fetch_add(bytes, Ordering::Relaxed);
        metrics::record_object_migrated(bytes);
    }

    pub fn object_failed(&self) {
        self.objects_failed.fetch_add(1, Ordering::Relaxed);
        metrics::record_object_failed();
    }

    pub fn directory_completed(&self) {
        self.directories_completed.fetch_add(1, Ordering::Relaxed);
        metrics::record_directory("completed");
    }

    pub fn directory_failed(&self) {
        self.directories_failed.fetch_add(1, Ordering::Relaxed);
        metrics::record_directory("failed");
    }

    pub fn directory_cancelled(&self) {
        self.directories_cancelled.fetch_add(1, Ordering::Relaxed);
        metrics::record_directory("cancelled");
    }

    pub fn snapshot(&self) -> TransferStats {
        TransferStats {
            directories_completed: self.directories_completed.load(Ordering::Relaxed),
            directories_failed: self.directories_failed.load(Ordering::Relaxed),
            directories_cancelled: self.directories_cancelled.load(Ordering::Relaxed),
            objects_migrated: self.objects_migrated.load(Ordering::Relaxed),
            objects_failed: self.objects_failed.load(Ordering::Relaxed),
            bytes_migrated: self.bytes_migrated.load(Ordering::Relaxed),
        }
    }
}
