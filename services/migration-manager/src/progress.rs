// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Append-only progress logs
//!
//! A migration writes two plain-text, line-oriented artifacts: the progress
//! log (directory and file events, completion, stop) and the failed-file log
//! (one line per key that could not be copied). Neither is read back by the
//! engine. Each entry is flushed and synced to disk before the write returns.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Shared append-only line sink
#[derive(Clone)]
pub struct ProgressLog {
    path: PathBuf,
    file: Arc<Mutex<File>>,
}

impl ProgressLog {
    /// Open (creating if needed) the log at `path` in append mode
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    /// Append one line. Errors are reported through tracing; a log write
    /// failure never interrupts a migration.
    pub async fn write(&self, message: &str) {
        if let Err(e) = self.try_write(message).await {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to write log entry"
            );
        }
    }

    async fn try_write(&self, message: &str) -> std::io::Result<()> {
        let mut file = self.file.lock().await;
        file.write_all(message.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        file.sync_data().await
    }
}

/// The pair of log sinks used by one run
#[derive(Clone)]
pub struct RunLogs {
    pub progress: ProgressLog,
    pub failures: ProgressLog,
}

impl RunLogs {
    pub async fn open(progress: &Path, failures: &Path) -> std::io::Result<Self> {
        Ok(Self {
            progress: ProgressLog::open(progress).await?,
            failures: ProgressLog::open(failures).await?,
        })
    }

    pub async fn file_migrated(&self, key: &str) {
        self.progress.write(&format!("File {} migrated", key)).await;
    }

    pub async fn file_failed(&self, key: &str) {
        self.failures
            .write(&format!("Failed to migrate file: {}", key))
            .await;
    }
}
