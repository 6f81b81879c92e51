// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Single-object copy

use std::sync::Arc;

use crate::jobs::{RunCounters, TransferError};
use crate::progress::RunLogs;
use crate::store::ObjectStore;

/// Copies one object, with its content type, to the same key on the target
pub struct ObjectTransfer {
    source: Arc<dyn ObjectStore>,
    target: Arc<dyn ObjectStore>,
    logs: RunLogs,
    counters: Arc<RunCounters>,
}

impl ObjectTransfer {
    pub fn new(
        source: Arc<dyn ObjectStore>,
        target: Arc<dyn ObjectStore>,
        logs: RunLogs,
        counters: Arc<RunCounters>,
    ) -> Self {
        Self {
            source,
            target,
            logs,
            counters,
        }
    }

    /// Copy `key` and record the outcome in the run logs and counters.
    ///
    /// Returns the number of bytes written.
    pub async fn transfer(&self, key: &str) -> Result<u64, TransferError> {
        match self.copy(key).await {
            Ok(size) => {
                tracing::debug!(key = %key, bytes = size, "File migrated");
                self.logs.file_migrated(key).await;
                self.counters.object_migrated(size);
                Ok(size)
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to migrate file");
                self.logs.file_failed(key).await;
                self.counters.object_failed();
                Err(e)
            }
        }
    }

    /// Stream the source body straight into the target write.
    async fn copy(&self, key: &str) -> Result<u64, TransferError> {
        let body = self
            .source
            .get_object(key)
            .await
            .map_err(TransferError::Open)?;

        let info = self
            .source
            .stat_object(key)
            .await
            .map_err(TransferError::Stat)?;

        self.target
            .put_object(key, body, info.size, info.content_type.as_deref())
            .await
            .map_err(TransferError::Write)?;

        Ok(info.size)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    struct Fixture {
        source: Arc<MemoryStore>,
        target: Arc<MemoryStore>,
        counters: Arc<RunCounters>,
        transfer: ObjectTransfer,
        dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let logs = RunLogs::open(&dir.path().join("migration.log"), &dir.path().join("failed.log"))
            .await
            .unwrap();
        let source = Arc::new(MemoryStore::new("src"));
        let target = Arc::new(MemoryStore::new("dst"));
        let counters = Arc::new(RunCounters::default());
        let transfer = ObjectTransfer::new(
            source.clone(),
            target.clone(),
            logs,
            counters.clone(),
        );
        Fixture {
            source,
            target,
            counters,
            transfer,
            dir,
        }
    }

    #[tokio::test]
    async fn copies_body_and_content_type() {
        let f = fixture().await;
        f.source.insert("A/1", "hello", Some("text/plain"));

        assert_eq!(f.transfer.transfer("A/1").await.unwrap(), 5);

        let (body, content_type) = f.target.object("A/1").unwrap();
        assert_eq!(&body[..], b"hello");
        assert_eq!(content_type.as_deref(), Some("text/plain"));
        assert_eq!(f.counters.snapshot().bytes_migrated, 5);

        let log = std::fs::read_to_string(f.dir.path().join("migration.log")).unwrap();
        assert_eq!(log, "File A/1 migrated\n");
    }

    #[tokio::test]
    async fn missing_source_is_an_open_failure() {
        let f = fixture().await;

        let err = f.transfer.transfer("A/missing").await.unwrap_err();
        assert!(matches!(err, TransferError::Open(_)));
        assert!(f.target.object("A/missing").is_none());

        let failed = std::fs::read_to_string(f.dir.path().join("failed.log")).unwrap();
        assert_eq!(failed, "Failed to migrate file: A/missing\n");
        assert_eq!(f.counters.snapshot().objects_failed, 1);
    }

    #[tokio::test]
    async fn stat_failure_is_reported_as_stat() {
        let f = fixture().await;
        f.source.insert("A/1", "x", None);
        f.source.fail_stat("A/1");

        let err = f.transfer.transfer("A/1").await.unwrap_err();
        assert!(matches!(err, TransferError::Stat(_)));
        assert_eq!(f.target.count_calls("put"), 0);
    }

    #[tokio::test]
    async fn write_failure_is_reported_as_write() {
        let f = fixture().await;
        f.source.insert("A/1", "x", None);
        f.target.fail_put("A/1");

        let err = f.transfer.transfer("A/1").await.unwrap_err();
        assert!(matches!(err, TransferError::Write(_)));

        let log = std::fs::read_to_string(f.dir.path().join("migration.log")).unwrap();
        assert!(log.is_empty());
    }
}
