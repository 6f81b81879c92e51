// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Object store abstraction
//!
//! One [`ObjectStore`] handle is bound to a single bucket. Object bodies are
//! passed around as streaming readers so a copy never buffers a whole object.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Object store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object store error: {0}")]
    Service(String),
}

/// One entry of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
}

/// Object metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub size: u64,
    pub content_type: Option<String>,
}

/// Streaming object body
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send + Sync>>;

/// Lazy, recursive listing; an `Err` item ends the listing.
pub type ObjectListing = BoxStream<'static, Result<ObjectEntry, StoreError>>;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket this handle reads from or writes to
    fn bucket(&self) -> &str;

    /// Every object whose key starts with `prefix`, at any depth.
    fn list_objects(&self, prefix: &str) -> ObjectListing;

    async fn stat_object(&self, key: &str) -> Result<ObjectInfo, StoreError>;

    async fn get_object(&self, key: &str) -> Result<ObjectReader, StoreError>;

    /// Store `size` bytes read from `body` under `key`.
    async fn put_object(
        &self,
        key: &str,
        body: ObjectReader,
        size: u64,
        content_type: Option<&str>,
    ) -> Result<(), StoreError>;

    async fn bucket_exists(&self) -> Result<bool, StoreError>;
}

#[cfg(any(test, feature = "test-util"))]
pub mod memory {
    //! In-process object store with failure injection and call accounting

    use std::collections::{BTreeMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, PoisonError};
    use std::time::Duration;

    use bytes::Bytes;
    use futures_util::StreamExt;
    use tokio::io::AsyncReadExt;

    use super::*;

    #[derive(Default)]
    struct State {
        objects: BTreeMap<String, (Bytes, Option<String>)>,
        fail_stat: HashSet<String>,
        fail_get: HashSet<String>,
        fail_put: HashSet<String>,
        fail_listing: HashSet<String>,
        calls: Vec<String>,
    }

    /// Single-bucket store kept in memory
    pub struct MemoryStore {
        bucket: String,
        exists: bool,
        put_delay: Option<Duration>,
        state: Mutex<State>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl MemoryStore {
        pub fn new(bucket: &str) -> Self {
            Self {
                bucket: bucket.to_string(),
                exists: true,
                put_delay: None,
                state: Mutex::new(State::default()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        /// A handle whose bucket does not exist
        pub fn missing(bucket: &str) -> Self {
            Self {
                exists: false,
                ..Self::new(bucket)
            }
        }

        /// Hold every upload open for `delay` before storing it
        pub fn with_put_delay(mut self, delay: Duration) -> Self {
            self.put_delay = Some(delay);
            self
        }

        pub fn insert(&self, key: &str, body: impl Into<Bytes>, content_type: Option<&str>) {
            self.lock().objects.insert(
                key.to_string(),
                (body.into(), content_type.map(str::to_string)),
            );
        }

        pub fn object(&self, key: &str) -> Option<(Bytes, Option<String>)> {
            self.lock().objects.get(key).cloned()
        }

        pub fn keys(&self) -> Vec<String> {
            self.lock().objects.keys().cloned().collect()
        }

        pub fn fail_stat(&self, key: &str) {
            self.lock().fail_stat.insert(key.to_string());
        }

        pub fn fail_get(&self, key: &str) {
            self.lock().fail_get.insert(key.to_string());
        }

        pub fn fail_put(&self, key: &str) {
            self.lock().fail_put.insert(key.to_string());
        }

        /// End the listing of `prefix` with an error after its objects
        pub fn fail_listing(&self, prefix: &str) {
            self.lock().fail_listing.insert(prefix.to_string());
        }

        /// Operations issued so far, as `op:key`
        pub fn calls(&self) -> Vec<String> {
            self.lock().calls.clone()
        }

        pub fn count_calls(&self, op: &str) -> usize {
            let prefix = format!("{}:", op);
            self.lock()
                .calls
                .iter()
                .filter(|c| c.starts_with(&prefix))
                .count()
        }

        /// Highest number of uploads observed in flight at once
        pub fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, State> {
            self.state.lock().unwrap_or_else(PoisonError::into_inner)
        }

        fn record(&self, op: &str, key: &str) {
            self.lock().calls.push(format!("{}:{}", op, key));
        }
    }

    struct InFlight<'a>(&'a AtomicUsize);

    impl Drop for InFlight<'_> {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        fn bucket(&self) -> &str {
            &self.bucket
        }

        fn list_objects(&self, prefix: &str) -> ObjectListing {
            self.record("list", prefix);
            let state = self.lock();
            let mut items: Vec<Result<ObjectEntry, StoreError>> = state
                .objects
                .iter()
                .filter(|(key, _)| key.starts_with(prefix))
                .map(|(key, (body, _))| {
                    Ok(ObjectEntry {
                        key: key.clone(),
                        size: body.len() as u64,
                    })
                })
                .collect();
            if state.fail_listing.contains(prefix) {
                items.push(Err(StoreError::Service(format!(
                    "injected listing failure for {}",
                    prefix
                ))));
            }
            futures_util::stream::iter(items).boxed()
        }

        async fn stat_object(&self, key: &str) -> Result<ObjectInfo, StoreError> {
            self.record("stat", key);
            let state = self.lock();
            if state.fail_stat.contains(key) {
                return Err(StoreError::Service(format!("injected stat failure for {}", key)));
            }
            state
                .objects
                .get(key)
                .map(|(body, content_type)| ObjectInfo {
                    size: body.len() as u64,
                    content_type: content_type.clone(),
                })
                .ok_or_else(|| StoreError::NotFound(key.to_string()))
        }

        async fn get_object(&self, key: &str) -> Result<ObjectReader, StoreError> {
            self.record("get", key);
            let state = self.lock();
            if state.fail_get.contains(key) {
                return Err(StoreError::Service(format!("injected get failure for {}", key)));
            }
            let (body, _) = state
                .objects
                .get(key)
                .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
            Ok(Box::pin(std::io::Cursor::new(body.clone())))
        }

        async fn put_object(
            &self,
            key: &str,
            mut body: ObjectReader,
            size: u64,
            content_type: Option<&str>,
        ) -> Result<(), StoreError> {
            self.record("put", key);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            let _guard = InFlight(&self.in_flight);
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if let Some(delay) = self.put_delay {
                tokio::time::sleep(delay).await;
            }
            if self.lock().fail_put.contains(key) {
                return Err(StoreError::Service(format!("injected put failure for {}", key)));
            }

            let mut buf = Vec::new();
            body.read_to_end(&mut buf).await?;
            if buf.len() as u64 != size {
                return Err(StoreError::Service(format!(
                    "short body for {}: expected {} bytes, read {}",
                    key,
                    size,
                    buf.len()
                )));
            }

            self.insert(key, buf, content_type);
            Ok(())
        }

        async fn bucket_exists(&self) -> Result<bool, StoreError> {
            Ok(self.exists)
        }
    }
}
