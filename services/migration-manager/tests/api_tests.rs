// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

// Allow expect/unwrap in tests - they provide clear panic messages on failure
#![allow(clippy::expect_used, clippy::unwrap_used)]

//! HTTP API tests for the migration manager.
//!
//! A real dropshot server is started on an ephemeral port with in-memory
//! ledger and stores behind it.

mod common;

use std::time::Duration;

use dropshot::{ConfigDropshot, ConfigLogging, ConfigLoggingLevel, HttpServerStarter};
use migration_manager::store::memory::MemoryStore;
use migration_types::{DirectoryRecord, DirectoryStatus, MigrationStatus, RunOutcome};
use reqwest::StatusCode;

use common::Harness;

// ============================================================================
// Test Infrastructure
// ============================================================================

struct TestServer {
    client: reqwest::Client,
    url: String,
    harness: Harness,
}

impl TestServer {
    fn start(harness: Harness) -> Self {
        // Already installed by an earlier test in this process
        let _ = rustls::crypto::ring::default_provider().install_default();
        migration_manager::metrics::register_metrics();

        let api = migration_api::migration_manager_api_mod::api_description::<
            migration_manager::MigrationManagerImpl,
        >()
        .expect("failed to create API description");

        let config_dropshot = ConfigDropshot {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            default_handler_task_mode: dropshot::HandlerTaskMode::Detached,
            ..Default::default()
        };

        let log = ConfigLogging::StderrTerminal {
            level: ConfigLoggingLevel::Error,
        }
        .to_logger("test-migration-manager")
        .expect("failed to create logger");

        let server = HttpServerStarter::new(&config_dropshot, api, harness.server_context(), &log)
            .expect("failed to create server")
            .start();

        let url = format!("http://{}", server.local_addr());

        // Leak the server handle to keep it running for the duration of the test
        std::mem::forget(server);

        Self {
            client: reqwest::Client::new(),
            url,
            harness,
        }
    }

    async fn post(&self, path: &str) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.url, path))
            .send()
            .await
            .expect("request failed")
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.url, path))
            .send()
            .await
            .expect("request failed")
    }

    async fn status(&self) -> MigrationStatus {
        let resp = self.get("/status").await;
        assert_eq!(resp.status(), StatusCode::OK);
        resp.json().await.expect("invalid status body")
    }

    /// Poll /status until the run is no longer active
    async fn wait_idle(&self) -> MigrationStatus {
        for _ in 0..200 {
            let status = self.status().await;
            if !status.running {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("migration did not finish");
    }
}

async fn error_message(resp: reqwest::Response) -> String {
    let body: serde_json::Value = resp.json().await.expect("invalid error body");
    body["message"].as_str().unwrap_or_default().to_string()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn start_runs_migration_to_completion() {
    let harness = Harness::new(&[("A", DirectoryStatus::Pending)]);
    harness.seed(&["A/1", "A/2"]);
    let server = TestServer::start(harness);

    let resp = server.post("/start").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "Migration started");

    let status = server.wait_idle().await;
    assert_eq!(status.last_outcome, Some(RunOutcome::Completed));
    assert!(status.run_id.is_some());
    assert_eq!(status.directories.completed, 1);
    assert_eq!(status.transfers.objects_migrated, 2);
    assert_eq!(server.harness.target.keys(), vec!["A/1", "A/2"]);
}

#[tokio::test]
async fn second_start_conflicts_then_stop_succeeds() {
    let harness = Harness::with_target(
        &[("A", DirectoryStatus::Pending)],
        MemoryStore::new("target").with_put_delay(Duration::from_millis(300)),
    );
    harness.seed(&["A/1", "A/2", "A/3"]);
    harness.set_max_concurrent_transfers(1);
    let server = TestServer::start(harness);

    assert_eq!(server.post("/start").await.status(), StatusCode::OK);

    let resp = server.post("/start").await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(error_message(resp).await, "Migration is already running");

    let resp = server.post("/stop").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "Migration stopping...");

    let status = server.wait_idle().await;
    assert_eq!(status.last_outcome, Some(RunOutcome::Stopped));
    assert_eq!(status.directories.completed, 0);
    assert!(server.harness.target.count_calls("put") < 3);
}

#[tokio::test]
async fn stop_without_run_conflicts() {
    let server = TestServer::start(Harness::new(&[("A", DirectoryStatus::Pending)]));

    let resp = server.post("/stop").await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(error_message(resp).await, "Migration is not running");

    let status = server.status().await;
    assert!(!status.running);
    assert!(status.run_id.is_none());
    assert_eq!(status.directories.pending, 1);
}

#[tokio::test]
async fn start_fails_when_log_cannot_be_opened() {
    let harness = Harness::new(&[("A", DirectoryStatus::Pending)]);
    harness.break_progress_log();
    let server = TestServer::start(harness);

    let resp = server.post("/start").await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let status = server.status().await;
    assert!(!status.running);
    assert_eq!(status.directories.pending, 1);
}

#[tokio::test]
async fn directories_lists_ledger_rows() {
    let harness = Harness::new(&[
        ("A", DirectoryStatus::Pending),
        ("B", DirectoryStatus::Completed),
    ]);
    let server = TestServer::start(harness);

    let resp = server.get("/directories").await;
    assert_eq!(resp.status(), StatusCode::OK);

    let raw: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(raw[1]["did"], "B");
    assert_eq!(raw[1]["status"], "completed");
    assert!(raw[1]["completedAt"].is_string());
    assert!(raw[0]["startedAt"].is_null());

    let records: Vec<DirectoryRecord> = serde_json::from_value(raw).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].status, DirectoryStatus::Pending);
}

#[tokio::test]
async fn metrics_are_exposed() {
    let harness = Harness::new(&[("A", DirectoryStatus::Pending)]);
    harness.seed(&["A/1"]);
    let server = TestServer::start(harness);

    assert_eq!(server.post("/start").await.status(), StatusCode::OK);
    server.wait_idle().await;

    let resp = server.get("/metrics").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/plain"));

    let body = resp.text().await.unwrap();
    assert!(body.contains("migration_manager_objects_total"));
    assert!(body.contains("migration_manager_bytes_total"));
}
